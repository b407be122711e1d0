//! Base types for structure of typed container files.

use binrw::{BinRead, BinWrite};
use std::fmt;

use crate::error::{Error, Result};

/// Size of the fixed container header
pub const HEADER_SIZE: u32 = 64;

/// Size of one entry in the group directory
pub const GROUP_ENTRY_SIZE: u32 = 12;

/// Size of one record-info slot
pub const INFO_SLOT_SIZE: u32 = 20;

/// Size of the header in front of every record payload (type tag + name)
pub const RECORD_HEADER_SIZE: u32 = 8;

/// Name reference used when a field carries no string
pub const NAME_NONE: u32 = 0xFFFF_FFFF;

/// Every region and blob starts on this boundary
pub const ALIGNMENT: u32 = 16;

/// Rounds `value` up to the next multiple of [`ALIGNMENT`]
pub const fn align(value: u32) -> u32 {
    value.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// [`align`] for values read from a file, `None` when the result does not fit a `u32`
pub const fn checked_align(value: u32) -> Option<u32> {
    value.checked_next_multiple_of(ALIGNMENT)
}

/// A 4-byte ASCII identifier
#[derive(BinRead, BinWrite, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const CONTAINER: Tag = Tag(*b"GCTR");
    pub const TEXTURE: Tag = Tag(*b"TXTR");
    pub const MATERIAL: Tag = Tag(*b"MTRL");
    pub const MATERIAL_PARAM: Tag = Tag(*b"MPRM");
    pub const MESH: Tag = Tag(*b"MESH");
    pub const SHAPE: Tag = Tag(*b"SHPE");
    pub const SCENE_NODE: Tag = Tag(*b"NODE");
    pub const VERTEX_BUFFER: Tag = Tag(*b"VTXB");
    pub const SKELETON: Tag = Tag(*b"SKEL");
    pub const BONE: Tag = Tag(*b"BONE");

    /// Reads the tag at the start of `data`, if there are enough bytes
    pub fn sniff(data: &[u8]) -> Option<Tag> {
        data.get(..4)
            .and_then(|b| <[u8; 4]>::try_from(b).ok())
            .map(Tag)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&latin1_to_string(&self.0))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

/// Container file header
///
/// All data is stored in big endian format
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(big)]
pub struct ContainerHeader {
    pub magic: Tag,
    pub version_major: u16,
    pub version_minor: u16,
    pub group_count: u32,
    pub name: u32,
    pub group_directory_size: u32,
    pub string_pool_size: u32,
    pub record_info_size: u32,
    pub data_size: u32,
    pub ioram_name: u32,
    pub ioram_size: u32,
    pub vram_name: u32,
    pub vram_size: u32,
    pub reserved: [u32; 4],
}

impl Default for ContainerHeader {
    fn default() -> Self {
        Self {
            magic: Tag::CONTAINER,
            version_major: 1,
            version_minor: 0,
            group_count: 0,
            name: NAME_NONE,
            group_directory_size: 0,
            string_pool_size: 0,
            record_info_size: 0,
            data_size: 0,
            ioram_name: NAME_NONE,
            ioram_size: 0,
            vram_name: NAME_NONE,
            vram_size: 0,
            reserved: [0; 4],
        }
    }
}

impl ContainerHeader {
    pub fn group_directory_start(&self) -> u32 {
        HEADER_SIZE
    }

    pub fn string_pool_start(&self) -> Result<u32> {
        region_after(self.group_directory_start(), self.group_directory_size, "group directory")
    }

    pub fn record_info_start(&self) -> Result<u32> {
        region_after(self.string_pool_start()?, self.string_pool_size, "string pool")
    }

    pub fn data_start(&self) -> Result<u32> {
        region_after(self.record_info_start()?, self.record_info_size, "record-info table")
    }
}

fn region_after(start: u32, size: u32, region: &str) -> Result<u32> {
    start
        .checked_add(size)
        .and_then(checked_align)
        .ok_or_else(|| Error::InvalidHeader(format!("{region} of {size} bytes overflows the file")))
}

/// Entry of the group directory
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big)]
pub struct GroupEntry {
    pub tag: Tag,
    pub reserved: u32,
    pub record_count: u32,
}

/// Slot of the record-info table, also repeated in the parent's child directory
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct RecordInfo {
    pub offset: u32,
    pub size: u32,
    pub child_count: u32,
    pub child_offset: u32,
    pub reserved: u32,
}

/// Decodes single-byte latin-1 text
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encodes text as latin-1, replacing characters outside of that range with `?`
pub fn string_to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
