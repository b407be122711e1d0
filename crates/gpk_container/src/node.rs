//! Recursive, offset-addressed record nodes.

use std::fmt::Write as _;
use std::io::{Cursor, Read, Write};

use binrw::{BinRead, BinWrite};
use tracing::{trace, warn};

use crate::config::CodecConfig;
use crate::cursor::scoped_seek;
use crate::error::{Error, Result};
use crate::pool::StringPool;
use crate::records::{read_name, write_name, DecodeContext, EncodeContext, Payload, RecordKind};
use crate::types::{checked_align, latin1_to_string, RecordInfo, Tag, INFO_SLOT_SIZE, RECORD_HEADER_SIZE};

fn overflow(name: &[u8]) -> Error {
    Error::InvalidRecord(format!(
        "{} does not fit a 4 GiB data block",
        latin1_to_string(name)
    ))
}

/// Placement of a record inside the data block
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RecordLayout {
    /// Offset of the record from the start of the data block
    pub offset: u32,
    /// Size of the record header and payload, without children
    pub size: u32,
    /// Offset of the child directory, `0` for leaves
    pub child_offset: u32,
}

/// A record with its payload and child records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordNode {
    pub type_tag: Tag,
    pub name: Vec<u8>,
    pub layout: RecordLayout,
    pub payload: Payload,
    pub children: Vec<RecordNode>,
}

impl RecordNode {
    /// Create a record without children
    pub fn new(type_tag: Tag, name: impl Into<Vec<u8>>, payload: Payload) -> RecordNode {
        RecordNode {
            type_tag,
            name: name.into(),
            payload,
            ..Default::default()
        }
    }

    /// Append a child record
    pub fn with_child(mut self, child: RecordNode) -> RecordNode {
        self.children.push(child);
        self
    }

    /// The record name decoded as latin-1
    pub fn name_str(&self) -> String {
        latin1_to_string(&self.name)
    }

    /// Number of records in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(RecordNode::count).sum::<usize>()
    }

    /// Visit this record and its descendants in pre-order
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a RecordNode, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at<'a>(&'a self, depth: usize, visit: &mut impl FnMut(&'a RecordNode, usize)) {
        visit(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, visit);
        }
    }

    /// First record of this subtree, in pre-order, accepted by `matches`
    pub fn find_mut(&mut self, matches: &impl Fn(&RecordNode) -> bool) -> Option<&mut RecordNode> {
        if matches(self) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(matches))
    }

    /// Push every string referenced by this subtree into `out`
    pub fn collect_strings(&self, out: &mut Vec<Vec<u8>>) {
        self.walk(&mut |node, _| {
            if !node.name.is_empty() {
                out.push(node.name.clone());
            }
            node.payload.collect_strings(out);
        });
    }

    /// The info slot describing this record
    pub fn info(&self) -> RecordInfo {
        RecordInfo {
            offset: self.layout.offset,
            size: self.layout.size,
            child_count: self.children.len() as u32,
            child_offset: self.layout.child_offset,
            reserved: 0,
        }
    }

    pub(crate) fn flatten_info(&self, out: &mut Vec<RecordInfo>) {
        self.walk(&mut |node, _| out.push(node.info()));
    }

    fn child_offsets(&self) -> Vec<u32> {
        self.children.iter().map(|c| c.layout.offset).collect()
    }

    fn encode_record(&self, pool: &StringPool, config: &CodecConfig) -> Result<Vec<u8>> {
        let child_offsets = self.child_offsets();
        let ctx = EncodeContext {
            pool,
            config,
            child_offsets: &child_offsets,
        };

        let mut record = Vec::new();
        record.write_all(&self.type_tag.0)?;
        write_name(&mut record, pool, &self.name)?;
        self.payload.encode(&mut record, &ctx)?;
        Ok(record)
    }

    /// Bottom-up pass: compute `size` for every record, returns the subtree size
    ///
    /// Each child adds its own subtree size plus one info slot in the parent's
    /// child directory.
    pub(crate) fn measure(&mut self, pool: &StringPool, config: &CodecConfig) -> Result<u32> {
        self.layout.size = self.encode_record(pool, config)?.len() as u32;

        let mut total = self.layout.size;
        for child in &mut self.children {
            let subtree = child.measure(pool, config)?;
            total = total
                .checked_add(INFO_SLOT_SIZE)
                .and_then(|t| t.checked_add(subtree))
                .ok_or_else(|| overflow(&self.name))?;
        }
        Ok(total)
    }

    /// Whether the first child has to start on a 16-byte boundary
    fn aligns_first_child(&self) -> bool {
        matches!(self.type_tag, Tag::SKELETON | Tag::BONE)
    }

    /// Top-down pass: assign `offset` to this record and lay out its children
    ///
    /// Returns the end of the laid out subtree. [`RecordNode::measure`] must run first.
    pub(crate) fn place(&mut self, offset: u32, config: &CodecConfig) -> Result<u32> {
        self.layout.offset = offset;
        let end = offset
            .checked_add(self.layout.size)
            .ok_or_else(|| overflow(&self.name))?;
        if self.children.is_empty() {
            self.layout.child_offset = 0;
            return Ok(end);
        }

        self.layout.child_offset = end;
        let directory = u32::try_from(self.children.len())
            .ok()
            .and_then(|n| n.checked_mul(INFO_SLOT_SIZE));
        let mut cursor = directory
            .and_then(|d| end.checked_add(d))
            .ok_or_else(|| overflow(&self.name))?;
        if self.aligns_first_child() {
            cursor = checked_align(cursor).ok_or_else(|| overflow(&self.name))?;
        }

        for child in &mut self.children {
            if config.is_aligned_name(&child.name) {
                cursor = checked_align(cursor).ok_or_else(|| overflow(&child.name))?;
            }
            cursor = child.place(cursor, config)?;
        }

        let offsets = self.child_offsets();
        self.payload.bind_child_offsets(&offsets);

        trace!(name = %self.name_str(), offset, end = cursor, "placed record");
        Ok(cursor)
    }

    /// Write this subtree into the data block at the offsets assigned by [`RecordNode::place`]
    pub(crate) fn write_data(
        &self,
        data: &mut Cursor<Vec<u8>>,
        pool: &StringPool,
        config: &CodecConfig,
    ) -> Result<()> {
        let record = self.encode_record(pool, config)?;
        if record.len() as u32 != self.layout.size {
            return Err(Error::InvalidRecord(format!(
                "{} changed size between layout passes",
                self.name_str()
            )));
        }

        scoped_seek(data, self.layout.offset.into(), |d| Ok(d.write_all(&record)?))?;

        if !self.children.is_empty() {
            scoped_seek(data, self.layout.child_offset.into(), |d| {
                for child in &self.children {
                    child.info().write(d)?;
                }
                Ok(())
            })?;
        }

        for child in &self.children {
            child.write_data(data, pool, config)?;
        }
        Ok(())
    }

    /// Rebuild a subtree from the pre-order record-info table and the data block
    pub(crate) fn read<I>(
        infos: &mut I,
        data: &mut Cursor<&[u8]>,
        pool: &StringPool,
        config: &CodecConfig,
    ) -> Result<RecordNode>
    where
        I: Iterator<Item = RecordInfo>,
    {
        let info = infos
            .next()
            .ok_or_else(|| Error::InvalidRecord("record-info table ended early".into()))?;
        if info.size < RECORD_HEADER_SIZE {
            return Err(Error::InvalidRecord(format!(
                "record at {:#x} is smaller than its header",
                info.offset
            )));
        }

        if u64::from(info.offset) + u64::from(info.size) > data.get_ref().len() as u64 {
            return Err(Error::InvalidRecord(format!(
                "record at {:#x} of {} bytes extends past the data block",
                info.offset, info.size
            )));
        }

        let record = scoped_seek(data, info.offset.into(), |d| {
            let mut buffer = vec![0u8; info.size as usize];
            d.read_exact(&mut buffer)?;
            Ok(buffer)
        })?;

        let type_tag = Tag::sniff(&record).unwrap_or_default();
        let name = read_name(&mut &record[4..8], pool)?;

        let children = (0..info.child_count)
            .map(|_| RecordNode::read(infos, data, pool, config))
            .collect::<Result<Vec<_>>>()?;

        if !children.is_empty() {
            let directory = scoped_seek(data, info.child_offset.into(), |d| {
                (0..children.len())
                    .map(|_| RecordInfo::read(d).map_err(Error::from))
                    .collect::<Result<Vec<_>>>()
            })?;
            let expected = children.iter().map(RecordNode::info).collect::<Vec<_>>();
            if directory != expected {
                warn!(
                    name = %latin1_to_string(&name),
                    "child directory disagrees with the record-info table"
                );
            }
        }

        let kind = RecordKind::resolve(type_tag, &name);
        let child_offsets = children.iter().map(|c| c.layout.offset).collect::<Vec<_>>();
        let ctx = DecodeContext {
            pool,
            config,
            name: &name,
            child_offsets: &child_offsets,
        };
        let payload = Payload::decode(kind, &record[RECORD_HEADER_SIZE as usize..], &ctx);

        Ok(RecordNode {
            type_tag,
            name,
            layout: RecordLayout {
                offset: info.offset,
                size: info.size,
                child_offset: info.child_offset,
            },
            payload,
            children,
        })
    }

    /// Append a human readable listing of this subtree to `out`
    pub fn render(&self, out: &mut String) {
        self.walk(&mut |node, depth| {
            let _ = writeln!(
                out,
                "{:indent$}{} {:?} [{}] offset={:#x} size={:#x} children={}",
                "",
                node.type_tag,
                node.name_str(),
                node.payload.label(),
                node.layout.offset,
                node.layout.size,
                node.children.len(),
                indent = depth * 2,
            );
        });
    }
}
