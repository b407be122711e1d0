//! Base types for structure of a package archive.

use binrw::{BinRead, BinWrite};

use crate::error::{Error, Result};

/// Size of the archive header
pub const HEADER_SIZE: u32 = 16;

/// Size of one directory record
pub const DIRECTORY_RECORD_SIZE: u32 = 48;

/// Longest entry name a directory record can hold, the terminating NUL excluded
pub const NAME_CAPACITY: usize = 35;

/// Entry data alignment inside the archive
pub const ENTRY_ALIGNMENT: u64 = 16;

/// Magic at the start of every archive
pub const MAGIC: [u8; 4] = *b"GPAK";

/// Package archive header
///
/// Always starts with "GPAK". All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"GPAK", little)]
pub struct ArchiveHeader {
    /// Format version, currently `1`
    pub version: u32,

    /// The number of directory records following the header
    pub entry_count: u32,

    /// Size of the directory in bytes
    pub directory_size: u32,
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        Self {
            version: 1,
            entry_count: 0,
            directory_size: 0,
        }
    }
}

impl ArchiveHeader {
    /// Header for `entry_count` entries, failing when the directory would not fit in 32 bits
    pub fn new(version: u32, entry_count: u32) -> Result<Self> {
        let directory_size = entry_count.checked_mul(DIRECTORY_RECORD_SIZE).ok_or_else(|| {
            Error::InvalidArchive(format!("{entry_count} entries do not fit in one directory"))
        })?;
        Ok(Self {
            version,
            entry_count,
            directory_size,
        })
    }
}

/// Package archive directory record
///
/// Defines an entry in the archive
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct DirectoryRecord {
    /// The offset to the data for this entry from the start of the archive
    pub data_offset: u32,

    /// The size of this entry's data
    pub data_size: u32,

    /// Always written as zero
    pub reserved: u32,

    /// NUL padded entry name
    pub name: [u8; 36],
}

impl Default for DirectoryRecord {
    fn default() -> Self {
        Self {
            data_offset: 0,
            data_size: 0,
            reserved: 0,
            name: [0u8; 36],
        }
    }
}

impl DirectoryRecord {
    /// Build a record, rejecting names that leave no room for the terminator
    pub fn new(name: &[u8], data_offset: u32, data_size: u32) -> Result<Self> {
        if name.len() > NAME_CAPACITY {
            return Err(Error::NameTooLong {
                name: String::from_utf8_lossy(name).into(),
                max: NAME_CAPACITY,
            });
        }

        let mut record = DirectoryRecord {
            data_offset,
            data_size,
            ..Default::default()
        };
        record.name[..name.len()].copy_from_slice(name);
        Ok(record)
    }

    /// The name up to its first NUL
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.name.len());
        &self.name[..end]
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::{BinRead, BinWrite};
    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::types::{ArchiveHeader, DirectoryRecord};

    #[test]
    fn read_header() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x47, 0x50, 0x41, 0x4B,
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x60, 0x00, 0x00, 0x00,
        ];

        let header = ArchiveHeader::read(&mut Cursor::new(input))?;
        assert_eq!(header, ArchiveHeader::new(1, 2)?);

        Ok(())
    }

    #[test]
    fn directory_size_overflow() {
        assert!(matches!(
            ArchiveHeader::new(1, u32::MAX / 16),
            Err(Error::InvalidArchive(_))
        ));
    }

    #[test]
    fn read_header_bad_magic() {
        #[rustfmt::skip]
        let input = [
            0x47, 0x43, 0x54, 0x52,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        assert!(ArchiveHeader::read(&mut Cursor::new(input)).is_err());
    }

    #[test]
    fn write_record() -> Result<()> {
        #[rustfmt::skip]
        let expected = [
            0x40, 0x00, 0x00, 0x00,
            0x0A, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x61, 0x2E, 0x62, 0x69, 0x6E, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let record = DirectoryRecord::new(b"a.bin", 0x40, 10)?;
        let mut out = Cursor::new(Vec::new());
        record.write(&mut out)?;

        assert_eq!(out.into_inner(), expected.to_vec());
        assert_eq!(record.name_bytes(), b"a.bin");

        Ok(())
    }

    #[test]
    fn name_capacity() -> Result<()> {
        let longest = [b'x'; 35];
        let record = DirectoryRecord::new(&longest, 0, 0)?;
        assert_eq!(record.name_bytes(), &longest[..]);

        let result = DirectoryRecord::new(&[b'x'; 36], 0, 0);
        assert!(matches!(result, Err(Error::NameTooLong { max: 35, .. })));

        Ok(())
    }
}
