//! Types for reading package archives
//!

use binrw::BinRead;
use bon::Builder;
use gpk_container::{
    cursor::scoped_seek,
    types::latin1_to_string,
    CodecConfig, Container,
};
use indexmap::IndexMap;
use std::io::{Cursor, Read, Seek, SeekFrom};
use tracing::{debug, info, instrument, warn};

use crate::{
    compression::ExternalCodec,
    dispatch::{DecoderChain, EntryPayload},
    error::{Error, FileNotFoundError, Result},
    types::{ArchiveHeader, DirectoryRecord, DIRECTORY_RECORD_SIZE, MAGIC},
};

/// A single named blob of an archive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveEntry {
    /// Name of the entry
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`).
    pub name: String,
    /// Raw name as stored in the directory
    pub name_raw: Vec<u8>,
    /// Offset of the data from the start of the archive
    pub offset: u32,
    pub size: u32,
    pub data: Vec<u8>,
    pub payload: EntryPayload,
}

impl ArchiveEntry {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The decoded container, if the entry holds one
    pub fn container(&self) -> Option<&Container> {
        match &self.payload {
            EntryPayload::Container(container) => Some(container),
            EntryPayload::Opaque => None,
        }
    }
}

/// Options for how entries are decoded while reading
#[derive(Debug, Clone, Default, Builder)]
pub struct ReadOptions {
    /// Configuration handed to the container decoder of the standard chain
    #[builder(default)]
    pub config: CodecConfig,

    /// Replaces the standard decoder chain
    pub chain: Option<DecoderChain>,
}

impl ReadOptions {
    fn decoder_chain(&self) -> DecoderChain {
        self.chain
            .clone()
            .unwrap_or_else(|| DecoderChain::standard(&self.config))
    }
}

/// Package archive reader
///
/// ```no_run
/// fn list_archive(reader: impl std::io::Read + std::io::Seek) -> gpk_archive::error::Result<()> {
///     let archive = gpk_archive::Archive::new(reader)?;
///
///     for entry in archive.entries() {
///         println!("{} ({} bytes, {})", entry.name, entry.size, entry.payload.label());
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Archive {
    header: ArchiveHeader,
    entries: Vec<ArchiveEntry>,
    /// Index of the last entry carrying each name
    names: IndexMap<String, usize>,
}

impl Archive {
    /// Read an archive with the standard decoder chain
    pub fn new<R: Read + Seek>(reader: R) -> Result<Archive> {
        Self::with_options(reader, &ReadOptions::default())
    }

    /// Read an archive starting at the current position of `reader`
    #[instrument(skip_all, err)]
    pub fn with_options<R: Read + Seek>(mut reader: R, options: &ReadOptions) -> Result<Archive> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        let header = Self::read_header(&mut reader)?;
        debug!(?header);

        if header.directory_size != header.entry_count.saturating_mul(DIRECTORY_RECORD_SIZE) {
            return Err(Error::InvalidArchive(format!(
                "directory size {} does not match {} entries",
                header.directory_size, header.entry_count
            )));
        }

        let records = (0..header.entry_count)
            .map(|_| DirectoryRecord::read(&mut reader).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        let chain = options.decoder_chain();
        let mut entries = Vec::with_capacity(records.len());
        let mut names = IndexMap::with_capacity(records.len());
        for record in records {
            let entry = Self::read_entry(&mut reader, &chain, &record, start, end)?;
            if names.insert(entry.name.clone(), entries.len()).is_some() {
                warn!("duplicate entry {}, lookups by name find the last one", entry.name);
            }
            entries.push(entry);
        }

        info!("read {} entries", entries.len());
        Ok(Archive {
            header,
            entries,
            names,
        })
    }

    /// Undo [`crate::ArchiveWriter::finish_compressed`] and read the result
    pub fn decompress<R: Read>(
        mut reader: R,
        codec: &dyn ExternalCodec,
        options: &ReadOptions,
    ) -> Result<Archive> {
        let mut packed = Vec::new();
        reader.read_to_end(&mut packed)?;
        let plain = codec.decompress(&packed)?;
        Self::with_options(Cursor::new(plain), options)
    }

    fn read_header<R: Read + Seek>(reader: &mut R) -> Result<ArchiveHeader> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| Error::InvalidArchive("file is too short".to_string()))?;
        if magic != MAGIC {
            return Err(Error::MalformedHeader {
                expected: MAGIC,
                found: magic,
            });
        }

        reader.seek(SeekFrom::Current(-4))?;
        Ok(ArchiveHeader::read(reader)?)
    }

    fn read_entry<R: Read + Seek>(
        reader: &mut R,
        chain: &DecoderChain,
        record: &DirectoryRecord,
        start: u64,
        end: u64,
    ) -> Result<ArchiveEntry> {
        let name_raw = record.name_bytes().to_vec();
        let name = latin1_to_string(&name_raw);

        let data_start = start + record.data_offset as u64;
        if data_start + record.data_size as u64 > end {
            return Err(Error::InvalidArchive(format!(
                "entry {name} extends past the end of the archive"
            )));
        }

        let data = scoped_seek(reader, data_start, |r| {
            let mut data = vec![0u8; record.data_size as usize];
            r.read_exact(&mut data)?;
            Ok(data)
        })?;

        let payload = chain.decode(&name, &data)?;

        Ok(ArchiveEntry {
            name,
            name_raw,
            offset: record.data_offset,
            size: record.data_size,
            data,
            payload,
        })
    }

    pub fn version(&self) -> u32 {
        self.header.version
    }

    /// Number of entries contained in this archive.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over all the entry names in directory order, duplicates included.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Returns an iterator over the entries in directory order.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter()
    }

    /// Get the index of an entry by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Get the name of an entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.name.as_str())
    }

    /// Search for an entry by name, the last one wins when names repeat
    pub fn by_name(&self, name: &str) -> Result<&ArchiveEntry> {
        self.index_for_name(name)
            .and_then(|index| self.entries.get(index))
            .ok_or_else(|| Error::FileNotFound(FileNotFoundError::Name(name.to_owned())))
    }

    /// Get an entry by index
    pub fn by_index(&self, index: usize) -> Result<&ArchiveEntry> {
        self.entries
            .get(index)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(index)))
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::dispatch::{DecoderChain, EntryPayload};
    use crate::error::{Error, Result};
    use crate::read::{Archive, ReadOptions};

    #[test]
    fn read_invalid_magic() {
        #[rustfmt::skip]
        let input = [
            0x47, 0x50, 0x41, 0x43,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let archive = Archive::new(Cursor::new(input));
        assert!(matches!(archive, Err(Error::MalformedHeader { .. })));
    }

    #[test]
    fn read_truncated() {
        let archive = Archive::new(Cursor::new([0x47, 0x50]));
        assert!(matches!(archive, Err(Error::InvalidArchive(_))));
    }

    #[test]
    fn read_empty_archive() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x47, 0x50, 0x41, 0x4B,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let archive = Archive::new(Cursor::new(input))?;
        assert!(archive.is_empty());
        assert_eq!(archive.version(), 1);

        Ok(())
    }

    #[test]
    fn read_directory_size_mismatch() {
        #[rustfmt::skip]
        let input = [
            0x47, 0x50, 0x41, 0x4B,
            0x01, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00,
        ];

        let archive = Archive::new(Cursor::new(input));
        assert!(matches!(archive, Err(Error::InvalidArchive(_))));
    }

    #[test]
    fn read_archive_with_entry() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            // Header (16)
            0x47, 0x50, 0x41, 0x4B,
            0x01, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x30, 0x00, 0x00, 0x00,
            // Directory (48)
            0x40, 0x00, 0x00, 0x00,
            0x0B, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x68, 0x65, 0x6C, 0x6C, 0x6F, 0x2E, 0x74, 0x78, 0x74, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // Data (11)
            0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72, 0x6C, 0x64,
        ];

        let archive = Archive::new(Cursor::new(input))?;
        assert_eq!(archive.len(), 1);

        let entry = archive.by_index(0)?;
        assert_eq!(entry.name, "hello.txt");
        assert_eq!(entry.offset, 0x40);
        assert_eq!(entry.data(), b"Hello World");
        assert_eq!(entry.payload, EntryPayload::Opaque);

        assert_eq!(archive.index_for_name("hello.txt"), Some(0));
        assert_eq!(archive.name_for_index(0), Some("hello.txt"));
        assert!(archive.by_name("missing.txt").is_err());
        assert!(archive.by_index(1).is_err());

        Ok(())
    }

    #[test]
    fn read_entry_past_end() {
        #[rustfmt::skip]
        let input = [
            0x47, 0x50, 0x41, 0x4B,
            0x01, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x30, 0x00, 0x00, 0x00,
            0x40, 0x00, 0x00, 0x00,
            0xFF, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x61, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let archive = Archive::with_options(
            Cursor::new(input),
            &ReadOptions::builder().chain(DecoderChain::opaque()).build(),
        );
        assert!(matches!(archive, Err(Error::InvalidArchive(_))));
    }
}
