//! Types for writing package archives
//!

use binrw::BinWrite;
use bon::Builder;
use gpk_container::{types::string_to_latin1, CodecConfig, Container};
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use tracing::{debug, instrument, Level};

use crate::compression::ExternalCodec;
use crate::error::{Error, Result};
use crate::types::{
    ArchiveHeader, DirectoryRecord, ENTRY_ALIGNMENT, HEADER_SIZE,
    NAME_CAPACITY,
};

/// Options for how the archive should be written
#[derive(Debug, Clone, Builder)]
pub struct ArchiveWriterOptions {
    /// Format version stored in the header
    #[builder(default = 1)]
    pub version: u32,

    /// Configuration used when encoding containers added with [`ArchiveWriter::add_container`]
    #[builder(default)]
    pub config: CodecConfig,
}

impl Default for ArchiveWriterOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Default)]
struct PendingEntry {
    name: Vec<u8>,
    data: Vec<u8>,
}

/// Package archive generator
///
/// ```
/// # fn doit() -> gpk_archive::error::Result<()>
/// # {
/// use gpk_archive::{write::ArchiveWriterOptions, ArchiveWriter};
/// use std::io::Write;
///
/// // We use a buffer here, though you'd normally use a `File`
/// let mut archive = ArchiveWriter::new(
///     std::io::Cursor::new(Vec::new()),
///     ArchiveWriterOptions::default(),
/// );
///
/// archive.start_entry("hello_world.txt")?;
/// archive.write_all(b"Hello, World!")?;
///
/// // Apply the changes you've made.
/// archive.finish()?;
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct ArchiveWriter<W: Write + Seek> {
    inner: W,
    options: ArchiveWriterOptions,
    entries: Vec<PendingEntry>,
    current: Option<PendingEntry>,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Initializes the archive.
    ///
    /// Before writing to this object, the [`ArchiveWriter::start_entry`] function should be
    /// called. Nothing reaches `inner` before [`ArchiveWriter::finish`].
    pub fn new(inner: W, options: ArchiveWriterOptions) -> ArchiveWriter<W> {
        ArchiveWriter {
            inner,
            options,
            entries: Vec::new(),
            current: None,
        }
    }

    /// Returns true if an entry is currently open for writing.
    pub const fn is_writing_entry(&self) -> bool {
        self.current.is_some()
    }

    /// Start a new entry, finishing the open one
    #[instrument(skip(self, name), err)]
    pub fn start_entry(&mut self, name: impl ToString) -> Result<()> {
        self.finish_entry();

        let name = name.to_string();
        let name_raw = string_to_latin1(&name);
        if name_raw.len() > NAME_CAPACITY {
            return Err(Error::NameTooLong {
                name,
                max: NAME_CAPACITY,
            });
        }

        self.current = Some(PendingEntry {
            name: name_raw,
            data: Vec::new(),
        });

        Ok(())
    }

    /// Close the open entry, if any
    pub fn finish_entry(&mut self) {
        if let Some(entry) = self.current.take() {
            debug!("finished entry with {} bytes", entry.data.len());
            self.entries.push(entry);
        }
    }

    /// Add a complete entry
    pub fn add_entry(&mut self, name: impl ToString, data: &[u8]) -> Result<()> {
        self.start_entry(name)?;
        self.write_all(data)?;
        self.finish_entry();
        Ok(())
    }

    /// Encode `container` with the writer's codec configuration and add it as an entry
    pub fn add_container(&mut self, name: impl ToString, container: &mut Container) -> Result<()> {
        let data = container.write(&self.options.config)?;
        self.add_entry(name, &data)
    }

    /// Finish the last entry and write the archive
    ///
    /// This will return the writer, but one should normally not append any data to the end of the file.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        self.finish_entry();
        assemble(&mut self.inner, self.options.version, &self.entries)?;
        Ok(self.inner)
    }

    /// Finish the archive and emit it through `codec`
    #[instrument(skip_all, err)]
    pub fn finish_compressed(mut self, codec: &dyn ExternalCodec) -> Result<W> {
        self.finish_entry();

        let mut plain = Cursor::new(Vec::new());
        assemble(&mut plain, self.options.version, &self.entries)?;

        let packed = codec.compress(plain.get_ref())?;
        debug!("compressed {} bytes into {}", plain.get_ref().len(), packed.len());
        self.inner.write_all(&packed)?;

        Ok(self.inner)
    }
}

fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::InvalidArchive(format!("offset {value:#x} does not fit in 32 bits")))
}

/// Header and zeroed directory first, then every entry on an aligned offset, then the
/// directory is backfilled
fn assemble<S: Write + Seek>(out: &mut S, version: u32, entries: &[PendingEntry]) -> Result<()> {
    let start = out.stream_position()?;
    let count = to_u32(entries.len() as u64)?;

    let header = ArchiveHeader::new(version, count)?;
    header.write(out)?;
    out.write_all(&vec![0u8; header.directory_size as usize])?;

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let relative = out.stream_position()? - start;
        let padding = (ENTRY_ALIGNMENT - relative % ENTRY_ALIGNMENT) % ENTRY_ALIGNMENT;
        out.write_all(&vec![0u8; padding as usize])?;

        let offset = to_u32(relative + padding)?;
        let size = to_u32(entry.data.len() as u64)?;
        out.write_all(&entry.data)?;

        records.push(DirectoryRecord::new(&entry.name, offset, size)?);
    }

    let end = out.stream_position()?;
    out.seek(SeekFrom::Start(start + HEADER_SIZE as u64))?;
    for record in &records {
        record.write(out)?;
    }
    out.seek(SeekFrom::Start(end))?;

    Ok(())
}

impl<W: Write + Seek> Write for ArchiveWriter<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size=buf.len()) )]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(entry) = self.current.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "No entry has been started",
            ));
        };
        entry.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_str_eq;
    use tracing_test::traced_test;

    use crate::error::{Error, Result};
    use crate::write::{ArchiveWriter, ArchiveWriterOptions};
    use std::io::{Cursor, Seek, SeekFrom, Write};

    #[traced_test]
    #[test]
    fn empty_write() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            0x47, 0x50, 0x41, 0x4B,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveWriterOptions::default());
        let result = writer.finish()?;
        assert_str_eq!(
            format!("{:02X?}", *result.get_ref()),
            format!("{:02X?}", expected)
        );

        Ok(())
    }

    #[traced_test]
    #[test]
    fn two_entries_write() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            // Header
            0x47, 0x50, 0x41, 0x4B,
            0x02, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x60, 0x00, 0x00, 0x00,
            // Directory
            0x70, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x61, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,

            0x80, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x62, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // Data
            0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x04,
        ];

        let mut writer = ArchiveWriter::new(
            Cursor::new(Vec::new()),
            ArchiveWriterOptions::builder().version(2).build(),
        );
        writer.start_entry("a")?;
        writer.write_all(&[0x01, 0x02])?;
        writer.write_all(&[0x03])?;
        writer.add_entry("b", &[0x04])?;

        let result = writer.finish()?;
        assert_str_eq!(
            format!("{:02X?}", *result.get_ref()),
            format!("{:02X?}", expected)
        );

        Ok(())
    }

    #[test]
    fn offsets_are_relative_to_the_start() -> Result<()> {
        let mut out = Cursor::new(Vec::new());
        out.write_all(&[0xFF; 5])?;

        let mut writer = ArchiveWriter::new(out, ArchiveWriterOptions::default());
        writer.add_entry("a", &[0x01])?;
        let mut result = writer.finish()?;
        let position = result.seek(SeekFrom::Current(0))?;

        // entry at 16 + 48 = 0x40 relative, 0x45 absolute
        let data = result.into_inner();
        assert_eq!(&data[5 + 16..5 + 20], &[0x40, 0x00, 0x00, 0x00]);
        assert_eq!(data[5 + 0x40], 0x01);
        assert_eq!(position, data.len() as u64);

        Ok(())
    }

    #[test]
    fn write_without_entry() {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveWriterOptions::default());
        assert!(writer.write_all(b"data").is_err());
    }

    #[test]
    fn rejects_long_names() {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveWriterOptions::default());
        let result = writer.start_entry("x".repeat(36));

        assert!(matches!(result, Err(Error::NameTooLong { max: 35, .. })));
        assert!(!writer.is_writing_entry());
    }
}
