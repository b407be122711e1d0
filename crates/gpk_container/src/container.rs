//! Reading and writing typed containers
//!

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite};
use derive_more::derive::{Constructor, IntoIterator};
use tracing::{debug, info, instrument};

use crate::config::CodecConfig;
use crate::cursor::pad_to;
use crate::error::{Error, Result};
use crate::node::RecordNode;
use crate::pool::StringPool;
use crate::records::Payload;
use crate::skeleton::Skeleton;
use crate::types::{
    checked_align, latin1_to_string, ContainerHeader, GroupEntry, RecordInfo, Tag, ALIGNMENT,
    GROUP_ENTRY_SIZE, INFO_SLOT_SIZE, NAME_NONE,
};
use crate::vertex::VertexBuffer;

/// Name and size of a companion data blob consumed by mesh tooling
#[derive(Debug, Clone, Default, PartialEq, Constructor)]
pub struct SideChannel {
    pub name: Vec<u8>,
    pub size: u32,
}

/// Root records sharing one type tag
#[derive(Debug, Clone, Default, PartialEq, IntoIterator)]
pub struct TypeGroup {
    pub tag: Tag,
    #[into_iterator(owned, ref, ref_mut)]
    pub records: Vec<RecordNode>,
}

/// A typed container: a string pool and a forest of records grouped by type
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub version_major: u16,
    pub version_minor: u16,
    pub name: Vec<u8>,
    pub ioram: SideChannel,
    pub vram: SideChannel,
    pub groups: Vec<TypeGroup>,
}

impl Default for Container {
    fn default() -> Self {
        let header = ContainerHeader::default();
        Container {
            version_major: header.version_major,
            version_minor: header.version_minor,
            name: Vec::new(),
            ioram: SideChannel::default(),
            vram: SideChannel::default(),
            groups: Vec::new(),
        }
    }
}

fn name_ref(pool: &StringPool, name: &[u8]) -> Result<u32> {
    if name.is_empty() {
        Ok(NAME_NONE)
    } else {
        pool.lookup_offset(name)
    }
}

fn name_at(pool: &StringPool, offset: u32) -> Result<Vec<u8>> {
    match offset {
        NAME_NONE => Ok(Vec::new()),
        offset => Ok(pool.lookup_index(offset)?.to_vec()),
    }
}

fn read_region<R: Read + Seek>(reader: &mut R, start: u64, size: u32, end: u64) -> Result<Vec<u8>> {
    if start + u64::from(size) > end {
        return Err(Error::InvalidHeader(format!(
            "region at {start:#x} of {size} bytes extends past the end of the file"
        )));
    }
    reader.seek(SeekFrom::Start(start))?;
    let mut data = vec![0u8; size as usize];
    reader.read_exact(&mut data)?;
    Ok(data)
}

impl Container {
    pub fn new(name: impl Into<Vec<u8>>) -> Container {
        Container {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a container starting at the current position of `reader`
    #[instrument(skip_all)]
    pub fn read<R: Read + Seek>(reader: &mut R, config: &CodecConfig) -> Result<Container> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;
        let header = ContainerHeader::read(reader)?;
        if header.magic != Tag::CONTAINER {
            return Err(Error::MalformedHeader {
                expected: Tag::CONTAINER,
                found: header.magic,
            });
        }
        debug!(?header, "read container header");

        reader.seek(SeekFrom::Start(start + u64::from(header.group_directory_start())))?;
        let entries = (0..header.group_count)
            .map(|_| GroupEntry::read(reader).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        let pool_data = read_region(
            reader,
            start + u64::from(header.string_pool_start()?),
            header.string_pool_size,
            end,
        )?;
        let pool = StringPool::parse(&pool_data, config.string_padding, config.string_first_offset)?;

        let info_data = read_region(
            reader,
            start + u64::from(header.record_info_start()?),
            header.record_info_size,
            end,
        )?;
        let mut info_data = Cursor::new(info_data);
        let infos = (0..header.record_info_size / INFO_SLOT_SIZE)
            .map(|_| RecordInfo::read(&mut info_data).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        let data = read_region(
            reader,
            start + u64::from(header.data_start()?),
            header.data_size,
            end,
        )?;
        let mut data = Cursor::new(data.as_slice());

        let mut infos = infos.into_iter();
        let groups = entries
            .iter()
            .map(|entry| {
                let records = (0..entry.record_count)
                    .map(|_| RecordNode::read(&mut infos, &mut data, &pool, config))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TypeGroup {
                    tag: entry.tag,
                    records,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let container = Container {
            version_major: header.version_major,
            version_minor: header.version_minor,
            name: name_at(&pool, header.name)?,
            ioram: SideChannel::new(name_at(&pool, header.ioram_name)?, header.ioram_size),
            vram: SideChannel::new(name_at(&pool, header.vram_name)?, header.vram_size),
            groups,
        };
        info!(
            name = %latin1_to_string(&container.name),
            records = container.record_count(),
            "read container"
        );
        Ok(container)
    }

    /// Parse a container held in memory
    pub fn from_bytes(data: &[u8], config: &CodecConfig) -> Result<Container> {
        Container::read(&mut Cursor::new(data), config)
    }

    /// Every string referenced by the container, in discovery order
    pub fn collect_strings(&self) -> Vec<Vec<u8>> {
        let mut strings = Vec::new();
        for name in [&self.name, &self.ioram.name, &self.vram.name] {
            if !name.is_empty() {
                strings.push(name.clone());
            }
        }
        for record in self.records() {
            record.collect_strings(&mut strings);
        }
        strings
    }

    /// Lay out every record and serialize the container
    ///
    /// The computed offsets and sizes are stored in the records, so a container
    /// read back from the output compares equal to `self`.
    #[instrument(skip_all, fields(name = %latin1_to_string(&self.name)))]
    pub fn write(&mut self, config: &CodecConfig) -> Result<Vec<u8>> {
        let pool = StringPool::build(
            self.collect_strings(),
            config.string_padding,
            config.string_first_offset,
        );

        for record in self.records_mut() {
            record.measure(&pool, config)?;
        }
        let mut data_size = 0;
        for record in self.records_mut() {
            let offset = checked_align(data_size).ok_or_else(|| {
                Error::InvalidRecord("records do not fit a 4 GiB data block".into())
            })?;
            data_size = record.place(offset, config)?;
        }

        let mut data = Cursor::new(vec![0u8; data_size as usize]);
        let mut infos = Vec::new();
        for record in self.records() {
            record.write_data(&mut data, &pool, config)?;
            record.flatten_info(&mut infos);
        }

        let pool_data = pool.to_bytes();
        let header = ContainerHeader {
            magic: Tag::CONTAINER,
            version_major: self.version_major,
            version_minor: self.version_minor,
            group_count: self.groups.len() as u32,
            name: name_ref(&pool, &self.name)?,
            group_directory_size: GROUP_ENTRY_SIZE * self.groups.len() as u32,
            string_pool_size: pool_data.len() as u32,
            record_info_size: INFO_SLOT_SIZE * infos.len() as u32,
            data_size,
            ioram_name: name_ref(&pool, &self.ioram.name)?,
            ioram_size: self.ioram.size,
            vram_name: name_ref(&pool, &self.vram.name)?,
            vram_size: self.vram.size,
            reserved: [0; 4],
        };

        let mut output = Cursor::new(Vec::new());
        let writer = &mut output;
        header.write(writer)?;
        for group in &self.groups {
            GroupEntry {
                tag: group.tag,
                reserved: 0,
                record_count: group.records.len() as u32,
            }
            .write(writer)?;
        }
        pad_to(writer, ALIGNMENT.into())?;
        writer.write_all(&pool_data)?;
        pad_to(writer, ALIGNMENT.into())?;
        for info in &infos {
            info.write(writer)?;
        }
        pad_to(writer, ALIGNMENT.into())?;
        writer.write_all(data.get_ref())?;

        info!(
            groups = self.groups.len(),
            records = infos.len(),
            data_size,
            "wrote container"
        );
        Ok(output.into_inner())
    }

    /// Lay out every record and serialize the container into `writer`
    pub fn write_to<W: Write>(&mut self, writer: &mut W, config: &CodecConfig) -> Result<()> {
        writer.write_all(&self.write(config)?)?;
        Ok(())
    }

    /// Add a root record to the group of its type tag, creating the group if needed
    pub fn insert_record(&mut self, record: RecordNode) {
        match self.groups.iter_mut().find(|g| g.tag == record.type_tag) {
            Some(group) => group.records.push(record),
            None => self.groups.push(TypeGroup {
                tag: record.type_tag,
                records: vec![record],
            }),
        }
    }

    /// The group holding root records of type `tag`
    pub fn group(&self, tag: Tag) -> Option<&TypeGroup> {
        self.groups.iter().find(|g| g.tag == tag)
    }

    /// Root records of every group, in group order
    pub fn records(&self) -> impl Iterator<Item = &RecordNode> {
        self.groups.iter().flat_map(|g| &g.records)
    }

    fn records_mut(&mut self) -> impl Iterator<Item = &mut RecordNode> {
        self.groups.iter_mut().flat_map(|g| &mut g.records)
    }

    /// First record, nested records included, accepted by `matches`
    pub fn find_record_mut(
        &mut self,
        matches: impl Fn(&RecordNode) -> bool,
    ) -> Option<&mut RecordNode> {
        self.records_mut().find_map(|r| r.find_mut(&matches))
    }

    /// Number of records, nested records included
    pub fn record_count(&self) -> usize {
        self.records().map(RecordNode::count).sum()
    }

    /// Decode every skeleton root record
    pub fn skeletons(&self) -> Result<Vec<Skeleton>> {
        self.records()
            .filter(|r| matches!(r.payload, Payload::SkeletonRoot(_)))
            .map(Skeleton::from_record)
            .collect()
    }

    /// Every decoded vertex buffer, nested ones included, with its record name
    pub fn vertex_buffers(&self) -> Vec<(&[u8], &VertexBuffer)> {
        let mut buffers = Vec::new();
        for record in self.records() {
            record.walk(&mut |node, _| {
                if let Payload::VertexBuffer(buffer) = &node.payload {
                    buffers.push((node.name.as_slice(), buffer));
                }
            });
        }
        buffers
    }

    /// Human readable listing of the record forest
    pub fn render_tree(&self) -> String {
        let mut out = format!(
            "{} v{}.{} {:?}\n",
            Tag::CONTAINER,
            self.version_major,
            self.version_minor,
            latin1_to_string(&self.name)
        );
        for group in &self.groups {
            out.push_str(&format!("{} ({} records)\n", group.tag, group.records.len()));
            let mut listing = String::new();
            for record in group {
                record.render(&mut listing);
            }
            for line in listing.lines() {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::config::CodecConfig;
    use crate::container::{Container, SideChannel};
    use crate::error::{Error, Result};
    use crate::node::RecordNode;
    use crate::records::{MaterialParam, MaterialRecord, Payload, TextureRecord};
    use crate::types::{Tag, HEADER_SIZE};

    fn textured() -> Container {
        let mut container = Container::new(b"crate.gctr".to_vec());
        container.vram = SideChannel::new(b"crate.vram".to_vec(), 0x4000);
        container.insert_record(RecordNode::new(
            Tag::TEXTURE,
            b"wood".to_vec(),
            Payload::Texture(TextureRecord {
                width: 128,
                height: 128,
                format: 7,
                mip_count: 8,
                sidecar: b"wood.dds".to_vec(),
                data_size: 0x4000,
            }),
        ));
        container.insert_record(
            RecordNode::new(
                Tag::MATERIAL,
                b"crate".to_vec(),
                Payload::Material(MaterialRecord {
                    shader: b"lambert".to_vec(),
                    flags: 0,
                }),
            )
            .with_child(RecordNode::new(
                Tag::MATERIAL_PARAM,
                b"diffuse".to_vec(),
                Payload::MaterialParam(MaterialParam::Texture {
                    texture: b"wood".to_vec(),
                    slot: 0,
                }),
            )),
        );
        container
    }

    #[test]
    fn groups_by_type_tag() {
        let mut container = textured();
        container.insert_record(RecordNode::new(Tag::TEXTURE, b"metal".to_vec(), Payload::default()));

        assert_eq!(container.groups.len(), 2);
        assert_eq!(container.group(Tag::TEXTURE).map(|g| g.records.len()), Some(2));
        assert_eq!(container.record_count(), 4);
    }

    #[test]
    fn round_trip() -> Result<()> {
        let config = CodecConfig::default();
        let mut container = textured();

        let data = container.write(&config)?;
        assert_eq!(&data[..4], b"GCTR");

        let read = Container::from_bytes(&data, &config)?;
        assert_eq!(read, container);

        Ok(())
    }

    #[test]
    fn roots_are_aligned() -> Result<()> {
        let config = CodecConfig::default();
        let mut container = textured();
        container.write(&config)?;

        let offsets = container
            .records()
            .map(|r| r.layout.offset)
            .collect::<Vec<_>>();
        // texture: 8 byte header + 20 byte payload
        assert_eq!(offsets, vec![0, 32]);

        Ok(())
    }

    #[test]
    fn rejects_other_magic() {
        let mut data = vec![0u8; HEADER_SIZE as usize];
        data[..4].copy_from_slice(b"GPAK");

        assert!(matches!(
            Container::from_bytes(&data, &CodecConfig::default()),
            Err(Error::MalformedHeader { found: Tag(magic), .. }) if &magic == b"GPAK"
        ));
    }

    #[test]
    fn render_tree_lists_groups() -> Result<()> {
        let mut container = textured();
        container.write(&CodecConfig::default())?;

        let tree = container.render_tree();
        assert!(tree.starts_with("GCTR v1.0 \"crate.gctr\"\n"));
        assert!(tree.contains("MTRL (1 records)\n"));
        assert!(tree.contains("    MPRM \"diffuse\" [material param]"));

        Ok(())
    }

    #[test]
    fn finds_nested_records() {
        let mut container = textured();

        let param = container.find_record_mut(|r| r.type_tag == Tag::MATERIAL_PARAM);
        assert_eq!(param.map(|r| r.name.clone()), Some(b"diffuse".to_vec()));

        if let Some(texture) = container.find_record_mut(|r| r.name == b"wood") {
            texture.name = b"oak".to_vec();
        }
        assert_eq!(
            container.group(Tag::TEXTURE).map(|g| g.records[0].name.clone()),
            Some(b"oak".to_vec())
        );
        assert!(container.find_record_mut(|r| r.name == b"missing").is_none());
    }
}
