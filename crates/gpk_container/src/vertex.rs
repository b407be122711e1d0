//! Interleaved vertex buffers.
//!
//! Attributes are stored in declaration order: positions, normals, binormals,
//! uvs, bone weights, bone indices, colors, tangents. Declarations are split
//! into stride groups, a new group starting at the first uv set and at the
//! first bone weight. Every group is one interleaved block of `stride` bytes
//! per vertex, each block starting on a 16-byte boundary.
//!
//! Skinned buffers always carry four bone weight and four bone index slots,
//! unused slots are written as padding declarations (flag `0`) filled with
//! zeros and are dropped again on decode.

use std::io::{Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::bridge::{VertexData, VertexStream};
use crate::cursor::bounded_count;
use crate::error::{Error, Result};
use crate::records::{push_name, read_name, write_name, DecodeContext, EncodeContext, RecordCodec};
use crate::types::{align, checked_align, latin1_to_string, string_to_latin1};

/// Size of the vertex buffer header
pub const VERTEX_HEADER_SIZE: u32 = 16;

/// Size of one vertex declaration
pub const DECLARATION_SIZE: u32 = 20;

/// Number of bone weight and bone index slots of a skinned vertex
pub const SKIN_SLOTS: u16 = 4;

/// Name the first uv set carries after decoding, in place of `uvSet`
pub const PRIMARY_UV_SET: &[u8] = b"map1";

const LEGACY_UV_SET: &[u8] = b"uvSet";

/// Semantic of a vertex attribute, in declaration order
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum VertexUsage {
    Positions,
    Normals,
    Binormals,
    Uvs,
    BoneWeights,
    BoneIndices,
    Colors,
    Tangents,
}

impl VertexUsage {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<VertexUsage> {
        Ok(match code {
            0 => VertexUsage::Positions,
            1 => VertexUsage::Normals,
            2 => VertexUsage::Binormals,
            3 => VertexUsage::Uvs,
            4 => VertexUsage::BoneWeights,
            5 => VertexUsage::BoneIndices,
            6 => VertexUsage::Colors,
            7 => VertexUsage::Tangents,
            other => {
                return Err(Error::InvalidVertexBuffer(format!(
                    "unknown usage code {other}"
                )))
            }
        })
    }

    /// Format the attribute is stored with
    pub fn storage_format(self) -> VertexFormat {
        match self {
            VertexUsage::Uvs => VertexFormat::Float2,
            VertexUsage::BoneWeights => VertexFormat::Float1,
            VertexUsage::BoneIndices => VertexFormat::Uint1,
            _ => VertexFormat::Float4,
        }
    }

    /// Value forced into the fourth component
    fn fixed_w(self) -> Option<f32> {
        match self {
            VertexUsage::Positions => Some(1.0),
            VertexUsage::Normals | VertexUsage::Binormals => Some(0.0),
            _ => None,
        }
    }

    fn starts_group(self) -> bool {
        matches!(self, VertexUsage::Uvs | VertexUsage::BoneWeights)
    }

    fn is_skinning(self) -> bool {
        matches!(self, VertexUsage::BoneWeights | VertexUsage::BoneIndices)
    }
}

/// Component type and count of one attribute
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VertexFormat {
    Float1,
    Float2,
    Float3,
    Float4,
    Uint1,
}

impl VertexFormat {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<VertexFormat> {
        Ok(match code {
            0 => VertexFormat::Float1,
            1 => VertexFormat::Float2,
            2 => VertexFormat::Float3,
            3 => VertexFormat::Float4,
            4 => VertexFormat::Uint1,
            other => {
                return Err(Error::InvalidVertexBuffer(format!(
                    "unknown format code {other}"
                )))
            }
        })
    }

    pub fn components(self) -> usize {
        match self {
            VertexFormat::Float1 | VertexFormat::Uint1 => 1,
            VertexFormat::Float2 => 2,
            VertexFormat::Float3 => 3,
            VertexFormat::Float4 => 4,
        }
    }

    /// Bytes taken by one value
    pub fn size(self) -> u32 {
        self.components() as u32 * 4
    }
}

/// Values of one attribute, one entry per vertex
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum AttributeValues {
    Float(Vec<Vec<f32>>),
    Uint(Vec<u32>),
}

impl AttributeValues {
    pub fn len(&self) -> usize {
        match self {
            AttributeValues::Float(values) => values.len(),
            AttributeValues::Uint(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A declared vertex attribute and its values
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    pub name: Vec<u8>,
    pub usage: VertexUsage,
    pub format: VertexFormat,
    pub semantic_index: u16,
    /// Stride of the attribute's group
    pub stride: u32,
    /// Offset of the attribute inside one vertex of its group
    pub byte_offset: u32,
    pub values: AttributeValues,
}

impl VertexAttribute {
    /// Attribute stored with the format of its usage, layout is assigned by [`VertexBuffer::new`]
    pub fn new(
        usage: VertexUsage,
        name: impl Into<Vec<u8>>,
        semantic_index: u16,
        values: AttributeValues,
    ) -> VertexAttribute {
        VertexAttribute {
            name: name.into(),
            usage,
            format: usage.storage_format(),
            semantic_index,
            stride: 0,
            byte_offset: 0,
            values,
        }
    }

    pub fn name_str(&self) -> String {
        latin1_to_string(&self.name)
    }

    /// Bring values to the component count of the storage format
    fn normalize(&mut self) -> Result<()> {
        let format = self.format;
        let components = format.components();
        let fixed_w = self.usage.fixed_w();
        match &mut self.values {
            AttributeValues::Uint(_) if format == VertexFormat::Uint1 => {}
            AttributeValues::Float(values) if format != VertexFormat::Uint1 => {
                for value in values.iter_mut() {
                    value.resize(components, 0.0);
                    if let (Some(w), 4) = (fixed_w, components) {
                        value[3] = w;
                    }
                }
            }
            _ => {
                return Err(Error::InvalidVertexBuffer(format!(
                    "values of {} do not match format {format:?}",
                    latin1_to_string(&self.name)
                )))
            }
        }
        Ok(())
    }
}

/// One declaration slot of a stride group
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StrideSlot {
    /// Index into [`VertexBuffer::attributes`], `None` for padding slots
    pub attribute: Option<usize>,
    pub usage: VertexUsage,
    pub format: VertexFormat,
    pub semantic_index: u16,
    pub byte_offset: u32,
}

/// Declarations sharing one interleaved block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrideGroup {
    pub stride: u32,
    pub slots: Vec<StrideSlot>,
}

impl StrideGroup {
    fn push(&mut self, attribute: Option<usize>, usage: VertexUsage, format: VertexFormat, semantic_index: u16) {
        self.slots.push(StrideSlot {
            attribute,
            usage,
            format,
            semantic_index,
            byte_offset: self.stride,
        });
        self.stride += format.size();
    }
}

/// Payload of a `VTXB` record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexBuffer {
    pub vertex_count: u32,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexBuffer {
    /// Validate and lay out a set of attributes
    ///
    /// Attributes are ordered by usage, keeping the given order within a usage.
    /// Values are widened to their storage format and every attribute must
    /// hold exactly `vertex_count` values.
    pub fn new(vertex_count: u32, mut attributes: Vec<VertexAttribute>) -> Result<VertexBuffer> {
        attributes.sort_by_key(|a| a.usage);
        for attribute in attributes.iter_mut() {
            if attribute.values.len() != vertex_count as usize {
                return Err(Error::VertexCountMismatch {
                    name: attribute.name_str(),
                    expected: vertex_count as usize,
                    found: attribute.values.len(),
                });
            }
            attribute.normalize()?;
        }

        for usage in [VertexUsage::BoneWeights, VertexUsage::BoneIndices] {
            let count = attributes.iter().filter(|a| a.usage == usage).count();
            if count > SKIN_SLOTS as usize {
                return Err(Error::InvalidVertexBuffer(format!(
                    "{count} {usage:?} attributes, at most {SKIN_SLOTS} are supported"
                )));
            }
        }

        let mut buffer = VertexBuffer {
            vertex_count,
            attributes,
        };
        buffer.assign_layout();
        Ok(buffer)
    }

    /// Split the declarations into interleaved blocks, skinning padding included
    pub fn stride_groups(&self) -> Vec<StrideGroup> {
        let mut groups = Vec::new();
        let mut current = StrideGroup::default();

        let mut start = 0;
        while start < self.attributes.len() {
            let usage = self.attributes[start].usage;
            let end = start
                + self.attributes[start..]
                    .iter()
                    .take_while(|a| a.usage == usage)
                    .count();

            if usage.starts_group() && !current.slots.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            for (index, attribute) in self.attributes[start..end].iter().enumerate() {
                current.push(
                    Some(start + index),
                    usage,
                    attribute.format,
                    attribute.semantic_index,
                );
            }
            if usage.is_skinning() {
                for slot in (end - start) as u16..SKIN_SLOTS {
                    current.push(None, usage, usage.storage_format(), slot);
                }
            }
            start = end;
        }

        if !current.slots.is_empty() {
            groups.push(current);
        }
        groups
    }

    fn assign_layout(&mut self) {
        for group in self.stride_groups() {
            for slot in &group.slots {
                if let Some(index) = slot.attribute {
                    self.attributes[index].stride = group.stride;
                    self.attributes[index].byte_offset = slot.byte_offset;
                }
            }
        }
    }

    /// Attributes with the given usage, in declaration order
    pub fn attributes_by_usage(&self, usage: VertexUsage) -> impl Iterator<Item = &VertexAttribute> {
        self.attributes.iter().filter(move |a| a.usage == usage)
    }

    /// Build from the interchange form
    pub fn from_vertex_data(data: &VertexData) -> Result<VertexBuffer> {
        let attributes = data
            .attributes
            .iter()
            .flat_map(|(usage, streams)| {
                streams.iter().map(|stream| {
                    VertexAttribute::new(
                        *usage,
                        string_to_latin1(&stream.name),
                        stream.semantic_index,
                        stream.values.clone(),
                    )
                })
            })
            .collect();
        VertexBuffer::new(data.vertex_count, attributes)
    }

    /// Interchange form, attributes grouped by usage
    pub fn to_vertex_data(&self) -> VertexData {
        let mut attributes: IndexMap<VertexUsage, Vec<VertexStream>> = IndexMap::new();
        for attribute in &self.attributes {
            attributes
                .entry(attribute.usage)
                .or_default()
                .push(VertexStream {
                    name: attribute.name_str(),
                    semantic_index: attribute.semantic_index,
                    values: attribute.values.clone(),
                });
        }
        VertexData {
            vertex_count: self.vertex_count,
            attributes,
        }
    }

    /// Give the legacy `uvSet` name its current name and make it the first uv set
    fn promote_primary_uv_set(&mut self) {
        let Some(legacy) = self
            .attributes
            .iter()
            .position(|a| a.usage == VertexUsage::Uvs && a.name == LEGACY_UV_SET)
        else {
            return;
        };
        let Some(first) = self.attributes.iter().position(|a| a.usage == VertexUsage::Uvs) else {
            return;
        };

        let mut attribute = self.attributes.remove(legacy);
        attribute.name = PRIMARY_UV_SET.to_vec();
        self.attributes.insert(first, attribute);
        if legacy != first {
            self.assign_layout();
        }
    }
}

/// A declaration as stored on disk
struct Declaration {
    flag: u16,
    usage: u8,
    format: u8,
    name: Vec<u8>,
    semantic_index: u16,
    stride: u32,
    byte_offset: u32,
}

fn read_values(
    data: &[u8],
    format: VertexFormat,
    vertex_count: u32,
    block_start: usize,
    stride: usize,
    byte_offset: usize,
) -> Result<AttributeValues> {
    let slot_bytes = |vertex: usize| -> Result<&[u8]> {
        let start = vertex
            .checked_mul(stride)
            .and_then(|o| o.checked_add(block_start))
            .and_then(|o| o.checked_add(byte_offset));
        start
            .and_then(|s| Some(s..s.checked_add(format.size() as usize)?))
            .and_then(|range| data.get(range))
            .ok_or_else(|| Error::InvalidVertexBuffer("attribute reads past the vertex data".into()))
    };

    Ok(match format {
        VertexFormat::Uint1 => AttributeValues::Uint(
            (0..vertex_count as usize)
                .map(|v| Ok(slot_bytes(v)?.read_u32::<BigEndian>()?))
                .collect::<Result<Vec<_>>>()?,
        ),
        _ => AttributeValues::Float(
            (0..vertex_count as usize)
                .map(|v| {
                    let mut value = vec![0f32; format.components()];
                    slot_bytes(v)?.read_f32_into::<BigEndian>(&mut value)?;
                    Ok(value)
                })
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

impl RecordCodec for VertexBuffer {
    // the legacy primary UV set name is rewritten on decode
    const LOSSLESS: bool = false;

    #[instrument(skip_all, fields(name = %latin1_to_string(ctx.name)))]
    fn decode<R: Read + Seek>(reader: &mut R, ctx: &DecodeContext<'_>) -> Result<Self> {
        let vertex_count = reader.read_u32::<BigEndian>()?;
        let declaration_count = reader.read_u32::<BigEndian>()?;
        let data_offset = reader.read_u32::<BigEndian>()?;
        let data_size = reader.read_u32::<BigEndian>()?;

        let declarations = (0..bounded_count(reader, declaration_count, DECLARATION_SIZE)?)
            .map(|_| {
                let flag = reader.read_u16::<BigEndian>()?;
                let usage = reader.read_u8()?;
                let format = reader.read_u8()?;
                let name = read_name(reader, ctx.pool)?;
                let semantic_index = reader.read_u16::<BigEndian>()?;
                let _reserved = reader.read_u16::<BigEndian>()?;
                Ok(Declaration {
                    flag,
                    usage,
                    format,
                    name,
                    semantic_index,
                    stride: reader.read_u32::<BigEndian>()?,
                    byte_offset: reader.read_u32::<BigEndian>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let gap = DECLARATION_SIZE
            .checked_mul(declaration_count)
            .and_then(|d| d.checked_add(VERTEX_HEADER_SIZE))
            .and_then(|header_end| data_offset.checked_sub(header_end))
            .ok_or_else(|| {
                Error::InvalidVertexBuffer(format!(
                    "data offset {data_offset:#x} overlaps the declarations"
                ))
            })?;
        let mut gap_buf = vec![0u8; bounded_count(reader, gap, 1)?];
        reader.read_exact(&mut gap_buf)?;
        let mut data = vec![0u8; bounded_count(reader, data_size, 1)?];
        reader.read_exact(&mut data)?;

        let mut attributes = Vec::new();
        let mut block_start = 0u32;
        let mut block_stride = 0u32;
        for (position, declaration) in declarations.into_iter().enumerate() {
            if declaration.byte_offset == 0 {
                if position > 0 {
                    block_start = block_stride
                        .checked_mul(vertex_count)
                        .and_then(checked_align)
                        .and_then(|block| block_start.checked_add(block))
                        .ok_or_else(|| {
                            Error::InvalidVertexBuffer(format!(
                                "group before declaration {position} does not fit 4 GiB"
                            ))
                        })?;
                }
                block_stride = declaration.stride;
            } else if position == 0 {
                return Err(Error::InvalidVertexBuffer(
                    "first declaration does not start a group".into(),
                ));
            }
            if declaration.stride != block_stride
                || declaration.byte_offset >= declaration.stride
            {
                return Err(Error::InvalidVertexBuffer(format!(
                    "declaration {position} does not fit its group"
                )));
            }

            if declaration.flag == 0 {
                continue;
            }

            let usage = VertexUsage::from_code(declaration.usage)?;
            let format = VertexFormat::from_code(declaration.format)?;
            let values = read_values(
                &data,
                format,
                vertex_count,
                block_start as usize,
                declaration.stride as usize,
                declaration.byte_offset as usize,
            )?;
            attributes.push(VertexAttribute {
                name: declaration.name,
                usage,
                format,
                semantic_index: declaration.semantic_index,
                stride: declaration.stride,
                byte_offset: declaration.byte_offset,
                values,
            });
        }

        let mut buffer = VertexBuffer {
            vertex_count,
            attributes,
        };
        buffer.promote_primary_uv_set();
        debug!(
            vertex_count,
            attributes = buffer.attributes.len(),
            "decoded vertex buffer"
        );
        Ok(buffer)
    }

    fn encode<W: Write>(&self, writer: &mut W, ctx: &EncodeContext<'_>) -> Result<()> {
        let groups = self.stride_groups();
        let declaration_count = groups.iter().map(|g| g.slots.len() as u32).sum::<u32>();
        let header_end = VERTEX_HEADER_SIZE + DECLARATION_SIZE * declaration_count;
        let data_offset = align(header_end);
        let data_size = groups
            .iter()
            .map(|g| align(g.stride * self.vertex_count))
            .sum::<u32>();

        writer.write_u32::<BigEndian>(self.vertex_count)?;
        writer.write_u32::<BigEndian>(declaration_count)?;
        writer.write_u32::<BigEndian>(data_offset)?;
        writer.write_u32::<BigEndian>(data_size)?;

        for group in &groups {
            for slot in &group.slots {
                let name = slot
                    .attribute
                    .map(|i| self.attributes[i].name.as_slice())
                    .unwrap_or_default();
                writer.write_u16::<BigEndian>(u16::from(slot.attribute.is_some()))?;
                writer.write_u8(slot.usage.code())?;
                writer.write_u8(slot.format.code())?;
                write_name(writer, ctx.pool, name)?;
                writer.write_u16::<BigEndian>(slot.semantic_index)?;
                writer.write_u16::<BigEndian>(0)?;
                writer.write_u32::<BigEndian>(group.stride)?;
                writer.write_u32::<BigEndian>(slot.byte_offset)?;
            }
        }
        writer.write_all(&vec![0u8; (data_offset - header_end) as usize])?;

        for group in &groups {
            for vertex in 0..self.vertex_count as usize {
                for slot in &group.slots {
                    match slot.attribute.map(|i| &self.attributes[i].values) {
                        Some(AttributeValues::Float(values)) => {
                            for component in &values[vertex] {
                                writer.write_f32::<BigEndian>(*component)?;
                            }
                        }
                        Some(AttributeValues::Uint(values)) => {
                            writer.write_u32::<BigEndian>(values[vertex])?;
                        }
                        None => writer.write_all(&vec![0u8; slot.format.size() as usize])?,
                    }
                }
            }
            let block = group.stride * self.vertex_count;
            writer.write_all(&vec![0u8; (align(block) - block) as usize])?;
        }
        Ok(())
    }

    fn collect_strings(&self, out: &mut Vec<Vec<u8>>) {
        for attribute in &self.attributes {
            push_name(out, &attribute.name);
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::config::CodecConfig;
    use crate::error::{Error, Result};
    use crate::pool::StringPool;
    use crate::records::{DecodeContext, EncodeContext, Payload, RecordCodec, RecordKind};
    use crate::vertex::{
        AttributeValues, VertexAttribute, VertexBuffer, VertexFormat, VertexUsage,
    };

    fn floats(values: &[&[f32]]) -> AttributeValues {
        AttributeValues::Float(values.iter().map(|v| v.to_vec()).collect())
    }

    fn skinned_quad() -> Result<VertexBuffer> {
        VertexBuffer::new(
            3,
            vec![
                VertexAttribute::new(VertexUsage::BoneIndices, "index0", 0, AttributeValues::Uint(vec![0, 1, 2])),
                VertexAttribute::new(VertexUsage::Uvs, "lightmap", 0, floats(&[&[0.5, 0.5], &[0.25, 0.75], &[1.0, 0.0]])),
                VertexAttribute::new(VertexUsage::Uvs, "uvSet", 1, floats(&[&[0.0, 0.0], &[1.0, 0.0], &[0.0, 1.0]])),
                VertexAttribute::new(VertexUsage::Positions, "position", 0, floats(&[&[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]])),
                VertexAttribute::new(VertexUsage::Normals, "normal", 0, floats(&[&[0.0, 0.0, 1.0], &[0.0, 0.0, 1.0], &[0.0, 0.0, 1.0]])),
                VertexAttribute::new(VertexUsage::BoneWeights, "weight0", 0, floats(&[&[1.0], &[0.75], &[0.5]])),
                VertexAttribute::new(VertexUsage::BoneWeights, "weight1", 1, floats(&[&[0.0], &[0.25], &[0.5]])),
                VertexAttribute::new(VertexUsage::BoneIndices, "index1", 1, AttributeValues::Uint(vec![3, 3, 3])),
            ],
        )
    }

    fn encode(buffer: &VertexBuffer, pool: &StringPool) -> Result<Vec<u8>> {
        let config = CodecConfig::default();
        let mut data = Vec::new();
        buffer.encode(
            &mut data,
            &EncodeContext {
                pool,
                config: &config,
                child_offsets: &[],
            },
        )?;
        Ok(data)
    }

    fn pool_for(buffer: &VertexBuffer) -> StringPool {
        let mut strings = Vec::new();
        buffer.collect_strings(&mut strings);
        StringPool::build(strings, 1, 0)
    }

    #[test]
    fn groups_break_at_uvs_and_weights() -> Result<()> {
        let buffer = skinned_quad()?;
        let groups = buffer.stride_groups();

        assert_eq!(groups.len(), 3);
        assert_eq!(
            groups.iter().map(|g| g.stride).collect::<Vec<_>>(),
            vec![32, 16, 32]
        );
        assert_eq!(groups[2].slots.len(), 8);
        assert_eq!(
            groups[2].slots.iter().filter(|s| s.attribute.is_none()).count(),
            4
        );

        let index1 = buffer
            .attributes
            .iter()
            .find(|a| a.name == b"index1")
            .map(|a| (a.stride, a.byte_offset, a.format));
        assert_eq!(index1, Some((32, 20, VertexFormat::Uint1)));

        Ok(())
    }

    #[test]
    fn values_are_widened_to_the_storage_format() -> Result<()> {
        let buffer = skinned_quad()?;

        assert_eq!(
            buffer.attributes[0].values,
            floats(&[&[0.0, 0.0, 0.0, 1.0], &[1.0, 0.0, 0.0, 1.0], &[0.0, 1.0, 0.0, 1.0]])
        );
        assert_eq!(
            buffer.attributes[1].values,
            floats(&[&[0.0, 0.0, 1.0, 0.0], &[0.0, 0.0, 1.0, 0.0], &[0.0, 0.0, 1.0, 0.0]])
        );

        Ok(())
    }

    #[test]
    fn encoded_layout() -> Result<()> {
        let buffer = skinned_quad()?;
        let data = encode(&buffer, &pool_for(&buffer))?;

        // 12 declarations end at 256, blocks of 96, 48 and 96 bytes
        #[rustfmt::skip]
        let header = vec![
            0x00, 0x00, 0x00, 0x03,
            0x00, 0x00, 0x00, 0x0C,
            0x00, 0x00, 0x01, 0x00,
            0x00, 0x00, 0x00, 0xF0,
        ];
        assert_eq!(&data[..16], header.as_slice());
        assert_eq!(data.len(), 256 + 240);

        // a padding weight slot
        assert_eq!(&data[16 + 20 * 6..16 + 20 * 6 + 4], &[0x00, 0x00, 0x04, 0x00]);

        Ok(())
    }

    #[test]
    fn decode_restores_values_and_renames_uv_set() -> Result<()> {
        let buffer = skinned_quad()?;
        let pool = pool_for(&buffer);
        let data = encode(&buffer, &pool)?;

        let config = CodecConfig::default();
        let payload = Payload::decode(
            RecordKind::VertexBuffer,
            &data,
            &DecodeContext {
                pool: &pool,
                config: &config,
                name: b"body_vb",
                child_offsets: &[],
            },
        );
        let Payload::VertexBuffer(decoded) = payload else {
            panic!("expected a vertex buffer, got {payload:?}");
        };

        assert_eq!(decoded.vertex_count, 3);
        assert_eq!(decoded.attributes.len(), 8);

        let uvs = decoded
            .attributes_by_usage(VertexUsage::Uvs)
            .map(|a| (a.name.clone(), a.values.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            uvs,
            vec![
                (b"map1".to_vec(), floats(&[&[0.0, 0.0], &[1.0, 0.0], &[0.0, 1.0]])),
                (b"lightmap".to_vec(), floats(&[&[0.5, 0.5], &[0.25, 0.75], &[1.0, 0.0]])),
            ]
        );

        for usage in [
            VertexUsage::Positions,
            VertexUsage::Normals,
            VertexUsage::BoneWeights,
            VertexUsage::BoneIndices,
        ] {
            let expected = buffer.attributes_by_usage(usage).collect::<Vec<_>>();
            let actual = decoded.attributes_by_usage(usage).collect::<Vec<_>>();
            assert_eq!(actual, expected);
        }

        Ok(())
    }

    #[test]
    fn oversized_groups_stay_opaque() {
        let pool = StringPool::build(Vec::<Vec<u8>>::new(), 1, 0);
        let config = CodecConfig::default();

        #[rustfmt::skip]
        let data = vec![
            // vertex count, declarations, data offset, data size
            0x10, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x02,
            0x00, 0x00, 0x00, 0x40,
            0x00, 0x00, 0x00, 0x00,
            // padding position slot, stride 16
            0x00, 0x00, 0x00, 0x03,
            0xFF, 0xFF, 0xFF, 0xFF,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x10,
            0x00, 0x00, 0x00, 0x00,
            // uvs starting a second group
            0x00, 0x01, 0x03, 0x01,
            0xFF, 0xFF, 0xFF, 0xFF,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x08,
            0x00, 0x00, 0x00, 0x00,
            // padding up to the data offset
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let ctx = DecodeContext {
            pool: &pool,
            config: &config,
            name: b"body_vb",
            child_offsets: &[],
        };
        assert!(matches!(
            VertexBuffer::decode(&mut std::io::Cursor::new(&data), &ctx),
            Err(Error::InvalidVertexBuffer(_))
        ));
        assert_eq!(
            Payload::decode(RecordKind::VertexBuffer, &data, &ctx),
            Payload::Opaque(data)
        );
    }

    #[test]
    fn data_size_past_the_payload() {
        let pool = StringPool::build(Vec::<Vec<u8>>::new(), 1, 0);
        let config = CodecConfig::default();

        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x10,
            0xFF, 0xFF, 0xFF, 0xF0,
        ];

        let result = VertexBuffer::decode(
            &mut std::io::Cursor::new(&data),
            &DecodeContext {
                pool: &pool,
                config: &config,
                name: b"body_vb",
                child_offsets: &[],
            },
        );
        assert!(matches!(result, Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn mismatched_vertex_counts() {
        let result = VertexBuffer::new(
            3,
            vec![
                VertexAttribute::new(VertexUsage::Positions, "position", 0, floats(&[&[0.0; 3], &[0.0; 3], &[0.0; 3]])),
                VertexAttribute::new(VertexUsage::Normals, "normal", 0, floats(&[&[0.0; 3], &[0.0; 3]])),
            ],
        );

        assert!(matches!(
            result,
            Err(Error::VertexCountMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn vertex_data_bridge() -> Result<()> {
        let buffer = skinned_quad()?;
        let data = buffer.to_vertex_data();

        assert_eq!(data.attributes[&VertexUsage::Uvs].len(), 2);
        assert_eq!(VertexBuffer::from_vertex_data(&data)?, buffer);

        Ok(())
    }
}
