//! Structured payloads carried by record nodes and the registry selecting them.
//!
//! A record's type tag and name pick a decoder through [`RecordKind::resolve`].
//! Anything the registry does not know, or fails to decode completely, is kept
//! as [`Payload::Opaque`] so it survives a read/write round trip untouched.

pub mod material;
pub mod mesh;
pub mod texture;

use std::io::{Cursor, Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;

use crate::config::CodecConfig;
use crate::error::Result;
use crate::pool::StringPool;
use crate::skeleton::{BoneRecord, SkeletonRoot};
use crate::types::{latin1_to_string, Tag, NAME_NONE};
use crate::vertex::VertexBuffer;

pub use material::{MaterialParam, MaterialRecord};
pub use mesh::{MeshRecord, SceneNode, SceneNodeKind, ShapeRecord};
pub use texture::TextureRecord;

/// Row-major 4×4 matrix
pub type Matrix = [[f32; 4]; 4];

/// The identity matrix
pub const IDENTITY: Matrix = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// State available while decoding one payload
pub struct DecodeContext<'a> {
    pub pool: &'a StringPool,
    pub config: &'a CodecConfig,
    pub name: &'a [u8],
    /// Data block offsets of the record's children, in order
    pub child_offsets: &'a [u32],
}

impl DecodeContext<'_> {
    pub fn child_count(&self) -> u32 {
        self.child_offsets.len() as u32
    }
}

/// State available while encoding one payload
pub struct EncodeContext<'a> {
    pub pool: &'a StringPool,
    pub config: &'a CodecConfig,
    /// Offsets of the record's children, placeholders while sizes are measured
    pub child_offsets: &'a [u32],
}

impl EncodeContext<'_> {
    pub fn child_count(&self) -> u32 {
        self.child_offsets.len() as u32
    }
}

/// A structured payload codec
pub trait RecordCodec: Sized {
    /// Whether a decoded value encodes back to exactly the bytes it came from
    const LOSSLESS: bool = true;

    fn decode<R: Read + Seek>(reader: &mut R, ctx: &DecodeContext<'_>) -> Result<Self>;

    fn encode<W: Write>(&self, writer: &mut W, ctx: &EncodeContext<'_>) -> Result<()>;

    /// Push every string this payload references into `out`
    fn collect_strings(&self, _out: &mut Vec<Vec<u8>>) {}
}

/// Decoder selected for a record
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Texture,
    Material,
    MaterialParam,
    Mesh,
    Shape,
    SceneNode,
    VertexBuffer,
    SkeletonRoot,
    Bone,
    SideTable,
    Unknown,
}

impl RecordKind {
    /// Pick the decoder for a record by its type tag and name
    pub fn resolve(tag: Tag, name: &[u8]) -> RecordKind {
        match tag {
            Tag::TEXTURE => RecordKind::Texture,
            Tag::MATERIAL => RecordKind::Material,
            Tag::MATERIAL_PARAM => RecordKind::MaterialParam,
            Tag::MESH => RecordKind::Mesh,
            Tag::SHAPE => RecordKind::Shape,
            Tag::SCENE_NODE => RecordKind::SceneNode,
            Tag::VERTEX_BUFFER => RecordKind::VertexBuffer,
            Tag::SKELETON if name.starts_with(b"boneInfo") => RecordKind::SideTable,
            Tag::SKELETON => RecordKind::SkeletonRoot,
            Tag::BONE => RecordKind::Bone,
            _ => RecordKind::Unknown,
        }
    }
}

/// Payload of a record node
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Texture(TextureRecord),
    Material(MaterialRecord),
    MaterialParam(MaterialParam),
    Mesh(MeshRecord),
    Shape(ShapeRecord),
    SceneNode(SceneNode),
    VertexBuffer(VertexBuffer),
    SkeletonRoot(SkeletonRoot),
    Bone(BoneRecord),
    Opaque(Vec<u8>),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Opaque(Vec::new())
    }
}

/// Decode `data` as `T`, `None` when bytes are left over or a lossless codec
/// would not encode the value back to `data`
fn decode_as<T: RecordCodec>(data: &[u8], ctx: &DecodeContext<'_>) -> Result<Option<T>> {
    let mut reader = Cursor::new(data);
    let value = T::decode(&mut reader, ctx)?;
    if reader.position() != data.len() as u64 {
        return Ok(None);
    }
    if !T::LOSSLESS {
        return Ok(Some(value));
    }

    let mut encoded = Vec::with_capacity(data.len());
    value.encode(
        &mut encoded,
        &EncodeContext {
            pool: ctx.pool,
            config: ctx.config,
            child_offsets: ctx.child_offsets,
        },
    )?;
    Ok((encoded == data).then_some(value))
}

impl Payload {
    /// Decode `data` with the decoder registered for `kind`
    ///
    /// Falls back to [`Payload::Opaque`] when there is no decoder, when it fails,
    /// or when the decoded value would not be written back byte for byte.
    pub fn decode(kind: RecordKind, data: &[u8], ctx: &DecodeContext<'_>) -> Payload {
        let decoded = match kind {
            RecordKind::Texture => decode_as(data, ctx).map(|p| p.map(Payload::Texture)),
            RecordKind::Material => decode_as(data, ctx).map(|p| p.map(Payload::Material)),
            RecordKind::MaterialParam => {
                decode_as(data, ctx).map(|p| p.map(Payload::MaterialParam))
            }
            RecordKind::Mesh => decode_as(data, ctx).map(|p| p.map(Payload::Mesh)),
            RecordKind::Shape => decode_as(data, ctx).map(|p| p.map(Payload::Shape)),
            RecordKind::SceneNode => decode_as(data, ctx).map(|p| p.map(Payload::SceneNode)),
            RecordKind::VertexBuffer => {
                decode_as(data, ctx).map(|p| p.map(Payload::VertexBuffer))
            }
            RecordKind::SkeletonRoot => {
                decode_as(data, ctx).map(|p| p.map(Payload::SkeletonRoot))
            }
            RecordKind::Bone => decode_as(data, ctx).map(|p| p.map(Payload::Bone)),
            RecordKind::SideTable | RecordKind::Unknown => Ok(None),
        };

        match decoded {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                if !matches!(kind, RecordKind::SideTable | RecordKind::Unknown) {
                    warn!(
                        ?kind,
                        name = %latin1_to_string(ctx.name),
                        "payload does not encode back to its bytes, keeping it opaque"
                    );
                }
                Payload::Opaque(data.to_vec())
            }
            Err(e) => {
                warn!(
                    ?kind,
                    name = %latin1_to_string(ctx.name),
                    error = %e,
                    "unable to decode payload, keeping it opaque"
                );
                Payload::Opaque(data.to_vec())
            }
        }
    }

    /// Serialize the payload
    pub fn encode<W: Write>(&self, writer: &mut W, ctx: &EncodeContext<'_>) -> Result<()> {
        match self {
            Payload::Texture(p) => p.encode(writer, ctx),
            Payload::Material(p) => p.encode(writer, ctx),
            Payload::MaterialParam(p) => p.encode(writer, ctx),
            Payload::Mesh(p) => p.encode(writer, ctx),
            Payload::Shape(p) => p.encode(writer, ctx),
            Payload::SceneNode(p) => p.encode(writer, ctx),
            Payload::VertexBuffer(p) => p.encode(writer, ctx),
            Payload::SkeletonRoot(p) => p.encode(writer, ctx),
            Payload::Bone(p) => p.encode(writer, ctx),
            Payload::Opaque(data) => Ok(writer.write_all(data)?),
        }
    }

    /// Push every string this payload references into `out`
    pub fn collect_strings(&self, out: &mut Vec<Vec<u8>>) {
        match self {
            Payload::Texture(p) => p.collect_strings(out),
            Payload::Material(p) => p.collect_strings(out),
            Payload::MaterialParam(p) => p.collect_strings(out),
            Payload::Mesh(p) => p.collect_strings(out),
            Payload::Shape(p) => p.collect_strings(out),
            Payload::SceneNode(p) => p.collect_strings(out),
            Payload::VertexBuffer(p) => p.collect_strings(out),
            Payload::SkeletonRoot(p) => p.collect_strings(out),
            Payload::Bone(p) => p.collect_strings(out),
            Payload::Opaque(_) => {}
        }
    }

    /// Store the final offsets of the record's children in payloads that carry them
    pub fn bind_child_offsets(&mut self, offsets: &[u32]) {
        if let Payload::Bone(bone) = self {
            bone.child_offsets = offsets.to_vec();
        }
    }

    /// Short label used in tree listings
    pub fn label(&self) -> &'static str {
        match self {
            Payload::Texture(_) => "texture",
            Payload::Material(_) => "material",
            Payload::MaterialParam(_) => "material param",
            Payload::Mesh(_) => "mesh",
            Payload::Shape(_) => "shape",
            Payload::SceneNode(_) => "scene node",
            Payload::VertexBuffer(_) => "vertex buffer",
            Payload::SkeletonRoot(_) => "skeleton",
            Payload::Bone(_) => "bone",
            Payload::Opaque(_) => "opaque",
        }
    }
}

/// Read a pool reference and resolve it, [`NAME_NONE`] becomes an empty name
pub(crate) fn read_name<R: Read>(reader: &mut R, pool: &StringPool) -> Result<Vec<u8>> {
    match reader.read_u32::<BigEndian>()? {
        NAME_NONE => Ok(Vec::new()),
        offset => Ok(pool.lookup_index(offset)?.to_vec()),
    }
}

/// Write the pool reference for `name`, empty names become [`NAME_NONE`]
pub(crate) fn write_name<W: Write>(writer: &mut W, pool: &StringPool, name: &[u8]) -> Result<()> {
    let offset = if name.is_empty() {
        NAME_NONE
    } else {
        pool.lookup_offset(name)?
    };
    writer.write_u32::<BigEndian>(offset)?;
    Ok(())
}

pub(crate) fn read_matrix<R: Read>(reader: &mut R) -> Result<Matrix> {
    let mut matrix = [[0f32; 4]; 4];
    for row in matrix.iter_mut() {
        reader.read_f32_into::<BigEndian>(row)?;
    }
    Ok(matrix)
}

pub(crate) fn write_matrix<W: Write>(writer: &mut W, matrix: &Matrix) -> Result<()> {
    for value in matrix.iter().flatten() {
        writer.write_f32::<BigEndian>(*value)?;
    }
    Ok(())
}

pub(crate) fn push_name(out: &mut Vec<Vec<u8>>, name: &[u8]) {
    if !name.is_empty() {
        out.push(name.to_vec());
    }
}
