use std::io::{Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::cursor::bounded_count;
use crate::error::{Error, Result};
use crate::records::{
    push_name, read_matrix, read_name, write_matrix, write_name, DecodeContext, EncodeContext,
    Matrix, RecordCodec, IDENTITY,
};

/// Mesh record, parent of the mesh's scene nodes and shapes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshRecord {
    pub flags: u32,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
}

impl RecordCodec for MeshRecord {
    fn decode<R: Read + Seek>(reader: &mut R, _ctx: &DecodeContext<'_>) -> Result<Self> {
        let flags = reader.read_u32::<BigEndian>()?;
        let mut bounds_min = [0f32; 3];
        reader.read_f32_into::<BigEndian>(&mut bounds_min)?;
        let mut bounds_max = [0f32; 3];
        reader.read_f32_into::<BigEndian>(&mut bounds_max)?;

        Ok(MeshRecord {
            flags,
            bounds_min,
            bounds_max,
        })
    }

    fn encode<W: Write>(&self, writer: &mut W, _ctx: &EncodeContext<'_>) -> Result<()> {
        writer.write_u32::<BigEndian>(self.flags)?;
        for v in self.bounds_min.iter().chain(&self.bounds_max) {
            writer.write_f32::<BigEndian>(*v)?;
        }
        Ok(())
    }
}

/// Shape record: one draw call binding a vertex buffer, a material and indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeRecord {
    pub vertex_buffer: Vec<u8>,
    pub material: Vec<u8>,
    pub primitive: u32,
    pub indices: Vec<u16>,
}

impl RecordCodec for ShapeRecord {
    fn decode<R: Read + Seek>(reader: &mut R, ctx: &DecodeContext<'_>) -> Result<Self> {
        let vertex_buffer = read_name(reader, ctx.pool)?;
        let material = read_name(reader, ctx.pool)?;
        let primitive = reader.read_u32::<BigEndian>()?;
        let count = reader.read_u32::<BigEndian>()?;

        let mut indices = vec![0u16; bounded_count(reader, count, 2)?];
        reader.read_u16_into::<BigEndian>(&mut indices)?;
        if count % 2 == 1 {
            reader.read_u16::<BigEndian>()?;
        }

        Ok(ShapeRecord {
            vertex_buffer,
            material,
            primitive,
            indices,
        })
    }

    fn encode<W: Write>(&self, writer: &mut W, ctx: &EncodeContext<'_>) -> Result<()> {
        write_name(writer, ctx.pool, &self.vertex_buffer)?;
        write_name(writer, ctx.pool, &self.material)?;
        writer.write_u32::<BigEndian>(self.primitive)?;
        writer.write_u32::<BigEndian>(self.indices.len() as u32)?;
        for index in &self.indices {
            writer.write_u16::<BigEndian>(*index)?;
        }
        // keep the record 4-byte aligned
        if self.indices.len() % 2 == 1 {
            writer.write_u16::<BigEndian>(0)?;
        }
        Ok(())
    }

    fn collect_strings(&self, out: &mut Vec<Vec<u8>>) {
        push_name(out, &self.vertex_buffer);
        push_name(out, &self.material);
    }
}

/// Variant of a scene graph node
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SceneNodeKind {
    #[default]
    Transform,
    Mesh,
    Shape,
}

impl TryFrom<u32> for SceneNodeKind {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(SceneNodeKind::Transform),
            1 => Ok(SceneNodeKind::Mesh),
            2 => Ok(SceneNodeKind::Shape),
            other => Err(Error::InvalidRecord(format!("unknown scene node kind {other}"))),
        }
    }
}

/// Scene graph node
///
/// Transform nodes only carry a matrix, mesh and shape nodes also name the
/// record they instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub kind: SceneNodeKind,
    pub target: Vec<u8>,
    pub transform: Matrix,
}

impl Default for SceneNode {
    fn default() -> Self {
        SceneNode {
            kind: SceneNodeKind::Transform,
            target: Vec::new(),
            transform: IDENTITY,
        }
    }
}

impl RecordCodec for SceneNode {
    fn decode<R: Read + Seek>(reader: &mut R, ctx: &DecodeContext<'_>) -> Result<Self> {
        Ok(SceneNode {
            kind: SceneNodeKind::try_from(reader.read_u32::<BigEndian>()?)?,
            target: read_name(reader, ctx.pool)?,
            transform: read_matrix(reader)?,
        })
    }

    fn encode<W: Write>(&self, writer: &mut W, ctx: &EncodeContext<'_>) -> Result<()> {
        writer.write_u32::<BigEndian>(self.kind as u32)?;
        write_name(writer, ctx.pool, &self.target)?;
        write_matrix(writer, &self.transform)
    }

    fn collect_strings(&self, out: &mut Vec<Vec<u8>>) {
        push_name(out, &self.target);
    }
}
