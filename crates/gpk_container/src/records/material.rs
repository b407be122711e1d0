use std::io::{Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::cursor::bounded_count;
use crate::error::{Error, Result};
use crate::records::{push_name, read_name, write_name, DecodeContext, EncodeContext, RecordCodec};

/// Material record, its parameters are [`MaterialParam`] child records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialRecord {
    pub shader: Vec<u8>,
    pub flags: u32,
}

impl RecordCodec for MaterialRecord {
    fn decode<R: Read + Seek>(reader: &mut R, ctx: &DecodeContext<'_>) -> Result<Self> {
        let shader = read_name(reader, ctx.pool)?;
        let flags = reader.read_u32::<BigEndian>()?;
        let param_count = reader.read_u32::<BigEndian>()?;
        if param_count != ctx.child_count() {
            return Err(Error::InvalidRecord(format!(
                "material stores {param_count} parameters but has {} children",
                ctx.child_count()
            )));
        }

        Ok(MaterialRecord { shader, flags })
    }

    fn encode<W: Write>(&self, writer: &mut W, ctx: &EncodeContext<'_>) -> Result<()> {
        write_name(writer, ctx.pool, &self.shader)?;
        writer.write_u32::<BigEndian>(self.flags)?;
        writer.write_u32::<BigEndian>(ctx.child_count())?;
        Ok(())
    }

    fn collect_strings(&self, out: &mut Vec<Vec<u8>>) {
        push_name(out, &self.shader);
    }
}

/// A single material parameter
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialParam {
    /// Numeric constants
    Values(Vec<f32>),
    /// A texture bound to a sampler slot
    Texture { texture: Vec<u8>, slot: u32 },
}

impl RecordCodec for MaterialParam {
    fn decode<R: Read + Seek>(reader: &mut R, ctx: &DecodeContext<'_>) -> Result<Self> {
        match reader.read_u32::<BigEndian>()? {
            0 => {
                let count = reader.read_u32::<BigEndian>()?;
                let mut values = vec![0f32; bounded_count(reader, count, 4)?];
                reader.read_f32_into::<BigEndian>(&mut values)?;
                Ok(MaterialParam::Values(values))
            }
            1 => Ok(MaterialParam::Texture {
                texture: read_name(reader, ctx.pool)?,
                slot: reader.read_u32::<BigEndian>()?,
            }),
            other => Err(Error::InvalidRecord(format!(
                "unknown material parameter kind {other}"
            ))),
        }
    }

    fn encode<W: Write>(&self, writer: &mut W, ctx: &EncodeContext<'_>) -> Result<()> {
        match self {
            MaterialParam::Values(values) => {
                writer.write_u32::<BigEndian>(0)?;
                writer.write_u32::<BigEndian>(values.len() as u32)?;
                for v in values {
                    writer.write_f32::<BigEndian>(*v)?;
                }
            }
            MaterialParam::Texture { texture, slot } => {
                writer.write_u32::<BigEndian>(1)?;
                write_name(writer, ctx.pool, texture)?;
                writer.write_u32::<BigEndian>(*slot)?;
            }
        }
        Ok(())
    }

    fn collect_strings(&self, out: &mut Vec<Vec<u8>>) {
        if let MaterialParam::Texture { texture, .. } = self {
            push_name(out, texture);
        }
    }
}
