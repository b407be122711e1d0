use std::io::{Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;
use crate::records::{push_name, read_name, write_name, DecodeContext, EncodeContext, RecordCodec};

/// Texture record
///
/// Describes a texture whose pixels live in a sidecar file next to the container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureRecord {
    pub width: u16,
    pub height: u16,
    /// Pixel format code, opaque to this library
    pub format: u32,
    pub mip_count: u32,
    /// Name of the sidecar file holding the pixel data
    pub sidecar: Vec<u8>,
    /// Size of the pixel data in the sidecar
    pub data_size: u32,
}

impl RecordCodec for TextureRecord {
    fn decode<R: Read + Seek>(reader: &mut R, ctx: &DecodeContext<'_>) -> Result<Self> {
        Ok(TextureRecord {
            width: reader.read_u16::<BigEndian>()?,
            height: reader.read_u16::<BigEndian>()?,
            format: reader.read_u32::<BigEndian>()?,
            mip_count: reader.read_u32::<BigEndian>()?,
            sidecar: read_name(reader, ctx.pool)?,
            data_size: reader.read_u32::<BigEndian>()?,
        })
    }

    fn encode<W: Write>(&self, writer: &mut W, ctx: &EncodeContext<'_>) -> Result<()> {
        writer.write_u16::<BigEndian>(self.width)?;
        writer.write_u16::<BigEndian>(self.height)?;
        writer.write_u32::<BigEndian>(self.format)?;
        writer.write_u32::<BigEndian>(self.mip_count)?;
        write_name(writer, ctx.pool, &self.sidecar)?;
        writer.write_u32::<BigEndian>(self.data_size)?;
        Ok(())
    }

    fn collect_strings(&self, out: &mut Vec<Vec<u8>>) {
        push_name(out, &self.sidecar);
    }
}
