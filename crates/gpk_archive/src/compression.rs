//! Whole-archive compression through in-process or external codecs.

use std::io::{Read, Write};
use std::process::{Command, Stdio};

use bon::Builder;
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// A codec which turns a complete archive into its compressed variant and back
pub trait ExternalCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// In-process zlib codec
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibCodec {
    pub level: Option<u32>,
}

impl ExternalCodec for ZlibCodec {
    #[instrument(skip_all, err, fields(size = data.len()))]
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let level = self
            .level
            .map(Compression::new)
            .unwrap_or_default();
        let mut encoder = ZlibEncoder::new(Vec::new(), level);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    #[instrument(skip_all, err, fields(size = data.len()))]
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

/// Pipes data through an external executable via stdin and stdout
///
/// ```no_run
/// use gpk_archive::compression::{CommandCodec, ExternalCodec};
///
/// let codec = CommandCodec::builder()
///     .program("zstd".to_string())
///     .compress_args(vec!["-q".into(), "-c".into()])
///     .decompress_args(vec!["-q".into(), "-d".into(), "-c".into()])
///     .build();
///
/// let packed = codec.compress(b"hello").unwrap();
/// assert_eq!(codec.decompress(&packed).unwrap(), b"hello");
/// ```
#[derive(Debug, Clone, Builder)]
pub struct CommandCodec {
    pub program: String,

    #[builder(default)]
    pub compress_args: Vec<String>,

    #[builder(default)]
    pub decompress_args: Vec<String>,
}

impl CommandCodec {
    fn tool_error(&self, message: impl ToString) -> Error {
        Error::ExternalToolError {
            program: self.program.clone(),
            message: message.to_string(),
        }
    }

    #[instrument(skip(self, data), err, fields(program = %self.program, size = data.len()))]
    fn run(&self, args: &[String], data: &[u8]) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.tool_error(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.tool_error("stdin is not available"))?;

        // stdin is fed from its own thread so a full stdout pipe cannot stall the child
        let output = std::thread::scope(|scope| {
            let feeder = scope.spawn(move || stdin.write_all(data));
            let output = child.wait_with_output();
            let fed = feeder
                .join()
                .map_err(|_| self.tool_error("stdin writer panicked"))?;
            // a tool may legitimately close stdin early; its exit status decides
            if let Err(e) = fed {
                debug!("writing stdin failed: {e}");
            }
            output.map_err(|e| self.tool_error(e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.tool_error(format!("{} {}", output.status, stderr.trim())));
        }

        debug!("produced {} bytes", output.stdout.len());
        Ok(output.stdout)
    }
}

impl ExternalCodec for CommandCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.run(&self.compress_args, data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.run(&self.decompress_args, data)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::compression::{CommandCodec, ExternalCodec, ZlibCodec};
    use crate::error::{Error, Result};

    #[test]
    fn zlib_round_trip() -> Result<()> {
        let codec = ZlibCodec::default();
        let data = b"Hello World".repeat(20);

        let packed = codec.compress(&data)?;
        assert!(packed.len() < data.len());
        assert_eq!(packed[0], 0x78);
        assert_eq!(codec.decompress(&packed)?, data);

        Ok(())
    }

    #[test]
    fn zlib_rejects_garbage() {
        let result = ZlibCodec::default().decompress(&[0x00, 0x01, 0x02]);
        assert!(matches!(result, Err(Error::IOError(_))));
    }

    #[test]
    fn missing_program() {
        let codec = CommandCodec::builder()
            .program("gpk-codec-that-does-not-exist".to_string())
            .build();

        let result = codec.compress(b"data");
        assert!(matches!(result, Err(Error::ExternalToolError { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn pipes_through_cat() -> Result<()> {
        let codec = CommandCodec::builder().program("cat".to_string()).build();
        let data = vec![0xABu8; 256 * 1024];

        assert_eq!(codec.compress(&data)?, data);
        assert_eq!(codec.decompress(b"abc")?, b"abc");

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn failing_program() {
        let codec = CommandCodec::builder().program("false".to_string()).build();

        let result = codec.decompress(b"data");
        assert!(matches!(result, Err(Error::ExternalToolError { .. })));
    }
}
