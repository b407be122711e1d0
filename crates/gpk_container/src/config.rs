//! Settings shared by every encode and decode call.

use bon::Builder;

/// Names of leaf records whose placement is rounded up to a 16-byte boundary
///
/// Matched by literal name, extended per call through [`CodecConfig::aligned_names`].
pub const ALIGNED_RECORD_NAMES: &[&[u8]] = &[b"eyeInfo", b"eyeInfoL", b"eyeInfoR"];

/// Options passed by reference into every container read and write
#[derive(Debug, Clone, Builder)]
pub struct CodecConfig {
    /// Strings in the pool are padded with NULs up to a multiple of this value
    #[builder(default = 1)]
    pub string_padding: u32,

    /// Offset assigned to the first string of the pool
    #[builder(default)]
    pub string_first_offset: u32,

    /// Record names needing the same alignment as [`ALIGNED_RECORD_NAMES`]
    #[builder(default)]
    pub aligned_names: Vec<Vec<u8>>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CodecConfig {
    /// Whether a record called `name` has to start on a 16-byte boundary
    pub fn is_aligned_name(&self, name: &[u8]) -> bool {
        ALIGNED_RECORD_NAMES.iter().any(|n| *n == name)
            || self.aligned_names.iter().any(|n| n == name)
    }
}
