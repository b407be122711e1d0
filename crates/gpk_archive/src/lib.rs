//! This library handles reading from and creating **package archives**, the flat directory of
//! named blobs games ship their assets in.
//!
//! # Package Archive Format Documentation
//!
//! ## File Structure
//!
//! An archive consists of a header, a directory and the entry data.
//!
//! ### Header
//!
//! | Offset (bytes) | Field                  | Description                                            |
//! |----------------|------------------------|--------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "GPAK"                                        |
//! | 0x0004         | Version                | 4 bytes: Format version, currently `1`                 |
//! | 0x0008         | Entry Count            | 4 bytes: Number of directory records                   |
//! | 0x000C         | Directory Size         | 4 bytes: Size of the directory (48 bytes per record)   |
//!
//! ### Directory Record
//!
//! | Offset (bytes) | Field                  | Description                                            |
//! |----------------|------------------------|--------------------------------------------------------|
//! | 0x0000         | Data Offset            | 4 bytes: Offset of the data from the archive start     |
//! | 0x0004         | Data Size              | 4 bytes: Size of the data                              |
//! | 0x0008         | Reserved               | 4 bytes: Always `0`                                    |
//! | 0x000C         | Name                   | 36 bytes: NUL padded latin-1 name                      |
//!
//! ### Entry Data
//!
//! Entries follow the directory in directory order. Every entry starts on a 16-byte boundary
//! relative to the start of the archive, the gaps are filled with zeros.
//!
//! ## Sub-formats
//!
//! Entries are handed to a [`dispatch::DecoderChain`]. Entries starting with `GCTR`, or named
//! `*.gctr`, are decoded as typed containers with [`gpk_container`].
//!
//! ## Additional Information
//!
//! - **File Extension**: `.gpk`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Compression**: The whole archive may be passed through an
//!   [`compression::ExternalCodec`], there is no per-entry compression
//!

pub mod compression;
pub mod dispatch;
pub mod error;
pub mod read;
pub mod types;
pub mod write;

pub use compression::{CommandCodec, ExternalCodec, ZlibCodec};
pub use dispatch::{DecoderChain, EntryPayload};
pub use read::{Archive, ArchiveEntry};
pub use write::ArchiveWriter;
