//! This library handles reading from and creating **typed containers**, the record files
//! carried inside game package archives.
//!
//! # Typed Container Format Documentation
//!
//! A typed container stores a forest of records. Every record has a 4-byte type tag, a name
//! and a payload, and may nest further records. Strings are shared through a string pool and
//! referenced by offset. Skeletons and vertex buffers are stored as records and decoded further
//! by [`skeleton`] and [`vertex`].
//!
//! ## File Structure
//!
//! A container consists of a header, a group directory, the string pool, the record-info
//! table and the data block. Every region after the header starts on a 16-byte boundary.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "GCTR"                                            |
//! | 0x0004         | Version                | 2 + 2 bytes: major and minor version                       |
//! | 0x0008         | Group Count            | 4 bytes: Number of entries in the group directory          |
//! | 0x000C         | Name                   | 4 bytes: String pool offset of the container name          |
//! | 0x0010         | Group Directory Size   | 4 bytes: Size of the group directory                       |
//! | 0x0014         | String Pool Size       | 4 bytes: Size of the string pool                           |
//! | 0x0018         | Record Info Size       | 4 bytes: Size of the record-info table                     |
//! | 0x001C         | Data Size              | 4 bytes: Size of the data block                            |
//! | 0x0020         | IORAM Name / Size      | 4 + 4 bytes: Companion blob consumed by mesh tooling       |
//! | 0x0028         | VRAM Name / Size       | 4 + 4 bytes: Companion blob consumed by mesh tooling       |
//! | 0x0030         | Reserved               | 16 bytes                                                   |
//!
//! ### Group Directory
//!
//! One 12-byte entry per group of root records: type tag, reserved, record count.
//!
//! ### String Pool
//!
//! NUL terminated latin-1 strings in natural order, each padded with NULs to a multiple of
//! the configured padding. An offset of `0xFFFFFFFF` stands for "no string".
//!
//! ### Record-Info Table
//!
//! One 20-byte slot per record, walked in pre-order:
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Offset                 | 4 bytes: Offset of the record inside the data block     |
//! | 0x0004         | Size                   | 4 bytes: Size of the record, children excluded          |
//! | 0x0008         | Child Count            | 4 bytes: Number of nested records                       |
//! | 0x000C         | Child Offset           | 4 bytes: Offset of the child directory, `0` for leaves  |
//! | 0x0010         | Reserved               | 4 bytes                                                 |
//!
//! ### Data Block
//!
//! Every record starts with its type tag and name offset, followed by its payload. A record
//! with children is followed by its child directory, a copy of the children's info slots, and
//! then by the children themselves.
//!
//! ## Additional Information
//!
//! - **Endianness**: Big-endian for all multi-byte values
//! - **Alignment**: Regions and root records start on 16-byte boundaries
//!

pub mod bridge;
pub mod config;
pub mod container;
pub mod cursor;
pub mod error;
pub mod node;
pub mod pool;
pub mod records;
pub mod skeleton;
pub mod types;
pub mod vertex;

pub use config::CodecConfig;
pub use container::Container;
pub use node::RecordNode;
pub use pool::StringPool;
pub use skeleton::Skeleton;
pub use vertex::VertexBuffer;
