//! Error types that can be emitted from this library
//!

use miette::Diagnostic;
use thiserror::Error;

use crate::types::Tag;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// The string pool could not be split into entries
    #[error("{0}")]
    WinnowError(winnow::error::ErrMode<winnow::error::ContextError>),

    /// Data does not start with the expected magic tag
    #[error("malformed header: expected {expected}, found {found}")]
    #[diagnostic(help("the blob is not a typed container or it is truncated"))]
    MalformedHeader { expected: Tag, found: Tag },

    /// Header sizes describe regions that cannot exist
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A string was referenced on write without being registered in the pool
    #[error("string {0:?} is not present in the string pool")]
    #[diagnostic(help("every name must be part of the set passed to StringPool::build"))]
    StringNotFound(String),

    /// A pool offset was referenced that does not start a string
    #[error("no string starts at pool offset {0:#x}")]
    OffsetNotFound(u32),

    /// A structured payload holds a value its decoder does not accept
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A bone references a child which is not part of the bone set
    #[error("bone {0:?} is referenced but was never defined")]
    MissingBone(String),

    /// The bone hierarchy loops back on itself
    #[error("bone {0:?} is part of a cycle")]
    CycleDetected(String),

    /// A step-transition sequence does not describe a tree
    #[error("invalid step code {code} at position {position}")]
    InvalidStepCode { position: usize, code: i32 },

    /// Explicit bone child offsets disagree with the step code
    #[error("skeleton is inconsistent at bone {0:?}")]
    InconsistentSkeleton(String),

    /// Attribute arrays of one vertex buffer have differing lengths
    #[error("attribute {name:?} has {found} values, expected {expected}")]
    VertexCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Vertex buffer declarations point outside of the vertex data
    #[error("invalid vertex buffer: {0}")]
    InvalidVertexBuffer(String),
}

impl From<winnow::error::ErrMode<winnow::error::ContextError>> for Error {
    fn from(value: winnow::error::ErrMode<winnow::error::ContextError>) -> Self {
        Error::WinnowError(value)
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
