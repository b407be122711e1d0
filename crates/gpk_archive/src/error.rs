//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent wrapper for errors raised while decoding a typed container
    #[error(transparent)]
    #[diagnostic(transparent)]
    ContainerError(#[from] gpk_container::error::Error),

    /// file is an invalid package archive
    #[error("file is an invalid package archive: {0}")]
    InvalidArchive(String),

    /// The archive does not start with the expected magic
    #[error("malformed archive header: expected {expected:?}, found {found:?}")]
    #[diagnostic(help("the file is not a package archive, or it is compressed"))]
    MalformedHeader { expected: [u8; 4], found: [u8; 4] },

    /// An entry could not be decoded by the decoder its name pointed to
    #[error("{name}: unknown sub-format ({reason})")]
    UnknownSubFormat { name: String, reason: String },

    /// An entry name does not fit in a directory record
    #[error("entry name {name:?} is longer than {max} bytes")]
    NameTooLong { name: String, max: usize },

    /// An external compression program failed
    #[error("external tool {program:?} failed: {message}")]
    #[diagnostic(help("check that the program is installed and accepts data on stdin"))]
    ExternalToolError { program: String, message: String },

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
