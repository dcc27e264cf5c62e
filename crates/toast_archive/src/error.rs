//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// data does not start with the Yaz0 magic
    #[error("data is not Yaz0 compressed")]
    NotYaz0,

    /// the Yaz0 stream ended before the declared size was produced
    #[error("yaz0 stream is truncated at offset {offset:#x}")]
    Yaz0Truncated { offset: usize },

    /// a Yaz0 back-reference points before the start of the output
    #[error("yaz0 back-reference of distance {distance} at output offset {position:#x} is out of range")]
    Yaz0BackReference { distance: usize, position: usize },

    /// the payload does not fit the 32 bit size of the Yaz0 header
    #[error("{0} bytes do not fit in a yaz0 stream")]
    Yaz0TooLarge(usize),

    /// the zlib wrapper is shorter than its own header
    #[error("zlib wrapper is too short ({0} bytes)")]
    ZlibTooShort(usize),

    /// the inflated zlib payload does not match the declared size
    #[error("zlib payload inflated to {actual} bytes, header declares {expected}")]
    ZlibSizeMismatch { expected: usize, actual: usize },

    /// the deflate stream could not be inflated
    #[error("zlib stream is corrupt")]
    Zlib(#[source] std::io::Error),

    /// file is an invalid archive
    #[error("file is an invalid {0} archive")]
    InvalidArchive(&'static str),

    /// an offset inside the archive points outside of the buffer
    #[error("{what} at {offset:#x} (size {size:#x}) is outside of the archive")]
    OutOfBounds {
        what: &'static str,
        offset: usize,
        size: usize,
    },

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// by path {0}
    #[error("by path {0}")]
    Path(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
