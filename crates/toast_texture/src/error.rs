//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::rvl::RvlFormat;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent wrapper for [`rayon::ThreadPoolBuildError`]
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// a buffer is smaller than its dimensions and format require
    #[error("{what} buffer holds {actual} bytes, {expected} are required")]
    BufferTooSmall {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// an image has a zero or oversized dimension
    #[error("invalid texture dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// an indexed image uses more colours than its format can address
    #[error("{format:?} can hold {capacity} colours, the image uses {colors}")]
    #[diagnostic(help("reduce the number of distinct colours or pick a direct colour format"))]
    PaletteOverflow {
        format: RvlFormat,
        colors: usize,
        capacity: usize,
    },

    /// an indexed image was decoded without a palette
    #[error("{0:?} needs a palette to be decoded")]
    MissingPalette(RvlFormat),

    /// unknown Wii texture format identifier
    #[error("unknown Wii texture format {0}")]
    UnknownRvlFormat(u32),

    /// unknown Wii palette format identifier
    #[error("unknown Wii palette format {0}")]
    UnknownPaletteFormat(u32),

    /// unknown 3DS texture format identifier
    #[error("unknown 3DS texture format {0}")]
    UnknownCtrFormat(u32),

    /// file is an invalid texture container
    #[error("file is an invalid {0} texture container")]
    InvalidContainer(&'static str),

    /// a TPL descriptor has no image header
    #[error("texture {0} of the TPL has no image header")]
    MissingImageHeader(usize),

    /// an offset inside the container points outside of the buffer
    #[error("{what} at {offset:#x} (size {size:#x}) is outside of the container")]
    OutOfBounds {
        what: &'static str,
        offset: usize,
        size: usize,
    },

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
