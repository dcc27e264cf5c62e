//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::model::Platform;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// the file belongs to the other console
    #[error("expected a {expected} cellanim, found a {found} one")]
    #[diagnostic(help("RVL archives hold .brcad files, CTR archives hold .bccad files"))]
    PlatformMismatch { expected: Platform, found: Platform },

    /// the revision field holds no known value
    #[error("unknown cellanim revision {0:#010x}")]
    InvalidRevision(u32),

    /// an animation key points past the arrangement list
    #[error("key {key} of animation {animation} uses arrangement {index}, only {count} exist")]
    InvalidArrangementIndex {
        animation: usize,
        key: usize,
        index: u16,
        count: usize,
    },

    /// a list is longer than its count field can express
    #[error("{count} {what} do not fit in a cellanim, at most {max} are allowed")]
    TooMany {
        what: &'static str,
        count: usize,
        max: usize,
    },

    /// a length prefixed string is longer than 255 bytes
    #[error("string {0:?} is longer than 255 bytes")]
    StringTooLong(String),

    /// the label header holds characters Shift-JIS cannot express
    #[error("label {0:?} cannot be encoded as Shift-JIS")]
    LabelEncoding(String),

    /// the label would not read back as written
    #[error("label {0:?} holds whitespace or a multi-line comment")]
    LabelName(String),

    /// file is an invalid editor metadata sidecar
    #[error("invalid editor metadata: {0}")]
    InvalidSidecar(&'static str),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
