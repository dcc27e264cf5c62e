//! Error types that can be emitted from this library

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;
use toast_cellanim::Platform;

/// Error type for library
///
/// Opening and exporting stop at the first failure and report it as one of these.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// the archive file could not be read
    #[error("unable to read {}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// neither a known compression nor a known container
    #[error("file is not Yaz0 or zlib compressed")]
    #[diagnostic(help("cellanim archives are usually .szs (Wii) or .zlib (3DS) files"))]
    UnknownCompression,

    /// the compressed stream is corrupt
    #[error("unable to decompress the archive")]
    Decompression(#[source] toast_archive::error::Error),

    /// the decompressed data is not a readable U8 or SARC archive
    #[error("archive is damaged or of an unknown kind")]
    InvalidContainer(#[source] toast_archive::error::Error),

    /// a file every cellanim archive needs is missing
    #[error("archive has no {0}")]
    MissingFile(String),

    /// the directory holding the cellanim files is missing
    #[error("archive has no {0:?} directory")]
    RootDirectoryMissing(&'static str),

    /// the archive holds a layout instead of cellanims
    #[error("this is a layout archive, not a cellanim archive")]
    #[diagnostic(help("layout archives contain a blyt directory; open the matching cellanim archive instead"))]
    LayoutArchive,

    /// the file is a 3D model resource
    #[error("this is a 3D model resource (BRRES / CGFX), not a cellanim archive")]
    ModelResource,

    /// the file is an effect resource
    #[error("this is an effect resource (REFF / EFTF), not a cellanim archive")]
    EffectResource,

    /// a cellanim of the other console was found
    #[error("{file} is a {found} cellanim inside a {expected} archive")]
    PlatformMismatch {
        file: String,
        expected: Platform,
        found: Platform,
    },

    /// a cellanim, label header or sidecar could not be read or written
    #[error("unable to process {file}")]
    Cellanim {
        file: String,
        #[source]
        source: toast_cellanim::error::Error,
    },

    /// a texture container could not be read or written
    #[error("unable to process {file}")]
    Texture {
        file: String,
        #[source]
        source: toast_texture::error::Error,
    },

    /// a texture container holds no textures
    #[error("{0} has no textures")]
    NoTextures(String),

    /// the archive could not be rebuilt
    #[error("unable to rebuild the archive")]
    ArchiveWrite(#[source] toast_archive::error::Error),

    /// the archive could not be compressed
    #[error("unable to compress the archive")]
    Compression(#[source] toast_archive::error::Error),

    /// the backup copy could not be made, the destination was left untouched
    #[error("unable to create backup {}", path.display())]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// the destination could not be opened or written
    #[error("unable to write {}", path.display())]
    DestinationOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// the configuration file could not be read or written
    #[error("unable to access configuration {}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// the configuration file is not valid JSON
    #[error("configuration {} is invalid", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// a background task could not be started
    #[error("unable to start task {name}")]
    TaskSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// the main thread stopped taking work
    #[error("the main thread queue is closed")]
    MainThreadClosed,

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

impl Error {
    /// Wrap a cellanim codec error, lifting platform mismatches
    pub fn cellanim(file: impl Into<String>, source: toast_cellanim::error::Error) -> Self {
        let file = file.into();
        match source {
            toast_cellanim::error::Error::PlatformMismatch { expected, found } => {
                Error::PlatformMismatch {
                    file,
                    expected,
                    found,
                }
            }
            source => Error::Cellanim { file, source },
        }
    }

    pub fn texture(file: impl Into<String>, source: toast_texture::error::Error) -> Self {
        Error::Texture {
            file: file.into(),
            source,
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
