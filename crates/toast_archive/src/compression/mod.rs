//! Whole-file compression and decompression handling.

use std::fmt;

use tracing::instrument;

use crate::error::Result;

pub mod yaz0;
pub mod zlib;

/// Identifies the wrapper used to compress a whole archive file
///
/// Wii archives are normally Yaz0 compressed (`.szs`), 3DS archives use a zlib stream with a
/// big-endian size header (`.zlib`).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Stores the data as it is
    None,

    /// Compress the data using Yaz0
    #[default]
    Yaz0,

    /// Compress the data using zlib, prefixed by the inflated size
    Zlib,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Yaz0 => write!(f, "yaz0"),
            Compression::Zlib => write!(f, "zlib"),
        }
    }
}

impl Compression {
    /// Guess the wrapper of `data` from its leading bytes
    ///
    /// Yaz0 is recognised by its magic, the zlib wrapper by the stream header that follows the
    /// size prefix. Anything else is reported as [`Compression::None`].
    pub fn detect(data: &[u8]) -> Compression {
        if yaz0::is_yaz0(data) {
            Compression::Yaz0
        } else if zlib::is_nzlib(data) {
            Compression::Zlib
        } else {
            Compression::None
        }
    }

    /// Decompress `data` with this wrapper
    #[instrument(skip(data), fields(size = data.len()), err)]
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Yaz0 => yaz0::decompress(data),
            Compression::Zlib => zlib::decompress(data),
        }
    }

    /// Compress `data` with this wrapper at `level` (0-9)
    #[instrument(skip(data), fields(size = data.len()), err)]
    pub fn compress(self, data: &[u8], level: u32) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Yaz0 => yaz0::compress(data, level),
            Compression::Zlib => zlib::compress(data, level),
        }
    }
}

/// Detect the wrapper of `data` and decompress it, returning the wrapper alongside the payload
pub fn decompress_any(data: &[u8]) -> Result<(Compression, Vec<u8>)> {
    let compression = Compression::detect(data);
    Ok((compression, compression.decompress(data)?))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{decompress_any, Compression};
    use crate::error::Result;

    #[test]
    fn detect_wrappers() -> Result<()> {
        let payload = b"a small payload, a small payload".to_vec();

        let yaz0 = Compression::Yaz0.compress(&payload, 9)?;
        let zlib = Compression::Zlib.compress(&payload, 9)?;

        assert_eq!(Compression::detect(&yaz0), Compression::Yaz0);
        assert_eq!(Compression::detect(&zlib), Compression::Zlib);
        assert_eq!(Compression::detect(&payload), Compression::None);

        assert_eq!(decompress_any(&yaz0)?, (Compression::Yaz0, payload.clone()));
        assert_eq!(decompress_any(&zlib)?, (Compression::Zlib, payload));

        Ok(())
    }
}
