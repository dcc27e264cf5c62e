//! Size-prefixed zlib wrapper
//!
//! | Offset (bytes) | Field         | Description                                   |
//! |----------------|---------------|-----------------------------------------------|
//! | 0x0000         | Inflated Size | 4 bytes: big endian size of the payload       |
//! | 0x0004         | Stream        | zlib stream (header, deflate data, adler32)   |

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::instrument;

use crate::error::{Error, Result};

/// Size of the inflated size prefix
pub const HEADER_SIZE: usize = 4;

/// Probe whether `data` looks like a size-prefixed zlib stream
///
/// Checks the zlib CMF/FLG pair that follows the size prefix: deflate method, a window of at most
/// 32K and a valid header checksum.
pub fn is_nzlib(data: &[u8]) -> bool {
    if data.len() < HEADER_SIZE + 2 {
        return false;
    }
    let cmf = data[HEADER_SIZE] as u16;
    let flg = data[HEADER_SIZE + 1] as u16;

    cmf & 0x0F == 8 && cmf >> 4 <= 7 && ((cmf << 8) | flg) % 31 == 0
}

/// Inflate a size-prefixed zlib stream
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < HEADER_SIZE {
        return Err(Error::ZlibTooShort(data.len()));
    }

    let expected = BigEndian::read_u32(&data[..HEADER_SIZE]) as usize;

    // Never trust the header for more than a sane initial reservation
    let mut out = Vec::with_capacity(expected.min(data.len().saturating_mul(16)));
    ZlibDecoder::new(&data[HEADER_SIZE..])
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(Error::Zlib)?;

    if out.len() != expected {
        return Err(Error::ZlibSizeMismatch {
            expected,
            actual: out.len(),
        });
    }

    Ok(out)
}

/// Deflate `data` behind a big-endian size prefix
///
/// `level` is clamped into the 0-9 range accepted by zlib.
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_SIZE + data.len() / 2);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());

    let mut encoder = ZlibEncoder::new(out, Compression::new(level.min(9)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
