//! CRC-32 (ISO-HDLC, the zlib polynomial) as used by CTPK path hashes.

use crc::{Crc, CRC_32_ISO_HDLC};

/// Table driven CRC-32 shared by every caller
pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Checksum of `data`
pub fn compute(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
