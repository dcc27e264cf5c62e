//! Yaz0 compression
//!
//! | Offset (bytes) | Field             | Description                                  |
//! |----------------|-------------------|----------------------------------------------|
//! | 0x0000         | Magic number      | 4 bytes: "Yaz0"                              |
//! | 0x0004         | Uncompressed Size | 4 bytes: big endian size of the payload      |
//! | 0x0008         | Reserved          | 8 bytes: zero                                |
//!
//! The header is followed by groups: one byte whose bits (most significant first) select eight
//! chunks. A set bit copies one literal byte, a clear bit is a back-reference encoded in two bytes
//! (`NR RR`: length `N + 2`, distance `RRR + 1`) or, when `N` is zero, three bytes
//! (`0R RR NN`: length `NN + 0x12`).

use byteorder::{BigEndian, ByteOrder};
use tracing::instrument;

use crate::error::{Error, Result};

/// Magic at the start of every Yaz0 stream
pub const MAGIC: [u8; 4] = *b"Yaz0";

/// Size of the Yaz0 header
pub const HEADER_SIZE: usize = 0x10;

const WINDOW: usize = 0x1000;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 0xFF + 0x12;

const HASH_BITS: u32 = 15;
const NO_POSITION: u32 = u32::MAX;

/// Whether `data` starts with the Yaz0 magic
pub fn is_yaz0(data: &[u8]) -> bool {
    data.len() >= HEADER_SIZE && data[..4] == MAGIC
}

/// Read the uncompressed size from a Yaz0 header
pub fn decompressed_size(data: &[u8]) -> Result<usize> {
    if !is_yaz0(data) {
        return Err(Error::NotYaz0);
    }
    Ok(BigEndian::read_u32(&data[4..8]) as usize)
}

/// Decompress a Yaz0 stream
///
/// Every read is checked against the input length and every back-reference against the data
/// produced so far, so corrupt streams are reported instead of read out of bounds.
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let size = decompressed_size(data)?;
    // The header is untrusted, the vector grows past this when the stream really is that large
    let mut out = Vec::with_capacity(size.min(data.len().saturating_mul(16)));

    let mut src = HEADER_SIZE;
    let next = |src: &mut usize| -> Result<u8> {
        let byte = *data
            .get(*src)
            .ok_or(Error::Yaz0Truncated { offset: *src })?;
        *src += 1;
        Ok(byte)
    };

    while out.len() < size {
        let group = next(&mut src)?;

        for bit in 0..8 {
            if out.len() >= size {
                break;
            }

            if group & (0x80 >> bit) != 0 {
                out.push(next(&mut src)?);
                continue;
            }

            let b1 = next(&mut src)? as usize;
            let b2 = next(&mut src)? as usize;

            let distance = (((b1 & 0x0F) << 8) | b2) + 1;
            let length = match b1 >> 4 {
                0 => next(&mut src)? as usize + 0x12,
                n => n + 2,
            };

            if distance > out.len() {
                return Err(Error::Yaz0BackReference {
                    distance,
                    position: out.len(),
                });
            }

            let start = out.len() - distance;
            let length = length.min(size - out.len());
            // Byte by byte, the source may overlap the bytes being produced
            for i in 0..length {
                let byte = out[start + i];
                out.push(byte);
            }
        }
    }

    Ok(out)
}

fn search_depth(level: u32) -> usize {
    match level.min(9) {
        0 => 0,
        1 => 4,
        2 => 8,
        3 => 16,
        4 => 32,
        5 => 64,
        6 => 128,
        7 => 256,
        8 => 1024,
        _ => 4096,
    }
}

/// Hash chain over three byte prefixes inside the sliding window
struct Matcher<'a> {
    data: &'a [u8],
    depth: usize,
    head: Vec<u32>,
    prev: Vec<u32>,
}

impl<'a> Matcher<'a> {
    fn new(data: &'a [u8], depth: usize) -> Self {
        Matcher {
            data,
            depth,
            head: vec![NO_POSITION; 1 << HASH_BITS],
            prev: vec![NO_POSITION; if depth == 0 { 0 } else { data.len() }],
        }
    }

    fn hash(&self, pos: usize) -> usize {
        let d = self.data;
        (((d[pos] as usize) << 10) ^ ((d[pos + 1] as usize) << 5) ^ d[pos + 2] as usize)
            & ((1 << HASH_BITS) - 1)
    }

    fn insert(&mut self, pos: usize) {
        if self.depth == 0 || pos + MIN_MATCH > self.data.len() {
            return;
        }
        let h = self.hash(pos);
        self.prev[pos] = self.head[h];
        self.head[h] = pos as u32;
    }

    /// Longest match for `pos` as `(distance, length)`, closest wins on ties
    fn find(&self, pos: usize) -> Option<(usize, usize)> {
        if self.depth == 0 || pos + MIN_MATCH > self.data.len() {
            return None;
        }

        let max_length = MAX_MATCH.min(self.data.len() - pos);
        let mut best = (0, 0);
        let mut candidate = self.head[self.hash(pos)];
        let mut remaining = self.depth;

        while candidate != NO_POSITION && remaining > 0 {
            let start = candidate as usize;
            let distance = pos - start;
            if distance > WINDOW {
                break;
            }

            let length = self.data[start..]
                .iter()
                .zip(&self.data[pos..pos + max_length])
                .take_while(|(a, b)| a == b)
                .count();

            if length > best.1 {
                best = (distance, length);
                if length == max_length {
                    break;
                }
            }

            candidate = self.prev[start];
            remaining -= 1;
        }

        (best.1 >= MIN_MATCH).then_some(best)
    }
}

/// Pending group: the flag byte and up to eight encoded chunks
#[derive(Default)]
struct Group {
    flags: u8,
    count: u32,
    chunks: Vec<u8>,
}

impl Group {
    fn literal(&mut self, byte: u8) {
        self.flags |= 0x80 >> self.count;
        self.chunks.push(byte);
        self.count += 1;
    }

    fn back_reference(&mut self, distance: usize, length: usize) {
        let distance = distance - 1;
        if length >= 0x12 {
            self.chunks.push((distance >> 8) as u8);
            self.chunks.push(distance as u8);
            self.chunks.push((length - 0x12) as u8);
        } else {
            self.chunks.push((((length - 2) << 4) | (distance >> 8)) as u8);
            self.chunks.push(distance as u8);
        }
        self.count += 1;
    }

    fn is_full(&self) -> bool {
        self.count == 8
    }

    fn flush(&mut self, out: &mut Vec<u8>) {
        if self.count == 0 {
            return;
        }
        out.push(self.flags);
        out.append(&mut self.chunks);
        self.flags = 0;
        self.count = 0;
    }
}

/// Compress `data` into a Yaz0 stream
///
/// `level` (0-9) controls how far the match finder searches; level 0 stores only literals. The
/// output is deterministic for a given input and level. Inputs that do not fit the 32 bit size
/// field are rejected.
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let size = u32::try_from(data.len()).map_err(|_| Error::Yaz0TooLarge(data.len()))?;

    let mut header = [0u8; HEADER_SIZE];
    header[..4].copy_from_slice(&MAGIC);
    BigEndian::write_u32(&mut header[4..8], size);

    let mut out = Vec::with_capacity(HEADER_SIZE + data.len() + data.len() / 8 + 1);
    out.extend_from_slice(&header);

    let mut matcher = Matcher::new(data, search_depth(level));
    let mut group = Group::default();

    let mut pos = 0;
    while pos < data.len() {
        match matcher.find(pos) {
            Some((distance, length)) => {
                group.back_reference(distance, length);
                for p in pos..pos + length {
                    matcher.insert(p);
                }
                pos += length;
            }
            None => {
                group.literal(data[pos]);
                matcher.insert(pos);
                pos += 1;
            }
        }

        if group.is_full() {
            group.flush(&mut out);
        }
    }
    group.flush(&mut out);

    Ok(out)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{compress, decompress};
    use crate::error::{Error, Result};

    fn with_header(size: u32, stream: &[u8]) -> Vec<u8> {
        let mut data = b"Yaz0".to_vec();
        data.extend_from_slice(&size.to_be_bytes());
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(stream);
        data
    }

    #[test]
    fn decompress_short_back_reference() -> Result<()> {
        let input = with_header(9, &[0xE0, b'a', b'b', b'c', 0x40, 0x02]);
        assert_eq!(decompress(&input)?, b"abcabcabc".to_vec());
        Ok(())
    }

    #[test]
    fn decompress_long_back_reference() -> Result<()> {
        let input = with_header(35, &[0x80, b'a', 0x00, 0x00, 0x10]);
        assert_eq!(decompress(&input)?, vec![b'a'; 35]);
        Ok(())
    }

    #[test]
    fn decompress_empty() -> Result<()> {
        assert_eq!(decompress(&with_header(0, &[]))?, Vec::<u8>::new());
        Ok(())
    }

    #[test]
    fn decompress_truncated_stream() {
        let input = with_header(9, &[0xE0, b'a']);
        assert!(matches!(
            decompress(&input),
            Err(Error::Yaz0Truncated { offset: 0x12 })
        ));
    }

    #[test]
    fn decompress_group_claims_missing_data() {
        let input = with_header(4, &[0xF0, b'a', b'b']);
        assert!(matches!(decompress(&input), Err(Error::Yaz0Truncated { .. })));
    }

    #[test]
    fn decompress_reference_before_start() {
        let input = with_header(8, &[0x00, 0x10, 0x05]);
        assert!(matches!(
            decompress(&input),
            Err(Error::Yaz0BackReference {
                distance: 6,
                position: 0
            })
        ));
    }

    #[test]
    fn decompress_huge_declared_size() {
        // only the header and one group byte, claiming almost 4 GiB
        let input = with_header(0xFFFF_FFF0, &[0x00]);
        assert!(matches!(decompress(&input), Err(Error::Yaz0Truncated { .. })));
    }

    #[test]
    fn decompress_rejects_missing_magic() {
        assert!(matches!(decompress(b"Yaz1"), Err(Error::NotYaz0)));
    }

    #[test]
    fn compress_literals_only() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            b'Y', b'a', b'z', b'0',
            0x00, 0x00, 0x00, 0x03,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0xE0, b'a', b'b', b'c',
        ];
        assert_eq!(compress(b"abc", 0)?, expected);
        Ok(())
    }

    #[test]
    fn compress_uses_back_references() -> Result<()> {
        let input = b"abcabcabc".repeat(40);
        let compressed = compress(&input, 9)?;
        assert!(compressed.len() < input.len() / 4);
        assert_eq!(decompress(&compressed)?, input);
        Ok(())
    }

    #[test]
    fn compress_round_trip_all_levels() -> Result<()> {
        let mut input = Vec::new();
        for i in 0u32..5000 {
            input.push((i.wrapping_mul(2654435761) >> 24) as u8 & 0x1F);
        }

        for data in [Vec::new(), vec![0x42], input] {
            for level in 0..=9 {
                assert_eq!(decompress(&compress(&data, level)?)?, data);
            }
        }
        Ok(())
    }
}
