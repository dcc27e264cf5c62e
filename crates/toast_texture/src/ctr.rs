//! 3DS (PICA) texture formats
//!
//! | Id   | Format   | Bits | Texel (little endian)                             |
//! |------|----------|------|---------------------------------------------------|
//! | 0x00 | RGBA8888 | 32   | bytes A, B, G, R                                  |
//! | 0x01 | RGB888   | 24   | bytes B, G, R                                     |
//! | 0x02 | RGBA5551 | 16   | R5 G5 B5 A1 from the top bit down                 |
//! | 0x03 | RGB565   | 16   |                                                   |
//! | 0x04 | RGBA4444 | 16   | R4 G4 B4 A4 from the top bit down                 |
//! | 0x05 | LA88     | 16   | bytes A, L                                        |
//! | 0x06 | HILO88   | 16   | bytes G, R                                        |
//! | 0x07 | L8       | 8    |                                                   |
//! | 0x08 | A8       | 8    |                                                   |
//! | 0x09 | LA44     | 8    | luminance in the high nibble                      |
//! | 0x0A | L4       | 4    | low nibble first                                  |
//! | 0x0B | A4       | 4    | low nibble first                                  |
//! | 0x0C | ETC1     | 4    | 4x4 blocks, see [`crate::etc1`]                   |
//! | 0x0D | ETC1A4   | 8    | 64 bit alpha block before every colour block      |
//!
//! Images are split in 8x8 tiles stored row by row. Texels inside a tile follow a Z-order curve;
//! ETC1 tiles instead hold four 4x4 blocks (top left, top right, bottom left, bottom right), each
//! stored as a little endian `u64`. ETC1A4 alpha words hold pixel `(x, y)` in nibble `x * 4 + y`.

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::instrument;

use crate::color::{align, expand4, expand5, expand6, luminance, pixel_at, set_pixel, Rgba, RGBA_SIZE};
use crate::error::{Error, Result};
use crate::etc1;

const TILE: u32 = 8;
const BLOCKS: [(u32, u32); 4] = [(0, 0), (4, 0), (0, 4), (4, 4)];

/// Texture format of a 3DS image
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CtrFormat {
    Rgba8888,
    Rgb888,
    Rgba5551,
    Rgb565,
    Rgba4444,
    La88,
    HiLo88,
    L8,
    A8,
    La44,
    L4,
    A4,
    Etc1,
    Etc1a4,
}

impl TryFrom<u32> for CtrFormat {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            0x00 => CtrFormat::Rgba8888,
            0x01 => CtrFormat::Rgb888,
            0x02 => CtrFormat::Rgba5551,
            0x03 => CtrFormat::Rgb565,
            0x04 => CtrFormat::Rgba4444,
            0x05 => CtrFormat::La88,
            0x06 => CtrFormat::HiLo88,
            0x07 => CtrFormat::L8,
            0x08 => CtrFormat::A8,
            0x09 => CtrFormat::La44,
            0x0A => CtrFormat::L4,
            0x0B => CtrFormat::A4,
            0x0C => CtrFormat::Etc1,
            0x0D => CtrFormat::Etc1a4,
            _ => return Err(Error::UnknownCtrFormat(value)),
        })
    }
}

impl CtrFormat {
    pub const ALL: [CtrFormat; 14] = [
        CtrFormat::Rgba8888,
        CtrFormat::Rgb888,
        CtrFormat::Rgba5551,
        CtrFormat::Rgb565,
        CtrFormat::Rgba4444,
        CtrFormat::La88,
        CtrFormat::HiLo88,
        CtrFormat::L8,
        CtrFormat::A8,
        CtrFormat::La44,
        CtrFormat::L4,
        CtrFormat::A4,
        CtrFormat::Etc1,
        CtrFormat::Etc1a4,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn bits_per_pixel(self) -> u32 {
        match self {
            CtrFormat::Rgba8888 => 32,
            CtrFormat::Rgb888 => 24,
            CtrFormat::Rgba5551
            | CtrFormat::Rgb565
            | CtrFormat::Rgba4444
            | CtrFormat::La88
            | CtrFormat::HiLo88 => 16,
            CtrFormat::L8 | CtrFormat::A8 | CtrFormat::La44 | CtrFormat::Etc1a4 => 8,
            CtrFormat::L4 | CtrFormat::A4 | CtrFormat::Etc1 => 4,
        }
    }

    /// Whether the format is block compressed
    pub fn is_compressed(self) -> bool {
        matches!(self, CtrFormat::Etc1 | CtrFormat::Etc1a4)
    }
}

/// Storage size of an image padded to whole tiles
pub fn byte_size(format: CtrFormat, width: u32, height: u32) -> usize {
    align(width, TILE) as usize * align(height, TILE) as usize * format.bits_per_pixel() as usize / 8
}

/// Position inside an 8x8 tile of the `i`th texel on the Z-order curve
pub const fn morton(i: u32) -> (u32, u32) {
    let x = (i & 1) | ((i >> 1) & 2) | ((i >> 2) & 4);
    let y = ((i >> 1) & 1) | ((i >> 2) & 2) | ((i >> 3) & 4);
    (x, y)
}

fn check(width: u32, height: u32, actual: usize, expected: usize, what: &'static str) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    if actual < expected {
        return Err(Error::BufferTooSmall {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn put_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn decode_texel(format: CtrFormat, data: &[u8], slot: usize) -> Rgba {
    let bytes = format.bits_per_pixel() as usize / 8;
    let at = slot * bytes;
    let word = || u16::from_le_bytes([data[at], data[at + 1]]);

    match format {
        CtrFormat::Rgba8888 => [data[at + 3], data[at + 2], data[at + 1], data[at]],
        CtrFormat::Rgb888 => [data[at + 2], data[at + 1], data[at], 0xFF],
        CtrFormat::Rgba5551 => {
            let v = word();
            [
                expand5((v >> 11) as u8 & 0x1F),
                expand5((v >> 6) as u8 & 0x1F),
                expand5((v >> 1) as u8 & 0x1F),
                if v & 1 != 0 { 0xFF } else { 0 },
            ]
        }
        CtrFormat::Rgb565 => {
            let v = word();
            [
                expand5((v >> 11) as u8 & 0x1F),
                expand6((v >> 5) as u8 & 0x3F),
                expand5(v as u8 & 0x1F),
                0xFF,
            ]
        }
        CtrFormat::Rgba4444 => {
            let v = word();
            [
                expand4((v >> 12) as u8 & 0x0F),
                expand4((v >> 8) as u8 & 0x0F),
                expand4((v >> 4) as u8 & 0x0F),
                expand4(v as u8 & 0x0F),
            ]
        }
        CtrFormat::La88 => {
            let l = data[at + 1];
            [l, l, l, data[at]]
        }
        CtrFormat::HiLo88 => [data[at + 1], data[at], 0, 0xFF],
        CtrFormat::L8 => [data[at], data[at], data[at], 0xFF],
        CtrFormat::A8 => [0xFF, 0xFF, 0xFF, data[at]],
        CtrFormat::La44 => {
            let l = expand4(data[at] >> 4);
            [l, l, l, expand4(data[at] & 0x0F)]
        }
        CtrFormat::L4 | CtrFormat::A4 => {
            let byte = data[slot / 2];
            let v = expand4(if slot % 2 == 0 { byte & 0x0F } else { byte >> 4 });
            if format == CtrFormat::L4 {
                [v, v, v, 0xFF]
            } else {
                [0xFF, 0xFF, 0xFF, v]
            }
        }
        CtrFormat::Etc1 | CtrFormat::Etc1a4 => [0, 0, 0, 0],
    }
}

fn encode_texel(format: CtrFormat, data: &mut [u8], slot: usize, pixel: Rgba) {
    let [r, g, b, a] = pixel;
    let bytes = format.bits_per_pixel() as usize / 8;
    let at = slot * bytes;
    let [r16, g16, b16, a16] = pixel.map(u16::from);

    match format {
        CtrFormat::Rgba8888 => data[at..at + 4].copy_from_slice(&[a, b, g, r]),
        CtrFormat::Rgb888 => data[at..at + 3].copy_from_slice(&[b, g, r]),
        CtrFormat::Rgba5551 => put_u16(
            data,
            at,
            ((r16 >> 3) << 11) | ((g16 >> 3) << 6) | ((b16 >> 3) << 1) | (a16 >> 7),
        ),
        CtrFormat::Rgb565 => put_u16(data, at, ((r16 >> 3) << 11) | ((g16 >> 2) << 5) | (b16 >> 3)),
        CtrFormat::Rgba4444 => put_u16(
            data,
            at,
            ((r16 >> 4) << 12) | ((g16 >> 4) << 8) | ((b16 >> 4) << 4) | (a16 >> 4),
        ),
        CtrFormat::La88 => data[at..at + 2].copy_from_slice(&[a, luminance(pixel)]),
        CtrFormat::HiLo88 => data[at..at + 2].copy_from_slice(&[g, r]),
        CtrFormat::L8 => data[at] = luminance(pixel),
        CtrFormat::A8 => data[at] = a,
        CtrFormat::La44 => data[at] = (luminance(pixel) & 0xF0) | (a >> 4),
        CtrFormat::L4 | CtrFormat::A4 => {
            let v = if format == CtrFormat::L4 {
                luminance(pixel) >> 4
            } else {
                a >> 4
            };
            let shift = if slot % 2 == 0 { 0 } else { 4 };
            data[slot / 2] |= v << shift;
        }
        CtrFormat::Etc1 | CtrFormat::Etc1a4 => {}
    }
}

fn etc1_block_size(format: CtrFormat) -> usize {
    if format == CtrFormat::Etc1a4 {
        16
    } else {
        8
    }
}

fn decode_etc1(format: CtrFormat, width: u32, height: u32, data: &[u8]) -> Vec<u8> {
    let mut rgba = vec![0u8; width as usize * height as usize * RGBA_SIZE];
    let block_size = etc1_block_size(format);
    let mut blocks = data.chunks_exact(block_size);

    for ty in (0..height).step_by(TILE as usize) {
        for tx in (0..width).step_by(TILE as usize) {
            for (bx, by) in BLOCKS {
                let Some(block) = blocks.next() else {
                    return rgba;
                };
                let word = |at: usize| {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(&block[at..at + 8]);
                    u64::from_le_bytes(bytes)
                };

                let (alpha, color) = if format == CtrFormat::Etc1a4 {
                    (Some(word(0)), word(8))
                } else {
                    (None, word(0))
                };

                for (i, [r, g, b]) in etc1::unpack_block(color).into_iter().enumerate() {
                    let (px, py) = ((i % 4) as u32, (i / 4) as u32);
                    let (x, y) = (tx + bx + px, ty + by + py);
                    if x >= width || y >= height {
                        continue;
                    }
                    let a = alpha.map_or(0xFF, |alpha| {
                        expand4(((alpha >> ((px * 4 + py) * 4)) & 0x0F) as u8)
                    });
                    set_pixel(&mut rgba, width, x, y, [r, g, b, a]);
                }
            }
        }
    }
    rgba
}

/// Encode one row of ETC1 tiles into `out`
fn encode_etc1_row(format: CtrFormat, width: u32, height: u32, rgba: &[u8], ty: u32, out: &mut [u8]) {
    let block_size = etc1_block_size(format);
    let mut offset = 0;

    for tx in (0..width).step_by(TILE as usize) {
        for (bx, by) in BLOCKS {
            let mut pixels = [[0u8; 3]; 16];
            let mut alpha = 0u64;

            for (i, pixel) in pixels.iter_mut().enumerate() {
                let (px, py) = ((i % 4) as u32, (i / 4) as u32);
                let (x, y) = (tx + bx + px, ty + by + py);
                if x >= width || y >= height {
                    continue;
                }
                let [r, g, b, a] = pixel_at(rgba, width, x, y);
                *pixel = [r, g, b];
                alpha |= ((a >> 4) as u64) << ((px * 4 + py) * 4);
            }

            let block = &mut out[offset..offset + block_size];
            if format == CtrFormat::Etc1a4 {
                block[..8].copy_from_slice(&alpha.to_le_bytes());
                block[8..].copy_from_slice(&etc1::pack_block(&pixels).to_le_bytes());
            } else {
                block.copy_from_slice(&etc1::pack_block(&pixels).to_le_bytes());
            }
            offset += block_size;
        }
    }
}

/// Decode a tiled image into canonical RGBA
#[instrument(skip(data), err)]
pub fn decode(format: CtrFormat, width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    check(width, height, data.len(), byte_size(format, width, height), "texture")?;

    if format.is_compressed() {
        return Ok(decode_etc1(format, width, height, data));
    }

    let mut rgba = vec![0u8; width as usize * height as usize * RGBA_SIZE];
    let tiles_x = align(width, TILE) / TILE;
    let tiles_y = align(height, TILE) / TILE;

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let tile = (ty * tiles_x + tx) as usize;
            for i in 0..TILE * TILE {
                let (mx, my) = morton(i);
                let (x, y) = (tx * TILE + mx, ty * TILE + my);
                if x < width && y < height {
                    let pixel = decode_texel(format, data, tile * 64 + i as usize);
                    set_pixel(&mut rgba, width, x, y, pixel);
                }
            }
        }
    }
    Ok(rgba)
}

/// Encode canonical RGBA into a tiled image
///
/// ETC1 encoding fans out over rows of tiles on `pool`, or on the global rayon pool when none is
/// given. Every row writes a disjoint part of the output so the result does not depend on the
/// number of workers.
#[instrument(skip(rgba, pool), err)]
pub fn encode(
    format: CtrFormat,
    width: u32,
    height: u32,
    rgba: &[u8],
    pool: Option<&ThreadPool>,
) -> Result<Vec<u8>> {
    let expected = width as usize * height as usize * RGBA_SIZE;
    check(width, height, rgba.len(), expected, "RGBA")?;

    let mut out = vec![0u8; byte_size(format, width, height)];

    if format.is_compressed() {
        let row_size = byte_size(format, width, TILE);
        let job = |(row, chunk): (usize, &mut [u8])| {
            encode_etc1_row(format, width, height, rgba, row as u32 * TILE, chunk)
        };

        match pool {
            Some(pool) => pool.install(|| out.par_chunks_mut(row_size).enumerate().for_each(job)),
            None => out.par_chunks_mut(row_size).enumerate().for_each(job),
        }
        return Ok(out);
    }

    let tiles_x = align(width, TILE) / TILE;
    let tiles_y = align(height, TILE) / TILE;
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let tile = (ty * tiles_x + tx) as usize;
            for i in 0..TILE * TILE {
                let (mx, my) = morton(i);
                let (x, y) = (tx * TILE + mx, ty * TILE + my);
                if x < width && y < height {
                    encode_texel(format, &mut out, tile * 64 + i as usize, pixel_at(rgba, width, x, y));
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{byte_size, decode, encode, morton, CtrFormat};
    use crate::error::{Error, Result};
    use crate::etc1::build_pool;

    fn noise(width: u32, height: u32) -> Vec<u8> {
        (0..width * height * 4)
            .map(|i| (i.wrapping_mul(2246822519) >> 11) as u8)
            .collect()
    }

    #[test]
    fn morton_order() {
        let first = (0..8).map(morton).collect::<Vec<_>>();
        assert_eq!(
            first,
            vec![(0, 0), (1, 0), (0, 1), (1, 1), (2, 0), (3, 0), (2, 1), (3, 1)]
        );
        assert_eq!(morton(63), (7, 7));
        assert_eq!(morton(16), (0, 2));
    }

    #[test]
    fn format_ids() -> Result<()> {
        for format in CtrFormat::ALL {
            assert_eq!(CtrFormat::try_from(format.id())?, format);
        }
        assert!(matches!(CtrFormat::try_from(14), Err(Error::UnknownCtrFormat(14))));
        Ok(())
    }

    #[test]
    fn sizes_pad_to_tiles() {
        assert_eq!(byte_size(CtrFormat::Etc1, 8, 8), 32);
        assert_eq!(byte_size(CtrFormat::Etc1a4, 8, 8), 64);
        assert_eq!(byte_size(CtrFormat::Rgba8888, 8, 8), 256);
        assert_eq!(byte_size(CtrFormat::L4, 8, 8), 32);
        assert_eq!(byte_size(CtrFormat::Etc1, 16, 8), 64);
        assert_eq!(byte_size(CtrFormat::Rgb888, 9, 9), 768);
    }

    #[test]
    fn rgba8888_is_stored_reversed() -> Result<()> {
        let mut rgba = vec![0u8; 8 * 8 * 4];
        rgba[..4].copy_from_slice(&[1, 2, 3, 4]);
        // second row, first column: third texel on the curve
        rgba[8 * 4..8 * 4 + 4].copy_from_slice(&[5, 6, 7, 8]);

        let data = encode(CtrFormat::Rgba8888, 8, 8, &rgba, None)?;
        assert_eq!(&data[..4], &[4, 3, 2, 1]);
        assert_eq!(&data[8..12], &[8, 7, 6, 5]);
        Ok(())
    }

    #[test]
    fn encode_decode_is_idempotent() -> Result<()> {
        for format in CtrFormat::ALL.into_iter().filter(|f| !f.is_compressed()) {
            for (width, height) in [(8, 8), (12, 20), (1, 1)] {
                let first = encode(format, width, height, &noise(width, height), None)?;
                let decoded = decode(format, width, height, &first)?;
                let second = encode(format, width, height, &decoded, None)?;
                assert_eq!(first, second, "{format:?} {width}x{height}");
            }
        }
        Ok(())
    }

    #[test]
    fn etc1_tile_layout() -> Result<()> {
        // left tile red, right tile blue
        let mut rgba = Vec::new();
        for _ in 0..8 {
            rgba.extend([0xFF, 0x00, 0x00, 0xFF].repeat(8));
            rgba.extend([0x00, 0x00, 0xFF, 0xFF].repeat(8));
        }

        let data = encode(CtrFormat::Etc1, 16, 8, &rgba, None)?;
        assert_eq!(data.len(), 64);

        let left = decode(CtrFormat::Etc1, 8, 8, &data[..32])?;
        assert!(left.chunks_exact(4).all(|p| p[0] > 0xE0 && p[2] < 0x20));

        let decoded = decode(CtrFormat::Etc1, 16, 8, &data)?;
        assert_eq!(&decoded[15 * 4..16 * 4], &decoded[8 * 4..9 * 4]);
        assert!(decoded[8 * 4 + 2] > 0xE0);
        Ok(())
    }

    #[test]
    fn etc1a4_alpha_nibbles() -> Result<()> {
        let mut rgba = vec![0x80u8; 8 * 8 * 4];
        for (i, pixel) in rgba.chunks_exact_mut(4).enumerate() {
            pixel[3] = ((i % 16) * 0x11) as u8;
        }

        let data = encode(CtrFormat::Etc1a4, 8, 8, &rgba, None)?;
        // nibble 1 holds pixel (0, 1), nibble 4 holds pixel (1, 0)
        assert_eq!(data[0], 0x80);
        assert_eq!(data[2] & 0x0F, 1);

        let decoded = decode(CtrFormat::Etc1a4, 8, 8, &data)?;
        let alphas = decoded.chunks_exact(4).map(|p| p[3]).collect::<Vec<_>>();
        let expected = rgba.chunks_exact(4).map(|p| p[3]).collect::<Vec<_>>();
        assert_eq!(alphas, expected);
        Ok(())
    }

    #[test]
    fn etc1_output_does_not_depend_on_workers() -> Result<()> {
        let rgba = noise(40, 24);
        let single = build_pool(Some(1))?;
        let many = build_pool(Some(4))?;

        let a = encode(CtrFormat::Etc1a4, 40, 24, &rgba, Some(&single))?;
        let b = encode(CtrFormat::Etc1a4, 40, 24, &rgba, Some(&many))?;
        let c = encode(CtrFormat::Etc1a4, 40, 24, &rgba, None)?;
        assert_eq!(a, b);
        assert_eq!(a, c);
        Ok(())
    }

    #[test]
    fn rejects_short_buffers() {
        assert!(matches!(
            decode(CtrFormat::Etc1, 8, 8, &[0; 16]),
            Err(Error::BufferTooSmall { expected: 32, .. })
        ));
        assert!(matches!(
            encode(CtrFormat::L8, 2, 2, &[0; 15], None),
            Err(Error::BufferTooSmall { what: "RGBA", .. })
        ));
    }
}
