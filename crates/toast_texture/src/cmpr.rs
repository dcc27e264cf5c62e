//! CMPR, the GX flavour of DXT1
//!
//! An 8x8 tile holds four 8 byte sub-blocks in the order top left, top right, bottom left, bottom
//! right. Each sub-block is a DXT1 block with big endian RGB565 endpoints and one index byte per
//! row, the leftmost pixel in the two most significant bits.

use crate::color::{align, expand5, expand6, pixel_at, set_pixel, Rgba};

pub const BLOCK_SIZE: usize = 8;
const SUB_BLOCKS: [(u32, u32); 4] = [(0, 0), (4, 0), (0, 4), (4, 4)];

fn rgb565(value: u16) -> Rgba {
    [
        expand5((value >> 11) as u8 & 0x1F),
        expand6((value >> 5) as u8 & 0x3F),
        expand5(value as u8 & 0x1F),
        0xFF,
    ]
}

fn to_rgb565(pixel: Rgba) -> u16 {
    let [r, g, b, _] = pixel.map(u32::from);
    let r = (r * 31 + 127) / 255;
    let g = (g * 63 + 127) / 255;
    let b = (b * 31 + 127) / 255;
    ((r << 11) | (g << 5) | b) as u16
}

fn mix(a: Rgba, b: Rgba, wa: u32, wb: u32) -> Rgba {
    let channel = |i: usize| ((wa * a[i] as u32 + wb * b[i] as u32) / (wa + wb)) as u8;
    [channel(0), channel(1), channel(2), 0xFF]
}

/// The four colours addressed by a block with endpoints `c0` and `c1`
pub fn palette(c0: u16, c1: u16) -> [Rgba; 4] {
    let p0 = rgb565(c0);
    let p1 = rgb565(c1);
    if c0 > c1 {
        [p0, p1, mix(p0, p1, 2, 1), mix(p0, p1, 1, 2)]
    } else {
        [p0, p1, mix(p0, p1, 1, 1), [0, 0, 0, 0]]
    }
}

/// Decode one sub-block into sixteen row-major pixels
pub fn decode_block(block: &[u8; BLOCK_SIZE]) -> [Rgba; 16] {
    let c0 = u16::from_be_bytes([block[0], block[1]]);
    let c1 = u16::from_be_bytes([block[2], block[3]]);
    let colors = palette(c0, c1);

    let mut out = [[0u8; 4]; 16];
    for (y, row) in block[4..].iter().enumerate() {
        for x in 0..4 {
            let index = (row >> (6 - 2 * x)) & 3;
            out[y * 4 + x] = colors[index as usize];
        }
    }
    out
}

fn distance(a: Rgba, b: Rgba) -> u32 {
    (0..3)
        .map(|i| (a[i] as i32 - b[i] as i32).pow(2) as u32)
        .sum()
}

/// Encode sixteen row-major pixels, `None` marking pixels outside the image
///
/// Endpoints span the bounding box of the opaque pixels. Blocks containing a pixel with alpha below
/// 0x80 use the three colour mode and map those pixels to the transparent index.
pub fn encode_block(pixels: &[Option<Rgba>; 16]) -> [u8; BLOCK_SIZE] {
    let transparent = |p: &Rgba| p[3] < 0x80;
    let has_transparent = pixels.iter().flatten().any(transparent);

    let mut low = [0xFFu8; 4];
    let mut high = [0u8; 4];
    let mut any_opaque = false;
    for pixel in pixels.iter().flatten().filter(|p| !transparent(p)) {
        any_opaque = true;
        for i in 0..3 {
            low[i] = low[i].min(pixel[i]);
            high[i] = high[i].max(pixel[i]);
        }
    }

    if !any_opaque {
        return [0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF];
    }

    let mut c0 = to_rgb565(high);
    let mut c1 = to_rgb565(low);
    if has_transparent == (c0 > c1) {
        std::mem::swap(&mut c0, &mut c1);
    }

    let colors = palette(c0, c1);
    let usable = if c0 > c1 { 4 } else { 3 };

    let mut block = [0u8; BLOCK_SIZE];
    block[..2].copy_from_slice(&c0.to_be_bytes());
    block[2..4].copy_from_slice(&c1.to_be_bytes());

    for (i, pixel) in pixels.iter().enumerate() {
        let index = match pixel {
            None => 0,
            Some(p) if transparent(p) => 3,
            Some(p) => (0..usable)
                .min_by_key(|&c| distance(colors[c], *p))
                .unwrap_or(0) as u8,
        };
        block[4 + i / 4] |= index << (6 - 2 * (i % 4));
    }

    block
}

/// Storage size of a CMPR image
pub fn byte_size(width: u32, height: u32) -> usize {
    (align(width, 8) as usize * align(height, 8) as usize) / 2
}

/// Decode a whole CMPR image into canonical RGBA
pub fn decode(width: u32, height: u32, data: &[u8]) -> Vec<u8> {
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    let mut blocks = data.chunks_exact(BLOCK_SIZE);

    for ty in (0..height).step_by(8) {
        for tx in (0..width).step_by(8) {
            for (sx, sy) in SUB_BLOCKS {
                let Some(block) = blocks.next() else {
                    return rgba;
                };
                let mut raw = [0u8; BLOCK_SIZE];
                raw.copy_from_slice(block);
                let decoded = decode_block(&raw);

                for (i, pixel) in decoded.iter().enumerate() {
                    let x = tx + sx + (i % 4) as u32;
                    let y = ty + sy + (i / 4) as u32;
                    if x < width && y < height {
                        set_pixel(&mut rgba, width, x, y, *pixel);
                    }
                }
            }
        }
    }
    rgba
}

/// Encode canonical RGBA into a CMPR image
pub fn encode(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(byte_size(width, height));

    for ty in (0..height).step_by(8) {
        for tx in (0..width).step_by(8) {
            for (sx, sy) in SUB_BLOCKS {
                let mut pixels = [None; 16];
                for (i, pixel) in pixels.iter_mut().enumerate() {
                    let x = tx + sx + (i % 4) as u32;
                    let y = ty + sy + (i / 4) as u32;
                    if x < width && y < height {
                        *pixel = Some(pixel_at(rgba, width, x, y));
                    }
                }
                out.extend_from_slice(&encode_block(&pixels));
            }
        }
    }
    out
}
