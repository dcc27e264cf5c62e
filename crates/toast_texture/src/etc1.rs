//! ETC1 block packing and unpacking
//!
//! Blocks are handled as `u64` values in the reference (big endian) bit layout:
//!
//! | Bits   | Individual mode        | Differential mode                  |
//! |--------|------------------------|------------------------------------|
//! | 63..56 | R1 (4), R2 (4)         | R (5), dR (3, signed)              |
//! | 55..48 | G1 (4), G2 (4)         | G (5), dG (3, signed)              |
//! | 47..40 | B1 (4), B2 (4)         | B (5), dB (3, signed)              |
//! | 39..34 | table 1 (3), table 2 (3)                                    |
//! | 33     | differential flag                                           |
//! | 32     | flip flag (0: 2x4 sub-blocks side by side, 1: 4x2 stacked)  |
//! | 31..16 | index MSBs, pixel `(x, y)` at bit `16 + x * 4 + y`          |
//! | 15..0  | index LSBs, pixel `(x, y)` at bit `x * 4 + y`               |
//!
//! Packing searches both flips, both modes and every modifier table, so its output only depends on
//! the input pixels.

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::color::{expand4, expand5};
use crate::error::Result;

/// One pixel without alpha
pub type Rgb = [u8; 3];

const MODIFIERS: [[i32; 2]; 8] = [
    [2, 8],
    [5, 17],
    [9, 29],
    [13, 42],
    [18, 60],
    [24, 80],
    [33, 106],
    [47, 183],
];

/// Worker count used when none is configured
pub const FALLBACK_THREADS: usize = 4;

fn modifier(table: usize, index: u64) -> i32 {
    let [small, large] = MODIFIERS[table];
    match index {
        0 => small,
        1 => large,
        2 => -small,
        _ => -large,
    }
}

fn apply(base: Rgb, modifier: i32) -> Rgb {
    base.map(|c| (c as i32 + modifier).clamp(0, 255) as u8)
}

fn signed3(value: u32) -> i32 {
    if value >= 4 {
        value as i32 - 8
    } else {
        value as i32
    }
}

fn sub_block(x: usize, y: usize, flip: bool) -> usize {
    if flip {
        usize::from(y >= 2)
    } else {
        usize::from(x >= 2)
    }
}

/// Decode a block into sixteen row-major pixels
pub fn unpack_block(block: u64) -> [Rgb; 16] {
    let high = (block >> 32) as u32;
    let differential = high & 2 != 0;
    let flip = high & 1 != 0;
    let tables = [((high >> 5) & 7) as usize, ((high >> 2) & 7) as usize];

    let bases: [Rgb; 2] = if differential {
        let channel = |shift: u32| {
            let base = (high >> shift) & 0x1F;
            let second = (base as i32 + signed3((high >> (shift - 3)) & 7)) as u32 & 0x1F;
            (expand5(base as u8), expand5(second as u8))
        };
        let (r1, r2) = channel(27);
        let (g1, g2) = channel(19);
        let (b1, b2) = channel(11);
        [[r1, g1, b1], [r2, g2, b2]]
    } else {
        let nibble = |shift: u32| expand4(((high >> shift) & 0x0F) as u8);
        [
            [nibble(28), nibble(20), nibble(12)],
            [nibble(24), nibble(16), nibble(8)],
        ]
    };

    let mut out = [[0u8; 3]; 16];
    for y in 0..4 {
        for x in 0..4 {
            let j = x * 4 + y;
            let index = (((block >> (16 + j)) & 1) << 1) | ((block >> j) & 1);
            let sub = sub_block(x, y, flip);
            out[y * 4 + x] = apply(bases[sub], modifier(tables[sub], index));
        }
    }
    out
}

fn distance(a: Rgb, b: Rgb) -> u32 {
    (0..3)
        .map(|i| (a[i] as i32 - b[i] as i32).pow(2) as u32)
        .sum()
}

/// Best table for one sub-block: `(error, table, indices per pixel position)`
fn fit_table(base: Rgb, pixels: &[(usize, Rgb)]) -> (u32, usize, Vec<(usize, u64)>) {
    let mut best: Option<(u32, usize, Vec<(usize, u64)>)> = None;

    for table in 0..MODIFIERS.len() {
        let mut error = 0;
        let mut indices = Vec::with_capacity(pixels.len());
        for &(j, pixel) in pixels {
            let (e, index) = (0..4u64)
                .map(|index| (distance(apply(base, modifier(table, index)), pixel), index))
                .min()
                .unwrap_or((0, 0));
            error += e;
            indices.push((j, index));
        }

        if best.as_ref().map_or(true, |(e, _, _)| error < *e) {
            best = Some((error, table, indices));
        }
    }

    best.unwrap_or((0, 0, Vec::new()))
}

fn average(pixels: &[(usize, Rgb)]) -> [u32; 3] {
    let count = pixels.len().max(1) as u32;
    let mut sum = [0u32; 3];
    for (_, pixel) in pixels {
        for i in 0..3 {
            sum[i] += pixel[i] as u32;
        }
    }
    sum.map(|s| (s + count / 2) / count)
}

fn quantize(value: u32, max: u32) -> u32 {
    (value * max + 127) / 255
}

/// Encode sixteen row-major pixels into a block
pub fn pack_block(pixels: &[Rgb; 16]) -> u64 {
    let mut best: Option<(u32, u64)> = None;

    for flip in [false, true] {
        let mut subsets: [Vec<(usize, Rgb)>; 2] = [Vec::with_capacity(8), Vec::with_capacity(8)];
        for y in 0..4 {
            for x in 0..4 {
                subsets[sub_block(x, y, flip)].push((x * 4 + y, pixels[y * 4 + x]));
            }
        }
        let averages = [average(&subsets[0]), average(&subsets[1])];

        // individual mode
        let q4 = averages.map(|avg| avg.map(|c| quantize(c, 15)));
        let colors = q4.map(|q| q.map(|c| expand4(c as u8)));
        let color_bits = (q4[0][0] << 28)
            | (q4[1][0] << 24)
            | (q4[0][1] << 20)
            | (q4[1][1] << 16)
            | (q4[0][2] << 12)
            | (q4[1][2] << 8);
        consider(&mut best, &subsets, colors, color_bits, false, flip);

        // differential mode, only when the second colour is in reach of the first
        let q5 = averages.map(|avg| avg.map(|c| quantize(c, 31)));
        let deltas = [0, 1, 2].map(|i| q5[1][i] as i32 - q5[0][i] as i32);
        if deltas.iter().all(|d| (-4..=3).contains(d)) {
            let colors = q5.map(|q| q.map(|c| expand5(c as u8)));
            let color_bits = (q5[0][0] << 27)
                | (((deltas[0] & 7) as u32) << 24)
                | (q5[0][1] << 19)
                | (((deltas[1] & 7) as u32) << 16)
                | (q5[0][2] << 11)
                | (((deltas[2] & 7) as u32) << 8);
            consider(&mut best, &subsets, colors, color_bits, true, flip);
        }
    }

    best.map_or(0, |(_, block)| block)
}

fn consider(
    best: &mut Option<(u32, u64)>,
    subsets: &[Vec<(usize, Rgb)>; 2],
    colors: [Rgb; 2],
    color_bits: u32,
    differential: bool,
    flip: bool,
) {
    let (e0, t0, i0) = fit_table(colors[0], &subsets[0]);
    let (e1, t1, i1) = fit_table(colors[1], &subsets[1]);
    let error = e0 + e1;

    if best.as_ref().is_some_and(|(e, _)| *e <= error) {
        return;
    }

    let high = color_bits
        | ((t0 as u32) << 5)
        | ((t1 as u32) << 2)
        | (u32::from(differential) << 1)
        | u32::from(flip);

    let mut low = 0u32;
    for (j, index) in i0.into_iter().chain(i1) {
        low |= ((index >> 1) as u32) << (16 + j);
        low |= ((index & 1) as u32) << j;
    }

    *best = Some((error, ((high as u64) << 32) | low as u64));
}

/// Worker count for ETC1 encoding: the machine's parallelism, or [`FALLBACK_THREADS`]
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_THREADS)
}

/// Build the pool ETC1 encoding fans out on
///
/// `None` or zero selects [`default_threads`].
pub fn build_pool(threads: Option<usize>) -> Result<ThreadPool> {
    let threads = match threads {
        Some(n) if n > 0 => n,
        _ => default_threads(),
    };
    debug!(threads, "building ETC1 worker pool");

    Ok(ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("etc1-worker-{i}"))
        .build()?)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{build_pool, pack_block, unpack_block, Rgb};
    use crate::error::Result;

    #[test]
    fn unpack_individual_block() {
        let block = 0x8888_8800_0000_0000u64;
        assert_eq!(unpack_block(block), [[0x8A; 3]; 16]);

        // every index LSB set selects the large positive modifier
        let block = 0x8888_8800_0000_FFFFu64;
        assert_eq!(unpack_block(block), [[0x90; 3]; 16]);

        // every index MSB set selects the small negative modifier
        let block = 0x8888_8800_FFFF_0000u64;
        assert_eq!(unpack_block(block), [[0x86; 3]; 16]);
    }

    #[test]
    fn unpack_differential_flipped_block() {
        // R = G = B = 16, red and blue deltas of -1, table 0 for both halves, stacked halves
        let block = 0x8780_8703_0000_0000u64;
        let pixels = unpack_block(block);
        assert_eq!(pixels[0], [0x86, 0x86, 0x86]);
        assert_eq!(pixels[7], [0x86, 0x86, 0x86]);
        assert_eq!(pixels[8], [0x7D, 0x86, 0x7D]);
        assert_eq!(pixels[15], [0x7D, 0x86, 0x7D]);
    }

    #[test]
    fn solid_colour_is_exact() {
        for value in [0x00, 0x8A, 0xFF] {
            let pixels = [[value; 3]; 16];
            assert_eq!(unpack_block(pack_block(&pixels)), pixels, "{value:#x}");
        }
    }

    #[test]
    fn gradient_stays_close() {
        let pixels: [Rgb; 16] = std::array::from_fn(|i| {
            let v = i as u8 * 8;
            [v, v + 20, v + 40]
        });
        let decoded = unpack_block(pack_block(&pixels));

        let error = decoded
            .iter()
            .zip(&pixels)
            .flat_map(|(a, b)| (0..3).map(move |c| (a[c] as i32 - b[c] as i32).pow(2)))
            .sum::<i32>();
        assert!(error / 48 < 400, "mean squared error {}", error / 48);
    }

    #[test]
    fn packing_is_deterministic() {
        let pixels: [Rgb; 16] = std::array::from_fn(|i| [i as u8 * 7, 200 - i as u8 * 3, 90]);
        assert_eq!(pack_block(&pixels), pack_block(&pixels));
    }

    #[test]
    fn pool_honours_thread_count() -> Result<()> {
        assert_eq!(build_pool(Some(3))?.current_num_threads(), 3);
        assert!(build_pool(None)?.current_num_threads() >= 1);
        Ok(())
    }
}
