//! Raster operations on canonical RGBA buffers
//!
//! All operations read from a source buffer and write into a destination buffer supplied by the
//! caller, so they can run on borrowed texture memory.

use crate::color::{pixel_at, set_pixel, RGBA_SIZE};
use crate::error::{Error, Result};

fn check(what: &'static str, buffer: usize, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    let expected = width as usize * height as usize * RGBA_SIZE;
    if buffer < expected {
        return Err(Error::BufferTooSmall {
            what,
            expected,
            actual: buffer,
        });
    }
    Ok(())
}

/// Rotate a `width` x `height` image a quarter turn clockwise into a `height` x `width` buffer
pub fn rotate_cw(src: &[u8], width: u32, height: u32, dst: &mut [u8]) -> Result<()> {
    check("source", src.len(), width, height)?;
    check("destination", dst.len(), height, width)?;

    for y in 0..height {
        for x in 0..width {
            set_pixel(dst, height, height - 1 - y, x, pixel_at(src, width, x, y));
        }
    }
    Ok(())
}

/// Rotate a `width` x `height` image a quarter turn counter-clockwise into a `height` x `width`
/// buffer
pub fn rotate_ccw(src: &[u8], width: u32, height: u32, dst: &mut [u8]) -> Result<()> {
    check("source", src.len(), width, height)?;
    check("destination", dst.len(), height, width)?;

    for y in 0..height {
        for x in 0..width {
            set_pixel(dst, height, y, width - 1 - x, pixel_at(src, width, x, y));
        }
    }
    Ok(())
}

fn ratio(src: u32, dst: u32) -> f32 {
    if dst > 1 {
        (src - 1) as f32 / (dst - 1) as f32
    } else {
        0.0
    }
}

/// Bilinear resample of a `src_width` x `src_height` image into `dst_width` x `dst_height`
///
/// Corners map onto corners: destination pixel `x` samples the source at
/// `x * (src_width - 1) / (dst_width - 1)`.
pub fn resize_bilinear(
    src: &[u8],
    src_width: u32,
    src_height: u32,
    dst: &mut [u8],
    dst_width: u32,
    dst_height: u32,
) -> Result<()> {
    check("source", src.len(), src_width, src_height)?;
    check("destination", dst.len(), dst_width, dst_height)?;

    let rx = ratio(src_width, dst_width);
    let ry = ratio(src_height, dst_height);

    for y in 0..dst_height {
        let sy = y as f32 * ry;
        let y0 = (sy.floor() as u32).min(src_height - 1);
        let y1 = (y0 + 1).min(src_height - 1);
        let fy = sy - y0 as f32;

        for x in 0..dst_width {
            let sx = x as f32 * rx;
            let x0 = (sx.floor() as u32).min(src_width - 1);
            let x1 = (x0 + 1).min(src_width - 1);
            let fx = sx - x0 as f32;

            let tl = pixel_at(src, src_width, x0, y0);
            let tr = pixel_at(src, src_width, x1, y0);
            let bl = pixel_at(src, src_width, x0, y1);
            let br = pixel_at(src, src_width, x1, y1);

            let pixel = std::array::from_fn(|c| {
                let top = tl[c] as f32 * (1.0 - fx) + tr[c] as f32 * fx;
                let bottom = bl[c] as f32 * (1.0 - fx) + br[c] as f32 * fx;
                (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
            });
            set_pixel(dst, dst_width, x, y, pixel);
        }
    }
    Ok(())
}

/// Dimensions of the next mip level, clamped at one pixel
pub fn half_size(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// Dimensions scaled down to fit `max` on both axes, keeping the aspect ratio
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = max as f64 / width.max(height) as f64;
    let fit = |v: u32| ((v as f64 * scale).round() as u32).clamp(1, max);
    (fit(width), fit(height))
}

/// Every mip level below `rgba` as `(width, height, pixels)`, each a bilinear halving of the last
pub fn mip_chain(rgba: &[u8], width: u32, height: u32, levels: u32) -> Result<Vec<(u32, u32, Vec<u8>)>> {
    check("source", rgba.len(), width, height)?;

    let mut chain: Vec<(u32, u32, Vec<u8>)> = Vec::new();
    for _ in 1..levels {
        let (w, h, src) = match chain.last() {
            Some((w, h, pixels)) => (*w, *h, pixels.as_slice()),
            None => (width, height, rgba),
        };
        let (dw, dh) = half_size(w, h);
        let mut dst = vec![0u8; dw as usize * dh as usize * RGBA_SIZE];
        resize_bilinear(src, w, h, &mut dst, dw, dh)?;
        chain.push((dw, dh, dst));
    }
    Ok(chain)
}
