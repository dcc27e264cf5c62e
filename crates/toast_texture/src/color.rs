//! Channel conversions shared by the Wii and 3DS codecs.

/// One canonical pixel: red, green, blue, alpha
pub type Rgba = [u8; 4];

/// Bytes per canonical pixel
pub const RGBA_SIZE: usize = 4;

pub const fn expand3(v: u8) -> u8 {
    (v << 5) | (v << 2) | (v >> 1)
}

pub const fn expand4(v: u8) -> u8 {
    v * 0x11
}

pub const fn expand5(v: u8) -> u8 {
    (v << 3) | (v >> 2)
}

pub const fn expand6(v: u8) -> u8 {
    (v << 2) | (v >> 4)
}

/// Luma of a pixel; exact for grey input
pub fn luminance(pixel: Rgba) -> u8 {
    let [r, g, b, _] = pixel.map(u32::from);
    ((77 * r + 150 * g + 29 * b + 128) >> 8) as u8
}

/// Canonical pixel at `(x, y)` of a `width` wide RGBA buffer
pub fn pixel_at(rgba: &[u8], width: u32, x: u32, y: u32) -> Rgba {
    let offset = (y as usize * width as usize + x as usize) * RGBA_SIZE;
    [
        rgba[offset],
        rgba[offset + 1],
        rgba[offset + 2],
        rgba[offset + 3],
    ]
}

/// Store a canonical pixel at `(x, y)` of a `width` wide RGBA buffer
pub fn set_pixel(rgba: &mut [u8], width: u32, x: u32, y: u32, pixel: Rgba) {
    let offset = (y as usize * width as usize + x as usize) * RGBA_SIZE;
    rgba[offset..offset + RGBA_SIZE].copy_from_slice(&pixel);
}

pub const fn align(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}
