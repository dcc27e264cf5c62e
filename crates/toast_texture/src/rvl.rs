//! Wii (GX) texture formats
//!
//! | Id   | Format  | Tile | Bits | Texel                                              |
//! |------|---------|------|------|----------------------------------------------------|
//! | 0x00 | I4      | 8x8  | 4    | intensity, high nibble first                       |
//! | 0x01 | I8      | 8x4  | 8    | intensity                                          |
//! | 0x02 | IA4     | 8x4  | 8    | alpha in the high nibble, intensity in the low one |
//! | 0x03 | IA8     | 4x4  | 16   | alpha byte then intensity byte                     |
//! | 0x04 | RGB565  | 4x4  | 16   |                                                    |
//! | 0x05 | RGB5A3  | 4x4  | 16   | RGB555 when the top bit is set, else A3RGB4        |
//! | 0x06 | RGBA32  | 4x4  | 32   | AR pairs for the tile, then GB pairs               |
//! | 0x08 | C4      | 8x8  | 4    | palette index                                      |
//! | 0x09 | C8      | 8x4  | 8    | palette index                                      |
//! | 0x0A | C14X2   | 4x4  | 16   | palette index in the low 14 bits                   |
//! | 0x0E | CMPR    | 8x8  | 4    | see [`crate::cmpr`]                                |
//!
//! Tiles are stored row by row, texels inside a tile row by row. Multi-byte texels are big endian.
//! Partial tiles at the right and bottom edges are padded with zero bytes.

use indexmap::IndexSet;
use tracing::instrument;

use crate::cmpr;
use crate::color::{align, expand3, expand4, expand5, expand6, luminance, Rgba, RGBA_SIZE};
use crate::error::{Error, Result};

/// Texture format of a Wii image
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RvlFormat {
    I4,
    I8,
    Ia4,
    Ia8,
    Rgb565,
    Rgb5a3,
    Rgba32,
    C4,
    C8,
    C14x2,
    Cmpr,
}

impl TryFrom<u32> for RvlFormat {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            0x00 => RvlFormat::I4,
            0x01 => RvlFormat::I8,
            0x02 => RvlFormat::Ia4,
            0x03 => RvlFormat::Ia8,
            0x04 => RvlFormat::Rgb565,
            0x05 => RvlFormat::Rgb5a3,
            0x06 => RvlFormat::Rgba32,
            0x08 => RvlFormat::C4,
            0x09 => RvlFormat::C8,
            0x0A => RvlFormat::C14x2,
            0x0E => RvlFormat::Cmpr,
            _ => return Err(Error::UnknownRvlFormat(value)),
        })
    }
}

impl RvlFormat {
    pub fn id(self) -> u32 {
        match self {
            RvlFormat::I4 => 0x00,
            RvlFormat::I8 => 0x01,
            RvlFormat::Ia4 => 0x02,
            RvlFormat::Ia8 => 0x03,
            RvlFormat::Rgb565 => 0x04,
            RvlFormat::Rgb5a3 => 0x05,
            RvlFormat::Rgba32 => 0x06,
            RvlFormat::C4 => 0x08,
            RvlFormat::C8 => 0x09,
            RvlFormat::C14x2 => 0x0A,
            RvlFormat::Cmpr => 0x0E,
        }
    }

    /// Width and height of one tile in pixels
    pub fn block_size(self) -> (u32, u32) {
        match self {
            RvlFormat::I4 | RvlFormat::C4 | RvlFormat::Cmpr => (8, 8),
            RvlFormat::I8 | RvlFormat::Ia4 | RvlFormat::C8 => (8, 4),
            _ => (4, 4),
        }
    }

    pub fn bits_per_pixel(self) -> u32 {
        match self {
            RvlFormat::I4 | RvlFormat::C4 | RvlFormat::Cmpr => 4,
            RvlFormat::I8 | RvlFormat::Ia4 | RvlFormat::C8 => 8,
            RvlFormat::Rgba32 => 32,
            _ => 16,
        }
    }

    /// Number of palette entries an indexed format can address
    pub fn palette_capacity(self) -> Option<usize> {
        match self {
            RvlFormat::C4 => Some(16),
            RvlFormat::C8 => Some(256),
            RvlFormat::C14x2 => Some(16384),
            _ => None,
        }
    }

    pub fn is_indexed(self) -> bool {
        self.palette_capacity().is_some()
    }
}

/// Format of the entries of a Wii palette
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum PaletteFormat {
    Ia8,
    Rgb565,
    #[default]
    Rgb5a3,
}

impl TryFrom<u32> for PaletteFormat {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(PaletteFormat::Ia8),
            1 => Ok(PaletteFormat::Rgb565),
            2 => Ok(PaletteFormat::Rgb5a3),
            _ => Err(Error::UnknownPaletteFormat(value)),
        }
    }
}

impl PaletteFormat {
    pub fn id(self) -> u32 {
        match self {
            PaletteFormat::Ia8 => 0,
            PaletteFormat::Rgb565 => 1,
            PaletteFormat::Rgb5a3 => 2,
        }
    }

    fn texel_format(self) -> RvlFormat {
        match self {
            PaletteFormat::Ia8 => RvlFormat::Ia8,
            PaletteFormat::Rgb565 => RvlFormat::Rgb565,
            PaletteFormat::Rgb5a3 => RvlFormat::Rgb5a3,
        }
    }
}

/// Result of encoding an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// Tiled texel data
    pub data: Vec<u8>,

    /// Colours addressed by the indices, only for indexed formats
    pub palette: Option<Vec<Rgba>>,
}

/// Storage size of an image, partial tiles included
pub fn byte_size(format: RvlFormat, width: u32, height: u32) -> usize {
    let (bw, bh) = format.block_size();
    align(width, bw) as usize * align(height, bh) as usize * format.bits_per_pixel() as usize / 8
}

/// Visit every texel slot in storage order with its pixel position, `None` for padding
fn for_each_tiled(
    width: u32,
    height: u32,
    (bw, bh): (u32, u32),
    mut f: impl FnMut(usize, Option<(u32, u32)>),
) {
    let mut slot = 0;
    for ty in (0..height).step_by(bh as usize) {
        for tx in (0..width).step_by(bw as usize) {
            for y in ty..ty + bh {
                for x in tx..tx + bw {
                    f(slot, (x < width && y < height).then_some((x, y)));
                    slot += 1;
                }
            }
        }
    }
}

fn read_texel(format: RvlFormat, data: &[u8], slot: usize) -> u16 {
    match format.bits_per_pixel() {
        4 => {
            let byte = data[slot / 2];
            if slot % 2 == 0 {
                (byte >> 4) as u16
            } else {
                (byte & 0x0F) as u16
            }
        }
        8 => data[slot] as u16,
        _ => u16::from_be_bytes([data[slot * 2], data[slot * 2 + 1]]),
    }
}

fn write_texel(format: RvlFormat, data: &mut [u8], slot: usize, value: u16) {
    match format.bits_per_pixel() {
        4 => {
            let shift = if slot % 2 == 0 { 4 } else { 0 };
            data[slot / 2] |= ((value & 0x0F) as u8) << shift;
        }
        8 => data[slot] = value as u8,
        _ => data[slot * 2..slot * 2 + 2].copy_from_slice(&value.to_be_bytes()),
    }
}

/// Canonical colour of a direct texel
fn decode_texel(format: RvlFormat, value: u16) -> Rgba {
    match format {
        RvlFormat::I4 => {
            let i = expand4(value as u8);
            [i, i, i, i]
        }
        RvlFormat::I8 => {
            let i = value as u8;
            [i, i, i, i]
        }
        RvlFormat::Ia4 => {
            let i = expand4(value as u8 & 0x0F);
            [i, i, i, expand4((value >> 4) as u8 & 0x0F)]
        }
        RvlFormat::Ia8 => {
            let i = value as u8;
            [i, i, i, (value >> 8) as u8]
        }
        RvlFormat::Rgb565 => [
            expand5((value >> 11) as u8 & 0x1F),
            expand6((value >> 5) as u8 & 0x3F),
            expand5(value as u8 & 0x1F),
            0xFF,
        ],
        RvlFormat::Rgb5a3 if value & 0x8000 != 0 => [
            expand5((value >> 10) as u8 & 0x1F),
            expand5((value >> 5) as u8 & 0x1F),
            expand5(value as u8 & 0x1F),
            0xFF,
        ],
        RvlFormat::Rgb5a3 => [
            expand4((value >> 8) as u8 & 0x0F),
            expand4((value >> 4) as u8 & 0x0F),
            expand4(value as u8 & 0x0F),
            expand3((value >> 12) as u8 & 0x07),
        ],
        _ => [0, 0, 0, 0],
    }
}

/// Direct texel value of a canonical colour
fn encode_texel(format: RvlFormat, pixel: Rgba) -> u16 {
    let [r, g, b, a] = pixel.map(u16::from);
    match format {
        RvlFormat::I4 => (luminance(pixel) >> 4) as u16,
        RvlFormat::I8 => luminance(pixel) as u16,
        RvlFormat::Ia4 => ((a >> 4) << 4) | (luminance(pixel) >> 4) as u16,
        RvlFormat::Ia8 => (a << 8) | luminance(pixel) as u16,
        RvlFormat::Rgb565 => ((r >> 3) << 11) | ((g >> 2) << 5) | (b >> 3),
        RvlFormat::Rgb5a3 if a == 0xFF => 0x8000 | ((r >> 3) << 10) | ((g >> 3) << 5) | (b >> 3),
        // A3 = 7 would decode as opaque, keep translucent pixels translucent
        RvlFormat::Rgb5a3 => ((a >> 5).min(6) << 12) | ((r >> 4) << 8) | ((g >> 4) << 4) | (b >> 4),
        _ => 0,
    }
}

/// Decode palette entries stored in `format`
pub fn decode_palette(format: PaletteFormat, data: &[u8], count: usize) -> Result<Vec<Rgba>> {
    if data.len() < count * 2 {
        return Err(Error::BufferTooSmall {
            what: "palette",
            expected: count * 2,
            actual: data.len(),
        });
    }

    Ok(data[..count * 2]
        .chunks_exact(2)
        .map(|e| decode_texel(format.texel_format(), u16::from_be_bytes([e[0], e[1]])))
        .collect())
}

/// Encode palette entries into `format`
pub fn encode_palette(format: PaletteFormat, colors: &[Rgba]) -> Vec<u8> {
    colors
        .iter()
        .flat_map(|c| encode_texel(format.texel_format(), *c).to_be_bytes())
        .collect()
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Decode a tiled image into canonical RGBA
///
/// Indexed formats resolve their texels through `palette`; indices past its end decode as
/// transparent black.
#[instrument(skip(data, palette), err)]
pub fn decode(
    format: RvlFormat,
    width: u32,
    height: u32,
    data: &[u8],
    palette: Option<&[Rgba]>,
) -> Result<Vec<u8>> {
    check_dimensions(width, height)?;

    let expected = byte_size(format, width, height);
    if data.len() < expected {
        return Err(Error::BufferTooSmall {
            what: "texture",
            expected,
            actual: data.len(),
        });
    }

    if format == RvlFormat::Cmpr {
        return Ok(cmpr::decode(width, height, data));
    }

    let palette = match (format.is_indexed(), palette) {
        (true, None) => return Err(Error::MissingPalette(format)),
        (_, palette) => palette.unwrap_or_default(),
    };

    let mut rgba = vec![0u8; width as usize * height as usize * RGBA_SIZE];
    for_each_tiled(width, height, format.block_size(), |slot, position| {
        let Some((x, y)) = position else {
            return;
        };

        let pixel = match format {
            RvlFormat::Rgba32 => {
                let base = (slot / 16) * 64 + (slot % 16) * 2;
                [data[base + 1], data[base + 32], data[base + 33], data[base]]
            }
            RvlFormat::C4 | RvlFormat::C8 | RvlFormat::C14x2 => {
                let index = read_texel(format, data, slot) & 0x3FFF;
                palette.get(index as usize).copied().unwrap_or_default()
            }
            _ => decode_texel(format, read_texel(format, data, slot)),
        };

        let offset = (y as usize * width as usize + x as usize) * RGBA_SIZE;
        rgba[offset..offset + RGBA_SIZE].copy_from_slice(&pixel);
    });

    Ok(rgba)
}

/// Build the palette of an indexed image
///
/// Colours are collected in first-seen order after the entries of `seed`, so re-encoding an
/// unmodified image keeps its palette.
fn build_palette(format: RvlFormat, rgba: &[u8], seed: Option<&[Rgba]>) -> Result<IndexSet<Rgba>> {
    let mut colors = seed
        .unwrap_or_default()
        .iter()
        .copied()
        .collect::<IndexSet<_>>();

    for pixel in rgba.chunks_exact(RGBA_SIZE) {
        colors.insert([pixel[0], pixel[1], pixel[2], pixel[3]]);
    }

    let capacity = format.palette_capacity().unwrap_or(0);
    if colors.len() > capacity {
        return Err(Error::PaletteOverflow {
            format,
            colors: colors.len(),
            capacity,
        });
    }
    Ok(colors)
}

/// Encode canonical RGBA into a tiled image
///
/// `seed_palette` is only used by indexed formats.
#[instrument(skip(rgba, seed_palette), err)]
pub fn encode(
    format: RvlFormat,
    width: u32,
    height: u32,
    rgba: &[u8],
    seed_palette: Option<&[Rgba]>,
) -> Result<Encoded> {
    check_dimensions(width, height)?;

    let expected = width as usize * height as usize * RGBA_SIZE;
    if rgba.len() < expected {
        return Err(Error::BufferTooSmall {
            what: "RGBA",
            expected,
            actual: rgba.len(),
        });
    }
    let rgba = &rgba[..expected];

    if format == RvlFormat::Cmpr {
        return Ok(Encoded {
            data: cmpr::encode(width, height, rgba),
            palette: None,
        });
    }

    let palette = if format.is_indexed() {
        Some(build_palette(format, rgba, seed_palette)?)
    } else {
        None
    };

    let pixel = |x: u32, y: u32| {
        let offset = (y as usize * width as usize + x as usize) * RGBA_SIZE;
        [rgba[offset], rgba[offset + 1], rgba[offset + 2], rgba[offset + 3]]
    };

    let mut data = vec![0u8; byte_size(format, width, height)];
    for_each_tiled(width, height, format.block_size(), |slot, position| {
        let Some((x, y)) = position else {
            return;
        };
        let [r, g, b, a] = pixel(x, y);

        match (format, &palette) {
            (RvlFormat::Rgba32, _) => {
                let base = (slot / 16) * 64 + (slot % 16) * 2;
                data[base] = a;
                data[base + 1] = r;
                data[base + 32] = g;
                data[base + 33] = b;
            }
            (_, Some(colors)) => {
                let index = colors.get_index_of(&[r, g, b, a]).unwrap_or(0);
                write_texel(format, &mut data, slot, index as u16);
            }
            (_, None) => write_texel(format, &mut data, slot, encode_texel(format, [r, g, b, a])),
        }
    });

    Ok(Encoded {
        data,
        palette: palette.map(|colors| colors.into_iter().collect()),
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{byte_size, decode, decode_palette, encode, encode_palette, PaletteFormat, RvlFormat};
    use crate::error::{Error, Result};

    const DIRECT: [RvlFormat; 7] = [
        RvlFormat::I4,
        RvlFormat::I8,
        RvlFormat::Ia4,
        RvlFormat::Ia8,
        RvlFormat::Rgb565,
        RvlFormat::Rgb5a3,
        RvlFormat::Rgba32,
    ];

    fn noise(width: u32, height: u32) -> Vec<u8> {
        (0..width * height * 4)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect()
    }

    #[test]
    fn sizes_include_partial_tiles() {
        assert_eq!(byte_size(RvlFormat::I4, 8, 8), 32);
        assert_eq!(byte_size(RvlFormat::I4, 9, 9), 128);
        assert_eq!(byte_size(RvlFormat::I8, 8, 5), 64);
        assert_eq!(byte_size(RvlFormat::Rgba32, 4, 4), 64);
        assert_eq!(byte_size(RvlFormat::Rgb5a3, 5, 4), 64);
        assert_eq!(byte_size(RvlFormat::C14x2, 4, 4), 32);
        assert_eq!(byte_size(RvlFormat::Cmpr, 8, 8), 32);
    }

    #[test]
    fn format_ids() -> Result<()> {
        for id in [0, 1, 2, 3, 4, 5, 6, 8, 9, 10, 14] {
            assert_eq!(RvlFormat::try_from(id)?.id(), id);
        }
        assert!(matches!(RvlFormat::try_from(7), Err(Error::UnknownRvlFormat(7))));
        Ok(())
    }

    #[test]
    fn encode_decode_is_idempotent() -> Result<()> {
        for format in DIRECT {
            for (width, height) in [(8, 8), (13, 7), (1, 1)] {
                let first = encode(format, width, height, &noise(width, height), None)?;
                let decoded = decode(format, width, height, &first.data, None)?;
                let second = encode(format, width, height, &decoded, None)?;

                assert_eq!(first, second, "{format:?} {width}x{height}");
                assert_eq!(decode(format, width, height, &second.data, None)?, decoded);
            }
        }
        Ok(())
    }

    #[test]
    fn rgb5a3_texels() -> Result<()> {
        #[rustfmt::skip]
        let data = vec![
            0xFF, 0xFF, 0x00, 0x00, 0x7F, 0xFF, 0x3A, 0x50,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let rgba = decode(RvlFormat::Rgb5a3, 4, 4, &data, None)?;
        assert_eq!(&rgba[..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&rgba[4..8], &[0x00, 0x00, 0x00, 0x00]);
        assert_eq!(&rgba[8..12], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&rgba[12..16], &[0xAA, 0x55, 0x00, 0x6D]);

        // translucent white never reaches A3 = 7
        let encoded = encode(RvlFormat::Rgb5a3, 1, 1, &[0xFF, 0xFF, 0xFF, 0xFE], None)?;
        assert_eq!(&encoded.data[..2], &[0x6F, 0xFF]);
        Ok(())
    }

    #[test]
    fn rgba32_planes() -> Result<()> {
        let mut rgba = vec![0u8; 4 * 4 * 4];
        rgba[..4].copy_from_slice(&[1, 2, 3, 4]);
        rgba[4..8].copy_from_slice(&[5, 6, 7, 8]);

        let encoded = encode(RvlFormat::Rgba32, 4, 4, &rgba, None)?;
        assert_eq!(&encoded.data[..4], &[4, 1, 8, 5]);
        assert_eq!(&encoded.data[32..36], &[2, 3, 6, 7]);
        Ok(())
    }

    #[test]
    fn i4_high_nibble_first() -> Result<()> {
        let mut rgba = vec![0u8; 8 * 8 * 4];
        rgba[..4].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        let encoded = encode(RvlFormat::I4, 8, 8, &rgba, None)?;
        assert_eq!(encoded.data[0], 0xF0);
        assert_eq!(encoded.data.len(), 32);
        Ok(())
    }

    fn distinct_colors(count: u32) -> Vec<u8> {
        (0..count)
            .flat_map(|i| [i as u8, (i >> 8) as u8, 0x40, 0xFF])
            .collect()
    }

    #[test]
    fn c8_capacity() -> Result<()> {
        let full = distinct_colors(256);
        let encoded = encode(RvlFormat::C8, 16, 16, &full, None)?;
        assert_eq!(encoded.palette.as_ref().map(Vec::len), Some(256));

        let colors = encoded.palette.unwrap_or_default();
        assert_eq!(decode(RvlFormat::C8, 16, 16, &encoded.data, Some(&colors))?, full);

        let over = distinct_colors(257);
        assert!(matches!(
            encode(RvlFormat::C8, 257, 1, &over, None),
            Err(Error::PaletteOverflow {
                colors: 257,
                capacity: 256,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn c4_capacity() {
        assert!(encode(RvlFormat::C4, 16, 1, &distinct_colors(16), None).is_ok());
        assert!(matches!(
            encode(RvlFormat::C4, 17, 1, &distinct_colors(17), None),
            Err(Error::PaletteOverflow { capacity: 16, .. })
        ));
    }

    #[test]
    fn seeded_palette_keeps_order() -> Result<()> {
        let blue = [0, 0, 0xFF, 0xFF];
        let red = [0xFF, 0, 0, 0xFF];
        let rgba = red.repeat(4 * 4);

        let encoded = encode(RvlFormat::C14x2, 4, 4, &rgba, Some(&[blue, red]))?;
        assert_eq!(encoded.palette, Some(vec![blue, red]));
        assert_eq!(&encoded.data[..2], &[0x00, 0x01]);
        Ok(())
    }

    #[test]
    fn indexed_needs_palette() {
        assert!(matches!(
            decode(RvlFormat::C4, 8, 8, &[0; 32], None),
            Err(Error::MissingPalette(RvlFormat::C4))
        ));
    }

    #[test]
    fn palette_entries() -> Result<()> {
        let colors = vec![[0xFF, 0xFF, 0xFF, 0xFF], [0x11, 0x22, 0x33, 0x00]];
        let data = encode_palette(PaletteFormat::Rgb5a3, &colors);
        assert_eq!(data, vec![0xFF, 0xFF, 0x01, 0x23]);
        assert_eq!(
            decode_palette(PaletteFormat::Rgb5a3, &data, 2)?,
            vec![[0xFF, 0xFF, 0xFF, 0xFF], [0x11, 0x22, 0x33, 0x00]]
        );
        Ok(())
    }

    #[test]
    fn rejects_short_buffers() {
        assert!(matches!(
            decode(RvlFormat::Rgb565, 4, 4, &[0; 31], None),
            Err(Error::BufferTooSmall { expected: 32, .. })
        ));
        assert!(matches!(
            encode(RvlFormat::I8, 0, 4, &[], None),
            Err(Error::InvalidDimensions { .. })
        ));
    }
}
