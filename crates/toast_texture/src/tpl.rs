//! TPL texture palettes used by Wii cellanim archives
//!
//! | Offset (bytes) | Field            | Description                                          |
//! |----------------|------------------|------------------------------------------------------|
//! | 0x0000         | Header           | magic `00 20 AF 30`, texture count, table offset     |
//! | 0x000C         | Descriptor table | image header and palette header offset per texture   |
//! | 32 aligned     | Palette headers  | 0x0C bytes each, textures without palette skip it    |
//! | ...            | Palette data     | each block 32 aligned                                |
//! | 32 aligned     | Image headers    | 0x24 bytes each                                      |
//! | ...            | Image data       | each block 64 aligned                                |
//!
//! Everything is big endian. Only the base level of a texture is decoded; its sampler settings are
//! kept as they are.

use std::io::{Cursor, Seek, SeekFrom};

use binrw::{BinRead, BinWrite};
use bon::Builder;
use tracing::{debug, instrument};

use crate::color::{align, Rgba, RGBA_SIZE};
use crate::error::{Error, Result};
use crate::rvl::{self, Encoded, PaletteFormat, RvlFormat};

const HEADER_SIZE: usize = 0x0C;
const DESCRIPTOR_SIZE: usize = 0x08;
const PALETTE_HEADER_SIZE: usize = 0x0C;
const IMAGE_HEADER_SIZE: usize = 0x24;

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(big, magic = 0x0020_AF30u32)]
struct TplHeader {
    count: u32,
    table_offset: u32,
}

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(big)]
struct Descriptor {
    image_header_offset: u32,
    palette_header_offset: u32,
}

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(big)]
struct PaletteHeader {
    entry_count: u16,
    unpacked: u8,
    #[brw(pad_before = 1)]
    format: u32,
    data_offset: u32,
}

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(big)]
struct ImageHeader {
    height: u16,
    width: u16,
    format: u32,
    data_offset: u32,
    wrap_s: WrapMode,
    wrap_t: WrapMode,
    min_filter: TextureFilter,
    mag_filter: TextureFilter,
    lod_bias: f32,
    edge_lod: u8,
    min_lod: u8,
    max_lod: u8,
    unpacked: u8,
}

/// Texture coordinate wrapping
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big, repr = u32)]
pub enum WrapMode {
    #[default]
    Clamp = 0,
    Repeat = 1,
    Mirror = 2,
}

/// Texture sampling filter
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big, repr = u32)]
pub enum TextureFilter {
    Near = 0,
    #[default]
    Linear = 1,
    NearMipNear = 2,
    LinearMipNear = 3,
    NearMipLinear = 4,
    LinearMipLinear = 5,
}

/// One texture of a TPL, held as canonical RGBA
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct TplTexture {
    pub width: u32,
    pub height: u32,
    pub format: RvlFormat,

    /// Entry format of the palette, only used by indexed formats
    #[builder(default)]
    pub palette_format: PaletteFormat,

    #[builder(default)]
    pub wrap_s: WrapMode,

    #[builder(default)]
    pub wrap_t: WrapMode,

    #[builder(default)]
    pub min_filter: TextureFilter,

    #[builder(default)]
    pub mag_filter: TextureFilter,

    #[builder(default)]
    pub lod_bias: f32,

    #[builder(default)]
    pub edge_lod: u8,

    #[builder(default)]
    pub min_lod: u8,

    #[builder(default)]
    pub max_lod: u8,

    /// Pixels, `width * height` RGBA values
    pub rgba: Vec<u8>,

    /// Palette the texture was read with
    ///
    /// Encoding lists these colours first so an unmodified texture keeps its palette order.
    pub palette: Option<Vec<Rgba>>,
}

impl TplTexture {
    /// Replace the pixels, dropping the palette order of the old image
    pub fn set_rgba(&mut self, width: u32, height: u32, rgba: Vec<u8>) -> Result<()> {
        let expected = width as usize * height as usize * RGBA_SIZE;
        if rgba.len() != expected {
            return Err(Error::BufferTooSmall {
                what: "RGBA",
                expected,
                actual: rgba.len(),
            });
        }
        self.width = width;
        self.height = height;
        self.rgba = rgba;
        self.palette = None;
        Ok(())
    }

    pub fn encode(&self) -> Result<Encoded> {
        if self.width > u16::MAX as u32 || self.height > u16::MAX as u32 {
            return Err(Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        rvl::encode(
            self.format,
            self.width,
            self.height,
            &self.rgba,
            self.palette.as_deref(),
        )
    }
}

/// A TPL file
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tpl {
    pub textures: Vec<TplTexture>,
}

/// Whether `data` starts with the TPL magic
pub fn is_tpl(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == [0x00, 0x20, 0xAF, 0x30]
}

fn slice<'a>(data: &'a [u8], what: &'static str, offset: usize, size: usize) -> Result<&'a [u8]> {
    data.get(offset..offset + size)
        .ok_or(Error::OutOfBounds { what, offset, size })
}

impl Tpl {
    /// Parse a TPL file, decoding every texture
    #[instrument(skip(data), err)]
    pub fn read(data: &[u8]) -> Result<Tpl> {
        if !is_tpl(data) {
            return Err(Error::InvalidContainer("TPL"));
        }

        let mut cursor = Cursor::new(data);
        let header = TplHeader::read(&mut cursor)?;
        cursor.seek(SeekFrom::Start(header.table_offset as u64))?;

        let descriptors = (0..header.count)
            .map(|_| Descriptor::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        let mut textures = Vec::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            // sheets are picked by index, so a hole cannot be skipped
            if descriptor.image_header_offset == 0 {
                return Err(Error::MissingImageHeader(index));
            }
            cursor.seek(SeekFrom::Start(descriptor.image_header_offset as u64))?;
            let image = ImageHeader::read(&mut cursor)?;
            let format = RvlFormat::try_from(image.format)?;
            let (width, height) = (image.width as u32, image.height as u32);

            let (palette_format, palette) = if descriptor.palette_header_offset != 0 {
                cursor.seek(SeekFrom::Start(descriptor.palette_header_offset as u64))?;
                let header = PaletteHeader::read(&mut cursor)?;
                let palette_format = PaletteFormat::try_from(header.format)?;
                let count = header.entry_count as usize;
                let entries = slice(data, "palette", header.data_offset as usize, count * 2)?;
                (palette_format, Some(rvl::decode_palette(palette_format, entries, count)?))
            } else {
                (PaletteFormat::default(), None)
            };

            let size = rvl::byte_size(format, width, height);
            let pixels = slice(data, "image", image.data_offset as usize, size)?;
            let rgba = rvl::decode(format, width, height, pixels, palette.as_deref())?;
            debug!(width, height, ?format, "read TPL texture");

            textures.push(TplTexture {
                width,
                height,
                format,
                palette_format,
                wrap_s: image.wrap_s,
                wrap_t: image.wrap_t,
                min_filter: image.min_filter,
                mag_filter: image.mag_filter,
                lod_bias: image.lod_bias,
                edge_lod: image.edge_lod,
                min_lod: image.min_lod,
                max_lod: image.max_lod,
                rgba,
                palette,
            });
        }

        Ok(Tpl { textures })
    }

    /// Serialize every texture
    ///
    /// All textures are encoded before anything is laid out, so the palette sizes are known when
    /// the offsets are assigned.
    #[instrument(skip(self), fields(textures = self.textures.len()), err)]
    pub fn write(&self) -> Result<Vec<u8>> {
        let encoded = self
            .textures
            .iter()
            .map(TplTexture::encode)
            .collect::<Result<Vec<_>>>()?;
        let count = encoded.len();

        let palette_headers_start = align((HEADER_SIZE + count * DESCRIPTOR_SIZE) as u32, 32) as usize;
        let palette_count = encoded.iter().filter(|e| e.palette.is_some()).count();
        let mut offset = palette_headers_start + palette_count * PALETTE_HEADER_SIZE;

        let mut palettes = Vec::with_capacity(count);
        let mut next_header = palette_headers_start;
        for e in &encoded {
            palettes.push(match &e.palette {
                Some(colors) => {
                    offset = align(offset as u32, 32) as usize;
                    let placed = (next_header, offset);
                    next_header += PALETTE_HEADER_SIZE;
                    offset += colors.len() * 2;
                    Some(placed)
                }
                None => None,
            });
        }

        let image_headers_start = align(offset as u32, 32) as usize;
        offset = image_headers_start + count * IMAGE_HEADER_SIZE;
        let mut images = Vec::with_capacity(count);
        for e in &encoded {
            offset = align(offset as u32, 64) as usize;
            images.push(offset);
            offset += e.data.len();
        }

        let mut cursor = Cursor::new(vec![0u8; offset]);
        TplHeader {
            count: count as u32,
            table_offset: HEADER_SIZE as u32,
        }
        .write(&mut cursor)?;

        for (i, texture) in self.textures.iter().enumerate() {
            let image_header_offset = image_headers_start + i * IMAGE_HEADER_SIZE;
            Descriptor {
                image_header_offset: image_header_offset as u32,
                palette_header_offset: palettes[i].map_or(0, |(header, _)| header as u32),
            }
            .write(&mut cursor)?;

            if let (Some((header, data_offset)), Some(colors)) = (palettes[i], &encoded[i].palette) {
                let entry_count = u16::try_from(colors.len()).map_err(|_| Error::PaletteOverflow {
                    format: texture.format,
                    colors: colors.len(),
                    capacity: u16::MAX as usize,
                })?;
                let descriptor_end = cursor.position();
                cursor.seek(SeekFrom::Start(header as u64))?;
                PaletteHeader {
                    entry_count,
                    unpacked: 0,
                    format: texture.palette_format.id(),
                    data_offset: data_offset as u32,
                }
                .write(&mut cursor)?;
                let entries = rvl::encode_palette(texture.palette_format, colors);
                cursor.get_mut()[data_offset..data_offset + entries.len()].copy_from_slice(&entries);
                cursor.seek(SeekFrom::Start(descriptor_end))?;
            }
        }

        cursor.seek(SeekFrom::Start(image_headers_start as u64))?;
        for (i, texture) in self.textures.iter().enumerate() {
            ImageHeader {
                height: texture.height as u16,
                width: texture.width as u16,
                format: texture.format.id(),
                data_offset: images[i] as u32,
                wrap_s: texture.wrap_s,
                wrap_t: texture.wrap_t,
                min_filter: texture.min_filter,
                mag_filter: texture.mag_filter,
                lod_bias: texture.lod_bias,
                edge_lod: texture.edge_lod,
                min_lod: texture.min_lod,
                max_lod: texture.max_lod,
                unpacked: 0,
            }
            .write(&mut cursor)?;
        }

        let mut out = cursor.into_inner();
        for (e, start) in encoded.iter().zip(images) {
            out[start..start + e.data.len()].copy_from_slice(&e.data);
        }
        Ok(out)
    }
}
