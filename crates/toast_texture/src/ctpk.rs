//! CTPK texture packages used by 3DS cellanim archives
//!
//! | Offset (bytes) | Field          | Description                                              |
//! |----------------|----------------|----------------------------------------------------------|
//! | 0x0000         | Header         | 0x20 bytes: magic, version, count, section offsets       |
//! | 0x0020         | Texture table  | 0x20 bytes per texture                                   |
//! | ...            | Size table     | one `u32` per mip level of every texture                 |
//! | ...            | Path pool      | null terminated paths, padded to 4 bytes                 |
//! | hash_offset    | Hash table     | CRC32 of the path and texture index, sorted by hash      |
//! | info_offset    | Info table     | format, mip count and compression per texture            |
//! | data_offset    | Data section   | 0x80 aligned, every texture 0x80 aligned                 |
//!
//! Everything is little endian. Textures are stored rotated a quarter turn clockwise; the canonical
//! pixels handed out by [`CtpkTexture::rgba`] are upright.

use std::io::{Cursor, Seek, SeekFrom};

use binrw::{BinRead, BinWrite};
use bon::Builder;
use rayon::ThreadPool;
use tracing::{debug, instrument, warn};

use crate::color::{align, RGBA_SIZE};
use crate::crc32;
use crate::ctr::{self, CtrFormat};
use crate::error::{Error, Result};
use crate::etc1;
use crate::transform;

const HEADER_SIZE: usize = 0x20;
const ENTRY_SIZE: usize = 0x20;
const HASH_ENTRY_SIZE: usize = 0x08;
const INFO_ENTRY_SIZE: usize = 0x04;
const DATA_ALIGNMENT: u32 = 0x80;

/// Largest width or height the console accepts
pub const MAX_DIMENSION: u32 = 1024;

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little, magic = b"CTPK")]
struct CtpkHeader {
    version: u16,
    count: u16,
    data_offset: u32,
    data_size: u32,
    hash_offset: u32,
    #[brw(pad_after = 8)]
    info_offset: u32,
}

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little)]
struct TextureEntry {
    path_offset: u32,
    data_size: u32,
    data_offset: u32,
    format: u32,
    width: u16,
    height: u16,
    mip_count: u8,
    texture_type: u8,
    cube_dir: u16,
    size_table_index: u32,
    timestamp: u32,
}

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little)]
struct HashEntry {
    hash: u32,
    index: u32,
}

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little)]
struct InfoEntry {
    format: u8,
    mip_count: u8,
    compressed: u8,
    method: u8,
}

/// Encoded payload of a texture, every mip level back to back
#[derive(Debug, Clone, PartialEq, Eq)]
struct EncodedCache {
    format: CtrFormat,
    mip_count: u8,
    data: Vec<u8>,
    level_sizes: Vec<u32>,
}

/// One texture of a CTPK
///
/// Holds upright RGBA pixels together with the encoded payload it was read with. The payload is
/// written back unchanged until the pixels, the format or the mip count change.
#[derive(Debug, Clone, PartialEq)]
pub struct CtpkTexture {
    path: String,
    format: CtrFormat,
    mip_count: u8,
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    timestamp: u32,

    /// Kept as read, the tool only writes plain 2D textures
    texture_type: u8,
    cube_dir: u16,
    method: u8,

    cache: Option<EncodedCache>,
}

fn check_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    let expected = width as usize * height as usize * RGBA_SIZE;
    if rgba.len() != expected {
        return Err(Error::BufferTooSmall {
            what: "RGBA",
            expected,
            actual: rgba.len(),
        });
    }
    Ok(())
}

impl CtpkTexture {
    /// New texture from upright pixels, with a single mip level
    pub fn new(
        path: impl Into<String>,
        format: CtrFormat,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    ) -> Result<Self> {
        check_rgba(width, height, &rgba)?;
        Ok(CtpkTexture {
            path: path.into(),
            format,
            mip_count: 1,
            width,
            height,
            rgba,
            timestamp: 0,
            texture_type: 0,
            cube_dir: 0,
            method: 0,
            cache: None,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn format(&self) -> CtrFormat {
        self.format
    }

    pub fn mip_count(&self) -> u8 {
        self.mip_count
    }

    /// Upright width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Upright height
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Whether the next write reuses the stored payload
    pub fn is_cached(&self) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|c| c.format == self.format && c.mip_count == self.mip_count)
    }

    pub fn set_rgba(&mut self, width: u32, height: u32, rgba: Vec<u8>) -> Result<()> {
        check_rgba(width, height, &rgba)?;
        self.width = width;
        self.height = height;
        self.rgba = rgba;
        self.cache = None;
        Ok(())
    }

    pub fn set_format(&mut self, format: CtrFormat) {
        if format != self.format {
            self.format = format;
            self.cache = None;
        }
    }

    pub fn set_mip_count(&mut self, mip_count: u8) {
        let mip_count = mip_count.max(1);
        if mip_count != self.mip_count {
            self.mip_count = mip_count;
            self.cache = None;
        }
    }

    /// Stored (rotated) dimensions
    fn stored_size(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Scale the pixels down until both sides fit [`MAX_DIMENSION`]
    fn fit(&mut self) -> Result<Option<Downscale>> {
        let (width, height) = transform::fit_within(self.width, self.height, MAX_DIMENSION);
        if (width, height) == (self.width, self.height) {
            return Ok(None);
        }

        let mut scaled = vec![0u8; width as usize * height as usize * RGBA_SIZE];
        transform::resize_bilinear(&self.rgba, self.width, self.height, &mut scaled, width, height)?;

        let downscale = Downscale {
            path: self.path.clone(),
            from: (self.width, self.height),
            to: (width, height),
        };
        warn!(
            path = %self.path,
            from = ?downscale.from,
            to = ?downscale.to,
            "texture is larger than {MAX_DIMENSION} pixels and was downscaled"
        );
        self.set_rgba(width, height, scaled)?;
        Ok(Some(downscale))
    }

    fn encode(&self, pool: &ThreadPool) -> Result<EncodedCache> {
        let (width, height) = self.stored_size();
        let mut stored = vec![0u8; self.rgba.len()];
        transform::rotate_cw(&self.rgba, self.width, self.height, &mut stored)?;

        let mut data = ctr::encode(self.format, width, height, &stored, Some(pool))?;
        let mut level_sizes = vec![data.len() as u32];

        let mips = transform::mip_chain(&stored, width, height, self.mip_count as u32)?;
        for (w, h, pixels) in mips {
            let level = ctr::encode(self.format, w, h, &pixels, Some(pool))?;
            level_sizes.push(level.len() as u32);
            data.extend_from_slice(&level);
        }

        debug!(path = %self.path, format = ?self.format, size = data.len(), "encoded texture");
        Ok(EncodedCache {
            format: self.format,
            mip_count: self.mip_count,
            data,
            level_sizes,
        })
    }
}

/// A texture that did not fit the console limits and was scaled down on write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downscale {
    pub path: String,
    pub from: (u32, u32),
    pub to: (u32, u32),
}

/// Side results of writing a CTPK
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CtpkWriteReport {
    pub downscaled: Vec<Downscale>,
}

/// Options for how the CTPK file should be written
#[derive(Debug, Default, Clone, Builder)]
pub struct CtpkWriteOptions {
    /// Workers used for ETC1 encoding, the machine's parallelism when unset
    pub threads: Option<usize>,
}

/// A CTPK file
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Ctpk {
    pub textures: Vec<CtpkTexture>,
}

/// Whether `data` starts with the CTPK magic
pub fn is_ctpk(data: &[u8]) -> bool {
    data.len() >= 4 && &data[..4] == b"CTPK"
}

fn read_path(data: &[u8], offset: usize) -> Result<String> {
    let tail = data.get(offset..).ok_or(Error::OutOfBounds {
        what: "texture path",
        offset,
        size: 0,
    })?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}

impl Ctpk {
    /// Parse a CTPK file, decoding the base level of every texture
    #[instrument(skip(data), err)]
    pub fn read(data: &[u8]) -> Result<Ctpk> {
        if !is_ctpk(data) {
            return Err(Error::InvalidContainer("CTPK"));
        }

        let mut cursor = Cursor::new(data);
        let header = CtpkHeader::read(&mut cursor)?;
        if header.version != 1 {
            return Err(Error::InvalidContainer("CTPK"));
        }

        let entries = (0..header.count)
            .map(|_| TextureEntry::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()?;
        let size_table_start = cursor.position();

        cursor.seek(SeekFrom::Start(header.info_offset as u64))?;
        let infos = (0..header.count)
            .map(|_| InfoEntry::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        let mut textures = Vec::with_capacity(entries.len());
        for (entry, info) in entries.into_iter().zip(infos) {
            let format = CtrFormat::try_from(entry.format)?;
            let mip_count = entry.mip_count.max(1);
            let (width, height) = (entry.width as u32, entry.height as u32);

            cursor.seek(SeekFrom::Start(
                size_table_start + entry.size_table_index as u64 * 4,
            ))?;
            let level_sizes = (0..mip_count)
                .map(|_| u32::read_le(&mut cursor))
                .collect::<binrw::BinResult<Vec<_>>>()?;

            let offset = header.data_offset as usize + entry.data_offset as usize;
            let size = entry.data_size as usize;
            let payload = data.get(offset..offset + size).ok_or(Error::OutOfBounds {
                what: "texture data",
                offset,
                size,
            })?;

            let stored = ctr::decode(format, width, height, payload)?;
            let mut rgba = vec![0u8; stored.len()];
            transform::rotate_ccw(&stored, width, height, &mut rgba)?;

            let path = read_path(data, entry.path_offset as usize)?;
            debug!(%path, ?format, width, height, mip_count, "read CTPK texture");

            textures.push(CtpkTexture {
                path,
                format,
                mip_count,
                width: height,
                height: width,
                rgba,
                timestamp: entry.timestamp,
                texture_type: entry.texture_type,
                cube_dir: entry.cube_dir,
                method: info.method,
                cache: Some(EncodedCache {
                    format,
                    mip_count,
                    data: payload.to_vec(),
                    level_sizes,
                }),
            });
        }

        Ok(Ctpk { textures })
    }

    /// Serialize every texture
    ///
    /// Textures without a usable cached payload are encoded (ETC1 work fans out over a pool sized
    /// by `options`) and the cache is refreshed. Oversized textures are downscaled first and listed
    /// in the report.
    #[instrument(skip(self, options), fields(textures = self.textures.len()), err)]
    pub fn write(&mut self, options: &CtpkWriteOptions) -> Result<(Vec<u8>, CtpkWriteReport)> {
        let count = u16::try_from(self.textures.len())
            .map_err(|_| Error::CustomError("a CTPK holds at most 65535 textures".to_owned()))?;

        let mut report = CtpkWriteReport::default();
        for texture in &mut self.textures {
            if let Some(downscale) = texture.fit()? {
                report.downscaled.push(downscale);
            }
        }

        if self.textures.iter().any(|t| !t.is_cached()) {
            let pool = etc1::build_pool(options.threads)?;
            for texture in self.textures.iter_mut().filter(|t| !t.is_cached()) {
                texture.cache = Some(texture.encode(&pool)?);
            }
        }

        let caches = self
            .textures
            .iter()
            .map(|t| {
                t.cache
                    .as_ref()
                    .ok_or_else(|| Error::CustomError(format!("{} was not encoded", t.path)))
            })
            .collect::<Result<Vec<_>>>()?;

        let size_table_start = HEADER_SIZE + self.textures.len() * ENTRY_SIZE;
        let size_count: usize = caches.iter().map(|c| c.level_sizes.len()).sum();
        let path_pool_start = size_table_start + size_count * 4;

        let mut path_offsets = Vec::with_capacity(self.textures.len());
        let mut pool_end = path_pool_start;
        for texture in &self.textures {
            path_offsets.push(pool_end);
            pool_end += texture.path.len() + 1;
        }
        let hash_offset = align(pool_end as u32, 4) as usize;
        let info_offset = hash_offset + self.textures.len() * HASH_ENTRY_SIZE;
        let data_offset = align((info_offset + self.textures.len() * INFO_ENTRY_SIZE) as u32, DATA_ALIGNMENT) as usize;

        let mut data_offsets = Vec::with_capacity(caches.len());
        let mut data_end = 0;
        for cache in &caches {
            data_end = align(data_end as u32, DATA_ALIGNMENT) as usize;
            data_offsets.push(data_end);
            data_end += cache.data.len();
        }

        let mut cursor = Cursor::new(vec![0u8; data_offset + data_end]);
        CtpkHeader {
            version: 1,
            count,
            data_offset: data_offset as u32,
            data_size: data_end as u32,
            hash_offset: hash_offset as u32,
            info_offset: info_offset as u32,
        }
        .write(&mut cursor)?;

        let mut size_table_index = 0;
        for (i, (texture, cache)) in self.textures.iter().zip(&caches).enumerate() {
            let (width, height) = texture.stored_size();
            TextureEntry {
                path_offset: path_offsets[i] as u32,
                data_size: cache.data.len() as u32,
                data_offset: data_offsets[i] as u32,
                format: cache.format.id(),
                width: width as u16,
                height: height as u16,
                mip_count: cache.mip_count,
                texture_type: texture.texture_type,
                cube_dir: texture.cube_dir,
                size_table_index,
                timestamp: texture.timestamp,
            }
            .write(&mut cursor)?;
            size_table_index += cache.level_sizes.len() as u32;
        }

        for size in caches.iter().flat_map(|c| &c.level_sizes) {
            size.write_le(&mut cursor)?;
        }

        let out = cursor.get_mut();
        for (texture, start) in self.textures.iter().zip(&path_offsets) {
            out[*start..*start + texture.path.len()].copy_from_slice(texture.path.as_bytes());
        }

        let mut hashes = self
            .textures
            .iter()
            .enumerate()
            .map(|(index, t)| HashEntry {
                hash: crc32::compute(t.path.as_bytes()),
                index: index as u32,
            })
            .collect::<Vec<_>>();
        hashes.sort_by_key(|h| h.hash);

        cursor.seek(SeekFrom::Start(hash_offset as u64))?;
        for hash in hashes {
            hash.write(&mut cursor)?;
        }
        for (texture, cache) in self.textures.iter().zip(&caches) {
            InfoEntry {
                format: cache.format.id() as u8,
                mip_count: cache.mip_count,
                compressed: u8::from(cache.format.is_compressed()),
                method: texture.method,
            }
            .write(&mut cursor)?;
        }

        let mut out = cursor.into_inner();
        for (cache, start) in caches.iter().zip(data_offsets) {
            let start = data_offset + start;
            out[start..start + cache.data.len()].copy_from_slice(&cache.data);
        }
        Ok((out, report))
    }
}
