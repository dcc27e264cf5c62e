//! This library handles decoding and encoding the textures of Wii (RVL) and 3DS (CTR) cellanim
//! archives.
//!
//! # Texture Documentation
//!
//! Every codec converts between a console specific storage layout and one canonical form: linear
//! RGBA8888 rows, top to bottom, left to right.
//!
//! | Platform | Container           | Pixel formats                                     |
//! |----------|---------------------|---------------------------------------------------|
//! | RVL      | TPL, see [`tpl`]    | GX tiled formats, see [`rvl`] and [`cmpr`]        |
//! | CTR      | CTPK, see [`ctpk`]  | PICA Morton tiled formats, see [`ctr`] and [`etc1`] |
//!
//! ## Containers
//!
//! - **TPL**: big endian list of images, indexed images reference a palette of IA8, RGB565 or
//!   RGB5A3 entries.
//! - **CTPK**: little endian list of named textures with mip levels. The path of every texture is
//!   indexed by its CRC32, see [`crc32`].
//!
//! ## Transforms
//!
//! CTPK textures are stored rotated and limited to 1024 pixels a side; the rotations, the bilinear
//! resampling and the mip chain live in [`transform`].
//!
//! ## Example
//!
//! ```rust
//! use toast_texture::ctr::{self, CtrFormat};
//!
//! # fn doit() -> toast_texture::error::Result<()> {
//! let rgba = [0x20, 0x40, 0x60, 0xFF].repeat(8 * 8);
//! let encoded = ctr::encode(CtrFormat::Rgb565, 8, 8, &rgba, None)?;
//! assert_eq!(encoded.len(), ctr::byte_size(CtrFormat::Rgb565, 8, 8));
//!
//! let decoded = ctr::decode(CtrFormat::Rgb565, 8, 8, &encoded)?;
//! assert_eq!(decoded.len(), rgba.len());
//! # Ok(())
//! # }
//! # doit().unwrap();
//! ```

pub mod cmpr;
pub mod color;
pub mod crc32;
pub mod ctpk;
pub mod ctr;
pub mod error;
pub mod etc1;
pub mod rvl;
pub mod tpl;
pub mod transform;

pub use ctpk::{Ctpk, CtpkTexture, CtpkWriteOptions, CtpkWriteReport};
pub use ctr::CtrFormat;
pub use rvl::{PaletteFormat, RvlFormat};
pub use tpl::{Tpl, TplTexture};
