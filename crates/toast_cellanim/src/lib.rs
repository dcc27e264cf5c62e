//! This library handles reading and writing the cell animation ("cellanim") files of Wii (RVL) and
//! 3DS (CTR) titles, together with the files that travel next to them.
//!
//! # Cellanim Documentation
//!
//! A cellanim cuts parts out of a texture sheet and places them into numbered arrangements;
//! animations step through arrangements, each key holding one for a number of frames.
//!
//! | Platform | Extension | Byte order | Animation names                          |
//! |----------|-----------|------------|------------------------------------------|
//! | RVL      | `.brcad`  | big        | label header, see [`labels`]             |
//! | CTR      | `.bccad`  | little     | stored in the file                       |
//!
//! Both layouts decode into the same [`CellAnim`] model; see [`rvl`] and [`ctr`] for the offsets.
//!
//! ## Editor Metadata
//!
//! Part state that only matters while editing (locked, hidden, display name) is kept in a sidecar
//! next to the console files, see [`ted`].
//!
//! ## Example
//!
//! ```rust
//! use toast_cellanim::{Arrangement, ArrangementPart, CellAnim, Platform};
//!
//! # fn doit() -> toast_cellanim::error::Result<()> {
//! let mut cellanim = CellAnim::new(Platform::Ctr, "agb_tap");
//! cellanim.arrangements.push(Arrangement {
//!     parts: vec![ArrangementPart::default()],
//! });
//!
//! let data = cellanim.write()?;
//! assert_eq!(Platform::detect(&data), Some(Platform::Ctr));
//!
//! let read = CellAnim::read(Platform::Ctr, "agb_tap", &data)?;
//! assert_eq!(read, cellanim);
//! # Ok(())
//! # }
//! # doit().unwrap();
//! ```

pub mod ctr;
pub mod error;
pub mod labels;
pub mod model;
pub mod rvl;
pub mod ted;

pub use labels::Label;
pub use model::{
    Animation, AnimationKey, Arrangement, ArrangementPart, CellAnim, Platform, Region,
    TransformValues,
};
pub use ted::{EditorMetadata, PartKey, PartMetadata};
