//! Opening, inspecting and rebuilding cellanim archives.
//!
//! The codecs live in their own crates: [`toast_archive`] for the compression and container
//! layers, [`toast_cellanim`] for the animation data and [`toast_texture`] for the sheets. This
//! crate ties them together:
//!
//! - [`session::open`] turns an archive into a [`session::Document`]
//! - [`session::export`] writes a document back, keeping a backup of the previous file
//! - [`app::AppContext`] owns the open sessions and runs the slow work on background threads
//!
//! ```no_run
//! use toast::session::{self, ExportOptions};
//!
//! let mut document = session::open("cellanim.szs".as_ref())?;
//! for cellanim in &mut document.cellanims {
//!     cellanim.animations.iter_mut().for_each(|a| a.name.make_ascii_uppercase());
//! }
//! session::export(&mut document, "cellanim.szs".as_ref(), &ExportOptions::default())?;
//! # Ok::<(), toast::error::Error>(())
//! ```

pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod session;
pub mod tasks;
