//! In-memory form of a cellanim, shared by both consoles.

use std::fmt;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::{ctr, rvl};

/// Revision stamped at the start of every `.brcad`
pub const RVL_REVISION: u32 = 20100312;

/// Revision stamped at the start of every `.bccad`
pub const CTR_REVISION: u32 = 20131007;

/// Console family a cellanim was made for
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    Rvl,
    Ctr,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Rvl => write!(f, "RVL"),
            Platform::Ctr => write!(f, "CTR"),
        }
    }
}

impl Platform {
    /// Platform whose revision (in either byte order) starts `data`
    pub fn detect(data: &[u8]) -> Option<Platform> {
        let head = data.get(..4)?;
        [BigEndian::read_u32(head), LittleEndian::read_u32(head)]
            .into_iter()
            .find_map(|revision| match revision {
                RVL_REVISION => Some(Platform::Rvl),
                CTR_REVISION => Some(Platform::Ctr),
                _ => None,
            })
    }

    /// File extension of a cellanim, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            Platform::Rvl => "brcad",
            Platform::Ctr => "bccad",
        }
    }
}

/// Position, scale and rotation of a part or key
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransformValues {
    /// Stored as 16 bit on disk, clamped on write
    pub position: [i32; 2],
    pub scale: [f32; 2],

    /// Degrees
    pub angle: f32,
}

impl Default for TransformValues {
    fn default() -> Self {
        Self {
            position: [0, 0],
            scale: [1.0, 1.0],
            angle: 0.0,
        }
    }
}

impl TransformValues {
    pub(crate) fn stored_position(&self) -> [i16; 2] {
        self.position
            .map(|v| v.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
    }
}

/// Rectangle of the sheet a part shows
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Region {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// One sprite of an arrangement
#[derive(Debug, Clone, PartialEq)]
pub struct ArrangementPart {
    pub region: Region,
    pub transform: TransformValues,
    pub flip_x: bool,
    pub flip_y: bool,
    pub opacity: u8,

    /// RVL only
    pub texture_varying: u16,

    /// CTR only
    pub fore_color: [u8; 3],
    /// CTR only
    pub back_color: [u8; 3],
    /// CTR only
    pub quad_depth: [f32; 4],
    /// CTR only
    pub id: u8,
    /// CTR only
    pub emitter_name: String,

    /// Hidden parts are written fully transparent; `opacity` keeps the value to restore
    pub editor_visible: bool,
    pub editor_locked: bool,
    pub editor_name: String,
}

impl Default for ArrangementPart {
    fn default() -> Self {
        Self {
            region: Region::default(),
            transform: TransformValues::default(),
            flip_x: false,
            flip_y: false,
            opacity: 0xFF,
            texture_varying: 0,
            fore_color: [0, 0, 0],
            back_color: [0xFF, 0xFF, 0xFF],
            quad_depth: [0.0; 4],
            id: 0,
            emitter_name: String::new(),
            editor_visible: true,
            editor_locked: false,
            editor_name: String::new(),
        }
    }
}

impl ArrangementPart {
    /// Opacity as written to the console file
    pub fn exported_opacity(&self) -> u8 {
        if self.editor_visible {
            self.opacity
        } else {
            0
        }
    }
}

/// A numbered frame: the parts drawn together
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Arrangement {
    pub parts: Vec<ArrangementPart>,
}

/// One step of an animation
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationKey {
    pub arrangement_index: u16,

    /// Frames the key stays on screen; zero keys are skipped during playback
    pub hold_frames: u16,
    pub transform: TransformValues,
    pub opacity: u8,

    /// CTR only
    pub translate_z: f32,
    /// CTR only
    pub fore_color: [u8; 3],
    /// CTR only
    pub back_color: [u8; 3],
}

impl Default for AnimationKey {
    fn default() -> Self {
        Self {
            arrangement_index: 0,
            hold_frames: 1,
            transform: TransformValues::default(),
            opacity: 0xFF,
            translate_z: 0.0,
            fore_color: [0, 0, 0],
            back_color: [0xFF, 0xFF, 0xFF],
        }
    }
}

/// A named sequence of keys
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Animation {
    /// RVL names come from the label header and may be empty
    pub name: String,
    pub comment: Option<String>,

    /// CTR only
    pub is_interpolated: bool,
    pub keys: Vec<AnimationKey>,
}

impl Animation {
    /// Keys that take part in playback
    pub fn playable_keys(&self) -> impl Iterator<Item = &AnimationKey> {
        self.keys.iter().filter(|k| k.hold_frames != 0)
    }

    /// Total length in frames
    pub fn duration(&self) -> u32 {
        self.keys.iter().map(|k| k.hold_frames as u32).sum()
    }
}

/// One cellanim: the arrangements and animations drawn from one sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellAnim {
    pub platform: Platform,

    /// File name without extension
    pub name: String,

    /// RVL only: texture of the TPL the sheet is taken from
    pub sheet_index: u16,

    /// RVL only
    pub use_palette: bool,

    pub sheet_width: u16,
    pub sheet_height: u16,
    pub arrangements: Vec<Arrangement>,
    pub animations: Vec<Animation>,
}

impl CellAnim {
    pub fn new(platform: Platform, name: impl Into<String>) -> Self {
        CellAnim {
            platform,
            name: name.into(),
            sheet_index: 0,
            use_palette: false,
            sheet_width: 0,
            sheet_height: 0,
            arrangements: Vec::new(),
            animations: Vec::new(),
        }
    }

    /// Parse a cellanim file of `platform`
    pub fn read(platform: Platform, name: &str, data: &[u8]) -> Result<CellAnim> {
        match platform {
            Platform::Rvl => rvl::read(name, data),
            Platform::Ctr => ctr::read(name, data),
        }
    }

    /// Serialize in the layout of the cellanim's platform
    pub fn write(&self) -> Result<Vec<u8>> {
        match self.platform {
            Platform::Rvl => rvl::write(self),
            Platform::Ctr => ctr::write(self),
        }
    }

    /// File name inside the archive
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.platform.extension())
    }

    /// Check that every key points at an existing arrangement
    pub fn validate(&self) -> Result<()> {
        let count = self.arrangements.len();
        for (animation, a) in self.animations.iter().enumerate() {
            for (key, k) in a.keys.iter().enumerate() {
                if k.arrangement_index as usize >= count {
                    return Err(Error::InvalidArrangementIndex {
                        animation,
                        key,
                        index: k.arrangement_index,
                        count,
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn expect_platform(&self, expected: Platform) -> Result<()> {
        if self.platform != expected {
            return Err(Error::PlatformMismatch {
                expected,
                found: self.platform,
            });
        }
        Ok(())
    }
}

/// Check the revision at the start of a cellanim file
pub(crate) fn check_revision(expected: Platform, data: &[u8]) -> Result<()> {
    match Platform::detect(data) {
        Some(found) if found != expected => Err(Error::PlatformMismatch { expected, found }),
        _ => Ok(()),
    }
}

pub(crate) fn count<T>(items: &[T], what: &'static str, max: usize) -> Result<()> {
    if items.len() > max {
        return Err(Error::TooMany {
            what,
            count: items.len(),
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{Animation, AnimationKey, Arrangement, CellAnim, Platform, TransformValues};
    use crate::error::Error;

    #[test]
    fn detect_platform_in_both_byte_orders() {
        assert_eq!(Platform::detect(&20100312u32.to_be_bytes()), Some(Platform::Rvl));
        assert_eq!(Platform::detect(&20100312u32.to_le_bytes()), Some(Platform::Rvl));
        assert_eq!(Platform::detect(&20131007u32.to_le_bytes()), Some(Platform::Ctr));
        assert_eq!(Platform::detect(&[0, 0, 0, 1]), None);
        assert_eq!(Platform::detect(&[0x01]), None);
    }

    #[test]
    fn position_is_clamped() {
        let transform = TransformValues {
            position: [40000, -40000],
            ..Default::default()
        };
        assert_eq!(transform.stored_position(), [i16::MAX, i16::MIN]);
    }

    #[test]
    fn playable_keys_skip_zero_holds() {
        let animation = Animation {
            keys: vec![
                AnimationKey {
                    hold_frames: 3,
                    ..Default::default()
                },
                AnimationKey {
                    hold_frames: 0,
                    arrangement_index: 1,
                    ..Default::default()
                },
                AnimationKey::default(),
            ],
            ..Default::default()
        };
        assert_eq!(animation.playable_keys().count(), 2);
        assert_eq!(animation.duration(), 4);
    }

    #[test]
    fn validate_reports_the_bad_key() {
        let mut cellanim = CellAnim::new(Platform::Ctr, "test");
        cellanim.arrangements.push(Arrangement::default());
        cellanim.animations.push(Animation {
            keys: vec![
                AnimationKey::default(),
                AnimationKey {
                    arrangement_index: 1,
                    ..Default::default()
                },
            ],
            ..Default::default()
        });

        assert!(matches!(
            cellanim.validate(),
            Err(Error::InvalidArrangementIndex {
                animation: 0,
                key: 1,
                index: 1,
                count: 1
            })
        ));
        assert_eq!(cellanim.file_name(), "test.bccad");
    }
}
