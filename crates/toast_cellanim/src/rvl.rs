//! RVL cellanim files (`.brcad`)
//!
//! | Offset (bytes) | Field             | Description                                       |
//! |----------------|-------------------|---------------------------------------------------|
//! | 0x0000         | Revision          | 4 bytes: 20100312                                 |
//! | 0x0004         | Reserved          | 4 bytes                                           |
//! | 0x0008         | Sheet Index       | 2 bytes, then 2 bytes padding                     |
//! | 0x000C         | Use Palette       | 1 byte, then 3 bytes padding                      |
//! | 0x0010         | Sheet Size        | 2 x 2 bytes                                       |
//! | 0x0014         | Arrangement Count | 2 bytes, then 2 bytes padding                     |
//! | 0x0018         | Arrangements      | part count (2 + 2 padding), then 0x20 byte parts  |
//! | ...            | Animation Count   | 2 bytes, then 2 bytes padding                     |
//! | ...            | Animations        | key count (2 + 2 padding), then 0x18 byte keys    |
//!
//! Everything is big endian. Animation names are not part of the file, they live in the label
//! header next to it (see [`crate::labels`]).

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::model::{
    check_revision, count, Animation, AnimationKey, Arrangement, ArrangementPart, CellAnim,
    Platform, Region, TransformValues, RVL_REVISION,
};

#[binrw]
#[brw(big)]
#[derive(Debug)]
struct RvlFile {
    revision: u32,
    reserved: u32,
    #[brw(pad_after = 2)]
    sheet_index: u16,
    #[brw(pad_after = 3)]
    use_palette: u8,
    sheet_width: u16,
    sheet_height: u16,

    #[br(temp)]
    #[bw(calc = arrangements.len() as u16)]
    #[brw(pad_after = 2)]
    arrangement_count: u16,
    #[br(count = arrangement_count)]
    arrangements: Vec<RvlArrangement>,

    #[br(temp)]
    #[bw(calc = animations.len() as u16)]
    #[brw(pad_after = 2)]
    animation_count: u16,
    #[br(count = animation_count)]
    animations: Vec<RvlAnimation>,
}

#[binrw]
#[brw(big)]
#[derive(Debug)]
struct RvlArrangement {
    #[br(temp)]
    #[bw(calc = parts.len() as u16)]
    #[brw(pad_after = 2)]
    part_count: u16,
    #[br(count = part_count)]
    parts: Vec<RvlPart>,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(big)]
struct RvlPart {
    region: [u16; 4],
    #[brw(pad_after = 2)]
    texture_varying: u16,
    position: [i16; 2],
    scale: [f32; 2],
    angle: f32,
    flip_x: u8,
    flip_y: u8,
    #[brw(pad_after = 1)]
    opacity: u8,
}

#[binrw]
#[brw(big)]
#[derive(Debug)]
struct RvlAnimation {
    #[br(temp)]
    #[bw(calc = keys.len() as u16)]
    #[brw(pad_after = 2)]
    key_count: u16,
    #[br(count = key_count)]
    keys: Vec<RvlKey>,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(big)]
struct RvlKey {
    arrangement_index: u16,
    hold_frames: u16,
    position: [i16; 2],
    scale: [f32; 2],
    angle: f32,
    #[brw(pad_after = 3)]
    opacity: u8,
}

impl From<&RvlPart> for ArrangementPart {
    fn from(part: &RvlPart) -> Self {
        let [x, y, width, height] = part.region;
        ArrangementPart {
            region: Region {
                x,
                y,
                width,
                height,
            },
            transform: TransformValues {
                position: part.position.map(i32::from),
                scale: part.scale,
                angle: part.angle,
            },
            flip_x: part.flip_x != 0,
            flip_y: part.flip_y != 0,
            opacity: part.opacity,
            texture_varying: part.texture_varying,
            ..Default::default()
        }
    }
}

impl From<&ArrangementPart> for RvlPart {
    fn from(part: &ArrangementPart) -> Self {
        let Region {
            x,
            y,
            width,
            height,
        } = part.region;
        RvlPart {
            region: [x, y, width, height],
            texture_varying: part.texture_varying,
            position: part.transform.stored_position(),
            scale: part.transform.scale,
            angle: part.transform.angle,
            flip_x: u8::from(part.flip_x),
            flip_y: u8::from(part.flip_y),
            opacity: part.exported_opacity(),
        }
    }
}

impl From<&RvlKey> for AnimationKey {
    fn from(key: &RvlKey) -> Self {
        AnimationKey {
            arrangement_index: key.arrangement_index,
            hold_frames: key.hold_frames,
            transform: TransformValues {
                position: key.position.map(i32::from),
                scale: key.scale,
                angle: key.angle,
            },
            opacity: key.opacity,
            ..Default::default()
        }
    }
}

impl From<&AnimationKey> for RvlKey {
    fn from(key: &AnimationKey) -> Self {
        RvlKey {
            arrangement_index: key.arrangement_index,
            hold_frames: key.hold_frames,
            position: key.transform.stored_position(),
            scale: key.transform.scale,
            angle: key.transform.angle,
            opacity: key.opacity,
        }
    }
}

/// Parse a `.brcad` file; animation names are left empty
#[instrument(skip(data), err)]
pub fn read(name: &str, data: &[u8]) -> Result<CellAnim> {
    check_revision(Platform::Rvl, data)?;

    let raw = RvlFile::read(&mut Cursor::new(data))?;
    if raw.revision != RVL_REVISION {
        return Err(Error::InvalidRevision(raw.revision));
    }

    let cellanim = CellAnim {
        platform: Platform::Rvl,
        name: name.to_owned(),
        sheet_index: raw.sheet_index,
        use_palette: raw.use_palette != 0,
        sheet_width: raw.sheet_width,
        sheet_height: raw.sheet_height,
        arrangements: raw
            .arrangements
            .iter()
            .map(|a| Arrangement {
                parts: a.parts.iter().map(ArrangementPart::from).collect(),
            })
            .collect(),
        animations: raw
            .animations
            .iter()
            .map(|a| Animation {
                keys: a.keys.iter().map(AnimationKey::from).collect(),
                ..Default::default()
            })
            .collect(),
    };
    cellanim.validate()?;
    Ok(cellanim)
}

/// Serialize a RVL cellanim into a `.brcad` file
#[instrument(skip(cellanim), fields(name = %cellanim.name), err)]
pub fn write(cellanim: &CellAnim) -> Result<Vec<u8>> {
    cellanim.expect_platform(Platform::Rvl)?;
    cellanim.validate()?;

    let max = u16::MAX as usize;
    count(&cellanim.arrangements, "arrangements", max)?;
    count(&cellanim.animations, "animations", max)?;
    for arrangement in &cellanim.arrangements {
        count(&arrangement.parts, "parts", max)?;
    }
    for animation in &cellanim.animations {
        count(&animation.keys, "keys", max)?;
    }

    let raw = RvlFile {
        revision: RVL_REVISION,
        reserved: 0,
        sheet_index: cellanim.sheet_index,
        use_palette: u8::from(cellanim.use_palette),
        sheet_width: cellanim.sheet_width,
        sheet_height: cellanim.sheet_height,
        arrangements: cellanim
            .arrangements
            .iter()
            .map(|a| RvlArrangement {
                parts: a.parts.iter().map(RvlPart::from).collect(),
            })
            .collect(),
        animations: cellanim
            .animations
            .iter()
            .map(|a| RvlAnimation {
                keys: a.keys.iter().map(RvlKey::from).collect(),
            })
            .collect(),
    };

    let mut cursor = Cursor::new(Vec::new());
    raw.write(&mut cursor)?;
    Ok(cursor.into_inner())
}
