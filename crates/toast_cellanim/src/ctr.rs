//! CTR cellanim files (`.bccad`)
//!
//! | Offset (bytes) | Field             | Description                                        |
//! |----------------|-------------------|----------------------------------------------------|
//! | 0x0000         | Revision          | 4 bytes: 20131007                                  |
//! | 0x0004         | Sheet Size        | 2 x 2 bytes                                        |
//! | 0x0008         | Arrangement Count | 2 bytes, then 2 bytes padding                      |
//! | 0x000C         | Arrangements      | part count (4 bytes), then the parts               |
//! | ...            | Animation Count   | 4 bytes                                            |
//! | ...            | Animations        | name, interpolation flag, key count, then the keys |
//!
//! Everything is little endian. Strings are a length byte followed by the bytes, padded so the
//! whole field is a multiple of four bytes long.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinResult, BinWrite};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::model::{
    check_revision, count, Animation, AnimationKey, Arrangement, ArrangementPart, CellAnim,
    Platform, Region, TransformValues, CTR_REVISION,
};

/// Padding after a length prefixed string of `len` bytes
fn string_padding(len: usize) -> usize {
    (4 - (1 + len) % 4) % 4
}

#[binrw::parser(reader)]
fn read_prefixed() -> BinResult<String> {
    let mut len = [0u8];
    reader.read_exact(&mut len)?;
    let len = len[0] as usize;
    let mut bytes = vec![0u8; len + string_padding(len)];
    reader.read_exact(&mut bytes)?;
    bytes.truncate(len);
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[binrw::writer(writer)]
fn write_prefixed(value: &String) -> BinResult<()> {
    let len = u8::try_from(value.len()).map_err(|_| binrw::Error::AssertFail {
        pos: writer.stream_position().unwrap_or_default(),
        message: format!("string {value:?} is longer than 255 bytes"),
    })?;
    writer.write_all(&[len])?;
    writer.write_all(value.as_bytes())?;
    writer.write_all(&[0u8; 3][..string_padding(value.len())])?;
    Ok(())
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
struct CtrFile {
    revision: u32,
    sheet_width: u16,
    sheet_height: u16,

    #[br(temp)]
    #[bw(calc = arrangements.len() as u16)]
    #[brw(pad_after = 2)]
    arrangement_count: u16,
    #[br(count = arrangement_count)]
    arrangements: Vec<CtrArrangement>,

    #[br(temp)]
    #[bw(calc = animations.len() as u32)]
    animation_count: u32,
    #[br(count = animation_count)]
    animations: Vec<CtrAnimation>,
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
struct CtrArrangement {
    #[br(temp)]
    #[bw(calc = parts.len() as u32)]
    part_count: u32,
    #[br(count = part_count)]
    parts: Vec<CtrPart>,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
struct CtrPart {
    region: [u16; 4],
    position: [i16; 2],
    scale: [f32; 2],
    angle: f32,
    flip_x: u8,
    flip_y: u8,
    fore_color: [u8; 3],
    back_color: [u8; 3],
    opacity: u8,
    id: u8,
    quad_depth: [f32; 4],
    #[br(parse_with = read_prefixed)]
    #[bw(write_with = write_prefixed)]
    emitter_name: String,
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
struct CtrAnimation {
    #[br(parse_with = read_prefixed)]
    #[bw(write_with = write_prefixed)]
    name: String,
    #[brw(pad_after = 3)]
    interpolated: u8,

    #[br(temp)]
    #[bw(calc = keys.len() as u32)]
    key_count: u32,
    #[br(count = key_count)]
    keys: Vec<CtrKey>,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
struct CtrKey {
    arrangement_index: u16,
    hold_frames: u16,
    position: [i16; 2],
    scale: [f32; 2],
    angle: f32,
    #[brw(pad_after = 3)]
    opacity: u8,
    translate_z: f32,
    fore_color: [u8; 3],
    #[brw(pad_after = 2)]
    back_color: [u8; 3],
}

impl From<&CtrPart> for ArrangementPart {
    fn from(part: &CtrPart) -> Self {
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
            fore_color: part.fore_color,
            back_color: part.back_color,
            quad_depth: part.quad_depth,
            id: part.id,
            emitter_name: part.emitter_name.clone(),
            ..Default::default()
        }
    }
}

impl From<&ArrangementPart> for CtrPart {
    fn from(part: &ArrangementPart) -> Self {
        let Region {
            x,
            y,
            width,
            height,
        } = part.region;
        CtrPart {
            region: [x, y, width, height],
            position: part.transform.stored_position(),
            scale: part.transform.scale,
            angle: part.transform.angle,
            flip_x: u8::from(part.flip_x),
            flip_y: u8::from(part.flip_y),
            fore_color: part.fore_color,
            back_color: part.back_color,
            opacity: part.exported_opacity(),
            id: part.id,
            quad_depth: part.quad_depth,
            emitter_name: part.emitter_name.clone(),
        }
    }
}

impl From<&CtrKey> for AnimationKey {
    fn from(key: &CtrKey) -> Self {
        AnimationKey {
            arrangement_index: key.arrangement_index,
            hold_frames: key.hold_frames,
            transform: TransformValues {
                position: key.position.map(i32::from),
                scale: key.scale,
                angle: key.angle,
            },
            opacity: key.opacity,
            translate_z: key.translate_z,
            fore_color: key.fore_color,
            back_color: key.back_color,
        }
    }
}

impl From<&AnimationKey> for CtrKey {
    fn from(key: &AnimationKey) -> Self {
        CtrKey {
            arrangement_index: key.arrangement_index,
            hold_frames: key.hold_frames,
            position: key.transform.stored_position(),
            scale: key.transform.scale,
            angle: key.transform.angle,
            opacity: key.opacity,
            translate_z: key.translate_z,
            fore_color: key.fore_color,
            back_color: key.back_color,
        }
    }
}

fn check_string(value: &str) -> Result<()> {
    if value.len() > u8::MAX as usize {
        return Err(Error::StringTooLong(value.to_owned()));
    }
    Ok(())
}

/// Parse a `.bccad` file
#[instrument(skip(data), err)]
pub fn read(name: &str, data: &[u8]) -> Result<CellAnim> {
    check_revision(Platform::Ctr, data)?;

    let raw = CtrFile::read(&mut Cursor::new(data))?;
    if raw.revision != CTR_REVISION {
        return Err(Error::InvalidRevision(raw.revision));
    }

    let cellanim = CellAnim {
        platform: Platform::Ctr,
        name: name.to_owned(),
        sheet_index: 0,
        use_palette: false,
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
                name: a.name.clone(),
                comment: None,
                is_interpolated: a.interpolated != 0,
                keys: a.keys.iter().map(AnimationKey::from).collect(),
            })
            .collect(),
    };
    cellanim.validate()?;
    Ok(cellanim)
}

/// Serialize a CTR cellanim into a `.bccad` file
#[instrument(skip(cellanim), fields(name = %cellanim.name), err)]
pub fn write(cellanim: &CellAnim) -> Result<Vec<u8>> {
    cellanim.expect_platform(Platform::Ctr)?;
    cellanim.validate()?;

    count(&cellanim.arrangements, "arrangements", u16::MAX as usize)?;
    count(&cellanim.animations, "animations", u32::MAX as usize)?;
    for arrangement in &cellanim.arrangements {
        count(&arrangement.parts, "parts", u32::MAX as usize)?;
        for part in &arrangement.parts {
            check_string(&part.emitter_name)?;
        }
    }
    for animation in &cellanim.animations {
        count(&animation.keys, "keys", u32::MAX as usize)?;
        check_string(&animation.name)?;
    }

    let raw = CtrFile {
        revision: CTR_REVISION,
        sheet_width: cellanim.sheet_width,
        sheet_height: cellanim.sheet_height,
        arrangements: cellanim
            .arrangements
            .iter()
            .map(|a| CtrArrangement {
                parts: a.parts.iter().map(CtrPart::from).collect(),
            })
            .collect(),
        animations: cellanim
            .animations
            .iter()
            .map(|a| CtrAnimation {
                name: a.name.clone(),
                interpolated: u8::from(a.is_interpolated),
                keys: a.keys.iter().map(CtrKey::from).collect(),
            })
            .collect(),
    };

    let mut cursor = Cursor::new(Vec::new());
    raw.write(&mut cursor)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{read, string_padding, write};
    use crate::error::{Error, Result};
    use crate::model::{
        Animation, AnimationKey, Arrangement, ArrangementPart, CellAnim, Platform, TransformValues,
    };

    fn sample() -> CellAnim {
        let mut cellanim = CellAnim::new(Platform::Ctr, "cellanim");
        cellanim.sheet_width = 512;
        cellanim.sheet_height = 256;
        cellanim.arrangements = vec![
            Arrangement {
                parts: vec![ArrangementPart {
                    transform: TransformValues {
                        position: [12, -7],
                        scale: [0.5, 1.5],
                        angle: -45.0,
                    },
                    fore_color: [1, 2, 3],
                    back_color: [4, 5, 6],
                    quad_depth: [0.25, 0.5, 0.75, 1.0],
                    id: 9,
                    emitter_name: "spark".to_owned(),
                    ..Default::default()
                }],
            },
            Arrangement::default(),
        ];
        cellanim.animations = vec![Animation {
            name: "beat".to_owned(),
            is_interpolated: true,
            keys: vec![
                AnimationKey {
                    arrangement_index: 1,
                    hold_frames: 4,
                    translate_z: 2.0,
                    ..Default::default()
                },
                AnimationKey::default(),
            ],
            ..Default::default()
        }];
        cellanim
    }

    #[test]
    fn string_fields_pad_to_four() {
        assert_eq!(string_padding(0), 3);
        assert_eq!(string_padding(3), 0);
        assert_eq!(string_padding(4), 3);
        assert_eq!(string_padding(5), 2);
    }

    #[test]
    fn header_layout() -> Result<()> {
        let data = write(&CellAnim::new(Platform::Ctr, "empty"))?;

        #[rustfmt::skip]
        let expected = vec![
            0xBF, 0x2C, 0x33, 0x01,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(data, expected);
        Ok(())
    }

    #[test]
    fn animation_name_layout() -> Result<()> {
        let mut cellanim = CellAnim::new(Platform::Ctr, "named");
        cellanim.animations.push(Animation {
            name: "idle".to_owned(),
            ..Default::default()
        });
        let data = write(&cellanim)?;

        #[rustfmt::skip]
        let animation = vec![
            0x04, b'i', b'd', b'l', b'e', 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(&data[0x10..], &animation[..]);
        Ok(())
    }

    #[test]
    fn round_trip() -> Result<()> {
        let cellanim = sample();
        let data = write(&cellanim)?;
        let read_back = read("cellanim", &data)?;
        assert_eq!(read_back, cellanim);
        assert_eq!(write(&read_back)?, data);
        Ok(())
    }

    #[test]
    fn rejects_rvl_files() {
        assert!(matches!(
            read("test", &20100312u32.to_be_bytes()),
            Err(Error::PlatformMismatch {
                expected: Platform::Ctr,
                found: Platform::Rvl
            })
        ));
    }

    #[test]
    fn rejects_long_names() {
        let mut cellanim = sample();
        cellanim.animations[0].name = "x".repeat(256);
        assert!(matches!(write(&cellanim), Err(Error::StringTooLong(_))));
    }

    #[test]
    fn rejects_wrong_platform_on_write() {
        let cellanim = CellAnim::new(Platform::Rvl, "test");
        assert!(matches!(
            write(&cellanim),
            Err(Error::PlatformMismatch {
                expected: Platform::Ctr,
                found: Platform::Rvl
            })
        ));
    }
}
