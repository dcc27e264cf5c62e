//! Editor metadata sidecar (`TOAST.TED`)
//!
//! Keeps the editor only state of arrangement parts (locked, hidden, display name) next to the
//! console files, which have no room for it.
//!
//! | Offset (bytes) | Field              | Description                                   |
//! |----------------|--------------------|-----------------------------------------------|
//! | 0x0000         | Magic              | `TTED`                                        |
//! | 0x0004         | Version            | 1 byte, major in the high nibble              |
//! | 0x0006         | Header Size        | 2 bytes, always 16                            |
//! | 0x0008         | Section Count      | 4 bytes                                       |
//! | 0x000C         | String Pool Offset | 4 bytes                                       |
//! | 0x0010         | Sections           | tag, entry count, offset of the next section  |
//!
//! The older `TOAST.DAT` sidecar uses the same sections but stores names inline. It can be read
//! but is never written.

use std::io::{Cursor, Seek, SeekFrom, Write};

use binrw::meta::{ReadEndian, WriteEndian};
use binrw::{binrw, BinRead, BinResult, BinWrite, NullString};
use indexmap::IndexMap;
use tracing::{instrument, warn};

use crate::error::{Error, Result};
use crate::model::CellAnim;

/// Name of the sidecar inside an archive
pub const FILE_NAME: &str = "TOAST.TED";

/// Name of the legacy sidecar, replaced by [`FILE_NAME`] on save
pub const LEGACY_FILE_NAME: &str = "TOAST.DAT";

const VERSION: u8 = 0x10;
const HEADER_SIZE: u16 = 16;
const SECTION_HEADER_SIZE: usize = 12;
const LEGACY_NAME_SIZE: usize = 32;

/// Location of a part: cellanim, arrangement and part index
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[brw(little)]
pub struct PartKey {
    pub cellanim: u16,
    pub arrangement: u16,
    pub part: u16,
}

/// Editor state of one part
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartMetadata {
    pub locked: bool,

    /// Opacity to restore once a hidden part is shown again
    pub hidden_opacity: Option<u8>,
    pub name: Option<String>,
}

/// Editor state of every part that has any
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EditorMetadata {
    pub parts: IndexMap<PartKey, PartMetadata>,
}

#[binrw]
#[brw(little, magic = b"TTED")]
#[derive(Debug)]
struct TedHeader {
    #[brw(pad_after = 1)]
    version: u8,
    header_size: u16,
    section_count: u32,
    string_pool_offset: u32,
}

#[binrw]
#[brw(little, magic = b"TOASTDAT")]
#[derive(Debug)]
struct LegacyHeader {
    #[brw(pad_after = 1)]
    version: u8,
    header_size: u16,
    section_count: u32,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
struct SectionHeader {
    tag: [u8; 4],
    entry_count: u32,
    next_section_offset: u32,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
struct LockEntry {
    #[brw(pad_after = 2)]
    key: PartKey,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
struct HiddenEntry {
    key: PartKey,
    #[brw(pad_after = 1)]
    opacity: u8,
}

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
struct NameEntry {
    #[brw(pad_after = 2)]
    key: PartKey,
    name_offset: u32,
}

#[derive(BinRead, Debug)]
#[br(little)]
struct LegacyNameEntry {
    #[br(pad_after = 2)]
    key: PartKey,
    name: [u8; LEGACY_NAME_SIZE],
}

fn read_entries<T>(reader: &mut Cursor<&[u8]>, count: u32) -> BinResult<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()> + ReadEndian,
{
    (0..count).map(|_| T::read(reader)).collect()
}

/// String pool that stores every distinct string once
#[derive(Default)]
struct StringPool {
    data: Vec<u8>,
    offsets: IndexMap<u32, Vec<u32>>,
}

impl StringPool {
    fn hash(value: &str) -> u32 {
        value
            .bytes()
            .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32))
    }

    /// Offset of `value` in the pool, appending it if it is new
    fn intern(&mut self, value: &str) -> u32 {
        let data = &mut self.data;
        let candidates = self.offsets.entry(Self::hash(value)).or_default();
        let found = candidates.iter().copied().find(|&offset| {
            let start = offset as usize;
            data.get(start..=start + value.len())
                .is_some_and(|stored| stored.strip_suffix(&[0u8][..]) == Some(value.as_bytes()))
        });
        if let Some(offset) = found {
            return offset;
        }

        let offset = data.len() as u32;
        candidates.push(offset);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        offset
    }

    fn into_padded(mut self) -> Vec<u8> {
        self.data.resize(self.data.len().next_multiple_of(4), 0);
        self.data
    }
}

fn index(value: usize, what: &'static str) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::TooMany {
        what,
        count: value + 1,
        max: u16::MAX as usize + 1,
    })
}

impl EditorMetadata {
    /// Whether a sidecar would carry anything
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Gather the editor state of every part of `cellanims`
    pub fn collect(cellanims: &[CellAnim]) -> Result<EditorMetadata> {
        let mut parts = IndexMap::new();
        for (c, cellanim) in cellanims.iter().enumerate() {
            for (a, arrangement) in cellanim.arrangements.iter().enumerate() {
                for (p, part) in arrangement.parts.iter().enumerate() {
                    let metadata = PartMetadata {
                        locked: part.editor_locked,
                        hidden_opacity: (!part.editor_visible).then_some(part.opacity),
                        name: (!part.editor_name.is_empty()).then(|| part.editor_name.clone()),
                    };
                    if metadata == PartMetadata::default() {
                        continue;
                    }

                    let key = PartKey {
                        cellanim: index(c, "cellanims")?,
                        arrangement: index(a, "arrangements")?,
                        part: index(p, "parts")?,
                    };
                    parts.insert(key, metadata);
                }
            }
        }
        Ok(EditorMetadata { parts })
    }

    /// Restore the editor state onto the parts of `cellanims`
    pub fn apply(&self, cellanims: &mut [CellAnim]) {
        for (key, metadata) in &self.parts {
            let part = cellanims
                .get_mut(key.cellanim as usize)
                .and_then(|c| c.arrangements.get_mut(key.arrangement as usize))
                .and_then(|a| a.parts.get_mut(key.part as usize));
            let Some(part) = part else {
                warn!(?key, "editor metadata for a part that does not exist");
                continue;
            };

            part.editor_locked = metadata.locked;
            if let Some(opacity) = metadata.hidden_opacity {
                part.editor_visible = false;
                part.opacity = opacity;
            }
            if let Some(name) = &metadata.name {
                part.editor_name.clone_from(name);
            }
        }
    }

    /// Parse a `TOAST.TED` or legacy `TOAST.DAT` sidecar
    #[instrument(skip(data), err)]
    pub fn read(data: &[u8]) -> Result<EditorMetadata> {
        let mut reader = Cursor::new(data);
        let (section_count, start, pool) = if data.starts_with(b"TTED") {
            let header = TedHeader::read(&mut reader)?;
            (
                header.section_count,
                header.header_size,
                Some(header.string_pool_offset as u64),
            )
        } else if data.starts_with(b"TOASTDAT") {
            let header = LegacyHeader::read(&mut reader)?;
            (header.section_count, header.header_size, None)
        } else {
            return Err(Error::InvalidSidecar("unknown magic"));
        };

        let mut metadata = EditorMetadata::default();
        let mut offset = start as u64;
        for _ in 0..section_count {
            reader.seek(SeekFrom::Start(offset))?;
            let section = SectionHeader::read(&mut reader)?;
            match (&section.tag, pool) {
                (b"LOCK", _) => {
                    for entry in read_entries::<LockEntry>(&mut reader, section.entry_count)? {
                        metadata.parts.entry(entry.key).or_default().locked = true;
                    }
                }
                (b"INVS", _) => {
                    for entry in read_entries::<HiddenEntry>(&mut reader, section.entry_count)? {
                        metadata.parts.entry(entry.key).or_default().hidden_opacity =
                            Some(entry.opacity);
                    }
                }
                (b"NAME", Some(pool)) => {
                    for entry in read_entries::<NameEntry>(&mut reader, section.entry_count)? {
                        let name = read_pool_string(data, pool + entry.name_offset as u64)?;
                        metadata.parts.entry(entry.key).or_default().name = Some(name);
                    }
                }
                (b"NAME", None) => {
                    for entry in read_entries::<LegacyNameEntry>(&mut reader, section.entry_count)?
                    {
                        let end = entry
                            .name
                            .iter()
                            .position(|&b| b == 0)
                            .unwrap_or(LEGACY_NAME_SIZE);
                        let name = String::from_utf8_lossy(&entry.name[..end]).into_owned();
                        metadata.parts.entry(entry.key).or_default().name = Some(name);
                    }
                }
                (tag, _) => {
                    warn!(
                        tag = %String::from_utf8_lossy(tag),
                        "skipping unknown editor metadata section"
                    );
                }
            }

            if section.next_section_offset == 0 {
                break;
            }
            offset = section.next_section_offset as u64;
        }
        Ok(metadata)
    }

    /// Serialize into the `TOAST.TED` layout
    ///
    /// Entries are written in part order, so collecting the same parts always gives the same
    /// bytes.
    #[instrument(skip(self), fields(parts = self.parts.len()), err)]
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut parts = self.parts.clone();
        parts.sort_keys();

        let locks: Vec<LockEntry> = parts
            .iter()
            .filter(|(_, m)| m.locked)
            .map(|(&key, _)| LockEntry { key })
            .collect();
        let hidden: Vec<HiddenEntry> = parts
            .iter()
            .filter_map(|(&key, m)| {
                Some(HiddenEntry {
                    key,
                    opacity: m.hidden_opacity?,
                })
            })
            .collect();

        let mut pool = StringPool::default();
        let names: Vec<NameEntry> = parts
            .iter()
            .filter_map(|(&key, m)| {
                let name = m.name.as_deref()?;
                Some(NameEntry {
                    key,
                    name_offset: pool.intern(name),
                })
            })
            .collect();

        let sections: Vec<Section> = [
            Section::encode(*b"LOCK", &locks)?,
            Section::encode(*b"INVS", &hidden)?,
            Section::encode(*b"NAME", &names)?,
        ]
        .into_iter()
        .flatten()
        .collect();

        let sections_size: usize = sections.iter().map(Section::size).sum();
        let header = TedHeader {
            version: VERSION,
            header_size: HEADER_SIZE,
            section_count: sections.len() as u32,
            string_pool_offset: (HEADER_SIZE as usize + sections_size) as u32,
        };

        let mut writer = Cursor::new(Vec::new());
        header.write(&mut writer)?;
        let last = sections.len().saturating_sub(1);
        for (i, section) in sections.iter().enumerate() {
            let next = writer.position() as usize + section.size();
            SectionHeader {
                tag: section.tag,
                entry_count: section.entry_count,
                next_section_offset: if i == last { 0 } else { next as u32 },
            }
            .write(&mut writer)?;
            writer.write_all(&section.entries)?;
        }
        writer.write_all(&pool.into_padded())?;
        Ok(writer.into_inner())
    }
}

/// A section with its entries already serialized
struct Section {
    tag: [u8; 4],
    entry_count: u32,
    entries: Vec<u8>,
}

impl Section {
    /// `None` for sections without entries, which are left out of the file
    fn encode<T>(tag: [u8; 4], entries: &[T]) -> Result<Option<Section>>
    where
        T: for<'a> BinWrite<Args<'a> = ()> + WriteEndian,
    {
        if entries.is_empty() {
            return Ok(None);
        }
        let mut writer = Cursor::new(Vec::new());
        for entry in entries {
            entry.write(&mut writer)?;
        }
        Ok(Some(Section {
            tag,
            entry_count: entries.len() as u32,
            entries: writer.into_inner(),
        }))
    }

    fn size(&self) -> usize {
        SECTION_HEADER_SIZE + self.entries.len()
    }
}

fn read_pool_string(data: &[u8], offset: u64) -> Result<String> {
    if offset >= data.len() as u64 {
        return Err(Error::InvalidSidecar("name offset is past the end of the file"));
    }
    let mut reader = Cursor::new(data);
    reader.seek(SeekFrom::Start(offset))?;
    let name = NullString::read_le(&mut reader)?;
    String::try_from(name).map_err(|_| Error::InvalidSidecar("name is not valid UTF-8"))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{EditorMetadata, PartKey, PartMetadata};
    use crate::error::{Error, Result};
    use crate::model::{Arrangement, ArrangementPart, CellAnim, Platform};

    fn key(cellanim: u16, arrangement: u16, part: u16) -> PartKey {
        PartKey {
            cellanim,
            arrangement,
            part,
        }
    }

    fn named(name: &str) -> PartMetadata {
        PartMetadata {
            name: Some(name.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn layout() -> Result<()> {
        let mut metadata = EditorMetadata::default();
        metadata.parts.insert(
            key(0, 1, 2),
            PartMetadata {
                locked: true,
                hidden_opacity: Some(0x80),
                name: Some("arm".to_owned()),
            },
        );
        let data = metadata.write()?;

        #[rustfmt::skip]
        let expected = vec![
            b'T', b'T', b'E', b'D', 0x10, 0x00, 0x10, 0x00,
            0x03, 0x00, 0x00, 0x00, 0x50, 0x00, 0x00, 0x00,
            // LOCK
            b'L', b'O', b'C', b'K', 0x01, 0x00, 0x00, 0x00,
            0x24, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00,
            // INVS
            b'I', b'N', b'V', b'S', 0x01, 0x00, 0x00, 0x00,
            0x38, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x80, 0x00,
            // NAME
            b'N', b'A', b'M', b'E', 0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            // string pool
            b'a', b'r', b'm', 0x00,
        ];
        assert_eq!(data, expected);
        assert_eq!(EditorMetadata::read(&data)?, metadata);
        Ok(())
    }

    #[test]
    fn shared_names_are_stored_once() -> Result<()> {
        let mut metadata = EditorMetadata::default();
        metadata.parts.insert(key(0, 0, 0), named("arm"));
        metadata.parts.insert(key(0, 0, 1), named("leg"));
        metadata.parts.insert(key(1, 3, 0), named("arm"));
        let data = metadata.write()?;

        assert_eq!(&data[data.len() - 8..], b"arm\0leg\0");
        let read = EditorMetadata::read(&data)?;
        assert_eq!(read.parts[&key(1, 3, 0)].name.as_deref(), Some("arm"));
        assert_eq!(read, metadata);
        Ok(())
    }

    #[test]
    fn empty_sidecar() -> Result<()> {
        let data = EditorMetadata::default().write()?;
        assert_eq!(data.len(), 16);
        assert!(EditorMetadata::read(&data)?.is_empty());
        Ok(())
    }

    #[test]
    fn collect_and_apply() -> Result<()> {
        let mut cellanim = CellAnim::new(Platform::Rvl, "test");
        cellanim.arrangements.push(Arrangement {
            parts: vec![
                ArrangementPart::default(),
                ArrangementPart {
                    opacity: 0x40,
                    editor_visible: false,
                    editor_locked: true,
                    editor_name: "shadow".to_owned(),
                    ..Default::default()
                },
            ],
        });
        let mut cellanims = vec![cellanim];

        let metadata = EditorMetadata::collect(&cellanims)?;
        assert_eq!(metadata.parts.len(), 1);
        assert_eq!(
            metadata.parts[&key(0, 0, 1)],
            PartMetadata {
                locked: true,
                hidden_opacity: Some(0x40),
                name: Some("shadow".to_owned()),
            }
        );

        // the console file only kept the exported opacity
        let part = &mut cellanims[0].arrangements[0].parts[1];
        *part = ArrangementPart {
            opacity: 0,
            ..Default::default()
        };

        EditorMetadata::read(&metadata.write()?)?.apply(&mut cellanims);
        let part = &cellanims[0].arrangements[0].parts[1];
        assert_eq!(part.opacity, 0x40);
        assert!(!part.editor_visible && part.editor_locked);
        assert_eq!(part.editor_name, "shadow");
        assert_eq!(cellanims[0].arrangements[0].parts[0], ArrangementPart::default());
        Ok(())
    }

    #[test]
    fn read_legacy_sidecar() -> Result<()> {
        #[rustfmt::skip]
        let mut data = vec![
            b'T', b'O', b'A', b'S', b'T', b'D', b'A', b'T',
            0x10, 0x00, 0x10, 0x00, 0x01, 0x00, 0x00, 0x00,
            b'N', b'A', b'M', b'E', 0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00,
        ];
        let mut name = [0u8; 32];
        name[..4].copy_from_slice(b"head");
        data.extend_from_slice(&name);

        let metadata = EditorMetadata::read(&data)?;
        assert_eq!(metadata.parts[&key(2, 0, 5)], named("head"));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn unknown_sections_are_skipped() -> Result<()> {
        #[rustfmt::skip]
        let data = vec![
            b'T', b'T', b'E', b'D', 0x10, 0x00, 0x10, 0x00,
            0x02, 0x00, 0x00, 0x00, 0x38, 0x00, 0x00, 0x00,
            b'Z', b'O', b'O', b'M', 0x01, 0x00, 0x00, 0x00,
            0x24, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            b'L', b'O', b'C', b'K', 0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let metadata = EditorMetadata::read(&data)?;
        assert!(metadata.parts[&key(1, 0, 0)].locked);
        assert!(logs_contain("skipping unknown editor metadata section"));
        Ok(())
    }

    #[test]
    fn rejects_other_files() {
        assert!(matches!(
            EditorMetadata::read(b"not a sidecar"),
            Err(Error::InvalidSidecar(_))
        ));
    }

    #[test]
    fn rejects_names_outside_the_pool() {
        #[rustfmt::skip]
        let data = vec![
            b'T', b'T', b'E', b'D', 0x10, 0x00, 0x10, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00,
            b'N', b'A', b'M', b'E', 0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x40, 0x00, 0x00, 0x00,
        ];
        assert!(matches!(
            EditorMetadata::read(&data),
            Err(Error::InvalidSidecar(_))
        ));
    }
}
