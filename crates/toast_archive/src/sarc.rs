//! SARC archive reading and writing
//!
//! | Offset (bytes) | Field          | Description                                            |
//! |----------------|----------------|--------------------------------------------------------|
//! | 0x0000         | SARC header    | 0x14 bytes: magic, byte order mark, sizes, version     |
//! | 0x0014         | SFAT header    | 0x0C bytes: node count and name hash key               |
//! | 0x0020         | SFAT entries   | 0x10 bytes each: hash, name attribute, data range      |
//! | ...            | SFNT header    | 0x08 bytes                                             |
//! | ...            | Name table     | null terminated full paths, each 4 aligned             |
//! | data_offset    | Data section   | file payloads                                          |
//!
//! Files are addressed by their full `/` delimited path. Archives are written little endian; the
//! byte order mark is honoured when reading.

use std::io::{Cursor, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite, Endian};
use bon::Builder;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::tree::{Directory, File};
use crate::types::{SarcHeader, SfatEntry, SfatHeader, SfntHeader};
use crate::u8_archive::align;

/// Multiplier used by every known SARC writer
pub const DEFAULT_HASH_KEY: u32 = 0x65;

/// Options for how the SARC file should be written
#[derive(Debug, Clone, Builder)]
pub struct SarcWriterOptions {
    /// Multiplier of the path hash
    #[builder(default = DEFAULT_HASH_KEY)]
    pub hash_key: u32,

    /// Alignment of the data section and of payloads listed in `aligned_extensions`
    #[builder(default = 0x80)]
    pub data_alignment: usize,

    /// Alignment of every other payload
    #[builder(default = 4)]
    pub file_alignment: usize,

    /// Extensions (without the dot) whose payloads use `data_alignment`
    #[builder(default = vec!["ctpk".to_owned(), "bch".to_owned()])]
    pub aligned_extensions: Vec<String>,
}

impl Default for SarcWriterOptions {
    fn default() -> Self {
        SarcWriterOptions::builder().build()
    }
}

impl SarcWriterOptions {
    fn alignment_for(&self, path: &str) -> usize {
        let aligned = path
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.aligned_extensions.iter().any(|e| e == ext));

        if aligned {
            self.data_alignment
        } else {
            self.file_alignment
        }
    }
}

/// Hash of a full path as stored in the SFAT
pub fn hash_name(name: &str, key: u32) -> u32 {
    name.bytes()
        .fold(0u32, |h, b| h.wrapping_mul(key).wrapping_add(b as u32))
}

/// Whether `data` starts with the SARC magic
pub fn is_sarc(data: &[u8]) -> bool {
    data.len() >= 4 && &data[..4] == b"SARC"
}

fn byte_order(data: &[u8]) -> Result<Endian> {
    match data.get(6..8) {
        Some([0xFF, 0xFE]) => Ok(Endian::Little),
        Some([0xFE, 0xFF]) => Ok(Endian::Big),
        _ => Err(Error::InvalidArchive("SARC")),
    }
}

fn read_name(data: &[u8], offset: usize) -> Result<String> {
    let name = data.get(offset..).ok_or(Error::OutOfBounds {
        what: "entry name",
        offset,
        size: 0,
    })?;
    let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
    Ok(String::from_utf8_lossy(&name[..end]).into_owned())
}

/// Parse a decompressed SARC archive into a directory tree
///
/// Directories are created on demand from the segments of each path.
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn read(data: &[u8]) -> Result<Directory> {
    if !is_sarc(data) {
        return Err(Error::InvalidArchive("SARC"));
    }
    let endian = byte_order(data)?;

    let mut cursor = Cursor::new(data);
    let header = SarcHeader::read_options(&mut cursor, endian, ())?;

    cursor.seek(SeekFrom::Start(header.header_size as u64))?;
    let sfat = SfatHeader::read_options(&mut cursor, endian, ())?;
    let entries = (0..sfat.node_count)
        .map(|_| SfatEntry::read_options(&mut cursor, endian, ()))
        .collect::<binrw::BinResult<Vec<_>>>()?;

    let sfnt_start = cursor.stream_position()?;
    let sfnt = SfntHeader::read_options(&mut cursor, endian, ())?;
    let names_start = (sfnt_start + sfnt.header_size as u64) as usize;
    let data_offset = header.data_offset as usize;

    let mut root = Directory::default();
    for entry in &entries {
        let path = if entry.has_name() {
            read_name(data, names_start + entry.name_offset())?
        } else {
            format!("0x{:08X}", entry.name_hash)
        };

        let start = data_offset + entry.data_start as usize;
        let end = data_offset + entry.data_end as usize;
        let payload = (start <= end)
            .then(|| data.get(start..end))
            .flatten()
            .ok_or(Error::OutOfBounds {
                what: "file data",
                offset: start,
                size: end.saturating_sub(start),
            })?;

        let mut segments = path.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>();
        let Some(file_name) = segments.pop() else {
            return Err(Error::InvalidArchive("SARC"));
        };

        let directory = segments
            .into_iter()
            .fold(&mut root, |dir, segment| dir.directory_or_create(segment));
        directory.insert_file(File::new(file_name, payload));
    }

    debug!(files = entries.len(), ?endian, "read SARC archive");
    Ok(root)
}

/// Serialize a directory tree into an uncompressed little endian SARC archive
#[instrument(skip(root, options), err)]
pub fn write(root: &Directory, options: &SarcWriterOptions) -> Result<Vec<u8>> {
    let mut files = root
        .walk()
        .into_iter()
        .map(|(path, file)| (hash_name(&path, options.hash_key), path, file))
        .collect::<Vec<_>>();
    files.sort_by_key(|(hash, _, _)| *hash);

    let mut names = Vec::new();
    let mut entries = Vec::with_capacity(files.len());
    let mut data_size = 0usize;
    for (hash, path, file) in &files {
        let name_offset = names.len();
        names.extend_from_slice(path.as_bytes());
        names.push(0);
        names.resize(align(names.len(), 4), 0);

        let start = align(data_size, options.alignment_for(path));
        data_size = start + file.data.len();

        entries.push(SfatEntry {
            name_hash: *hash,
            name_attr: SfatEntry::name_attr_for(name_offset),
            data_start: start as u32,
            data_end: data_size as u32,
        });
    }

    let node_count = u16::try_from(entries.len())
        .map_err(|_| Error::CustomError(format!("{} files do not fit a SARC", entries.len())))?;

    let tables_size = SarcHeader::SIZE as usize
        + SfatHeader::SIZE as usize
        + entries.len() * SfatEntry::SIZE as usize
        + SfntHeader::SIZE as usize
        + names.len();
    let data_offset = align(tables_size, options.data_alignment);

    let header = SarcHeader {
        header_size: SarcHeader::SIZE,
        bom: SarcHeader::BOM,
        file_size: (data_offset + data_size) as u32,
        data_offset: data_offset as u32,
        version: SarcHeader::VERSION,
        reserved: 0,
    };
    let sfat = SfatHeader {
        header_size: SfatHeader::SIZE,
        node_count,
        hash_key: options.hash_key,
    };
    let sfnt = SfntHeader {
        header_size: SfntHeader::SIZE,
        reserved: 0,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(data_offset + data_size));
    header.write_le(&mut cursor)?;
    sfat.write_le(&mut cursor)?;
    for entry in &entries {
        entry.write_le(&mut cursor)?;
    }
    sfnt.write_le(&mut cursor)?;
    cursor.write_all(&names)?;

    let mut out = cursor.into_inner();
    for ((_, _, file), entry) in files.iter().zip(&entries) {
        out.resize(data_offset + entry.data_start as usize, 0);
        out.extend_from_slice(&file.data);
    }
    out.resize(data_offset + data_size, 0);

    debug!(files = entries.len(), size = out.len(), "wrote SARC archive");
    Ok(out)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{hash_name, read, write, SarcWriterOptions};
    use crate::error::{Error, Result};
    use crate::tree::{Directory, File};

    fn sample() -> Directory {
        let mut root = Directory::default();
        let arc = root.directory_or_create("arc");
        arc.insert_file(File::new("cellanim.bccad", vec![1, 2, 3, 4, 5]));
        arc.insert_file(File::new("cellanim.ctpk", vec![6; 9]));
        arc.insert_file(File::new("TOAST.TED", vec![7, 7]));
        root
    }

    #[test]
    fn hash_matches_multiplier_rule() {
        assert_eq!(hash_name("", 0x65), 0);
        assert_eq!(hash_name("a", 0x65), 0x61);
        assert_eq!(hash_name("ab", 0x65), 0x26A7);
    }

    #[test]
    fn header_layout() -> Result<()> {
        let bytes = write(&sample(), &SarcWriterOptions::default())?;

        #[rustfmt::skip]
        assert_eq!(&bytes[..0x20], &[
            b'S', b'A', b'R', b'C', 0x14, 0x00, 0xFF, 0xFE,
            bytes[8], bytes[9], bytes[10], bytes[11],
            0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
            b'S', b'F', b'A', b'T', 0x0C, 0x00, 0x03, 0x00,
            0x65, 0x00, 0x00, 0x00,
        ][..]);
        assert_eq!(
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            bytes.len()
        );
        Ok(())
    }

    #[test]
    fn entries_sorted_and_aligned() -> Result<()> {
        let bytes = write(&sample(), &SarcWriterOptions::default())?;

        let word = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };

        let hashes = (0..3).map(|i| word(0x20 + i * 0x10)).collect::<Vec<_>>();
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes, sorted);

        for i in 0..3 {
            let entry = 0x20 + i * 0x10;
            if word(entry) == hash_name("arc/cellanim.ctpk", 0x65) {
                assert_eq!(word(entry + 8) % 0x80, 0);
            } else {
                assert_eq!(word(entry + 8) % 4, 0);
            }
        }
        Ok(())
    }

    #[test]
    fn round_trip() -> Result<()> {
        let mut root = sample();
        let bytes = write(&root, &SarcWriterOptions::default())?;

        let mut parsed = read(&bytes)?;
        root.sort();
        parsed.sort();
        assert_eq!(parsed, root);

        Ok(())
    }

    #[test]
    fn big_endian_archives_are_read() -> Result<()> {
        let name = b"a.bin\0\0\0";
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"SARC");
        bytes.extend_from_slice(&0x14u16.to_be_bytes());
        bytes.extend_from_slice(&0xFEFFu16.to_be_bytes());
        bytes.extend_from_slice(&0x43u32.to_be_bytes());
        bytes.extend_from_slice(&0x40u32.to_be_bytes());
        bytes.extend_from_slice(&0x0100u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(b"SFAT");
        bytes.extend_from_slice(&0x0Cu16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&0x65u32.to_be_bytes());
        bytes.extend_from_slice(&hash_name("a.bin", 0x65).to_be_bytes());
        bytes.extend_from_slice(&0x0100_0000u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&3u32.to_be_bytes());
        bytes.extend_from_slice(b"SFNT");
        bytes.extend_from_slice(&8u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(name);
        bytes.extend_from_slice(&[9, 8, 7]);

        let root = read(&bytes)?;
        assert_eq!(root.files, vec![File::new("a.bin", vec![9, 8, 7])]);
        Ok(())
    }

    #[test]
    fn unnamed_entries_get_hash_names() -> Result<()> {
        let mut bytes = write(&sample(), &SarcWriterOptions::default())?;
        // clear the name attribute of the first entry
        bytes[0x24..0x28].copy_from_slice(&[0, 0, 0, 0]);
        let hash = u32::from_le_bytes([bytes[0x20], bytes[0x21], bytes[0x22], bytes[0x23]]);

        let root = read(&bytes)?;
        assert!(root.file(&format!("0x{hash:08X}")).is_some());
        Ok(())
    }

    #[test]
    fn rejects_missing_byte_order_mark() -> Result<()> {
        let mut bytes = write(&sample(), &SarcWriterOptions::default())?;
        bytes[6] = 0;
        assert!(matches!(read(&bytes), Err(Error::InvalidArchive("SARC"))));
        Ok(())
    }
}
