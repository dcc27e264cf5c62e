//! Base types for the structure of U8 and SARC files.

use binrw::{BinRead, BinWrite};

/// U8 magic as it appears on disk
pub const U8_MAGIC: [u8; 4] = [0x55, 0xAA, 0x38, 0x2D];

/// U8 file header
///
/// All data is stored in big endian format
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"\x55\xAA\x38\x2D", big)]
pub struct U8Header {
    /// Offset from the start of the file to the root node
    pub node_section_start: u32,

    /// Size of the node table plus the string pool
    pub node_section_size: u32,

    /// Offset from the start of the file to the first file payload
    pub data_section_start: u32,

    /// Always zero
    pub reserved: [u8; 16],
}

impl Default for U8Header {
    fn default() -> Self {
        Self {
            node_section_start: 0x20,
            node_section_size: Default::default(),
            data_section_start: Default::default(),
            reserved: Default::default(),
        }
    }
}

/// U8 node
///
/// The first word packs the node type in its top byte and the name offset (relative to the string
/// pool) in the low 24 bits. Directory nodes reuse the other two words for the parent index and the
/// index of the first node after their subtree.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big)]
pub struct U8Node {
    /// Node type (top byte) and name offset (low 24 bits)
    pub type_name: u32,

    /// Data offset for files, parent index for directories
    pub data_offset: u32,

    /// Data size for files, index past the end of the subtree for directories
    pub size: u32,
}

impl U8Node {
    const DIRECTORY: u32 = 0x0100_0000;
    const NAME_MASK: u32 = 0x00FF_FFFF;

    pub fn file(name_offset: u32, data_offset: u32, size: u32) -> Self {
        U8Node {
            type_name: name_offset & Self::NAME_MASK,
            data_offset,
            size,
        }
    }

    pub fn directory(name_offset: u32, parent: u32, next_out_of_directory: u32) -> Self {
        U8Node {
            type_name: Self::DIRECTORY | (name_offset & Self::NAME_MASK),
            data_offset: parent,
            size: next_out_of_directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.type_name >> 24 != 0
    }

    pub fn name_offset(&self) -> u32 {
        self.type_name & Self::NAME_MASK
    }

    /// Index of the first node that is not part of this directory
    pub fn next_out_of_directory(&self) -> u32 {
        self.size
    }
}

/// SARC file header
///
/// The byte order is selected by the byte order mark, so these structures are read and written with
/// an explicit [`binrw::Endian`].
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"SARC")]
pub struct SarcHeader {
    pub header_size: u16,
    pub bom: u16,
    pub file_size: u32,
    pub data_offset: u32,
    pub version: u16,
    pub reserved: u16,
}

impl SarcHeader {
    pub const SIZE: u16 = 0x14;
    pub const BOM: u16 = 0xFEFF;
    pub const VERSION: u16 = 0x0100;
}

/// SARC file allocation table header
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"SFAT")]
pub struct SfatHeader {
    pub header_size: u16,
    pub node_count: u16,
    pub hash_key: u32,
}

impl SfatHeader {
    pub const SIZE: u16 = 0x0C;
}

/// SARC file allocation table entry
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
pub struct SfatEntry {
    /// Hash of the full path, see [`crate::sarc::hash_name`]
    pub name_hash: u32,

    /// Flag byte plus the name offset in 4 byte units
    pub name_attr: u32,

    /// Start of the payload relative to the data section
    pub data_start: u32,

    /// End of the payload relative to the data section
    pub data_end: u32,
}

impl SfatEntry {
    pub const SIZE: u32 = 0x10;
    const HAS_NAME: u32 = 0x0100_0000;

    pub fn has_name(&self) -> bool {
        self.name_attr & 0xFF00_0000 != 0
    }

    /// Offset of the name in bytes from the start of the name table
    pub fn name_offset(&self) -> usize {
        (self.name_attr & 0x00FF_FFFF) as usize * 4
    }

    pub fn name_attr_for(offset: usize) -> u32 {
        Self::HAS_NAME | ((offset / 4) as u32 & 0x00FF_FFFF)
    }
}

/// SARC file name table header
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"SFNT")]
pub struct SfntHeader {
    pub header_size: u16,
    pub reserved: u16,
}

impl SfntHeader {
    pub const SIZE: u16 = 0x08;
}
