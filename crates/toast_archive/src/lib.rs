//! This library handles reading from and creating the archives that hold the cell animation data of
//! Wii (RVL) and 3DS (CTR) titles.
//!
//! # Archive Format Documentation
//!
//! A cellanim archive is a directory tree packed into one of two containers, which in turn is
//! usually wrapped by a whole-file compression layer:
//!
//! | Platform | Wrapper                  | Container | Extension      |
//! |----------|--------------------------|-----------|----------------|
//! | RVL      | Yaz0                     | U8        | `.szs`         |
//! | CTR      | size prefixed zlib       | SARC      | `.zlib`        |
//!
//! ## Wrappers
//!
//! - **Yaz0**: a 16 byte header (`"Yaz0"`, big endian payload size, 8 reserved bytes) followed by
//!   LZ77 style groups, see [`compression::yaz0`].
//! - **zlib**: a big endian payload size followed by a zlib stream, see [`compression::zlib`].
//!
//! ## U8
//!
//! | Offset (bytes) | Field              | Description                                        |
//! |----------------|--------------------|----------------------------------------------------|
//! | 0x0000         | Magic number       | 4 bytes: 0x55AA382D                                |
//! | 0x0004         | Node Section Start | 4 bytes: always 0x20                               |
//! | 0x0008         | Node Section Size  | 4 bytes: node table plus string pool               |
//! | 0x000C         | Data Section Start | 4 bytes: 32 aligned                                |
//! | 0x0010         | Reserved           | 16 bytes                                           |
//! | 0x0020         | Nodes              | 12 bytes each, the root first                      |
//!
//! Each node packs its type in the top byte of the first word and its name offset in the low 24
//! bits. File nodes hold the payload offset and size, directory nodes the index of their parent and
//! the index of the first node past their subtree.
//!
//! ## SARC
//!
//! | Offset (bytes) | Field          | Description                                         |
//! |----------------|----------------|-----------------------------------------------------|
//! | 0x0000         | SARC header    | 0x14 bytes: byte order mark, file size, data offset |
//! | 0x0014         | SFAT           | 0x0C byte header then 0x10 byte entries             |
//! | ...            | SFNT           | 0x08 byte header then the name table                |
//! | data_offset    | Data           | payloads, 0x80 aligned section                      |
//!
//! Entries are sorted by the multiplicative hash of their full path.
//!
//! ## Additional Information
//!
//! - **Endianness**: U8 is big endian, SARC follows its byte order mark (written little endian)
//! - Both containers are decoded into the same [`tree::Directory`] model.

pub mod compression;
pub mod error;
pub mod sarc;
pub mod tree;
pub mod types;
pub mod u8_archive;

pub use compression::Compression;
pub use sarc::SarcWriterOptions;
pub use tree::{Directory, File};

/// Container found inside a (decompressed) archive
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Container {
    /// U8, used by Wii titles
    U8,
    /// SARC, used by 3DS titles
    Sarc,
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Container::U8 => write!(f, "u8"),
            Container::Sarc => write!(f, "sarc"),
        }
    }
}

impl Container {
    /// Identify the container from its magic
    pub fn detect(data: &[u8]) -> Option<Container> {
        if u8_archive::is_u8(data) {
            Some(Container::U8)
        } else if sarc::is_sarc(data) {
            Some(Container::Sarc)
        } else {
            None
        }
    }

    /// Parse `data` with this container
    pub fn read(self, data: &[u8]) -> error::Result<Directory> {
        match self {
            Container::U8 => u8_archive::read(data),
            Container::Sarc => sarc::read(data),
        }
    }

    /// Serialize `root` with this container and its default options
    pub fn write(self, root: &Directory) -> error::Result<Vec<u8>> {
        match self {
            Container::U8 => u8_archive::write(root),
            Container::Sarc => sarc::write(root, &SarcWriterOptions::default()),
        }
    }
}
