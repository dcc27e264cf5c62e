//! U8 archive reading and writing
//!
//! | Offset (bytes) | Field              | Description                                          |
//! |----------------|--------------------|------------------------------------------------------|
//! | 0x0000         | Magic number       | 4 bytes: 0x55AA382D                                  |
//! | 0x0004         | Node Section Start | 4 bytes: offset of the root node (always 0x20)       |
//! | 0x0008         | Node Section Size  | 4 bytes: size of the node table and string pool      |
//! | 0x000C         | Data Section Start | 4 bytes: offset of the first payload, 32 aligned     |
//! | 0x0010         | Reserved           | 16 bytes: zero                                       |
//!
//! The node table is a pre-order flattening of the tree where the files of a directory come before
//! its sub directories. Every value is big endian.

use std::io::{Cursor, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::tree::{Directory, File};
use crate::types::{U8Header, U8Node, U8_MAGIC};

const NODE_SIZE: usize = 12;
const NAME_ALIGNMENT: usize = 4;
const DATA_ALIGNMENT: usize = 32;
const MAX_NAME_OFFSET: usize = 0x00FF_FFFF;

pub(crate) fn align(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// Whether `data` starts with the U8 magic
pub fn is_u8(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == U8_MAGIC
}

fn read_name(pool: &[u8], offset: u32) -> Result<String> {
    let name = pool.get(offset as usize..).ok_or(Error::OutOfBounds {
        what: "node name",
        offset: offset as usize,
        size: 0,
    })?;
    let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
    Ok(String::from_utf8_lossy(&name[..end]).into_owned())
}

/// Parse a decompressed U8 archive into a directory tree
///
/// ```
/// # fn doit() -> toast_archive::error::Result<()>
/// # {
/// use toast_archive::tree::{Directory, File};
///
/// let mut root = Directory::default();
/// root.directory_or_create(".").insert_file(File::new("a.bin", vec![1, 2, 3]));
///
/// let bytes = toast_archive::u8_archive::write(&root)?;
/// let parsed = toast_archive::u8_archive::read(&bytes)?;
/// assert_eq!(parsed.find_file("./a.bin").map(|f| f.data.clone()), Some(vec![1, 2, 3]));
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn read(data: &[u8]) -> Result<Directory> {
    if !is_u8(data) {
        return Err(Error::InvalidArchive("U8"));
    }

    let mut cursor = Cursor::new(data);
    let header = U8Header::read(&mut cursor)?;

    let node_start = header.node_section_start as usize;
    cursor.seek(SeekFrom::Start(node_start as u64))?;
    let root = U8Node::read(&mut cursor)?;
    if !root.is_directory() {
        return Err(Error::InvalidArchive("U8"));
    }

    let count = root.next_out_of_directory() as usize;
    let pool_start = node_start + count * NODE_SIZE;
    if count == 0 || pool_start > data.len() {
        return Err(Error::OutOfBounds {
            what: "node table",
            offset: node_start,
            size: count * NODE_SIZE,
        });
    }
    let pool = &data[pool_start..];

    let mut stack = vec![(Directory::new(read_name(pool, root.name_offset())?), count)];

    for index in 1..count {
        let node = U8Node::read(&mut cursor)?;

        close_finished(&mut stack, index);

        let name = read_name(pool, node.name_offset())?;
        let parent_end = stack.last().map_or(count, |(_, end)| *end);

        if node.is_directory() {
            let end = node.next_out_of_directory() as usize;
            if end <= index || end > parent_end {
                return Err(Error::InvalidArchive("U8"));
            }
            stack.push((Directory::new(name), end));
        } else {
            let start = node.data_offset as usize;
            let size = node.size as usize;
            let payload = data
                .get(start..start.saturating_add(size))
                .ok_or(Error::OutOfBounds {
                    what: "file data",
                    offset: start,
                    size,
                })?;

            if let Some((directory, _)) = stack.last_mut() {
                directory.files.push(File::new(name, payload));
            }
        }
    }

    close_finished(&mut stack, count);

    let (root, _) = stack.pop().ok_or(Error::InvalidArchive("U8"))?;
    debug!(
        files = root.file_count(),
        directories = root.directory_count(),
        "read U8 archive"
    );
    Ok(root)
}

/// Pop every open directory whose subtree ends at or before `index`, attaching it to its parent
fn close_finished(stack: &mut Vec<(Directory, usize)>, index: usize) {
    while stack.len() > 1 && stack.last().is_some_and(|(_, end)| *end <= index) {
        if let Some((directory, _)) = stack.pop() {
            if let Some((parent, _)) = stack.last_mut() {
                parent.directories.push(directory);
            }
        }
    }
}

enum FlatKind<'a> {
    Directory { parent: u32, next: u32 },
    File { data: &'a [u8] },
}

struct FlatNode<'a> {
    name: &'a str,
    kind: FlatKind<'a>,
}

struct Frame<'a> {
    directory: &'a Directory,
    index: usize,
    next_file: usize,
    next_directory: usize,
}

/// Flatten the tree in pre-order, files before sub directories
fn flatten(root: &Directory) -> Vec<FlatNode<'_>> {
    let mut nodes = vec![FlatNode {
        name: &root.name,
        kind: FlatKind::Directory { parent: 0, next: 0 },
    }];
    let mut stack = vec![Frame {
        directory: root,
        index: 0,
        next_file: 0,
        next_directory: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let directory = frame.directory;

        if let Some(file) = directory.files.get(frame.next_file) {
            frame.next_file += 1;
            nodes.push(FlatNode {
                name: &file.name,
                kind: FlatKind::File { data: &file.data },
            });
            continue;
        }

        if let Some(child) = directory.directories.get(frame.next_directory) {
            frame.next_directory += 1;
            let parent = frame.index as u32;
            nodes.push(FlatNode {
                name: &child.name,
                kind: FlatKind::Directory { parent, next: 0 },
            });
            stack.push(Frame {
                directory: child,
                index: nodes.len() - 1,
                next_file: 0,
                next_directory: 0,
            });
            continue;
        }

        let closed = frame.index;
        stack.pop();

        // Every directory still open ends at least here, deeper closes patch them again later
        let end = nodes.len() as u32;
        for index in std::iter::once(closed).chain(stack.iter().map(|f| f.index)) {
            if let FlatKind::Directory { next, .. } = &mut nodes[index].kind {
                *next = end;
            }
        }
    }

    nodes
}

/// Serialize a directory tree into an uncompressed U8 archive
#[instrument(skip(root), err)]
pub fn write(root: &Directory) -> Result<Vec<u8>> {
    let nodes = flatten(root);

    let mut pool = Vec::new();
    let mut name_offsets = Vec::with_capacity(nodes.len());
    for node in &nodes {
        pool.resize(align(pool.len(), NAME_ALIGNMENT), 0);
        if pool.len() > MAX_NAME_OFFSET {
            return Err(Error::CustomError(format!(
                "U8 string pool exceeds {MAX_NAME_OFFSET:#x} bytes"
            )));
        }
        name_offsets.push(pool.len() as u32);
        pool.extend_from_slice(node.name.as_bytes());
        pool.push(0);
    }

    let node_section_start = 0x20usize;
    let node_section_size = nodes.len() * NODE_SIZE + pool.len();
    let data_section_start = align(node_section_start + node_section_size, DATA_ALIGNMENT);

    let header = U8Header {
        node_section_start: node_section_start as u32,
        node_section_size: node_section_size as u32,
        data_section_start: data_section_start as u32,
        ..Default::default()
    };

    let mut data_end = data_section_start;
    let mut records = Vec::with_capacity(nodes.len());
    let mut payloads = Vec::new();
    for (node, name_offset) in nodes.iter().zip(name_offsets) {
        let record = match node.kind {
            FlatKind::Directory { parent, next } => U8Node::directory(name_offset, parent, next),
            FlatKind::File { data } => {
                let offset = align(data_end, DATA_ALIGNMENT);
                data_end = offset + data.len();
                payloads.push((offset, data));
                U8Node::file(name_offset, offset as u32, data.len() as u32)
            }
        };
        records.push(record);
    }

    let mut cursor = Cursor::new(Vec::with_capacity(data_end));
    header.write(&mut cursor)?;
    for record in &records {
        record.write(&mut cursor)?;
    }
    cursor.write_all(&pool)?;

    let mut out = cursor.into_inner();
    out.resize(data_section_start, 0);
    for (offset, data) in payloads {
        out.resize(offset, 0);
        out.extend_from_slice(data);
    }

    debug!(nodes = records.len(), size = out.len(), "wrote U8 archive");
    Ok(out)
}
