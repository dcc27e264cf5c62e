//! In-memory directory tree shared by the U8 and SARC codecs.

use std::fmt;

use crate::error::{Error, FileNotFoundError, Result};

/// A named file with its payload
#[derive(Clone, Default, PartialEq, Eq)]
pub struct File {
    /// Name of the file inside its parent directory
    pub name: String,
    /// Contents of the file
    pub data: Vec<u8>,
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "File({:?}, {} bytes)", self.name, self.data.len())
    }
}

impl File {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        File {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Name without the final extension
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(0) | None => &self.name,
            Some(dot) => &self.name[..dot],
        }
    }
}

/// A directory owning files and sub directories
///
/// Names are unique within one directory. The root of an archive has an empty name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    /// Name of the directory inside its parent
    pub name: String,
    /// Files directly inside this directory
    pub files: Vec<File>,
    /// Sub directories of this directory
    pub directories: Vec<Directory>,
}

impl Directory {
    pub fn new(name: impl Into<String>) -> Self {
        Directory {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Number of files in this directory and all of its descendants
    pub fn file_count(&self) -> usize {
        self.files.len()
            + self
                .directories
                .iter()
                .map(Directory::file_count)
                .sum::<usize>()
    }

    /// Number of directories below this one (not counting itself)
    pub fn directory_count(&self) -> usize {
        self.directories.len()
            + self
                .directories
                .iter()
                .map(Directory::directory_count)
                .sum::<usize>()
    }

    /// A direct child file
    pub fn file(&self, name: &str) -> Option<&File> {
        self.files.iter().find(|f| f.name == name)
    }

    /// A direct child directory
    pub fn directory(&self, name: &str) -> Option<&Directory> {
        self.directories.iter().find(|d| d.name == name)
    }

    /// A direct child directory, mutably
    pub fn directory_mut(&mut self, name: &str) -> Option<&mut Directory> {
        self.directories.iter_mut().find(|d| d.name == name)
    }

    /// Get a direct child directory, creating it when missing
    pub fn directory_or_create(&mut self, name: &str) -> &mut Directory {
        match self.directories.iter().position(|d| d.name == name) {
            Some(index) => &mut self.directories[index],
            None => {
                self.directories.push(Directory::new(name));
                let last = self.directories.len() - 1;
                &mut self.directories[last]
            }
        }
    }

    /// Resolve a `/` delimited path one segment at a time
    ///
    /// Returns `None` as soon as one segment is missing.
    pub fn find_file(&self, path: &str) -> Option<&File> {
        match path.split_once('/') {
            Some((head, rest)) => self.directory(head)?.find_file(rest),
            None => self.file(path),
        }
    }

    /// Mutable variant of [`Directory::find_file`]
    pub fn find_file_mut(&mut self, path: &str) -> Option<&mut File> {
        match path.split_once('/') {
            Some((head, rest)) => self.directory_mut(head)?.find_file_mut(rest),
            None => self.files.iter_mut().find(|f| f.name == path),
        }
    }

    /// Resolve a `/` delimited directory path
    pub fn find_directory(&self, path: &str) -> Option<&Directory> {
        match path.split_once('/') {
            Some((head, rest)) => self.directory(head)?.find_directory(rest),
            None => self.directory(path),
        }
    }

    /// Mutable variant of [`Directory::find_directory`]
    pub fn find_directory_mut(&mut self, path: &str) -> Option<&mut Directory> {
        match path.split_once('/') {
            Some((head, rest)) => self.directory_mut(head)?.find_directory_mut(rest),
            None => self.directory_mut(path),
        }
    }

    /// Read a file by path, reporting a typed error when it is missing
    pub fn by_path(&self, path: &str) -> Result<&File> {
        self.find_file(path)
            .ok_or_else(|| Error::FileNotFound(FileNotFoundError::Path(path.to_owned())))
    }

    /// Whether a directory called `name` exists anywhere below this one
    pub fn contains_directory_named(&self, name: &str) -> bool {
        self.directories
            .iter()
            .any(|d| d.name == name || d.contains_directory_named(name))
    }

    /// Add a file, replacing the contents of an existing file with the same name
    pub fn insert_file(&mut self, file: File) {
        match self.files.iter_mut().find(|f| f.name == file.name) {
            Some(existing) => existing.data = file.data,
            None => self.files.push(file),
        }
    }

    /// Remove a direct child file, returning it when it existed
    pub fn remove_file(&mut self, name: &str) -> Option<File> {
        let index = self.files.iter().position(|f| f.name == name)?;
        Some(self.files.remove(index))
    }

    /// Iterate over every file below this directory with its full `/` delimited path
    pub fn walk(&self) -> Vec<(String, &File)> {
        let mut result = Vec::with_capacity(self.file_count());
        self.walk_into("", &mut result);
        result
    }

    fn walk_into<'a>(&'a self, prefix: &str, result: &mut Vec<(String, &'a File)>) {
        for file in &self.files {
            result.push((format!("{prefix}{}", file.name), file));
        }
        for directory in &self.directories {
            directory.walk_into(&format!("{prefix}{}/", directory.name), result);
        }
    }

    /// Sort files and directories by name, recursively
    pub fn sort(&mut self) {
        self.files.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        self.directories
            .sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        self.directories.iter_mut().for_each(Directory::sort);
    }
}
