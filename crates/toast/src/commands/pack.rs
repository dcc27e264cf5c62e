use std::io::Write;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use miette::{miette, Context, IntoDiagnostic, Result};
use toast_archive::{Compression, Container, Directory, File};
use tracing::info;
use walkdir::WalkDir;

use super::create_file;
use crate::config::Config;
use crate::session::open::RVL_ROOT;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    /// U8 in Yaz0, as read by Wii titles
    #[default]
    Szs,
    /// SARC in size prefixed zlib, as read by 3DS titles
    Zlib,
    /// U8 without compression
    U8,
    /// SARC without compression
    Sarc,
}

impl Format {
    fn container(self) -> Container {
        match self {
            Format::Szs | Format::U8 => Container::U8,
            Format::Zlib | Format::Sarc => Container::Sarc,
        }
    }

    fn compression(self) -> Compression {
        match self {
            Format::Szs => Compression::Yaz0,
            Format::Zlib => Compression::Zlib,
            Format::U8 | Format::Sarc => Compression::None,
        }
    }
}

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Archive format
    #[arg(long, value_enum, default_value_t = Format::Szs)]
    format: Format,

    /// Compression level, 0 to 9; the configured level when unset
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=9))]
    level: Option<u32>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    fn collect(&self) -> Result<Directory> {
        let mut root = Directory::default();
        // U8 archives keep their files under a "." directory
        let base = match self.format.container() {
            Container::U8 => root.directory_or_create(RVL_ROOT),
            Container::Sarc => &mut root,
        };

        let files = WalkDir::new(&self.directory)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();
        if files.is_empty() {
            return Err(miette!("directory is empty"));
        }

        for entry in files {
            let name = entry
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;
            let name = name
                .to_str()
                .ok_or(miette!("unable to convert {} to a string", name.display()))?
                .replace('\\', "/");
            info!("packing {name}");

            let data = std::fs::read(entry.path())
                .into_diagnostic()
                .context(format!("reading {}", entry.path().display()))?;
            let (parent, file_name) = match name.rsplit_once('/') {
                Some((parent, file_name)) => (
                    parent
                        .split('/')
                        .fold(&mut *base, |dir, part| dir.directory_or_create(part)),
                    file_name,
                ),
                None => (&mut *base, name.as_str()),
            };
            parent.insert_file(File::new(file_name, data));
        }

        root.sort();
        Ok(root)
    }

    pub fn handle(&self, config: &Config) -> Result<()> {
        let root = self.collect()?;
        let compression = self.format.compression();
        let level = self.level.unwrap_or(match compression {
            Compression::Zlib => config.zlib_level,
            Compression::Yaz0 | Compression::None => config.yaz0_level,
        });

        info!("creating {}", self.file.display());
        let payload = self.format.container().write(&root)?;
        let data = compression.compress(&payload, level)?;

        create_file(&self.file, self.overwrite)?
            .write_all(&data)
            .into_diagnostic()
            .context(format!("writing {}", self.file.display()))
    }
}
