//! Writing a [`Document`] back into an archive.

use std::fs;
use std::path::Path;

use bon::Builder;
use toast_archive::{compression::Compression, File};
use toast_cellanim::{labels, ted, EditorMetadata, Platform};
use toast_texture::{ctpk::Downscale, CtpkWriteOptions};
use tracing::{info, instrument, warn};

use super::backup::{backup, BackupMode};
use super::open::{Document, Textures, TPL_NAME};
use crate::config::Config;
use crate::error::{Error, Result};

/// Options for how an archive is exported
#[derive(Debug, Clone, Builder)]
pub struct ExportOptions {
    #[builder(default)]
    pub backup: BackupMode,

    /// Compression level, 0 to 9
    #[builder(default = 9)]
    pub level: u32,

    /// Workers used for ETC1 encoding, the machine's parallelism when unset
    pub etc1_threads: Option<usize>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions::builder().build()
    }
}

impl ExportOptions {
    /// Options from the configuration, picking the level of `compression`
    pub fn from_config(config: &Config, compression: Compression) -> Self {
        let level = match compression {
            Compression::Zlib => config.zlib_level,
            Compression::Yaz0 | Compression::None => config.yaz0_level,
        };
        ExportOptions {
            backup: config.backup_mode,
            level,
            etc1_threads: config.etc1_threads,
        }
    }
}

/// Side results of an export
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Textures scaled down to fit the console limits
    pub downscaled: Vec<Downscale>,

    /// Copy of the previous archive
    pub backup: Option<std::path::PathBuf>,
}

impl Document {
    /// Serialize, pack and compress the document
    ///
    /// The tree of the document is updated with the regenerated files.
    #[instrument(skip_all, fields(platform = %self.platform), err)]
    pub fn to_bytes(&mut self, options: &ExportOptions) -> Result<(Vec<u8>, ExportReport)> {
        let mut report = ExportReport::default();
        let root_name = self.root_name();

        let metadata = EditorMetadata::collect(&self.cellanims)
            .map_err(|e| Error::cellanim(ted::FILE_NAME, e))?;

        let mut files = Vec::new();
        for cellanim in &self.cellanims {
            let name = cellanim.file_name();
            let data = cellanim.write().map_err(|e| Error::cellanim(&name, e))?;
            files.push(File::new(name, data));
        }

        let root = self
            .tree
            .directory_mut(root_name)
            .ok_or(Error::RootDirectoryMissing(root_name))?;

        if self.platform == Platform::Rvl {
            for cellanim in &self.cellanims {
                let label_name = labels::file_name(&cellanim.name);
                let named = cellanim.animations.iter().any(|a| !a.name.is_empty());
                if named || root.file(&label_name).is_some() {
                    let data = labels::generate(&cellanim.animations)
                        .map_err(|e| Error::cellanim(&label_name, e))?;
                    files.push(File::new(label_name, data));
                }
            }
        }

        match &mut self.textures {
            Textures::Rvl(tpl) => {
                let data = tpl.write().map_err(|e| Error::texture(TPL_NAME, e))?;
                files.push(File::new(TPL_NAME, data));
            }
            Textures::Ctr(sheets) => {
                let ctpk_options = CtpkWriteOptions {
                    threads: options.etc1_threads,
                };
                for (name, ctpk) in sheets.iter_mut() {
                    let (data, ctpk_report) = ctpk
                        .write(&ctpk_options)
                        .map_err(|e| Error::texture(name.as_str(), e))?;
                    for downscale in &ctpk_report.downscaled {
                        warn!(
                            sheet = %name,
                            texture = %downscale.path,
                            "texture was downscaled from {:?} to {:?}",
                            downscale.from,
                            downscale.to
                        );
                    }
                    report.downscaled.extend(ctpk_report.downscaled);
                    files.push(File::new(name.clone(), data));
                }
            }
        }

        for file in files {
            root.insert_file(file);
        }

        if self.legacy_sidecar {
            root.remove_file(ted::LEGACY_FILE_NAME);
            info!("replaced legacy sidecar with {}", ted::FILE_NAME);
        }
        if metadata.is_empty() {
            root.remove_file(ted::FILE_NAME);
        } else {
            let data = metadata
                .write()
                .map_err(|e| Error::cellanim(ted::FILE_NAME, e))?;
            root.insert_file(File::new(ted::FILE_NAME, data));
        }
        self.legacy_sidecar = false;

        let payload = self
            .container
            .write(&self.tree)
            .map_err(Error::ArchiveWrite)?;
        let data = self
            .compression
            .compress(&payload, options.level)
            .map_err(Error::Compression)?;
        Ok((data, report))
    }
}

/// Export `document` to `path`, backing up the file already there
///
/// Nothing is written when any step fails, including the backup.
pub fn export(document: &mut Document, path: &Path, options: &ExportOptions) -> Result<ExportReport> {
    let (data, mut report) = document.to_bytes(options)?;
    report.backup = backup(path, options.backup)?;

    fs::write(path, &data).map_err(|source| Error::DestinationOpen {
        path: path.to_owned(),
        source,
    })?;
    info!("exported {} ({} bytes)", path.display(), data.len());
    Ok(report)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use toast_archive::compression::Compression;

    use super::ExportOptions;
    use crate::config::Config;
    use crate::session::BackupMode;

    #[test]
    fn options_follow_the_configuration() {
        let config = Config {
            backup_mode: BackupMode::Overwrite,
            yaz0_level: 4,
            zlib_level: 6,
            etc1_threads: Some(2),
        };

        let yaz0 = ExportOptions::from_config(&config, Compression::Yaz0);
        assert_eq!(yaz0.level, 4);
        assert_eq!(yaz0.backup, BackupMode::Overwrite);
        assert_eq!(yaz0.etc1_threads, Some(2));
        assert_eq!(ExportOptions::from_config(&config, Compression::Zlib).level, 6);

        let defaults = ExportOptions::default();
        assert_eq!((defaults.level, defaults.backup), (9, BackupMode::Save));
    }
}
