//! Backup copies made before an export overwrites an archive.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// What happens to an existing archive before it is overwritten
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    /// Overwrite without a copy
    None,

    /// Copy to `<path>.bak` unless a backup already exists
    #[default]
    Save,

    /// Copy to `<path>.bak`, replacing an older backup
    Overwrite,
}

/// `<path>.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Back up `path` according to `mode`, returning the copy when one was made
///
/// Nothing happens when `path` does not exist yet.
pub fn backup(path: &Path, mode: BackupMode) -> Result<Option<PathBuf>> {
    if mode == BackupMode::None || !path.exists() {
        return Ok(None);
    }

    let destination = backup_path(path);
    if mode == BackupMode::Save && destination.is_file() {
        debug!("keeping existing backup {}", destination.display());
        return Ok(None);
    }

    fs::copy(path, &destination).map_err(|source| Error::BackupFailed {
        path: destination.clone(),
        source,
    })?;
    info!("backed up {} to {}", path.display(), destination.display());
    Ok(Some(destination))
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::{backup, backup_path, BackupMode};
    use crate::error::{Error, Result};

    #[test]
    fn appends_to_the_full_name() {
        assert_eq!(
            backup_path(Path::new("dir/cellanim.szs")),
            Path::new("dir/cellanim.szs.bak")
        );
    }

    #[test]
    fn modes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("archive.szs");
        let bak = backup_path(&path);

        // nothing to back up yet
        assert_eq!(backup(&path, BackupMode::Overwrite)?, None);

        fs::write(&path, b"first")?;
        assert_eq!(backup(&path, BackupMode::None)?, None);
        assert!(!bak.exists());

        assert_eq!(backup(&path, BackupMode::Save)?, Some(bak.clone()));
        fs::write(&path, b"second")?;

        assert_eq!(backup(&path, BackupMode::Save)?, None);
        assert_eq!(fs::read(&bak)?, b"first");

        assert_eq!(backup(&path, BackupMode::Overwrite)?, Some(bak.clone()));
        assert_eq!(fs::read(&bak)?, b"second");
        Ok(())
    }

    #[test]
    fn failed_copy_is_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("archive.szs");
        fs::write(&path, b"data")?;
        fs::create_dir(backup_path(&path))?;

        assert!(matches!(
            backup(&path, BackupMode::Overwrite),
            Err(Error::BackupFailed { .. })
        ));
        Ok(())
    }

    #[test]
    fn save_only_keeps_a_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("archive.szs");
        fs::write(&path, b"data")?;
        fs::create_dir(backup_path(&path))?;

        assert!(matches!(
            backup(&path, BackupMode::Save),
            Err(Error::BackupFailed { .. })
        ));
        Ok(())
    }
}
