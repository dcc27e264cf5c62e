//! Configuration management (`toast.json`)
//!
//! Settings are stored as JSON. A missing file means every setting keeps its default; missing
//! keys do the same, so older files keep loading.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::session::BackupMode;

/// File looked for when no configuration path is given
pub const DEFAULT_FILE_NAME: &str = "toast.json";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// What happens to an archive before it is overwritten
    #[serde(default)]
    pub backup_mode: BackupMode,

    /// Yaz0 search depth, 0 (store only) to 9
    #[serde(default = "default_level")]
    pub yaz0_level: u32,

    /// zlib level, 0 to 9
    #[serde(default = "default_level")]
    pub zlib_level: u32,

    /// Worker threads used to encode ETC1 textures, all cores when unset
    #[serde(default)]
    pub etc1_threads: Option<usize>,
}

fn default_level() -> u32 {
    9
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backup_mode: BackupMode::default(),
            yaz0_level: default_level(),
            zlib_level: default_level(),
            etc1_threads: None,
        }
    }
}

impl Config {
    /// Load `path`, falling back to the defaults when it does not exist
    pub fn load(path: &Path) -> Result<Config> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no configuration at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(Error::ConfigIo {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|source| Error::ConfigParse {
            path: path.to_owned(),
            source,
        })?;
        fs::write(path, text + "\n").map_err(|source| Error::ConfigIo {
            path: path.to_owned(),
            source,
        })?;
        info!("wrote configuration to {}", path.display());
        Ok(())
    }
}
