use std::path::Path;

use miette::{miette, IntoDiagnostic, Result};
use tracing::info;

use crate::config::Config;

#[derive(clap::Subcommand)]
pub enum ConfigCommands {
    /// Print the configuration in effect
    Show,
    /// Write the default configuration
    Init {
        /// Allow overwriting an existing configuration
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
}

impl ConfigCommands {
    pub fn handle(&self, config: &Config, path: &Path) -> Result<()> {
        match self {
            ConfigCommands::Show => {
                println!("{}", serde_json::to_string_pretty(config).into_diagnostic()?);
                Ok(())
            }
            ConfigCommands::Init { overwrite } => {
                if path.exists() && !overwrite {
                    return Err(miette!("{} already exists", path.display()));
                }
                Config::default().save(path)?;
                info!("wrote {}", path.display());
                Ok(())
            }
        }
    }
}
