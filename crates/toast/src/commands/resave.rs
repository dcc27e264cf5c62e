use std::path::PathBuf;

use clap::Args;
use miette::{miette, Result};
use tracing::{info, warn};

use crate::app::AppContext;
use crate::config::Config;
use crate::session::{BackupMode, ExportOptions};

#[derive(Args)]
pub struct ResaveArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Where to write the archive, the input when unset
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// What happens to the file being replaced, overrides the configuration
    #[arg(long, value_enum)]
    backup: Option<BackupMode>,

    /// Compression level, 0 to 9, overrides the configuration
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=9))]
    level: Option<u32>,
}

impl ResaveArgs {
    pub fn handle(&self, config: &Config) -> Result<()> {
        let app = AppContext::new(config.clone());
        app.open_async(&self.file)?;
        app.wait_idle();

        if let Some(prompt) = app.take_prompts().into_iter().next() {
            return Err(miette!("{prompt}"));
        }

        let report = app
            .sessions
            .with_current(|session| {
                let mut options =
                    ExportOptions::from_config(&app.config, session.document.compression);
                if let Some(backup) = self.backup {
                    options.backup = backup;
                }
                if let Some(level) = self.level {
                    options.level = level;
                }
                let path = self.output.clone().unwrap_or_else(|| session.path.clone());
                session.save_as(&path, &options)
            })
            .ok_or(miette!("{} was not opened", self.file.display()))??;

        for downscale in &report.downscaled {
            warn!(
                "{} was downscaled from {:?} to {:?}",
                downscale.path, downscale.from, downscale.to
            );
        }
        if let Some(backup) = &report.backup {
            info!("previous archive kept as {}", backup.display());
        }
        Ok(())
    }
}
