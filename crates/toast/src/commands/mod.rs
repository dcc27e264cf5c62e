use std::path::Path;

use crate::config::Config;

pub mod config;
pub mod extract;
pub mod info;
pub mod pack;
pub mod resave;
pub mod sheets;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Describe the cellanims and sheets of an archive
    Info(info::InfoArgs),
    /// Extract every file of an archive into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into an archive
    Pack(pack::PackArgs),
    /// Decode the sheets of an archive to PNG files
    Sheets(sheets::SheetsArgs),
    /// Open an archive and export it again
    Resave(resave::ResaveArgs),
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

impl Commands {
    pub fn handle(&self, config: &Config, config_path: &Path) -> miette::Result<()> {
        match self {
            Commands::Info(info) => info.handle(),
            Commands::Extract(extract) => extract.handle(),
            Commands::Pack(pack) => pack.handle(config),
            Commands::Sheets(sheets) => sheets.handle(),
            Commands::Resave(resave) => resave.handle(config),
            Commands::Config { command } => command.handle(config, config_path),
        }
    }
}

/// Create `path`, refusing to replace an existing file unless `overwrite` is set
pub(crate) fn create_file(path: &Path, overwrite: bool) -> miette::Result<std::fs::File> {
    use miette::{Context, IntoDiagnostic};

    let file = if overwrite {
        std::fs::File::create(path)
    } else {
        std::fs::File::create_new(path)
    };
    file.into_diagnostic()
        .context(format!("creating {}", path.display()))
}
