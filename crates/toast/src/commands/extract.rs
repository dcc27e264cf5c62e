use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use toast_archive::{compression, Container};
use tracing::info;

use super::create_file;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let data = std::fs::read(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", self.file.display()))?;
        let (compression, payload) = compression::decompress_any(&data)?;
        let container = Container::detect(&payload)
            .ok_or(miette!("{} is not a U8 or SARC archive", self.file.display()))?;
        let tree = container.read(&payload)?;
        info!("extracting {container} archive ({compression})");

        for (name, file) in tree.walk() {
            let name = name.strip_prefix("./").unwrap_or(&name);
            let p = self.directory.join(name);
            info!("writing {}", p.display());

            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .context(format!("creating {}", parent.display()))?;
            }
            create_file(&p, self.overwrite)?
                .write_all(&file.data)
                .into_diagnostic()
                .context(format!("writing {}", p.display()))?;
        }
        Ok(())
    }
}
