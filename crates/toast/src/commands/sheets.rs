use std::io::BufWriter;
use std::path::PathBuf;

use clap::Args;
use image::{ImageFormat, RgbaImage};
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::info;

use super::create_file;
use crate::session::{self, Textures};

#[derive(Args)]
pub struct SheetsArgs {
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

impl SheetsArgs {
    fn write_png(&self, name: &str, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
        let image = RgbaImage::from_raw(width, height, rgba.to_vec())
            .ok_or(miette!("{name} holds less pixel data than {width}x{height}"))?;

        let p = self.directory.join(name);
        info!("writing {}", p.display());
        let mut out = BufWriter::new(create_file(&p, self.overwrite)?);
        image
            .write_to(&mut out, ImageFormat::Png)
            .into_diagnostic()
            .context(format!("encoding {}", p.display()))
    }

    pub fn handle(&self) -> Result<()> {
        let document =
            session::open(&self.file).context(format!("opening {}", self.file.display()))?;
        std::fs::create_dir_all(&self.directory)
            .into_diagnostic()
            .context(format!("creating {}", self.directory.display()))?;

        match &document.textures {
            Textures::Rvl(tpl) => {
                for (index, texture) in tpl.textures.iter().enumerate() {
                    self.write_png(
                        &format!("sheet_{index}.png"),
                        texture.width,
                        texture.height,
                        &texture.rgba,
                    )?;
                }
            }
            Textures::Ctr(sheets) => {
                for (name, ctpk) in sheets {
                    let stem = name.rsplit_once('.').map_or(name.as_str(), |(s, _)| s);
                    for (index, texture) in ctpk.textures.iter().enumerate() {
                        let file_name = if ctpk.textures.len() == 1 {
                            format!("{stem}.png")
                        } else {
                            format!("{stem}_{index}.png")
                        };
                        self.write_png(
                            &file_name,
                            texture.width(),
                            texture.height(),
                            texture.rgba(),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}
