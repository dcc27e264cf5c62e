use std::path::PathBuf;

use clap::Args;
use itertools::Itertools;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use toast_cellanim::CellAnim;

use crate::session::{self, Document, Textures};

#[derive(Args)]
pub struct InfoArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// List every animation by name
    #[arg(short, long, default_value_t = false)]
    animations: bool,
}

impl InfoArgs {
    fn describe_cellanim(&self, document: &Document, index: usize, cellanim: &CellAnim) -> String {
        let sheet = match &document.textures {
            Textures::Rvl(_) => format!("texture {}", cellanim.sheet_index),
            Textures::Ctr(_) => document
                .sheet_files
                .get(index)
                .and_then(Option::as_deref)
                .unwrap_or("no sheet")
                .to_string(),
        };
        let parts = cellanim
            .arrangements
            .iter()
            .map(|a| a.parts.len())
            .sum::<usize>();

        let mut text = format!(
            "{} ({}x{}, {})\n  {} arrangements, {} parts, {} animations",
            cellanim.name.bold(),
            cellanim.sheet_width,
            cellanim.sheet_height,
            sheet.cyan(),
            cellanim.arrangements.len(),
            parts,
            cellanim.animations.len(),
        );

        if self.animations {
            let names = cellanim
                .animations
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    let name = if a.name.is_empty() {
                        format!("{}", "(unnamed)".dimmed())
                    } else {
                        format!("{}", a.name.green())
                    };
                    format!("    {i:>3} {name} {} frames", a.duration())
                })
                .join("\n");
            text.push('\n');
            text.push_str(&names);
        }
        text
    }

    fn describe_sheets(textures: &Textures) -> String {
        match textures {
            Textures::Rvl(tpl) => tpl
                .textures
                .iter()
                .enumerate()
                .map(|(i, t)| format!("  {i:>3} {}x{} {:?}", t.width, t.height, t.format))
                .join("\n"),
            Textures::Ctr(sheets) => sheets
                .iter()
                .flat_map(|(name, ctpk)| {
                    ctpk.textures.iter().map(move |t| {
                        format!(
                            "  {} {} {}x{} {:?}",
                            name,
                            t.path().dimmed(),
                            t.width(),
                            t.height(),
                            t.format()
                        )
                    })
                })
                .join("\n"),
        }
    }

    pub fn handle(&self) -> Result<()> {
        let document =
            session::open(&self.file).context(format!("opening {}", self.file.display()))?;

        println!(
            "{} {} archive, {} in {}",
            self.file.display().bold(),
            document.platform.yellow(),
            document.container,
            document.compression
        );
        for (index, cellanim) in document.cellanims.iter().enumerate() {
            println!("{}", self.describe_cellanim(&document, index, cellanim));
        }
        println!("{}", "sheets".bold());
        println!("{}", Self::describe_sheets(&document.textures));
        if document.legacy_sidecar {
            println!(
                "{}",
                "editor metadata uses the legacy format and is upgraded on export".yellow()
            );
        }
        Ok(())
    }
}
