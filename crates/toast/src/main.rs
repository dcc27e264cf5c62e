use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use miette::{IntoDiagnostic, Result};
use toast::config::{self, Config};
use tracing_log::AsTrace;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: toast::commands::Commands,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// Configuration file
    #[arg(long, global = true, value_name = "FILE", default_value = config::DEFAULT_FILE_NAME)]
    config: PathBuf,

    /// Threads used to encode ETC1 textures, overrides the configuration
    #[arg(long, global = true, value_name = "COUNT")]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    better_panic::install();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(std::io::stdout().is_terminal())
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .without_time()
                .compact(),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(cli.verbose.log_level_filter().as_trace().into())
                .from_env_lossy(),
        )
        .try_init()
        .into_diagnostic()?;

    let mut config = Config::load(&cli.config)?;
    if cli.threads.is_some() {
        config.etc1_threads = cli.threads;
    }

    cli.command.handle(&config, &cli.config)
}
