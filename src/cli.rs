//! Command-line interface implementation

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::baking::MasterBaker;
use crate::config::{apply_overrides, load_config, BakeTarget, CliOverrides};

/// Exit codes
const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;

/// Resbake - bake game resource packs into engine-ready artifacts
#[derive(Parser)]
#[command(name = "resbake")]
#[command(about = "Resbake - bake game resource packs into engine-ready artifacts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full bake over every configured resource pack
    Bake {
        /// Path to resbake.toml (discovered by walking up when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Delete all outputs and rebake everything
        #[arg(long)]
        force: bool,

        /// Run fully sequentially for deterministic debugging
        #[arg(long)]
        single_thread: bool,

        /// Bake only packs for this engine side
        #[arg(long, value_enum)]
        target: Option<CliTarget>,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// List configured resource packs and their bakers
    Packs {
        /// Path to resbake.toml (discovered by walking up when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// CLI mirror of [`BakeTarget`].
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliTarget {
    All,
    Server,
    Client,
    Mapper,
}

impl From<CliTarget> for BakeTarget {
    fn from(target: CliTarget) -> Self {
        match target {
            CliTarget::All => BakeTarget::All,
            CliTarget::Server => BakeTarget::Server,
            CliTarget::Client => BakeTarget::Client,
            CliTarget::Mapper => BakeTarget::Mapper,
        }
    }
}

fn init_logger(verbose: bool) {
    env_logger::Builder::new()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();
}

/// Parse arguments and dispatch. Returns the process exit code.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bake { config, out, force, single_thread, target, verbose } => {
            init_logger(verbose);

            let overrides = CliOverrides {
                out,
                force: force.then_some(true),
                single_thread: single_thread.then_some(true),
                target: target.map(BakeTarget::from),
            };

            let settings = match load_config(config.as_deref())
                .and_then(|settings| apply_overrides(settings, &overrides))
            {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::from(EXIT_ERROR);
                }
            };

            if MasterBaker::new(Arc::new(settings)).bake_all() {
                ExitCode::from(EXIT_SUCCESS)
            } else {
                ExitCode::from(EXIT_ERROR)
            }
        }
        Commands::Packs { config } => {
            init_logger(false);

            match load_config(config.as_deref()) {
                Ok(settings) => {
                    for pack in &settings.packs {
                        println!(
                            "{} [{:?}]: {}",
                            pack.name,
                            pack.side(),
                            pack.bakers.join(", ")
                        );
                    }
                    ExitCode::from(EXIT_SUCCESS)
                }
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::from(EXIT_ERROR)
                }
            }
        }
    }
}
