//! Command-line surface: parses one of the three scrape operations and hands it to the
//! [`synchronise`] pipeline. All business logic lives in the library modules.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::load_config::load_config;
use crate::synchronise::{synchronise, Mode};

/// CLI for sharepoint-scrape: pull SharePoint pages and files into a local data directory.
#[derive(Parser)]
#[clap(
    name = "sharepoint-scrape",
    version,
    about = "Scrape SharePoint site pages and document-library files via Microsoft Graph"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract the text of every site page into <output_dir>/pages
    #[clap(name = "scrape_pages")]
    ScrapePages(RunArgs),
    /// Download supported files from the site's document drive into <output_dir>/files
    #[clap(name = "scrape_files")]
    ScrapeFiles(RunArgs),
    /// Scrape pages, then files
    #[clap(name = "scrape_all")]
    ScrapeAll(RunArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Optional YAML settings file (retry policy, timeouts, output directory)
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Output directory; overrides `output_dir` from the settings file
    #[clap(long)]
    pub output_dir: Option<PathBuf>,
}

impl Commands {
    pub fn mode(&self) -> Mode {
        match self {
            Commands::ScrapePages(_) => Mode::Pages,
            Commands::ScrapeFiles(_) => Mode::Files,
            Commands::ScrapeAll(_) => Mode::All,
        }
    }

    pub fn args(&self) -> &RunArgs {
        match self {
            Commands::ScrapePages(args) | Commands::ScrapeFiles(args) | Commands::ScrapeAll(args) => {
                args
            }
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let mode = cli.command.mode();
    let args = cli.command.args().clone();

    let mut config = load_config(args.config.as_ref())?;
    if let Some(output_dir) = args.output_dir {
        config.settings.output_dir = output_dir;
    }

    tracing::info!(?mode, "Starting scrape");
    match synchronise(&config, mode).await {
        Ok(summary) => {
            println!("Scrape complete.\n{summary}");
            tracing::info!(?summary, "Scrape complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Scrape failed");
            Err(anyhow::Error::new(e))
        }
    }
}
