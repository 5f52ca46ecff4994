//! CLI command definitions and dispatch.
//!
//! Subcommands are implemented in submodules:
//! - `phases`: `run` and the single-phase `extract`, `correct`, `commit`
//! - `init`: writing a default configuration file

mod init;
mod phases;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{self, Config};
use crate::corrector::RunSummary;
use crate::external::ToolRunner;
use crate::metadata::LoftyBackend;

pub use init::cmd_init_config;
pub use phases::{cmd_commit, cmd_correct, cmd_extract, cmd_run};

/// mp3-tidy CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: the OS config directory)
    #[arg(long, global = true, env = "MP3_TIDY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Prepare, extract, correct, review and commit in one go
    Run {
        /// Commit without opening the changes document in an editor
        #[arg(long)]
        no_review: bool,
    },
    /// Prepare the base directory and write the changes document
    Extract,
    /// Apply the text rules to the changes document
    Correct,
    /// Write tags and move files as described by the changes document
    Commit,
    /// Write a default configuration file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::InitConfig { force } => cmd_init_config(cli.config.as_deref(), *force),
        Commands::Run { no_review } => cmd_run(&Session::open(cli)?, !*no_review),
        Commands::Extract => cmd_extract(&Session::open(cli)?),
        Commands::Correct => cmd_correct(&Session::open(cli)?),
        Commands::Commit => cmd_commit(&Session::open(cli)?),
    }
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Everything a phase needs: validated config, collaborators and the abort
/// flag set by Ctrl-C.
pub struct Session {
    pub config: Config,
    pub backend: LoftyBackend,
    pub runner: ToolRunner,
    pub abort: Arc<AtomicBool>,
}

impl Session {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let config = config::load(cli.config.as_deref())?;
        config.validate()?;

        let abort = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&abort);
        ctrlc::set_handler(move || {
            if flag.swap(true, Ordering::SeqCst) {
                // Second Ctrl-C exits at once
                std::process::exit(130);
            }
            eprintln!("\nStopping after the current file...");
        })?;

        let runner = ToolRunner::new(config.tools.timeout())?;
        Ok(Self {
            config,
            backend: LoftyBackend,
            runner,
            abort,
        })
    }
}

/// Print the end-of-run report.
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "Extracted {} singles, {} album tracks and {} images",
        summary.singles, summary.album_tracks, summary.images
    );
    if summary.committed > 0 {
        println!("Committed {} tracks", summary.committed);
    }
    if !summary.broken.is_empty() {
        println!("Set aside {} unreadable files:", summary.broken.len());
        for path in &summary.broken {
            println!("  {}", path.display());
        }
    }
    if !summary.skipped_dirs.is_empty() {
        println!("Skipped {} folders without mp3 files:", summary.skipped_dirs.len());
        for path in &summary.skipped_dirs {
            println!("  {}", path.display());
        }
    }
    if summary.recovered > 0 {
        println!("{} problems were skipped, see the log above", summary.recovered);
    }
}
