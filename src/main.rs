//! mp3-tidy - normalizes MP3 tags and files cleaned tracks into a library.
//!
//! A run walks an incoming folder, writes every file's tags to an editable
//! changes document, corrects that document with text rules, optionally
//! hands it to a human editor, and finally writes the tags back while
//! moving each file to its place in the destination tree.

pub mod cli;
pub mod config;
pub mod corrector;
pub mod cover;
pub mod document;
pub mod error;
pub mod external;
pub mod extractor;
pub mod metadata;
pub mod model;
pub mod organizer;
pub mod review;
pub mod rules;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("mp3_tidy=info".parse()?))
        .init();

    cli::run_command(&args)
}
