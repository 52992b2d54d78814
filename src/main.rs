//! codepack - Turn a zipped project into one prompt-ready text file
//!
//! codepack provides:
//! - ZIP extraction into a scratch directory that never outlives the run
//! - Extension/exclusion filtered discovery with single-folder collapse
//! - Encoding-tolerant reading and concatenation under path headers
//! - Token counting for common LLM tokenizer profiles

use anyhow::Result;
use clap::Parser;

mod backends;
mod cli;
mod core;
mod flows;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::run(cli)
}
