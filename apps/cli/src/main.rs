//! Syllatrack CLI: syllabus ingestion and course/task tracking.
//!
//! Serves the HTTP API, ingests syllabus documents through the extraction
//! pipeline, and manages courses, tasks, and dashboard insights locally.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
