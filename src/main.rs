mod assembly;
mod benchmark;
mod cli;
mod config;
mod discovery;
mod dispatch;
mod error;
mod failures;
mod github;
mod output;
mod parsers;
mod schema;
mod timestamp;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

fn main() -> Result<ExitCode> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting cicollect - CI artifact collector");
    cli.execute()
}
