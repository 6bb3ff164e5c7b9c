//! `boardflow` command-line entry point.
//!
//! ```text
//! boardflow [--config <file>] [--board <file>] [--simulate] <command>
//! ```
//!
//! Exit status is 0 on success, 1 when the operation was rejected and 2 when
//! the command could not run at all.

use boardflow::{
    cli::{Cli, CliError, run},
    telemetry::init_telemetry,
};
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;

async fn dispatch(cli: Cli) -> Result<bool, CliError> {
    let config = cli.load_config()?;
    init_telemetry(&config.logging)?;
    let mut stdout = io::stdout();
    run(cli.command, &config, &mut stdout).await
}

#[tokio::main]
async fn main() -> ExitCode {
    match dispatch(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            writeln!(io::stderr(), "boardflow: {err}").ok();
            ExitCode::from(2)
        }
    }
}
