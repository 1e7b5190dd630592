use clap::Parser;
use genjob_core::logging;

mod cli;

use crate::cli::{Cli, Report};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries the JSON report only; logs go to the file or stderr.
    if cli.log_stderr {
        logging::init_logging_stderr();
    } else if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("log file unavailable, logging to stderr: {e:#}");
    }

    let report = match cli.run().await {
        Ok(report) => report,
        Err(err) => {
            tracing::error!("genjob error: {err:#}");
            Report::internal(&err)
        }
    };
    println!("{}", report.to_json());
    std::process::exit(report.exit_code());
}
