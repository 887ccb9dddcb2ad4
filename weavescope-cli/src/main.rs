mod app;
mod commands;
mod output;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use weavescope::project::CancellationFlag;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cancel: CancellationFlag = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling, waiting for running classes to finish...");
        flag.store(true, Ordering::Relaxed);
    })
    .context("failed to set Ctrl+C handler")?;

    let cli = Cli::parse();

    // Show weavescope info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("weavescope", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Weave {
            dir,
            threads,
            dry_run,
            tolerate_partial,
        } => commands::weave::run(
            dir,
            &commands::weave::WeaveOptions {
                threads: *threads,
                dry_run: *dry_run,
                tolerate_partial: *tolerate_partial,
                cancel,
            },
            &cli.global,
        ),
        Command::Inspect { path, classes } => {
            commands::inspect::run(path, classes.as_deref(), &cli.global)
        }
    }
}
