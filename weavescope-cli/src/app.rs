use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// weavescope - rewrite compiled ECS components into pooled or packed layouts
#[derive(Debug, Parser)]
#[command(name = "weavescope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Weave every class file below a compiler output directory, in place.
    Weave {
        /// Root of the compiled classes (e.g. target/classes).
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Worker threads; 0 uses one per logical CPU.
        #[arg(short, long, default_value_t = 0)]
        threads: usize,

        /// Report what would be woven without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Exit successfully even if some classes failed to weave.
        #[arg(long)]
        tolerate_partial: bool,
    },

    /// Show the classification, fields and packed layout of a single class file.
    Inspect {
        /// Path to the class file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Directory of sibling classes, used to resolve nested packed field types.
        #[arg(short, long, value_name = "DIR")]
        classes: Option<PathBuf>,
    },
}
