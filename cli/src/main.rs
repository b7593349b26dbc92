//! Control-plane binary for the chunked agglomeration graph (§4.L):
//! `ingest`, `repair`, `status`. Exit codes follow §6/§7's universal
//! scheme: `0` success, `2` configuration/argument error, `3` storage
//! unreachable, `4` partial completion that needs repair.

mod commands;
mod error;
mod raw_source;

use std::path::PathBuf;
use std::process::ExitCode;

use chunkedgraph_node::ProcessConfig;
use clap::{Parser, Subcommand};
use tracing::error;

use error::CliResult;

#[derive(Parser)]
#[command(name = "chunkedgraph", about = "Control plane for a chunked agglomeration graph")]
struct Cli {
    #[command(flatten)]
    config: ProcessConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the hierarchy from raw segmentation data, layer by layer.
    Ingest {
        /// Path to a JSON-encoded ingestion plan (see `IngestPlan`).
        plan: PathBuf,
        /// Directory of per-chunk raw adjacency/supervoxel files.
        #[arg(long)]
        raw_data: PathBuf,
    },
    /// Re-derive and re-execute operations left in a `Failed` state.
    Repair {
        /// Only consider entries submitted at or after this millisecond
        /// timestamp.
        #[arg(long)]
        since: u64,
    },
    /// Print a read-only snapshot of graph metadata, roots, and locks.
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => exit_code(code),
        Err(e) => {
            error!(error = %e, "command failed");
            exit_code(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> CliResult<i32> {
    let config = cli.config.validate()?;
    chunkedgraph_o11y::init_logging(&config.log_config());

    let (store, layout) = chunkedgraph_node::open(&config)?;

    match cli.command {
        Command::Ingest { plan, raw_data } => commands::ingest::run(&config, store, layout, plan, raw_data),
        Command::Repair { since } => commands::repair::run(store, layout, since),
        Command::Status => commands::status::run(store, layout),
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}
