//! Blockdex CLI: freshness-first block indexing.
//!
//! # Commands
//! ```text
//! blockdex poll                      follow the tip, fill gaps, ingest
//! blockdex replay --log <file>       ingest a durable NDJSON block log
//! blockdex heights                   print heights in priority order only
//! blockdex status                    print indexed height and resume sequence
//! ```
//!
//! Heights are printed on stdout, one per line, as they are dispatched.
//! Diagnostics go to stderr. The exit status tells configuration (78),
//! connectivity (69) and protocol (76) failures apart.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use blockdex_core::error::IndexerError;

mod commands;
mod logging;
mod settings;

#[derive(Parser)]
#[command(
    name = "blockdex",
    about = "Produces and indexes block heights, prioritized by freshness",
    long_about = "
Blockdex indexes an EVM chain into PostgreSQL. It follows the chain tip and
walks back through history in fixed windows, always indexing the highest
missing height first.

ENVIRONMENT VARIABLES:
  BLOCKDEX_DATABASE   PostgreSQL URL (same as --database)
  BLOCKDEX_ENDPOINT   Node JSON-RPC URL (same as --endpoint)
  RUST_LOG            Log filter directives (overrides --log-level)
",
    version
)]
struct Cli {
    /// Config file (default: config/local.yaml, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// PostgreSQL connection URL
    #[arg(long, global = true, env = "BLOCKDEX_DATABASE")]
    database: Option<String>,

    /// Node JSON-RPC endpoint URL
    #[arg(long, global = true, env = "BLOCKDEX_ENDPOINT")]
    endpoint: Option<String>,

    /// Be verbose (log every enqueued height)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level or filter directives
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the tip, scan for gaps and ingest blocks over JSON-RPC
    Poll {
        /// Fail a block on malformed numeric fields instead of storing zero
        #[arg(long)]
        strict_numerics: bool,
        /// Do not store empty blocks for heights the node has no block for
        #[arg(long)]
        no_empty_blocks: bool,
    },

    /// Ingest blocks from a durable NDJSON log, resuming after the last committed sequence
    Replay {
        /// Path to the log file; line N has sequence N
        #[arg(long)]
        log: PathBuf,
        /// Keep waiting for appended lines
        #[arg(long)]
        follow: bool,
        /// Sequence to start from when nothing has been replayed yet
        #[arg(long)]
        start_sequence: Option<u64>,
        /// Fail a block on malformed numeric fields instead of storing zero
        #[arg(long)]
        strict_numerics: bool,
    },

    /// Print heights in priority order without ingesting them
    Heights,

    /// Print the highest indexed height and the replay resume sequence
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose && cli.log_level == "info" {
        "debug".to_string()
    } else {
        cli.log_level.clone()
    };
    logging::init_tracing(&logging::LogConfig {
        level,
        json: cli.json_logs,
    });

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<IndexerError>()
                .map_or(70, |err| err.class().exit_code());
            tracing::error!(exit_code = code, "{e:#}");
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = settings::config_path(cli.config.as_deref());
    let mut config = settings::load(
        path.as_deref(),
        settings::Overrides {
            database: cli.database,
            endpoint: cli.endpoint,
        },
    )?;

    match cli.command {
        Commands::Poll {
            strict_numerics,
            no_empty_blocks,
        } => {
            if strict_numerics {
                config.numeric_policy = blockdex_core::NumericPolicy::Strict;
            }
            if no_empty_blocks {
                config.index_empty_blocks = false;
            }
            commands::poll(config).await
        }

        Commands::Replay {
            log,
            follow,
            start_sequence,
            strict_numerics,
        } => {
            if let Some(sequence) = start_sequence {
                config.start_sequence = sequence;
            }
            if strict_numerics {
                config.numeric_policy = blockdex_core::NumericPolicy::Strict;
            }
            commands::replay(config, log, follow).await
        }

        Commands::Heights => commands::heights(config).await,

        Commands::Status => commands::status(config).await,
    }
}
