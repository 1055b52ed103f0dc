//! # Tally CLI
//!
//! Command-line interface for the Tally boolean retrieval engine.
//!
//! ## Commands
//!
//! - `tally ingest <file>` - Add one document per line to the index
//! - `tally count <query>` - Count (or list) documents matching a query
//! - `tally parse <query>` - Show the canonical form and tree of a query
//! - `tally expand <query> <word>` - Expand a query and count each result
//! - `tally status` - Show index status and statistics
//!
//! ## Example Usage
//!
//! ```bash
//! # Build the index from a text file
//! tally ingest news.txt
//!
//! # Count matching documents
//! tally count "(president OR obama) AND NOT trump"
//!
//! # Try every way of adding a term
//! tally expand "obama OR president" biden --all
//! ```

mod app;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tally_core::Operator;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Tally - Boolean full-text retrieval
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the index file (overrides the configuration)
    #[arg(short, long, global = true, env = "TALLY_INDEX")]
    index: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add documents to the index, one per line of whitespace-separated terms
    Ingest {
        /// Text file to read documents from
        file: PathBuf,

        /// Start from an empty index instead of appending
        #[arg(long)]
        fresh: bool,
    },

    /// Count documents matching a query
    Count {
        /// Query text, e.g. "(a OR b) AND NOT c"
        query: String,

        /// Also list the matching document ids
        #[arg(long)]
        ids: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Show the canonical form and tree of a query
    Parse {
        /// Query text
        query: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Combine a query with a new word and count the results
    Expand {
        /// Query text to expand
        query: String,

        /// Word to add
        word: String,

        /// Operator joining the query and the word (and, or, and-not)
        #[arg(long, default_value = "and")]
        op: Operator,

        /// Show the expansion for every operator
        #[arg(long, conflicts_with = "leaves")]
        all: bool,

        /// Expand at every word of the query instead of the whole query
        #[arg(long)]
        leaves: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Show index status and statistics
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => tally_core::Config::load_from(path)?,
        None => tally_core::Config::load()?,
    };
    if let Some(path) = cli.index {
        config.general.index_path = Some(path);
    }

    // Setup logging
    let log_level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.general.log_level.to_lowercase(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    // Execute command
    match cli.command {
        Commands::Ingest { file, fresh } => commands::ingest::run(config, &file, fresh),
        Commands::Count { query, ids, output } => commands::count::run(config, &query, ids, output),
        Commands::Parse { query, output } => commands::parse::run(config, &query, output),
        Commands::Expand {
            query,
            word,
            op,
            all,
            leaves,
            output,
        } => {
            let mode = if all {
                commands::expand::Mode::AllOperators
            } else if leaves {
                commands::expand::Mode::Leaves
            } else {
                commands::expand::Mode::Single(op)
            };
            commands::expand::run(config, &query, &word, mode, output)
        }
        Commands::Status { output } => commands::status::run(config, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_expand_arguments() {
        let cli = Cli::try_parse_from([
            "tally", "expand", "a OR b", "c", "--op", "and-not", "-o", "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Expand {
                op, all, output, ..
            } => {
                assert_eq!(op, Operator::AndNot);
                assert!(!all);
                assert_eq!(output, OutputFormat::Json);
            }
            _ => panic!("expected expand command"),
        }
    }

    #[test]
    fn test_all_conflicts_with_leaves() {
        let result = Cli::try_parse_from(["tally", "expand", "a", "b", "--all", "--leaves"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_index_flag() {
        let cli =
            Cli::try_parse_from(["tally", "count", "obama", "--index", "/tmp/news.idx"]).unwrap();
        assert_eq!(cli.index, Some(PathBuf::from("/tmp/news.idx")));
    }
}
