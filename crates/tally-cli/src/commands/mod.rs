//! Subcommand implementations.

pub mod count;
pub mod expand;
pub mod ingest;
pub mod parse;
pub mod status;
