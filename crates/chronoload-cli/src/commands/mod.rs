//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod archives;
pub mod query;
pub mod status;
