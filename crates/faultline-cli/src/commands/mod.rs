//! CLI subcommands

pub mod completions;
pub mod config;
pub mod queue;
pub mod send;
