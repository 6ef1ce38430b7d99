//! Subcommand implementations.

pub mod cart;
pub mod prompt;
