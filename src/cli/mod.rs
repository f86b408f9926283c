// src/cli/mod.rs
//! Command-line interface definitions

/// Argument structures and tag parsing
pub mod commands;

pub use commands::{Action, BenchmarkOptions, Commands, ConfigOptions, MineOptions, parse_tag};
