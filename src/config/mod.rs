// src/config/mod.rs
//! Configuration management for the note miner
//!
//! Loads and parses the TOML configuration file and generates commented
//! templates. Command line flags override whatever the file provides.

/// Core configuration implementation
///
/// Contains the [`Config`] struct and the `[note]` section type.
pub mod config;

// Re-export key items for easy access
pub use config::{Config, NoteConfig};

use crate::utils::error::MinerError;
use std::path::PathBuf;

/// Loads miner configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the configuration file (anything convertible to PathBuf)
///
/// # Returns
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(MinerError)` - If the file couldn't be read or parsed
pub fn load(path: impl Into<PathBuf>) -> Result<Config, MinerError> {
    Config::load(path)
}

/// Generates a commented configuration template
pub fn generate_template(with_note: bool) -> String {
    Config::generate_template(with_note)
}
