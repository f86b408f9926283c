// src/cli/commands.rs
use crate::utils::error::MinerError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Note miner CLI - NIP-13 proof of work for Nostr notes
#[derive(Parser, Debug)]
#[command(name = "notemine-rs")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// Log more (debug level) unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The action to perform (mine a note, run a benchmark, or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Mine a note until it meets the target difficulty
    Mine(MineOptions),

    /// Measure hash rate with an unreachable difficulty
    Benchmark(BenchmarkOptions),

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for mining a note
#[derive(Parser, Debug)]
pub struct MineOptions {
    /// Path to configuration file (optional)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Note content (overrides config)
    #[arg(long)]
    pub content: Option<String>,

    /// Author public key in hex (overrides config)
    #[arg(short, long)]
    pub pubkey: Option<String>,

    /// Required leading zero bits (overrides config)
    #[arg(short, long)]
    pub difficulty: Option<u32>,

    /// Number of worker threads (overrides config)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Tag as `name=value[,value...]`, repeatable (replaces config tags)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Write the mined event JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Options for running a hash rate benchmark
#[derive(Parser, Debug)]
pub struct BenchmarkOptions {
    /// Duration of benchmark in seconds
    #[arg(short, long, default_value_t = 10)]
    pub duration: u64,

    /// Number of threads to use
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub threads: usize,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,

    /// Include a sample note section
    #[arg(short, long)]
    pub note: bool,
}

/// Parses a `name=value[,value...]` tag argument
///
/// # Errors
/// `InputError` when the name is empty or `=` is missing.
pub fn parse_tag(raw: &str) -> Result<Vec<String>, MinerError> {
    let (name, values) = raw
        .split_once('=')
        .ok_or_else(|| MinerError::InputError(format!("Tag '{}' is not name=value", raw)))?;
    if name.is_empty() {
        return Err(MinerError::InputError(format!("Tag '{}' has no name", raw)));
    }

    let mut tag = vec![name.to_string()];
    tag.extend(values.split(',').map(str::to_string));
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags() {
        assert_eq!(parse_tag("t=pow").unwrap(), vec!["t", "pow"]);
        assert_eq!(
            parse_tag("e=abc,wss://relay,reply").unwrap(),
            vec!["e", "abc", "wss://relay", "reply"]
        );
        assert!(parse_tag("nope").is_err());
        assert!(parse_tag("=x").is_err());
    }

    #[test]
    fn mine_flags_parse() {
        let cli = Commands::parse_from([
            "notemine-rs",
            "mine",
            "--content",
            "hello",
            "-p",
            "abc",
            "-d",
            "8",
            "-t",
            "t=pow",
            "-t",
            "client=cli",
        ]);
        match cli.action {
            Action::Mine(opts) => {
                assert_eq!(opts.content.as_deref(), Some("hello"));
                assert_eq!(opts.difficulty, Some(8));
                assert_eq!(opts.tags.len(), 2);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }
}
