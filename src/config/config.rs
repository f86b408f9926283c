// src/config/config.rs
use crate::miner::event::{DEFAULT_DIFFICULTY, MiningConfiguration, Tags};
use crate::utils::error::MinerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the note miner
///
/// Contains the mining parameters (difficulty, worker count, reporting
/// cadence) and, optionally, the note to mine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Required leading zero bits of the event id
    /// (default: 20)
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,

    /// Number of worker threads to use for mining
    /// (0 = number of CPU cores)
    #[serde(default)]
    pub worker_threads: usize,

    /// Longest gap between two progress reports of a worker, in milliseconds
    /// (default: 1000)
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// How often aggregated statistics are logged, in seconds
    /// (default: 10)
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,

    /// Publish an error event when no worker reports for this many seconds
    /// (default: disabled, 0 also disables)
    #[serde(default)]
    pub stall_timeout_secs: Option<u64>,

    /// The note to mine
    #[serde(default)]
    pub note: NoteConfig,
}

/// Note content section of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteConfig {
    /// Note content
    #[serde(default)]
    pub content: String,

    /// Author public key (hex)
    #[serde(default)]
    pub pubkey: String,

    /// Tags, e.g. `[["t", "pow"]]`
    #[serde(default)]
    pub tags: Tags,
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_progress_interval_ms() -> u64 {
    1000
}

fn default_report_interval_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Config {
            difficulty: default_difficulty(),
            worker_threads: 0,
            progress_interval_ms: default_progress_interval_ms(),
            report_interval_secs: default_report_interval_secs(),
            stall_timeout_secs: None,
            note: NoteConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(MinerError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(toml::from_str(&config_str)?)
    }

    /// Worker count with `0` resolved to the number of CPU cores
    pub fn effective_workers(&self) -> usize {
        match self.worker_threads {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }

    /// Progress interval handed to the mining primitive
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    /// Statistics logging interval
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }

    /// Coordinator inactivity watchdog, `None` when unset or zero
    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Builds the coordinator configuration for the note in this file
    pub fn mining_configuration(&self) -> MiningConfiguration {
        MiningConfiguration {
            content: self.note.content.clone(),
            tags: self.note.tags.clone(),
            public_key: self.note.pubkey.clone(),
            difficulty: self.difficulty,
            worker_count: self.effective_workers(),
        }
    }

    /// Generates a configuration template string
    ///
    /// # Arguments
    /// * `with_note` - Include a sample `[note]` section
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template(with_note: bool) -> String {
        let mut template = String::new();
        template.push_str("# Note miner configuration\n\n");
        template.push_str("# Required leading zero bits of the event id\n");
        template.push_str(&format!("difficulty = {}\n", DEFAULT_DIFFICULTY));
        template.push_str("# Number of worker threads (0 = auto-detect)\n");
        template.push_str("worker_threads = 0\n");
        template.push_str("# Longest gap between progress reports per worker (ms)\n");
        template.push_str("progress_interval_ms = 1000\n");
        template.push_str("# Statistics logging interval (s)\n");
        template.push_str("report_interval_secs = 10\n");
        template.push_str("# Report an error when no worker reports for this long (s, 0 = off)\n");
        template.push_str("# stall_timeout_secs = 60\n");

        if with_note {
            template.push_str("\n# Note to mine\n");
            template.push_str("[note]\n");
            template.push_str("content = \"hello nostr\"\n");
            template.push_str("pubkey = \"your_hex_public_key\"\n");
            template.push_str("tags = [[\"t\", \"pow\"]]\n");
        }

        template
    }
}
