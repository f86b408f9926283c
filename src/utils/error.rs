// src/utils/error.rs
use serde_json;
use std::io;
use thiserror::Error;

/// Main error type for the note miner
///
/// Covers configuration problems detected before a run starts, faults
/// raised by individual workers, and lookups of results that do not exist yet.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Incomplete or invalid mining configuration (missing public key,
    /// missing content, zero workers, unreadable config file)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A worker's mining primitive failed
    ///
    /// Never returned from the coordinator API directly; it is rendered into
    /// the error channel so the remaining workers keep going.
    #[error("Worker {worker_id} failed: {reason}")]
    WorkerError {
        /// Index of the failing worker
        worker_id: usize,
        /// Human readable failure description
        reason: String,
    },

    /// A result was requested before any worker produced one
    #[error("No mined result available")]
    NoResultError,

    /// A worker walked off the end of the 64-bit nonce space
    #[error("Nonce space exhausted after nonce {last_nonce} (step {step})")]
    NonceSpaceExhausted {
        /// Last nonce that was hashed
        last_nonce: u64,
        /// Stride of the exhausted sequence
        step: u64,
    },

    /// Invalid user input (command line values, tag syntax)
    #[error("Invalid input: {0}")]
    InputError(String),

    /// Standard I/O operation errors (thread spawning, file output)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Converts TOML parse failures into configuration errors
///
/// Used when loading the miner configuration file.
impl From<toml::de::Error> for MinerError {
    fn from(e: toml::de::Error) -> Self {
        MinerError::ConfigError(format!("Invalid config format: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_error_names_the_worker() {
        let err = MinerError::WorkerError {
            worker_id: 3,
            reason: "boom".into(),
        };
        assert_eq!(err.to_string(), "Worker 3 failed: boom");
    }

    #[test]
    fn toml_errors_become_config_errors() {
        let parse_err = toml::from_str::<toml::Value>("= nope").unwrap_err();
        let err: MinerError = parse_err.into();
        assert!(matches!(err, MinerError::ConfigError(_)));
    }
}
