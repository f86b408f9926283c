//! Note miner - parallel NIP-13 proof of work for Nostr notes
//!
//! This crate coordinates a pool of worker threads that jointly search the
//! nonce space of a candidate note:
//! - Disjoint nonce partitioning across workers
//! - Global best proof-of-work tracking
//! - First-result-wins completion and cooperative cancellation
//! - Multicast progress/error/cancelled/success notifications

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Miner core implementation: primitives, workers and the coordinator
pub mod miner;

/// Lifecycle notification channels
pub mod events;

/// Statistics collection and reporting functionality
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use events::{CancelledEvent, ErrorEvent, EventStream, ProgressEvent, SuccessEvent};
pub use miner::{
    CandidateEvent, MinePrimitive, MinedEvent, MinedResult, MiningConfiguration,
    MiningCoordinator, MiningJob, Nip13Miner, PowTracker, WorkerEvent,
};
pub use stats::{MiningStats, StatsReporter};
pub use types::{ProofOfWork, RunState, WorkerPow, WorkerProgress};
pub use utils::{MinerError, init_logging};
