// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components of a mining run:
//! - Hash-mining primitives (NIP-13 over sha256)
//! - Nonce space partitioning
//! - Worker threads and their messages
//! - Global best proof-of-work tracking
//! - The run coordinator

/// Mining primitive interface and the default NIP-13 implementation
pub mod algorithm;

/// Run coordinator and state machine
///
/// Spawns and terminates workers, routes their messages and publishes
/// lifecycle events.
pub mod coordinator;

/// Candidate and finalized events, run configuration
pub mod event;

/// Disjoint nonce assignments for parallel workers
pub mod nonce;

/// Best proof-of-work tracking across workers
pub mod tracker;

/// Worker thread implementation
///
/// Each worker runs one primitive search and reports back over a channel.
pub mod worker;

// Re-export main components for cleaner imports
pub use self::algorithm::{MinePrimitive, MiningJob, Nip13Miner};
pub use self::coordinator::MiningCoordinator;
pub use self::event::{CandidateEvent, MinedEvent, MinedResult, MiningConfiguration, Tags};
pub use self::nonce::{NonceAssignment, allocate};
pub use self::tracker::PowTracker;
pub use self::worker::{WorkerEvent, WorkerHandle, WorkerMessage};
