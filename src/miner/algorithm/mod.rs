// src/miner/algorithm/mod.rs
//! Hash-mining primitives
//!
//! The coordinator never hashes anything itself. Each worker hands its
//! [`MiningJob`] to a [`MinePrimitive`], which owns the search loop.
//! The default primitive is NIP-13 over sha256.

/// NIP-13 proof of work over sha256 event ids
pub mod nip13;

pub use nip13::{Nip13Miner, leading_zero_bits};

use crate::miner::event::MinedResult;
use crate::types::ProofOfWork;
use crate::utils::error::MinerError;

/// Everything one worker needs to search its slice of the nonce space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningJob {
    /// Index of the worker running this job
    pub worker_id: usize,
    /// Serialized [`CandidateEvent`](crate::miner::event::CandidateEvent)
    pub event: String,
    /// Required leading zero bits
    pub difficulty: u32,
    /// First nonce to try
    pub start_nonce: u64,
    /// Stride between nonces
    pub step: u64,
}

/// Progress callback: `(hash_rate, best_pow)`
pub type ProgressFn<'a> = dyn FnMut(f64, Option<ProofOfWork>) + 'a;

/// Cancellation query, true once the worker has been told to stop
pub type CancelFn<'a> = dyn Fn() -> bool + 'a;

/// Common interface for hash-mining primitives
///
/// Implementations iterate `start_nonce, start_nonce + step, ...` until a
/// hash meets `difficulty`. They must poll `should_cancel` at a bounded
/// interval and return `Ok(None)` promptly once it reports true.
pub trait MinePrimitive: Send + Sync {
    /// Runs the search for one worker
    ///
    /// # Returns
    /// * `Ok(Some(result))` - a finalized event meeting the difficulty
    /// * `Ok(None)` - the search was cancelled
    /// * `Err(MinerError)` - the search could not continue
    fn mine(
        &self,
        job: &MiningJob,
        on_progress: &mut ProgressFn<'_>,
        should_cancel: &CancelFn<'_>,
    ) -> Result<Option<MinedResult>, MinerError>;

    /// Short name used in log lines
    fn name(&self) -> &'static str;
}
