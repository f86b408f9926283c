// src/miner/tracker.rs
//! Global best proof-of-work tracking
//!
//! The tracker lives inside the coordinator's run state and is only touched
//! with that lock held, so it needs no synchronization of its own.

use crate::types::{ProofOfWork, WorkerPow};

/// Highest-difficulty partial solution seen in the current run
///
/// Only a strictly higher difficulty replaces the current best, so among
/// equal reports the earliest one wins.
#[derive(Debug, Default, Clone)]
pub struct PowTracker {
    best: Option<WorkerPow>,
}

impl PowTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a candidate reported by `worker_id`
    ///
    /// # Returns
    /// `true` if the candidate became the new global best. The first
    /// candidate offered to an empty tracker always does.
    pub fn update(&mut self, candidate: &ProofOfWork, worker_id: usize) -> bool {
        let improves = self
            .best
            .as_ref()
            .is_none_or(|best| candidate.best_difficulty_bits > best.pow.best_difficulty_bits);

        if improves {
            self.best = Some(WorkerPow {
                worker_id,
                pow: candidate.clone(),
            });
        }
        improves
    }

    /// Current global best
    pub fn best(&self) -> Option<&WorkerPow> {
        self.best.as_ref()
    }

    /// Difficulty of the current best, zero when empty
    pub fn best_bits(&self) -> u32 {
        self.best
            .as_ref()
            .map_or(0, |best| best.pow.best_difficulty_bits)
    }

    /// Forgets the current best, used when a new run starts
    pub fn reset(&mut self) {
        self.best = None;
    }
}
