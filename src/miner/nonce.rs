// src/miner/nonce.rs
//! Nonce space partitioning
//!
//! Worker `i` of `n` searches the residue class `{i, i + n, i + 2n, ...}`.
//! Together the classes cover every nonce exactly once.

/// Starting nonce and stride assigned to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceAssignment {
    /// First nonce to try
    pub start: u64,
    /// Distance between consecutive nonces
    pub step: u64,
}

impl NonceAssignment {
    /// True if this assignment eventually visits `nonce`
    pub fn covers(&self, nonce: u64) -> bool {
        nonce >= self.start && (nonce - self.start) % self.step == 0
    }
}

/// Returns the nonce assignment for `worker_index` out of `total_workers`
///
/// `worker_index` must be below `total_workers` and `total_workers` must be
/// at least one; the coordinator rejects zero workers before calling this.
pub fn allocate(worker_index: usize, total_workers: usize) -> NonceAssignment {
    debug_assert!(total_workers >= 1 && worker_index < total_workers);
    NonceAssignment {
        start: worker_index as u64,
        step: total_workers as u64,
    }
}

/// Assignments for every worker of an `total_workers`-wide run
pub fn allocate_all(total_workers: usize) -> Vec<NonceAssignment> {
    (0..total_workers).map(|i| allocate(i, total_workers)).collect()
}
