// src/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a mining run
///
/// Exactly one state is active per coordinator. Terminal states
/// (`Succeeded`, `Cancelled`, `Failed`) stay put until the next `mine()`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run has been started yet
    #[default]
    Idle,
    /// Workers are searching the nonce space
    Mining,
    /// The run was stopped by an explicit `cancel()`
    Cancelled,
    /// A worker reached the target difficulty
    Succeeded,
    /// Every worker exited without producing a result
    Failed,
}

impl RunState {
    /// True for states that end a run
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Cancelled | RunState::Succeeded | RunState::Failed
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Mining => write!(f, "mining"),
            RunState::Cancelled => write!(f, "cancelled"),
            RunState::Succeeded => write!(f, "succeeded"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// Best partial solution a worker has found so far
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWork {
    /// Leading zero bits of `hash`
    pub best_difficulty_bits: u32,
    /// Nonce that produced `hash`, decimal encoded
    pub nonce: String,
    /// Hex encoded event id
    pub hash: String,
}

/// The global best proof of work together with the worker that reported it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPow {
    /// Reporting worker
    pub worker_id: usize,
    /// The reported proof of work
    pub pow: ProofOfWork,
}

/// Periodic progress report from one worker
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerProgress {
    /// Reporting worker
    pub worker_id: usize,
    /// Hashes per second since the worker started
    pub hash_rate: f64,
    /// Worker's best proof of work, if the report carries one
    pub best_pow: Option<ProofOfWork>,
}
