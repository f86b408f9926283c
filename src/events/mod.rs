// src/events/mod.rs
//! Lifecycle notifications published by the coordinator
//!
//! Four independent [`Channel`]s make up the consumer-facing surface:
//! progress, error, cancelled and success. The coordinator's correctness
//! does not depend on how many subscribers are attached.

/// Observer-list channel implementation
pub mod channel;

pub use channel::{Channel, SubscriptionId};

use crate::miner::event::MinedResult;
use crate::types::{ProofOfWork, WorkerPow};

/// Progress reported by one worker
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Reporting worker
    pub worker_id: usize,
    /// Worker's hash rate in hashes per second
    pub hash_rate: f64,
    /// Worker's best proof of work carried by the report
    pub best_pow: Option<ProofOfWork>,
    /// New global best, set only when this report improved it
    pub global_best: Option<WorkerPow>,
}

/// A failure surfaced during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Failing worker, `None` for run-level errors
    pub worker_id: Option<usize>,
    /// Rendered error
    pub error: String,
    /// Additional context
    pub message: Option<String>,
    /// True when this error ended the run (every worker is gone)
    pub fatal: bool,
}

/// The run was cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledEvent {
    /// Why the run stopped
    pub reason: Option<String>,
}

/// A worker reached the target difficulty
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessEvent {
    /// The winning result
    pub result: MinedResult,
}

/// The four notification channels of a coordinator
#[derive(Debug)]
pub struct EventStream {
    /// Worker progress
    pub progress: Channel<ProgressEvent>,
    /// Worker and run errors
    pub error: Channel<ErrorEvent>,
    /// Explicit cancellation
    pub cancelled: Channel<CancelledEvent>,
    /// First successful result of a run
    pub success: Channel<SuccessEvent>,
}

impl Default for EventStream {
    fn default() -> Self {
        Self {
            progress: Channel::new("progress"),
            error: Channel::new("error"),
            cancelled: Channel::new("cancelled"),
            success: Channel::new("success"),
        }
    }
}

impl EventStream {
    /// Creates a stream with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn emit(&self, notice: Notice) {
        match notice {
            Notice::Progress(event) => {
                self.progress.publish(&event);
            }
            Notice::Error(event) => {
                self.error.publish(&event);
            }
            Notice::Cancelled(event) => {
                self.cancelled.publish(&event);
            }
            Notice::Success(event) => {
                self.success.publish(&event);
            }
        }
    }
}

/// An event queued while the coordinator lock is held, emitted after release
#[derive(Debug, Clone)]
pub(crate) enum Notice {
    Progress(ProgressEvent),
    Error(ErrorEvent),
    Cancelled(CancelledEvent),
    Success(SuccessEvent),
}
