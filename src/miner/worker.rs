// src/miner/worker.rs
//! Worker thread implementation
//!
//! Each worker runs one [`MinePrimitive`] search on its own OS thread and
//! talks to the coordinator only through [`WorkerEvent`] messages on a
//! crossbeam channel. The coordinator stops a worker by raising its
//! terminate flag, which the primitive sees through its cancellation query.

use crate::miner::algorithm::{MinePrimitive, MiningJob};
use crate::miner::event::MinedResult;
use crate::types::{ProofOfWork, WorkerProgress};
use crate::utils::error::MinerError;
use crossbeam_channel::Sender;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Payload of a worker message
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    /// Periodic progress report
    Progress(WorkerProgress),
    /// The primitive found a solution
    Result(MinedResult),
    /// The primitive failed or stopped without a result
    Error(String),
}

/// Message posted by a worker, stamped with the run it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerEvent {
    /// Run generation the worker was spawned for
    pub run_id: u64,
    /// Posting worker
    pub worker_id: usize,
    /// Message payload
    pub message: WorkerMessage,
}

impl WorkerEvent {
    /// Builds a progress message
    pub fn progress(
        run_id: u64,
        worker_id: usize,
        hash_rate: f64,
        best_pow: Option<ProofOfWork>,
    ) -> Self {
        Self {
            run_id,
            worker_id,
            message: WorkerMessage::Progress(WorkerProgress {
                worker_id,
                hash_rate,
                best_pow,
            }),
        }
    }

    /// Builds a result message
    pub fn result(run_id: u64, worker_id: usize, result: MinedResult) -> Self {
        Self {
            run_id,
            worker_id,
            message: WorkerMessage::Result(result),
        }
    }

    /// Builds an error message
    pub fn error(run_id: u64, worker_id: usize, reason: impl Into<String>) -> Self {
        Self {
            run_id,
            worker_id,
            message: WorkerMessage::Error(reason.into()),
        }
    }
}

/// Coordinator-owned handle to one worker thread
#[derive(Debug)]
pub struct WorkerHandle {
    worker_id: usize,
    terminate: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawns a worker thread running `primitive` on `job`
    ///
    /// # Arguments
    /// * `run_id` - Run generation stamped on every message
    /// * `job` - Serialized event, difficulty and nonce assignment
    /// * `primitive` - The hash-mining primitive to run
    /// * `sender` - Channel back to the coordinator
    ///
    /// # Errors
    /// Returns `MinerError::IoError` if the OS refuses to create the thread.
    pub fn spawn(
        run_id: u64,
        job: MiningJob,
        primitive: Arc<dyn MinePrimitive>,
        sender: Sender<WorkerEvent>,
    ) -> Result<Self, MinerError> {
        let worker_id = job.worker_id;
        let terminate = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&terminate);

        let thread = thread::Builder::new()
            .name(format!("note-miner-{}", worker_id))
            .spawn(move || run_worker(run_id, job, primitive, flag, sender))?;

        Ok(Self {
            worker_id,
            terminate,
            thread: Some(thread),
        })
    }

    /// Index of this worker
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Asks the worker to stop; does not wait
    pub fn terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    /// True once [`terminate`](Self::terminate) was called
    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// True once the worker thread has returned
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Blocks until the worker thread returns
    ///
    /// Only meaningful after [`terminate`](Self::terminate) or once the
    /// search completed; a primitive that ignores cancellation blocks forever.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_worker(
    run_id: u64,
    job: MiningJob,
    primitive: Arc<dyn MinePrimitive>,
    terminate: Arc<AtomicBool>,
    sender: Sender<WorkerEvent>,
) {
    let worker_id = job.worker_id;
    // Nothing is posted once terminated. A message racing the flag is
    // dropped by the coordinator's run-state check.
    let post = |message: WorkerEvent| {
        if !terminate.load(Ordering::SeqCst) {
            let _ = sender.send(message);
        }
    };

    log::debug!(
        "Worker {} started ({}), run {}",
        worker_id,
        primitive.name(),
        run_id
    );

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        primitive.mine(
            &job,
            &mut |hash_rate, best_pow| {
                post(WorkerEvent::progress(run_id, worker_id, hash_rate, best_pow))
            },
            &|| terminate.load(Ordering::Relaxed),
        )
    }));

    match outcome {
        Ok(Ok(Some(result))) => post(WorkerEvent::result(run_id, worker_id, result)),
        Ok(Ok(None)) => post(WorkerEvent::error(
            run_id,
            worker_id,
            "mining stopped without a result",
        )),
        Ok(Err(e)) => post(WorkerEvent::error(run_id, worker_id, e.to_string())),
        Err(payload) => post(WorkerEvent::error(
            run_id,
            worker_id,
            format!("mining primitive panicked: {}", panic_message(&*payload)),
        )),
    }

    log::debug!("Worker {} exited, run {}", worker_id, run_id);
}
