// src/miner/coordinator.rs
//! Mining run coordinator
//!
//! Owns the worker handles of the current run, routes their messages, keeps
//! the global best proof of work and drives the run state machine:
//!
//! ```text
//! Idle ──mine()──> Mining ──result──> Succeeded
//!                     │ ───cancel()─> Cancelled
//!                     └──all failed─> Failed
//! ```
//!
//! Worker messages are handled one at a time by a dispatcher thread per run.
//! All run state sits behind a single lock; notifications are collected
//! under the lock and published after it is released, so subscribers may
//! call back into the coordinator.
//!
//! Ordering is only guaranteed within one channel. A progress event built
//! just before `cancel()` takes the lock can still reach subscribers after
//! the cancelled event, and [`MiningCoordinator::wait`] can return before
//! the terminal event has been delivered.

use crate::events::{
    CancelledEvent, ErrorEvent, EventStream, Notice, ProgressEvent, SuccessEvent,
};
use crate::miner::algorithm::{MinePrimitive, MiningJob, Nip13Miner};
use crate::miner::event::{
    CandidateEvent, MinedEvent, MinedResult, MiningConfiguration, Tags, unix_now,
};
use crate::miner::nonce;
use crate::miner::tracker::PowTracker;
use crate::miner::worker::{WorkerEvent, WorkerHandle, WorkerMessage};
use crate::types::{ProofOfWork, RunState, WorkerPow};
use crate::utils::error::MinerError;
use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Reason attached to the cancelled event
pub const CANCEL_REASON: &str = "Mining cancelled by user.";

/// Settings picked up by the next `mine()` call
#[derive(Debug, Clone)]
struct NextRun {
    config: MiningConfiguration,
    stall_timeout: Option<Duration>,
}

/// State of the current (or last) run
#[derive(Debug, Default)]
struct RunContext {
    run_id: u64,
    state: RunState,
    cancelled: bool,
    config: Option<MiningConfiguration>,
    started_at: Option<Instant>,
    result: Option<MinedResult>,
    workers: Vec<WorkerHandle>,
    live: BTreeSet<usize>,
    workers_pow: HashMap<usize, ProofOfWork>,
    hash_rates: HashMap<usize, f64>,
    tracker: PowTracker,
}

impl RunContext {
    fn begin(&mut self, config: MiningConfiguration) {
        self.run_id += 1;
        self.state = RunState::Mining;
        self.cancelled = false;
        self.config = Some(config);
        self.started_at = Some(Instant::now());
        self.result = None;
        // Handles of the previous run were terminated when it ended.
        self.workers.clear();
        self.live.clear();
        self.workers_pow.clear();
        self.hash_rates.clear();
        self.tracker.reset();
    }

    fn is_mining(&self, run_id: u64) -> bool {
        self.run_id == run_id && self.state == RunState::Mining
    }

    fn terminate_all(&mut self) {
        for worker in &self.workers {
            worker.terminate();
        }
        self.live.clear();
    }

    fn elapsed_secs(&self) -> f64 {
        self.started_at
            .map_or(0.0, |started| started.elapsed().as_secs_f64())
    }

    fn apply(&mut self, event: WorkerEvent) -> Vec<Notice> {
        let worker_id = event.worker_id;

        if !self.is_mining(event.run_id) {
            log::trace!(
                "Discarding message from worker {} of run {} (current run {}, {})",
                worker_id,
                event.run_id,
                self.run_id,
                self.state
            );
            return Vec::new();
        }

        match event.message {
            WorkerMessage::Progress(progress) => {
                self.hash_rates.insert(worker_id, progress.hash_rate);

                let mut global_best = None;
                if let Some(pow) = &progress.best_pow {
                    let improves_worker = self
                        .workers_pow
                        .get(&worker_id)
                        .is_none_or(|best| pow.best_difficulty_bits > best.best_difficulty_bits);
                    if improves_worker {
                        self.workers_pow.insert(worker_id, pow.clone());
                    }

                    if self.tracker.update(pow, worker_id) {
                        log::debug!(
                            "New best: {} bits from worker {} (nonce {})",
                            pow.best_difficulty_bits,
                            worker_id,
                            pow.nonce
                        );
                        global_best = self.tracker.best().cloned();
                    }
                }

                vec![Notice::Progress(ProgressEvent {
                    worker_id,
                    hash_rate: progress.hash_rate,
                    best_pow: progress.best_pow,
                    global_best,
                })]
            }
            WorkerMessage::Result(result) => {
                log::info!(
                    "Worker {} mined event {} in {:.2}s ({:.0} H/s)",
                    worker_id,
                    result.event.id,
                    result.total_time_seconds,
                    result.hash_rate
                );
                self.state = RunState::Succeeded;
                self.result = Some(result.clone());
                self.terminate_all();

                vec![Notice::Success(SuccessEvent { result })]
            }
            WorkerMessage::Error(reason) => {
                let error = MinerError::WorkerError { worker_id, reason };
                log::warn!("{}", error);

                let mut notices = vec![Notice::Error(ErrorEvent {
                    worker_id: Some(worker_id),
                    error: error.to_string(),
                    message: None,
                    fatal: false,
                })];

                if self.live.remove(&worker_id) && self.live.is_empty() {
                    log::error!(
                        "Run {} failed: every worker exited without a result",
                        self.run_id
                    );
                    self.state = RunState::Failed;
                    self.terminate_all();
                    notices.push(Notice::Error(ErrorEvent {
                        worker_id: None,
                        error: "All workers exited without a result".into(),
                        message: Some(format!("run {} failed", self.run_id)),
                        fatal: true,
                    }));
                }
                notices
            }
        }
    }
}

struct Inner {
    primitive: Arc<dyn MinePrimitive>,
    next: Mutex<NextRun>,
    run: Mutex<RunContext>,
    finished: Condvar,
    events: EventStream,
}

impl Inner {
    fn emit_all(&self, notices: Vec<Notice>) {
        for notice in notices {
            self.events.emit(notice);
        }
    }

    fn handle(&self, event: WorkerEvent) {
        let notices = {
            let mut run = self.run.lock();
            let notices = run.apply(event);
            if run.state.is_terminal() {
                self.finished.notify_all();
            }
            notices
        };
        self.emit_all(notices);
    }

    fn report_stall(&self, run_id: u64, timeout: Duration) {
        if !self.run.lock().is_mining(run_id) {
            return;
        }
        log::warn!(
            "Run {}: no worker activity for {}s",
            run_id,
            timeout.as_secs_f64()
        );
        self.events.emit(Notice::Error(ErrorEvent {
            worker_id: None,
            error: format!("No worker activity for {:.1}s", timeout.as_secs_f64()),
            message: Some("the run continues until cancelled".into()),
            fatal: false,
        }));
    }

    fn dispatch(
        self: Arc<Self>,
        run_id: u64,
        receiver: Receiver<WorkerEvent>,
        stall_timeout: Option<Duration>,
    ) {
        loop {
            let next = match stall_timeout {
                Some(timeout) => receiver.recv_timeout(timeout),
                None => receiver
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match next {
                Ok(event) => self.handle(event),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(timeout) = stall_timeout {
                        self.report_stall(run_id, timeout);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if !self.run.lock().is_mining(run_id) {
                break;
            }
        }
        log::debug!("Dispatcher for run {} stopped", run_id);
    }
}

/// Coordinates a pool of workers searching for a proof-of-work note
///
/// One coordinator serves any number of consecutive runs; at most one run
/// is mining at a time. Dropping the coordinator terminates its workers.
pub struct MiningCoordinator {
    inner: Arc<Inner>,
}

impl MiningCoordinator {
    /// Creates a coordinator using the default NIP-13 primitive
    pub fn new(config: MiningConfiguration) -> Self {
        Self::with_primitive(config, Arc::new(Nip13Miner::default()))
    }

    /// Creates a coordinator running `primitive` in every worker
    pub fn with_primitive(config: MiningConfiguration, primitive: Arc<dyn MinePrimitive>) -> Self {
        Self {
            inner: Arc::new(Inner {
                primitive,
                next: Mutex::new(NextRun {
                    config,
                    stall_timeout: None,
                }),
                run: Mutex::new(RunContext::default()),
                finished: Condvar::new(),
                events: EventStream::new(),
            }),
        }
    }

    /// Notification channels of this coordinator
    pub fn events(&self) -> &EventStream {
        &self.inner.events
    }

    /// Sets the content of the next run
    pub fn set_content(&self, content: impl Into<String>) {
        self.inner.next.lock().config.content = content.into();
    }

    /// Sets the tags of the next run
    pub fn set_tags(&self, tags: Tags) {
        self.inner.next.lock().config.tags = tags;
    }

    /// Sets the public key of the next run
    pub fn set_pubkey(&self, public_key: impl Into<String>) {
        self.inner.next.lock().config.public_key = public_key.into();
    }

    /// Sets the target difficulty of the next run
    pub fn set_difficulty(&self, difficulty: u32) {
        self.inner.next.lock().config.difficulty = difficulty;
    }

    /// Sets the worker count of the next run
    pub fn set_worker_count(&self, worker_count: usize) {
        self.inner.next.lock().config.worker_count = worker_count;
    }

    /// Enables or disables the inactivity watchdog for the next run
    ///
    /// When enabled, a non-fatal error event is published every time no
    /// worker message arrives within `timeout`. A zero timeout disables it.
    pub fn set_stall_timeout(&self, timeout: Option<Duration>) {
        self.inner.next.lock().stall_timeout = timeout.filter(|t| !t.is_zero());
    }

    /// Inactivity watchdog the next `mine()` call will use
    pub fn stall_timeout(&self) -> Option<Duration> {
        self.inner.next.lock().stall_timeout
    }

    /// Configuration the next `mine()` call will use
    pub fn configuration(&self) -> MiningConfiguration {
        self.inner.next.lock().config.clone()
    }

    /// Configuration snapshot of the current (or last) run
    pub fn active_configuration(&self) -> Option<MiningConfiguration> {
        self.inner.run.lock().config.clone()
    }

    /// Starts a run
    ///
    /// Returns once the workers are spawned; completion is observed through
    /// the event channels or [`wait`](Self::wait). Does nothing while a run
    /// is already mining.
    ///
    /// # Errors
    /// `ConfigError` if the public key or content is empty or the worker
    /// count is zero. No state changes and no workers are spawned then.
    pub fn mine(&self) -> Result<(), MinerError> {
        let NextRun {
            config,
            stall_timeout,
        } = self.inner.next.lock().clone();

        let mut notices = Vec::new();
        {
            let mut run = self.inner.run.lock();
            if run.state == RunState::Mining {
                log::debug!("mine() ignored: run {} is in progress", run.run_id);
                return Ok(());
            }

            config.validate()?;
            let payload = CandidateEvent::new(&config, unix_now()).to_json()?;

            run.begin(config.clone());
            let run_id = run.run_id;
            let (sender, receiver) = unbounded();

            for (worker_id, assignment) in nonce::allocate_all(config.worker_count)
                .into_iter()
                .enumerate()
            {
                let job = MiningJob {
                    worker_id,
                    event: payload.clone(),
                    difficulty: config.difficulty,
                    start_nonce: assignment.start,
                    step: assignment.step,
                };

                match WorkerHandle::spawn(
                    run_id,
                    job,
                    Arc::clone(&self.inner.primitive),
                    sender.clone(),
                ) {
                    Ok(handle) => {
                        run.live.insert(worker_id);
                        run.workers.push(handle);
                    }
                    Err(e) => {
                        log::warn!("Worker {} could not be started: {}", worker_id, e);
                        notices.push(Notice::Error(ErrorEvent {
                            worker_id: Some(worker_id),
                            error: MinerError::WorkerError {
                                worker_id,
                                reason: e.to_string(),
                            }
                            .to_string(),
                            message: Some("worker not started".into()),
                            fatal: false,
                        }));
                    }
                }
            }
            drop(sender);

            let dispatcher = if run.workers.is_empty() {
                None
            } else {
                let inner = Arc::clone(&self.inner);
                thread::Builder::new()
                    .name(format!("note-miner-dispatch-{}", run_id))
                    .spawn(move || inner.dispatch(run_id, receiver, stall_timeout))
                    .map_err(|e| log::error!("Dispatcher could not be started: {}", e))
                    .ok()
            };

            if dispatcher.is_none() {
                run.state = RunState::Failed;
                run.terminate_all();
                self.inner.finished.notify_all();
                notices.push(Notice::Error(ErrorEvent {
                    worker_id: None,
                    error: "Mining run could not be started".into(),
                    message: Some(format!("run {} failed", run_id)),
                    fatal: true,
                }));
            } else {
                log::info!(
                    "Run {} started: {} workers, difficulty {} ({})",
                    run_id,
                    run.workers.len(),
                    config.difficulty,
                    self.inner.primitive.name()
                );
            }
        }

        self.inner.emit_all(notices);
        Ok(())
    }

    /// Cancels the current run
    ///
    /// Sends terminate to every worker without waiting for them and publishes
    /// one cancelled event. Does nothing unless a run is mining.
    pub fn cancel(&self) {
        {
            let mut run = self.inner.run.lock();
            if run.state != RunState::Mining {
                log::debug!("cancel() ignored: no run in progress");
                return;
            }
            run.cancelled = true;
            run.terminate_all();
            run.state = RunState::Cancelled;
            log::info!(
                "Run {} cancelled after {:.2}s",
                run.run_id,
                run.elapsed_secs()
            );
            self.inner.finished.notify_all();
        }

        self.inner.events.emit(Notice::Cancelled(CancelledEvent {
            reason: Some(CANCEL_REASON.to_string()),
        }));
    }

    /// Handles one inbound worker message
    ///
    /// Called by the dispatcher for every message a worker posts. Messages
    /// stamped with another run, or arriving after the run ended, are
    /// discarded.
    pub fn handle_worker_event(&self, event: WorkerEvent) {
        self.inner.handle(event);
    }

    /// Blocks until the current run leaves `Mining` or `timeout` elapses
    ///
    /// Returns the state observed last. The matching success, cancelled or
    /// error event is published after the state changes, so subscribers may
    /// not have seen it yet when this returns.
    pub fn wait(&self, timeout: Duration) -> RunState {
        let deadline = Instant::now() + timeout;
        let mut run = self.inner.run.lock();
        while run.state == RunState::Mining {
            if self.inner.finished.wait_until(&mut run, deadline).timed_out() {
                break;
            }
        }
        run.state
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        self.inner.run.lock().state
    }

    /// True while a run is mining
    pub fn is_mining(&self) -> bool {
        self.state() == RunState::Mining
    }

    /// True if the last run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.run.lock().cancelled
    }

    /// Generation of the current (or last) run, zero before the first
    pub fn run_id(&self) -> u64 {
        self.inner.run.lock().run_id
    }

    /// Result of the last successful run
    pub fn result(&self) -> Option<MinedResult> {
        self.inner.run.lock().result.clone()
    }

    /// Finalized event of the last result, ready to be signed and published
    ///
    /// # Errors
    /// `NoResultError` if no run has succeeded yet.
    pub fn publishable_event(&self) -> Result<MinedEvent, MinerError> {
        self.inner
            .run
            .lock()
            .result
            .as_ref()
            .map(|result| result.event.clone())
            .ok_or(MinerError::NoResultError)
    }

    /// Highest proof of work seen in the current run
    pub fn highest_pow(&self) -> Option<WorkerPow> {
        self.inner.run.lock().tracker.best().cloned()
    }

    /// Best proof of work reported by one worker in the current run
    pub fn worker_pow(&self, worker_id: usize) -> Option<ProofOfWork> {
        self.inner.run.lock().workers_pow.get(&worker_id).cloned()
    }

    /// Sum of the latest hash rate of every worker in the current run
    pub fn hash_rate(&self) -> f64 {
        self.inner.run.lock().hash_rates.values().sum()
    }

    /// Number of worker handles spawned for the current run
    pub fn spawned_workers(&self) -> usize {
        self.inner.run.lock().workers.len()
    }

    /// Number of workers still expected to report
    pub fn live_workers(&self) -> usize {
        self.inner.run.lock().live.len()
    }
}

impl Drop for MiningCoordinator {
    fn drop(&mut self) {
        let mut run = self.inner.run.lock();
        if !run.state.is_terminal() && !run.workers.is_empty() {
            log::debug!("Coordinator dropped, terminating run {}", run.run_id);
            run.terminate_all();
        }
    }
}

impl std::fmt::Debug for MiningCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let run = self.inner.run.lock();
        f.debug_struct("MiningCoordinator")
            .field("run_id", &run.run_id)
            .field("state", &run.state)
            .field("workers", &run.workers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::algorithm::{CancelFn, ProgressFn};
    use crate::miner::event::TEXT_NOTE_KIND;

    /// Idles until cancelled, never reports anything
    struct Idle;

    impl MinePrimitive for Idle {
        fn mine(
            &self,
            _job: &MiningJob,
            _on_progress: &mut ProgressFn<'_>,
            should_cancel: &CancelFn<'_>,
        ) -> Result<Option<MinedResult>, MinerError> {
            while !should_cancel() {
                thread::sleep(Duration::from_millis(2));
            }
            Ok(None)
        }

        fn name(&self) -> &'static str {
            "idle"
        }
    }

    fn config() -> MiningConfiguration {
        MiningConfiguration {
            content: "hello".into(),
            tags: Vec::new(),
            public_key: "abc".into(),
            difficulty: 4,
            worker_count: 2,
        }
    }

    fn idle_coordinator() -> MiningCoordinator {
        MiningCoordinator::with_primitive(config(), Arc::new(Idle))
    }

    fn mined(content: &str) -> MinedResult {
        MinedResult {
            event: MinedEvent {
                id: "00ff".into(),
                pubkey: "abc".into(),
                created_at: 1,
                kind: TEXT_NOTE_KIND,
                tags: vec![vec!["nonce".into(), "42".into(), "4".into()]],
                content: content.into(),
            },
            total_time_seconds: 1.0,
            hash_rate: 1000.0,
        }
    }

    #[test]
    fn starts_idle() {
        let coordinator = idle_coordinator();
        assert_eq!(coordinator.state(), RunState::Idle);
        assert!(!coordinator.is_mining());
        assert!(!coordinator.is_cancelled());
        assert!(coordinator.result().is_none());
        assert!(matches!(
            coordinator.publishable_event(),
            Err(MinerError::NoResultError)
        ));
    }

    #[test]
    fn setters_only_affect_the_next_run() {
        let coordinator = idle_coordinator();
        coordinator.mine().unwrap();
        coordinator.set_content("changed");
        coordinator.set_worker_count(5);

        let active = coordinator.active_configuration().unwrap();
        assert_eq!(active.content, "hello");
        assert_eq!(active.worker_count, 2);
        assert_eq!(coordinator.configuration().content, "changed");
        coordinator.cancel();
    }

    #[test]
    fn late_message_from_previous_run_is_discarded() {
        let coordinator = idle_coordinator();
        coordinator.mine().unwrap();
        let first_run = coordinator.run_id();
        coordinator.cancel();
        coordinator.mine().unwrap();

        coordinator.handle_worker_event(WorkerEvent::result(first_run, 0, mined("stale")));
        assert!(coordinator.is_mining());
        assert!(coordinator.result().is_none());
        coordinator.cancel();
    }

    #[test]
    fn worker_best_only_moves_up() {
        let coordinator = idle_coordinator();
        coordinator.mine().unwrap();
        let run = coordinator.run_id();
        let pow = |bits: u32| ProofOfWork {
            best_difficulty_bits: bits,
            nonce: bits.to_string(),
            hash: "h".into(),
        };

        coordinator.handle_worker_event(WorkerEvent::progress(run, 1, 10.0, Some(pow(6))));
        coordinator.handle_worker_event(WorkerEvent::progress(run, 1, 20.0, Some(pow(3))));
        assert_eq!(coordinator.worker_pow(1).unwrap().best_difficulty_bits, 6);
        assert_eq!(coordinator.hash_rate(), 20.0);
        coordinator.cancel();
    }

    #[test]
    fn errors_from_every_worker_fail_the_run() {
        let coordinator = idle_coordinator();
        coordinator.mine().unwrap();
        let run = coordinator.run_id();

        coordinator.handle_worker_event(WorkerEvent::error(run, 0, "disk on fire"));
        assert!(coordinator.is_mining());
        assert_eq!(coordinator.live_workers(), 1);

        coordinator.handle_worker_event(WorkerEvent::error(run, 1, "disk on fire"));
        assert_eq!(coordinator.state(), RunState::Failed);
        assert!(coordinator.state().is_terminal());
        assert_eq!(coordinator.wait(Duration::from_millis(10)), RunState::Failed);
        assert!(!coordinator.is_cancelled());
    }

    #[test]
    fn only_finished_runs_are_terminal() {
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Mining.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
    }

    #[test]
    fn zero_stall_timeout_is_disabled() {
        let coordinator = idle_coordinator();
        coordinator.set_stall_timeout(Some(Duration::ZERO));
        assert_eq!(coordinator.stall_timeout(), None);

        coordinator.set_stall_timeout(Some(Duration::from_secs(5)));
        assert_eq!(coordinator.stall_timeout(), Some(Duration::from_secs(5)));
    }
}
