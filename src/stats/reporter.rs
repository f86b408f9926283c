// src/stats/reporter.rs
use crate::events::{EventStream, SubscriptionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use sysinfo::{Components, System};

/// Aggregated mining performance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MiningStats {
    /// Sum of the latest hash rate of every worker (hashes per second)
    pub hash_rate: f64,
    /// Number of workers that have reported at least once
    pub workers_reporting: usize,
    /// Highest difficulty seen so far
    pub best_difficulty_bits: u32,
}

/// Statistics related to hardware performance
#[derive(Debug, Clone)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently used (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius
    pub temperature: f32,
}

struct SharedStats {
    hash_rates: Mutex<HashMap<usize, f64>>,
    best_bits: AtomicU32,
}

/// Collects progress events and periodically logs mining and hardware stats
pub struct StatsReporter {
    stats: Arc<SharedStats>,
    subscription: Option<SubscriptionId>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    report_interval: Duration,
}

impl StatsReporter {
    /// Creates a reporter that logs every `report_interval` once started
    pub fn new(report_interval: Duration) -> Self {
        StatsReporter {
            stats: Arc::new(SharedStats {
                hash_rates: Mutex::new(HashMap::new()),
                best_bits: AtomicU32::new(0),
            }),
            subscription: None,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
            report_interval,
        }
    }

    /// Subscribes to the progress channel of `events`
    ///
    /// Call [`detach`](Self::detach) with the same stream before dropping it.
    pub fn attach(&mut self, events: &EventStream) {
        let stats = Arc::clone(&self.stats);
        let id = events.progress.subscribe(move |progress| {
            stats
                .hash_rates
                .lock()
                .insert(progress.worker_id, progress.hash_rate);
            if let Some(best) = &progress.global_best {
                stats
                    .best_bits
                    .fetch_max(best.pow.best_difficulty_bits, Ordering::Relaxed);
            }
        });
        self.subscription = Some(id);
    }

    /// Unsubscribes from the progress channel
    pub fn detach(&mut self, events: &EventStream) {
        if let Some(id) = self.subscription.take() {
            events.progress.unsubscribe(id);
        }
    }

    /// Gets the current mining statistics
    pub fn get_stats(&self) -> MiningStats {
        let rates = self.stats.hash_rates.lock();
        MiningStats {
            hash_rate: rates.values().sum(),
            workers_reporting: rates.len(),
            best_difficulty_bits: self.stats.best_bits.load(Ordering::Relaxed),
        }
    }

    /// Starts the periodic reporting of statistics
    ///
    /// Spawns a background thread that logs stats at the configured interval
    /// until [`stop`](Self::stop) is called. Calling it twice is a no-op.
    pub fn start_reporting(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        let interval = self.report_interval;

        self.thread = Some(std::thread::spawn(move || {
            let mut system = System::new_all();
            let mut components = Components::new_with_refreshed_list();
            let tick = Duration::from_millis(100).min(interval);
            let mut waited = Duration::ZERO;

            while running.load(Ordering::Relaxed) {
                std::thread::sleep(tick);
                waited += tick;
                if waited < interval {
                    continue;
                }
                waited = Duration::ZERO;

                let hash_rate: f64 = stats.hash_rates.lock().values().sum();
                let best = stats.best_bits.load(Ordering::Relaxed);
                let hw = hardware_stats(&mut system, &mut components);

                log::info!(
                    "Hashrate: {:.2} H/s | Best: {} bits | CPU: {:.1}% | Temp: {:.1}°C",
                    hash_rate,
                    best,
                    hw.cpu_usage,
                    hw.temperature
                );
            }
        }));
    }

    /// Stops periodic reporting and waits for the reporter thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Samples CPU, memory and temperature
fn hardware_stats(system: &mut System, components: &mut Components) -> HardwareStats {
    system.refresh_cpu_all();
    system.refresh_memory();
    components.refresh(true);

    let cpus = system.cpus();
    let cpu_usage = if cpus.is_empty() {
        0.0
    } else {
        cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
    };

    let temperature = components
        .iter()
        .find(|c| c.label().contains("CPU"))
        .and_then(|c| c.temperature())
        .unwrap_or(0.0);

    HardwareStats {
        cpu_usage,
        memory_used: system.used_memory(),
        temperature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ProgressEvent;
    use crate::types::{ProofOfWork, WorkerPow};

    fn progress(worker_id: usize, hash_rate: f64, best: Option<u32>) -> ProgressEvent {
        ProgressEvent {
            worker_id,
            hash_rate,
            best_pow: None,
            global_best: best.map(|bits| WorkerPow {
                worker_id,
                pow: ProofOfWork {
                    best_difficulty_bits: bits,
                    nonce: "1".into(),
                    hash: "h".into(),
                },
            }),
        }
    }

    #[test]
    fn aggregates_latest_rate_per_worker() {
        let events = EventStream::new();
        let mut reporter = StatsReporter::new(Duration::from_secs(60));
        reporter.attach(&events);

        events.progress.publish(&progress(0, 100.0, Some(3)));
        events.progress.publish(&progress(1, 50.0, None));
        events.progress.publish(&progress(0, 120.0, Some(7)));

        let stats = reporter.get_stats();
        assert_eq!(stats.hash_rate, 170.0);
        assert_eq!(stats.workers_reporting, 2);
        assert_eq!(stats.best_difficulty_bits, 7);

        reporter.detach(&events);
        assert_eq!(events.progress.subscriber_count(), 0);
    }

    #[test]
    fn reporting_thread_stops() {
        let mut reporter = StatsReporter::new(Duration::from_millis(10));
        reporter.start_reporting();
        std::thread::sleep(Duration::from_millis(30));
        reporter.stop();
        assert!(reporter.thread.is_none());
    }
}
