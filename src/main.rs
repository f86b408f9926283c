// src/main.rs
use clap::Parser;
use log::LevelFilter;
use notemine_rs::cli::{self, Action, BenchmarkOptions, Commands, ConfigOptions, MineOptions};
use notemine_rs::config::{self, Config};
use notemine_rs::miner::{MiningConfiguration, MiningCoordinator, Nip13Miner};
use notemine_rs::stats::StatsReporter;
use notemine_rs::utils::{self, MinerError};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Difficulty no hash reaches in practice (every bit zero)
const BENCHMARK_DIFFICULTY: u32 = 256;

/// How a mining session ended
enum Outcome {
    Mined,
    Cancelled,
    Failed(String),
}

/// Main entry point for the note miner
///
/// Parses command line arguments and delegates to the subcommand handler.
fn main() -> Result<(), MinerError> {
    let cli = Commands::parse();

    match cli.action {
        Action::Mine(opts) => mine_note(opts, cli.verbose),
        Action::Benchmark(opts) => run_benchmark(opts),
        Action::Config(opts) => generate_config(opts),
    }
}

/// Mines one note and prints the finalized event
///
/// # Operations
/// 1. Loads the optional config file and applies CLI overrides
/// 2. Starts the coordinator and the stats reporter
/// 3. Waits for success, failure, or Ctrl-C (which cancels the run)
/// 4. Writes the mined event JSON to stdout or `--output`
fn mine_note(opts: MineOptions, verbose: bool) -> Result<(), MinerError> {
    utils::init_logging(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let mut config = match &opts.config {
        Some(path) => config::load(path)?,
        None => Config::default(),
    };
    // Apply CLI overrides
    if let Some(content) = opts.content {
        config.note.content = content;
    }
    if let Some(pubkey) = opts.pubkey {
        config.note.pubkey = pubkey;
    }
    if let Some(difficulty) = opts.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(workers) = opts.workers {
        config.worker_threads = workers;
    }
    if !opts.tags.is_empty() {
        config.note.tags = opts
            .tags
            .iter()
            .map(|raw| cli::parse_tag(raw))
            .collect::<Result<_, _>>()?;
    }

    let coordinator = MiningCoordinator::with_primitive(
        config.mining_configuration(),
        Arc::new(Nip13Miner::new(config.progress_interval())),
    );
    coordinator.set_stall_timeout(config.stall_timeout());

    let mut reporter = StatsReporter::new(config.report_interval());
    reporter.attach(coordinator.events());

    let rt = Runtime::new()?;
    let outcome = rt.block_on(async {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let on_success = tx.clone();
        coordinator.events().success.subscribe(move |_| {
            let _ = on_success.send(Outcome::Mined);
        });
        let on_cancel = tx.clone();
        coordinator.events().cancelled.subscribe(move |_| {
            let _ = on_cancel.send(Outcome::Cancelled);
        });
        coordinator.events().error.subscribe(move |event| {
            if event.fatal {
                let _ = tx.send(Outcome::Failed(event.error.clone()));
            } else {
                log::warn!("{}", event.error);
            }
        });

        coordinator.mine()?;
        reporter.start_reporting();

        let outcome = tokio::select! {
            outcome = rx.recv() => outcome.unwrap_or(Outcome::Cancelled),
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, cancelling");
                coordinator.cancel();
                Outcome::Cancelled
            }
        };
        Ok::<_, MinerError>(outcome)
    })?;

    reporter.stop();
    reporter.detach(coordinator.events());

    match outcome {
        Outcome::Mined => {
            let event = coordinator.publishable_event()?;
            if !event.has_valid_id() {
                log::warn!("Mined event id {} does not match its contents", event.id);
            }
            let pow = event.pow_difficulty();
            if pow < config.difficulty {
                log::warn!(
                    "Mined event proves {} bits, below the requested {}",
                    pow,
                    config.difficulty
                );
            } else {
                log::info!("Mined event proves {} bits of work", pow);
            }
            if let Some(result) = coordinator.result() {
                log::info!(
                    "Mined in {:.2}s at {:.0} H/s",
                    result.total_time_seconds,
                    result.hash_rate
                );
            }

            let json = serde_json::to_string_pretty(&event)?;
            match opts.output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    log::info!("Mined event written to {}", path.display());
                }
                None => println!("{}", json),
            }
            Ok(())
        }
        Outcome::Cancelled => {
            log::warn!("Mining cancelled before a solution was found");
            Ok(())
        }
        Outcome::Failed(reason) => {
            log::error!("Mining failed: {}", reason);
            Err(MinerError::NoResultError)
        }
    }
}

/// Runs a hash rate benchmark
///
/// Mines an unreachable difficulty for the requested duration, then cancels
/// and reports the aggregate hash rate of all workers.
fn run_benchmark(opts: BenchmarkOptions) -> Result<(), MinerError> {
    utils::init_bench_logging();

    let coordinator = MiningCoordinator::new(MiningConfiguration {
        content: "notemine benchmark".into(),
        tags: Vec::new(),
        public_key: "0".repeat(64),
        difficulty: BENCHMARK_DIFFICULTY,
        worker_count: opts.threads.max(1),
    });
    let mut reporter = StatsReporter::new(Duration::from_secs(5));
    reporter.attach(coordinator.events());

    log::info!(
        "Starting benchmark for {} seconds on {} threads",
        opts.duration,
        opts.threads.max(1)
    );

    coordinator.mine()?;
    reporter.start_reporting();
    std::thread::sleep(Duration::from_secs(opts.duration));

    let stats = reporter.get_stats();
    coordinator.cancel();
    reporter.stop();
    reporter.detach(coordinator.events());

    log::info!("Benchmark results:");
    log::info!("Workers reporting: {}", stats.workers_reporting);
    log::info!("Average hashrate: {:.2} H/s", stats.hash_rate);
    log::info!("Best difficulty: {} bits", stats.best_difficulty_bits);
    log::logger().flush();

    Ok(())
}

/// Writes a configuration template file
fn generate_config(opts: ConfigOptions) -> Result<(), MinerError> {
    let template = config::generate_template(opts.note);
    std::fs::write(&opts.output, template)?;
    println!("Configuration template written to {}", opts.output.display());
    Ok(())
}
