// src/utils/logging.rs
//! Logging configuration and utilities
//!
//! Sets up `env_logger` for the miner binary and for tests. All output
//! shares one line format: `[ts level module:line] message`.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;

/// Initializes logging for a mining session
///
/// `default_level` applies when `RUST_LOG` is not set; otherwise the
/// environment wins.
pub fn init_logging(default_level: LevelFilter) {
    let mut builder = common_log_config();

    match env::var("RUST_LOG") {
        Ok(filters) => builder.parse_filters(&filters),
        Err(_) => builder.filter_level(default_level),
    };

    // A second init (e.g. library embedded in a host that already logs) is not fatal.
    let _ = builder.try_init();
}

/// Configures benchmark logging
///
/// Same as [`init_logging`] with Debug as the default level so per-worker
/// progress lines are visible.
pub fn init_bench_logging() {
    init_logging(LevelFilter::Debug);
}

/// Routes log output through the test harness capture
///
/// Safe to call from every test; only the first call installs the logger.
pub fn init_test_logging() {
    let _ = Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

fn common_log_config() -> Builder {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.module_path().unwrap_or_default(),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(Target::Stdout);

    builder
}
