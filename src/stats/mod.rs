//! Statistics collection and reporting module
//!
//! [`StatsReporter`] listens on a coordinator's progress channel, keeps the
//! latest hash rate of every worker and the best difficulty seen, and can
//! periodically log them together with hardware readings.

/// Submodule containing the statistics reporter implementation
pub mod reporter;

// Re-export main components
pub use reporter::{HardwareStats, MiningStats, StatsReporter};
