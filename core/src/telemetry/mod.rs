//! Per-stage log collection and counters.

pub mod log;
pub mod metrics;

pub use log::LogManager;
pub use metrics::MetricsRecorder;
