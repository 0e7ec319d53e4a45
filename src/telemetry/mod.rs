//! Telemetry module.
//!
//! Structured logging setup. Counters are emitted through the `metrics`
//! facade at the call sites; installing a recorder is left to the embedder.

mod logging;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
