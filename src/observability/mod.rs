//! Observability subsystem.
//!
//! Every pipeline state transition (block arrival, work found, submission
//! result, retry start) emits a structured tracing event, and the hot
//! counters are mirrored as metrics so inclusion rates can be graphed.

pub mod logging;
pub mod metrics;
