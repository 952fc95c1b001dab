//! Port allocation for job forks.

pub mod arbiter;

pub use arbiter::{PortArbiter, PortArbiterHandle, PortError, PORT_HOLD_WINDOW};
