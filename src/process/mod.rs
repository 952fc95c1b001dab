//! Subprocess management and the inter-process message protocol.

pub mod manager;
pub mod protocol;

pub use manager::{ProcessError, ProcessHandle, ProcessManager};
pub use protocol::{CoreMessage, JobMessage, UnsignedTx, WorkRequest, WorkableGroup};
