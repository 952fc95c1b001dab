//! Job dispatch pipeline.
//!
//! Responsibilities:
//! - Feed new blocks to one dispatch loop per configured job.
//! - Fork the job wrapper, answer its port requests, capture work requests.
//! - Track in-flight correlation ids and retry failed submissions.

pub mod dispatcher;
pub mod in_flight;
pub mod retry;

pub use dispatcher::{DispatchContext, DispatchError, WorkDispatcher};
pub use in_flight::InFlightSet;
pub use retry::RetryEngine;
