//! Relay submission layer.
//!
//! Responsibilities:
//! - Sign workable groups into raw EIP-2718 bundles.
//! - Gate broadcasts behind an optional simulation on the first relay.
//! - Broadcast to every configured relay and resolve inclusion on-chain.

pub mod client;
pub mod submitter;
pub mod types;

pub use client::RelayClient;
pub use submitter::{BundleSubmitter, Submit};
pub use types::{BundleResolution, SignedBundle, SubmitError};
