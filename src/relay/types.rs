//! Relay wire types and submission errors.

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while preparing or submitting a bundle.
///
/// All of these are transient from the pipeline's point of view: they turn a
/// submission into a retry, never into a crash.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The group violates the payment invariant (last tx must be EIP-1559).
    #[error("Invalid workable group: {0}")]
    InvalidGroup(String),

    /// Transaction signing failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// The relay rejected or failed the request.
    #[error("Relay error: {0}")]
    Relay(String),

    /// The relay response could not be interpreted.
    #[error("Malformed relay response: {0}")]
    Response(String),
}

/// Terminal state of a bundle at one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleResolution {
    /// The bundle landed in the target block.
    Included,
    /// The target block passed without the bundle; simply missed.
    BlockPassedWithoutInclusion,
    /// The keeper account's nonce moved past the bundle's first tx —
    /// a stale-nonce signal, logged distinctly.
    AccountNonceTooHigh,
}

/// A signed bundle ready for simulation and broadcast.
#[derive(Debug, Clone)]
pub struct SignedBundle {
    /// Raw EIP-2718 encoded transactions, hex with 0x prefix.
    pub txs: Vec<String>,
    /// Hash of the first transaction; used for the inclusion check.
    pub first_tx_hash: B256,
    /// Nonce of the first transaction; used for the stale-nonce check.
    pub first_tx_nonce: u64,
    /// Block the bundle targets.
    pub target_block: u64,
    /// Log correlation id carried from the workable group.
    pub log_id: String,
}

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: P,
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<R> {
    pub result: Option<R>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Parameters for `eth_sendBundle`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBundleParams {
    pub txs: Vec<String>,
    pub block_number: String,
}

/// Parameters for `eth_callBundle`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallBundleParams {
    pub txs: Vec<String>,
    pub block_number: String,
    pub state_block_number: String,
}

/// Result of `eth_sendBundle`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBundleResult {
    pub bundle_hash: Option<String>,
}

/// Result of `eth_callBundle`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallBundleResult {
    #[serde(default)]
    pub results: Vec<CallBundleTxResult>,
}

/// Per-transaction simulation outcome.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallBundleTxResult {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub revert: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

impl CallBundleResult {
    /// First transaction that errored or reverted during simulation, if any.
    pub fn first_revert(&self) -> Option<&CallBundleTxResult> {
        self.results
            .iter()
            .find(|r| r.error.is_some() || r.revert.is_some())
    }
}
