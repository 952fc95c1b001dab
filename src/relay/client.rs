//! Single-relay JSON-RPC client.
//!
//! Speaks the flashbots-style bundle RPC (`eth_sendBundle`,
//! `eth_callBundle`). Every request body is signed by the bundle-signer
//! wallet and carried in the `X-Flashbots-Signature` header; that key
//! builds relay reputation and is distinct from the keeper key that signs
//! the transactions themselves.

use alloy::primitives::{hex, keccak256};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::blockchain::wallet::Wallet;
use crate::relay::types::{
    CallBundleParams, CallBundleResult, JsonRpcRequest, JsonRpcResponse, SendBundleParams,
    SendBundleResult, SignedBundle, SubmitError,
};

/// HTTP header carrying the payload signature.
const SIGNATURE_HEADER: &str = "X-Flashbots-Signature";

/// One configured relay endpoint.
#[derive(Clone)]
pub struct RelayClient {
    url: Url,
    http: reqwest::Client,
    bundle_signer: Wallet,
}

impl RelayClient {
    pub fn new(url: Url, bundle_signer: Wallet) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
            bundle_signer,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Simulate a signed bundle against this relay at its target block.
    pub async fn call_bundle(&self, bundle: &SignedBundle) -> Result<CallBundleResult, SubmitError> {
        let params = [CallBundleParams {
            txs: bundle.txs.clone(),
            block_number: format!("{:#x}", bundle.target_block),
            state_block_number: "latest".to_string(),
        }];
        self.request("eth_callBundle", params).await
    }

    /// Submit a signed bundle to this relay for its target block.
    pub async fn send_bundle(&self, bundle: &SignedBundle) -> Result<SendBundleResult, SubmitError> {
        let params = [SendBundleParams {
            txs: bundle.txs.clone(),
            block_number: format!("{:#x}", bundle.target_block),
        }];
        self.request("eth_sendBundle", params).await
    }

    async fn request<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<R, SubmitError> {
        let body = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        })
        .map_err(|e| SubmitError::Response(e.to_string()))?;

        let signature = self.payload_signature(&body)?;

        let response = self
            .http
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| SubmitError::Relay(e.to_string()))?;

        let parsed: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| SubmitError::Response(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(SubmitError::Relay(format!(
                "{} ({})",
                error.message, error.code
            )));
        }

        parsed
            .result
            .ok_or_else(|| SubmitError::Response("missing result".to_string()))
    }

    /// Compute the payload signature header value: the signer address and
    /// an EIP-191 signature over the hex string of the body's keccak hash.
    fn payload_signature(&self, body: &str) -> Result<String, SubmitError> {
        let digest = format!("{:?}", keccak256(body.as_bytes()));
        let signature = self
            .bundle_signer
            .sign_message(digest.as_bytes())
            .map_err(|e| SubmitError::Signing(e.to_string()))?;
        Ok(format!(
            "{:?}:0x{}",
            self.bundle_signer.address(),
            hex::encode(signature.as_bytes())
        ))
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient").field("url", &self.url).finish()
    }
}
