//! Bundle signing, simulation gating, and multi-relay broadcast.

use std::time::Duration;

use alloy::consensus::TxEip1559;
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{hex, Address, TxKind};

use crate::blockchain::{ChainClient, Wallet};
use crate::observability::metrics;
use crate::process::protocol::{WorkRequest, WorkableGroup};
use crate::relay::client::RelayClient;
use crate::relay::types::{BundleResolution, SignedBundle, SubmitError};

/// How often the chain head is polled while waiting for a bundle's target
/// block to pass.
const RESOLUTION_POLL: Duration = Duration::from_secs(3);

/// Submission capability consumed by the dispatch pipeline.
pub trait Submit: Send + Sync {
    /// Sign, optionally simulate, and broadcast a work request's bundles.
    /// Returns whether the submission succeeded.
    fn submit(&self, request: &WorkRequest) -> impl std::future::Future<Output = bool> + Send;
}

/// Signs work-request bundles and broadcasts them to every configured
/// relay, with optional simulation gating against the first relay.
#[derive(Clone)]
pub struct BundleSubmitter {
    relays: Vec<RelayClient>,
    tx_signer: Wallet,
    chain: ChainClient,
    simulate: bool,
}

impl BundleSubmitter {
    pub fn new(
        relays: Vec<RelayClient>,
        tx_signer: Wallet,
        chain: ChainClient,
        simulate: bool,
    ) -> Self {
        Self {
            relays,
            tx_signer,
            chain,
            simulate,
        }
    }

    /// Address whose transactions the bundles carry.
    pub fn keeper_address(&self) -> Address {
        self.tx_signer.address()
    }

    /// Submit every workable group of a request.
    ///
    /// An empty burst succeeds immediately with no network activity. With
    /// multiple groups, only the first group's outcome is returned; the
    /// remaining groups are still sent, but their results are not reflected
    /// in the return value. That asymmetry is long-standing observed
    /// behavior the retry loop depends on, so it is kept (and pinned by a
    /// test) rather than corrected.
    pub async fn submit_bundles(&self, request: &WorkRequest) -> bool {
        tracing::info!(
            job = %request.job,
            correlation_id = %request.correlation_id,
            groups = request.burst.len(),
            "Sending txs"
        );
        if request.burst.is_empty() {
            return true;
        }

        let mut first_outcome = None;
        for (i, group) in request.burst.iter().enumerate() {
            if i == 0 {
                first_outcome = Some(self.send_group(group).await);
            } else {
                let submitter = self.clone();
                let group = group.clone();
                tokio::spawn(async move {
                    submitter.send_group(&group).await;
                });
            }
        }

        let included = first_outcome.unwrap_or(true);
        metrics::record_submission(&request.job, included);
        included
    }

    /// Sign, gate, and broadcast one workable group.
    async fn send_group(&self, group: &WorkableGroup) -> bool {
        let bundle = match self.sign_group(group) {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::error!(log_id = %group.log_id, error = %e, "Rejecting workable group");
                return false;
            }
        };

        if self.simulate {
            let Some(simulation_relay) = self.relays.first() else {
                tracing::error!(log_id = %bundle.log_id, "No relay available for simulation");
                return false;
            };
            if !self.simulate_bundle(simulation_relay, &bundle).await {
                return false;
            }
        }

        self.broadcast(&bundle).await
    }

    /// Validate the payment invariant, then sign every transaction.
    ///
    /// Validation runs before any signing: a group whose last transaction
    /// cannot carry the priority-fee payment is rejected outright.
    fn sign_group(&self, group: &WorkableGroup) -> Result<SignedBundle, SubmitError> {
        let last = group
            .unsigned_txs
            .last()
            .ok_or_else(|| SubmitError::InvalidGroup("empty group".to_string()))?;
        if !last.supports_priority_fee() {
            return Err(SubmitError::InvalidGroup(
                "last tx must be EIP-1559 for producer payment".to_string(),
            ));
        }

        let mut txs = Vec::with_capacity(group.unsigned_txs.len());
        let mut first_tx_hash = None;
        let mut first_tx_nonce = 0;

        for (i, tx) in group.unsigned_txs.iter().enumerate() {
            let envelope = self
                .tx_signer
                .sign_eip1559(TxEip1559 {
                    chain_id: tx.chain_id,
                    nonce: tx.nonce,
                    gas_limit: tx.gas_limit,
                    max_fee_per_gas: tx.max_fee_per_gas,
                    max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
                    to: TxKind::Call(tx.to),
                    value: tx.value,
                    access_list: Default::default(),
                    input: tx.data.clone(),
                })
                .map_err(|e| SubmitError::Signing(e.to_string()))?;

            if i == 0 {
                first_tx_hash = Some(*envelope.tx_hash());
                first_tx_nonce = tx.nonce;
            }

            let mut raw = Vec::new();
            envelope.encode_2718(&mut raw);
            txs.push(hex::encode_prefixed(raw));
        }

        Ok(SignedBundle {
            txs,
            first_tx_hash: first_tx_hash
                .ok_or_else(|| SubmitError::InvalidGroup("empty group".to_string()))?,
            first_tx_nonce,
            target_block: group.target_block,
            log_id: group.log_id.clone(),
        })
    }

    /// Simulate against one relay; any error or reverted tx fails the gate.
    async fn simulate_bundle(&self, relay: &RelayClient, bundle: &SignedBundle) -> bool {
        match relay.call_bundle(bundle).await {
            Ok(result) => {
                if let Some(revert) = result.first_revert() {
                    tracing::warn!(
                        target_block = bundle.target_block,
                        log_id = %bundle.log_id,
                        tx_hash = ?revert.tx_hash,
                        error = ?revert.error,
                        "Bundle simulation error"
                    );
                    false
                } else {
                    tracing::info!(
                        target_block = bundle.target_block,
                        log_id = %bundle.log_id,
                        "Bundle simulation success"
                    );
                    true
                }
            }
            Err(e) => {
                tracing::warn!(
                    target_block = bundle.target_block,
                    log_id = %bundle.log_id,
                    error = %e,
                    "Bundle simulation error"
                );
                false
            }
        }
    }

    /// Broadcast to every relay concurrently; succeed if any includes.
    async fn broadcast(&self, bundle: &SignedBundle) -> bool {
        let sends = self
            .relays
            .iter()
            .map(|relay| self.send_to_relay(relay, bundle));
        let inclusions = futures_util::future::join_all(sends).await;
        inclusions.into_iter().any(|included| included)
    }

    /// Send to one relay and await its resolution. A transport failure here
    /// never aborts the other relays.
    async fn send_to_relay(&self, relay: &RelayClient, bundle: &SignedBundle) -> bool {
        tracing::info!(
            relay = %relay.url(),
            target_block = bundle.target_block,
            log_id = %bundle.log_id,
            "Sending bundle"
        );

        if let Err(e) = relay.send_bundle(bundle).await {
            tracing::warn!(
                relay = %relay.url(),
                log_id = %bundle.log_id,
                error = %e,
                "Failed to send bundle"
            );
            return false;
        }

        match self.wait_for_resolution(bundle).await {
            Ok(BundleResolution::Included) => {
                tracing::info!(
                    relay = %relay.url(),
                    log_id = %bundle.log_id,
                    "Bundle status: BundleIncluded"
                );
                true
            }
            Ok(BundleResolution::BlockPassedWithoutInclusion) => {
                tracing::info!(
                    relay = %relay.url(),
                    log_id = %bundle.log_id,
                    "Bundle status: BlockPassedWithoutInclusion"
                );
                false
            }
            Ok(BundleResolution::AccountNonceTooHigh) => {
                tracing::warn!(
                    relay = %relay.url(),
                    log_id = %bundle.log_id,
                    "AccountNonceTooHigh"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    relay = %relay.url(),
                    log_id = %bundle.log_id,
                    error = %e,
                    "Failed to resolve bundle"
                );
                false
            }
        }
    }

    /// Wait until the target block has passed, then classify the outcome:
    /// receipt present → included; keeper nonce moved past the bundle →
    /// stale nonce; otherwise the block simply passed without inclusion.
    async fn wait_for_resolution(
        &self,
        bundle: &SignedBundle,
    ) -> Result<BundleResolution, crate::blockchain::BlockchainError> {
        loop {
            let head = self.chain.get_block_number().await?;
            if head >= bundle.target_block {
                break;
            }
            tokio::time::sleep(RESOLUTION_POLL).await;
        }

        if self
            .chain
            .get_transaction_receipt(bundle.first_tx_hash)
            .await?
            .is_some()
        {
            return Ok(BundleResolution::Included);
        }

        let nonce = self
            .chain
            .get_transaction_count(self.keeper_address())
            .await?;
        if nonce > bundle.first_tx_nonce {
            return Ok(BundleResolution::AccountNonceTooHigh);
        }

        Ok(BundleResolution::BlockPassedWithoutInclusion)
    }
}

impl Submit for BundleSubmitter {
    fn submit(&self, request: &WorkRequest) -> impl std::future::Future<Output = bool> + Send {
        self.submit_bundles(request)
    }
}

impl std::fmt::Debug for BundleSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleSubmitter")
            .field("relays", &self.relays.len())
            .field("simulate", &self.simulate)
            .finish()
    }
}
