//! Chain-head block source.
//!
//! Wraps the websocket head subscription and multicasts one [`BlockInfo`]
//! per new head to every subscriber. Late subscribers only receive events
//! from their subscription point onward. If the underlying subscription
//! ends, the channel closes and every subscriber observes the failure as
//! fatal; there is no implicit reconnection.

use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use futures_util::StreamExt;
use tokio::sync::broadcast;

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{BlockInfo, BlockchainError, BlockchainResult};
use crate::observability::metrics;

/// Capacity of the multicast channel. A slow dispatcher coalesces missed
/// blocks anyway, so lag here only costs already-stale heads.
const CHANNEL_CAPACITY: usize = 64;

/// Multicasting source of chain-head blocks.
pub struct BlockSource {
    sender: broadcast::Sender<BlockInfo>,
}

impl BlockSource {
    /// Connect the websocket subscription and start publishing heads.
    ///
    /// Each head notification is resolved to a full block through `client`
    /// before being published.
    pub async fn connect(ws_url: &str, client: ChainClient) -> BlockchainResult<Self> {
        let ws = ProviderBuilder::new()
            .connect_ws(WsConnect::new(ws_url))
            .await
            .map_err(|e| BlockchainError::Subscription(format!("{}: {}", ws_url, e)))?;

        let subscription = ws
            .subscribe_blocks()
            .await
            .map_err(|e| BlockchainError::Subscription(e.to_string()))?;

        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let task_sender = sender.clone();

        tokio::spawn(async move {
            // keep the provider alive for the duration of the subscription
            let _ws = ws;
            let mut stream = subscription.into_stream();

            while let Some(header) = stream.next().await {
                let number = header.number;
                match client.get_block(number).await {
                    Ok(block) => {
                        tracing::info!(number = block.number, "Block arrived");
                        metrics::record_block();
                        // send fails only when no dispatcher is listening yet
                        let _ = task_sender.send(block);
                    }
                    Err(e) => {
                        tracing::warn!(number, error = %e, "Failed to fetch new head block");
                    }
                }
            }

            tracing::error!("Block subscription ended");
            // dropping task_sender closes the channel once the BlockSource
            // handle is gone, surfacing the failure to all subscribers
        });

        Ok(Self { sender })
    }

    /// Subscribe to future head events.
    pub fn subscribe(&self) -> broadcast::Receiver<BlockInfo> {
        self.sender.subscribe()
    }
}
