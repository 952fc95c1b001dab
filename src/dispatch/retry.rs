//! Retry loop for work that failed to land on-chain.

use std::time::Duration;

use crate::dispatch::dispatcher::DispatchContext;
use crate::observability::metrics;
use crate::process::protocol::WorkRequest;
use crate::relay::Submit;

/// How often the chain head is polled between retry attempts.
const RETRY_POLL: Duration = Duration::from_secs(3);

/// Re-submits a correlation id until it lands or shutdown fires.
///
/// There is no attempt cap: the in-flight claim clears only on inclusion.
/// Cadence is bounded to once per new block by the head poll between
/// attempts.
pub struct RetryEngine<'a, S: Submit> {
    ctx: &'a DispatchContext<S>,
}

impl<'a, S: Submit> RetryEngine<'a, S> {
    pub fn new(ctx: &'a DispatchContext<S>) -> Self {
        Self { ctx }
    }

    /// Drive `request` to inclusion. `last_block` is the block the initial
    /// dispatch ran against; each retry waits for the head to pass the
    /// previous attempt's block before re-forking the wrapper.
    ///
    /// Only work produced by the most recent dispatch is ever submitted. A
    /// retry dispatch that finds nothing workable ends the loop and
    /// releases the in-flight claim: the opportunity is gone, and its stale
    /// bundles must not be re-broadcast.
    pub async fn run(self, request: WorkRequest, mut last_block: u64) {
        let correlation_id = request.correlation_id.clone();
        let job = self.ctx.job.metadata.name.clone();
        let mut pending = Some(request);

        loop {
            if let Some(request) = pending.take() {
                if self.ctx.submitter.submit(&request).await {
                    self.ctx.in_flight.remove(&correlation_id);
                    tracing::info!(job = %job, correlation_id = %correlation_id, "Work included");
                    return;
                }

                metrics::record_retry(&job);
                tracing::warn!(
                    job = %job,
                    correlation_id = %correlation_id,
                    block = last_block,
                    "Submission failed, retrying on next block"
                );
            }

            let Some(head) = self.next_head_after(last_block).await else {
                tracing::info!(
                    job = %job,
                    correlation_id = %correlation_id,
                    "Retry loop stopped by shutdown"
                );
                return;
            };
            last_block = head;

            // the correlation id is still in flight, so the wrapper sees it
            // on its skip list alongside the explicit retry id
            match self.ctx.dispatch_once(head, Some(&correlation_id)).await {
                Ok(Some(next)) => pending = Some(next),
                Ok(None) => {
                    self.ctx.in_flight.remove(&correlation_id);
                    tracing::info!(
                        job = %job,
                        correlation_id = %correlation_id,
                        block = head,
                        "No workable groups on retry, releasing claim"
                    );
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        job = %job,
                        correlation_id = %correlation_id,
                        error = %e,
                        "Retry dispatch failed"
                    );
                }
            }
        }
    }

    /// Poll the chain until the head passes `block`. Returns None when
    /// shutdown fires first.
    async fn next_head_after(&self, block: u64) -> Option<u64> {
        let mut shutdown_rx = self.ctx.shutdown.subscribe();
        loop {
            match self.ctx.chain.get_block_number().await {
                Ok(head) if head > block => return Some(head),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to poll chain head");
                }
            }
            tokio::select! {
                _ = shutdown_rx.recv() => return None,
                _ = tokio::time::sleep(RETRY_POLL) => {}
            }
        }
    }
}
