//! Per-job dispatch loop: block intake, subprocess orchestration, and the
//! hand-off between a captured work request and the retry engine.

use std::sync::Arc;

use alloy::primitives::Address;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::blockchain::{BlockInfo, ChainClient};
use crate::config::KeeperConfig;
use crate::dispatch::in_flight::InFlightSet;
use crate::dispatch::retry::RetryEngine;
use crate::jobs::JobObject;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::ports::{PortArbiterHandle, PortError};
use crate::process::manager::{ProcessError, ProcessManager};
use crate::process::protocol::{CoreMessage, JobMessage, WorkRequest};
use crate::relay::Submit;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    #[error("port error: {0}")]
    Ports(#[from] PortError),

    #[error("config serialization error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything a single job's pipeline needs, cheap to share between the
/// dispatch loop and the retry engine.
pub struct DispatchContext<S: Submit> {
    pub config: Arc<KeeperConfig>,
    pub job: JobObject,
    pub keeper_address: Address,
    pub manager: Arc<ProcessManager>,
    pub ports: PortArbiterHandle,
    pub submitter: Arc<S>,
    pub chain: ChainClient,
    pub in_flight: InFlightSet,
    pub shutdown: Arc<Shutdown>,
}

/// Slice of the keeper configuration forwarded to the job wrapper.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WrapperConfig<'a> {
    local_rpc: &'a str,
    chain_id: u64,
    registry: &'a str,
    registry_v1: &'a str,
    helper: &'a str,
}

impl<S: Submit> DispatchContext<S> {
    /// Run the job wrapper once against `block_number` and capture its first
    /// work request, answering port requests along the way.
    ///
    /// `Ok(None)` means the wrapper exited without finding workable groups;
    /// that is a normal outcome, not a failure.
    pub async fn dispatch_once(
        &self,
        block_number: u64,
        retry_id: Option<&str>,
    ) -> Result<Option<WorkRequest>, DispatchError> {
        let attempt = Uuid::new_v4().to_string();
        let job = &self.job.metadata.name;
        let args = self.wrapper_args(block_number, retry_id)?;

        tracing::debug!(job = %job, attempt = %attempt, block = block_number, "Forking job wrapper");
        let (handle, mut messages) =
            self.manager
                .run(&attempt, &self.config.runner.program, &args)?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let forks = &self.config.forks;
        let mut request = None;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    handle.terminate();
                    break;
                }
                message = messages.recv() => match message {
                    None => break,
                    Some(JobMessage::PortRequest(_)) => {
                        match self.ports.find_free_port(forks.start_port, forks.end_port()).await {
                            Ok(port) => {
                                tracing::debug!(job = %job, attempt = %attempt, port, "Granting fork port");
                                if !handle.send(CoreMessage::AvailablePort { port }) {
                                    tracing::warn!(job = %job, attempt = %attempt, "Subprocess gone before port reply");
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(job = %job, attempt = %attempt, error = %e, "No fork port available");
                                handle.terminate();
                                return Err(DispatchError::Ports(e));
                            }
                        }
                    }
                    Some(JobMessage::WorkRequest(work)) => {
                        tracing::info!(
                            job = %job,
                            correlation_id = %work.correlation_id,
                            groups = work.burst.len(),
                            "Work request received"
                        );
                        metrics::record_work_request(job);
                        request = Some(work);
                        handle.terminate();
                        break;
                    }
                },
            }
        }

        Ok(request)
    }

    fn wrapper_args(
        &self,
        block_number: u64,
        retry_id: Option<&str>,
    ) -> Result<Vec<String>, DispatchError> {
        let job = &self.job.config;
        let wrapper_config = serde_json::to_string(&WrapperConfig {
            local_rpc: &self.config.rpc.http_url,
            chain_id: self.config.rpc.chain_id,
            registry: &self.config.protocol.registry,
            registry_v1: &self.config.protocol.registry_v1,
            helper: &self.config.protocol.helper,
        })?;

        let mut args = vec![
            self.config.runner.entry.clone(),
            "--job".to_string(),
            job.path.clone(),
            "--block".to_string(),
            block_number.to_string(),
            "--time-to-advance".to_string(),
            job.time_to_advance_secs.to_string(),
            "--priority-fee".to_string(),
            job.priority_fee_gwei.to_string(),
            "--ahead-amount".to_string(),
            job.future_blocks.to_string(),
            "--bundle-burst".to_string(),
            job.bundle_burst.to_string(),
            "--keeper".to_string(),
            format!("{:?}", self.keeper_address),
            "--config".to_string(),
            wrapper_config,
        ];

        for id in self.in_flight.snapshot() {
            args.push("--skip-id".to_string());
            args.push(id);
        }
        if let Some(id) = retry_id {
            args.push("--retry-id".to_string());
            args.push(id.to_string());
        }

        Ok(args)
    }
}

/// Drives one job: one block in, at most one wrapper fork and one
/// submission pipeline at a time.
pub struct WorkDispatcher<S: Submit> {
    ctx: DispatchContext<S>,
}

impl<S: Submit> WorkDispatcher<S> {
    pub fn new(ctx: DispatchContext<S>) -> Self {
        Self { ctx }
    }

    /// Consume the block feed until shutdown. Blocks that arrive while an
    /// attempt is running are coalesced down to the newest one.
    pub async fn run(self, mut blocks: broadcast::Receiver<BlockInfo>) {
        let mut shutdown_rx = self.ctx.shutdown.subscribe();
        let job = self.ctx.job.metadata.name.clone();
        tracing::info!(job = %job, path = %self.ctx.job.config.path, "Job dispatcher started");

        loop {
            let block = tokio::select! {
                _ = shutdown_rx.recv() => break,
                received = blocks.recv() => match received {
                    Ok(block) => block,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(job = %job, skipped, "Dispatcher lagging behind block feed");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            let block = latest_pending(&mut blocks, block);

            tracing::info!(job = %job, block = block.number, "Dispatching job");
            metrics::record_dispatch(&job);

            match self.ctx.dispatch_once(block.number, None).await {
                Ok(Some(request)) => {
                    if !self.ctx.in_flight.insert(&request.correlation_id) {
                        tracing::info!(
                            job = %job,
                            correlation_id = %request.correlation_id,
                            "Work already in flight"
                        );
                        continue;
                    }
                    RetryEngine::new(&self.ctx).run(request, block.number).await;
                }
                Ok(None) => {
                    tracing::info!(job = %job, block = block.number, "Nothing workable");
                }
                Err(e) => {
                    tracing::warn!(job = %job, block = block.number, error = %e, "Dispatch attempt failed");
                }
            }
        }

        tracing::info!(job = %job, "Job dispatcher stopped");
    }
}

/// Collapse any blocks buffered during a busy period to the newest one.
fn latest_pending(
    blocks: &mut broadcast::Receiver<BlockInfo>,
    mut latest: BlockInfo,
) -> BlockInfo {
    loop {
        match blocks.try_recv() {
            Ok(block) => latest = block,
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    latest
}
