use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use url::Url;

use keeper_core::blockchain::{
    wallet::{BUNDLE_SIGNER_KEY_ENV_VAR, KEEPER_KEY_ENV_VAR},
    BlockSource, ChainClient, Wallet,
};
use keeper_core::config::load_config;
use keeper_core::dispatch::{DispatchContext, InFlightSet, WorkDispatcher};
use keeper_core::jobs::load_job;
use keeper_core::lifecycle::signals::listen_for_signals;
use keeper_core::observability::{logging, metrics};
use keeper_core::ports::PortArbiter;
use keeper_core::process::ProcessManager;
use keeper_core::relay::{BundleSubmitter, RelayClient};
use keeper_core::Shutdown;

#[derive(Parser)]
#[command(name = "keeper-core", about = "On-chain job keeper")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "keeper.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli.config)?);

    logging::init(&config.observability.log_level);
    tracing::info!(
        config = %cli.config.display(),
        chain_id = config.rpc.chain_id,
        jobs = config.jobs.len(),
        relays = config.relay.endpoints.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let keeper = Wallet::from_env(KEEPER_KEY_ENV_VAR, config.rpc.chain_id)?;
    let bundle_signer = Wallet::from_env(BUNDLE_SIGNER_KEY_ENV_VAR, config.rpc.chain_id)?;
    tracing::info!(keeper = ?keeper.address(), "Keeper wallet loaded");

    let chain = ChainClient::new(config.rpc.clone()).await?;
    let blocks = BlockSource::connect(&config.rpc.ws_url, chain.clone()).await?;

    let mut relays = Vec::with_capacity(config.relay.endpoints.len());
    for endpoint in &config.relay.endpoints {
        relays.push(RelayClient::new(Url::parse(endpoint)?, bundle_signer.clone()));
    }
    let submitter = Arc::new(BundleSubmitter::new(
        relays,
        keeper.clone(),
        chain.clone(),
        config.relay.simulate_bundle,
    ));

    let ports = PortArbiter::new().spawn();
    let manager = Arc::new(ProcessManager::new());
    let in_flight = InFlightSet::new();
    let shutdown = Arc::new(Shutdown::new());

    for entry in &config.jobs {
        let job = load_job(entry, &config.job_defaults)?;
        tracing::info!(job = %job.metadata.name, path = %job.config.path, "Job loaded");

        let ctx = DispatchContext {
            config: Arc::clone(&config),
            job,
            keeper_address: keeper.address(),
            manager: Arc::clone(&manager),
            ports: ports.clone(),
            submitter: Arc::clone(&submitter),
            chain: chain.clone(),
            in_flight: in_flight.clone(),
            shutdown: Arc::clone(&shutdown),
        };
        tokio::spawn(WorkDispatcher::new(ctx).run(blocks.subscribe()));
    }

    listen_for_signals(&shutdown).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
