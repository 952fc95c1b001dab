//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the keeper.
//! All types derive Serde traits: TOML on disk, and the whole config is also
//! serialized to JSON when handed to job subprocesses.

use serde::{Deserialize, Serialize};

/// Root configuration for the keeper.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KeeperConfig {
    /// Chain RPC endpoints and identity.
    pub rpc: RpcConfig,

    /// Protocol contract addresses handed down to job modules.
    pub protocol: ProtocolConfig,

    /// Local fork port allocation window.
    pub forks: ForkConfig,

    /// Relay endpoints and bundle submission behavior.
    pub relay: RelayConfig,

    /// Subprocess runner used to launch job attempts.
    pub runner: RunnerConfig,

    /// Defaults applied to jobs that do not override them.
    pub job_defaults: JobDefaults,

    /// Per-job entries.
    pub jobs: Vec<JobEntry>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chain RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// HTTP JSON-RPC endpoint.
    pub http_url: String,

    /// Websocket endpoint for the head subscription.
    pub ws_url: String,

    /// Failover HTTP endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            http_url: "http://127.0.0.1:8545".to_string(),
            ws_url: "ws://127.0.0.1:8546".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            timeout_secs: 10,
        }
    }
}

/// Keeper protocol contract addresses.
///
/// The core never calls these contracts itself; they are forwarded to job
/// subprocesses through the serialized config.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Main keeper registry contract.
    pub registry: String,

    /// Legacy (v1) registry contract.
    pub registry_v1: String,

    /// Quoting helper contract.
    pub helper: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            registry: "0x1cEB5cB57C4D4E2b2433641b95Dd330A33185A44".to_string(),
            registry_v1: "0x1cEB5cB57C4D4E2b2433641b95Dd330A33185A44".to_string(),
            helper: "0xcb12Ac8649eA06Cbb15e29032163938D5F86D8ad".to_string(),
        }
    }
}

/// Port window from which job forks are allocated.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForkConfig {
    /// First port of the allocation window.
    pub start_port: u16,

    /// Number of ports available after `start_port`.
    pub max_ports: u16,
}

impl ForkConfig {
    /// Last port of the allocation window, inclusive.
    pub fn end_port(&self) -> u16 {
        self.start_port.saturating_add(self.max_ports)
    }
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self {
            start_port: 10_000,
            max_ports: 100,
        }
    }
}

/// Relay endpoints and submission behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay URLs. Every configured relay receives each bundle.
    pub endpoints: Vec<String>,

    /// Simulate bundles against the first relay before broadcasting.
    pub simulate_bundle: bool,

    /// Optional hard cap on maxFeePerGas, in wei. Applied by job wrappers.
    pub top_max_fee_per_gas: Option<u128>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["https://relay.flashbots.net".to_string()],
            simulate_bundle: true,
            top_max_fee_per_gas: None,
        }
    }
}

/// Command used to spawn job attempt subprocesses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Program to execute.
    pub program: String,

    /// Entry script passed as the first argument.
    pub entry: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            entry: "./dist/job-wrapper.js".to_string(),
        }
    }
}

/// Process-wide defaults for per-job timing and fee parameters.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct JobDefaults {
    /// How many blocks ahead of the fork point bundles target.
    pub future_blocks: u64,

    /// Number of workable groups emitted per attempt.
    pub bundle_burst: u32,

    /// Seconds the fork clock is advanced before probing workability.
    pub time_to_advance_secs: u64,

    /// Priority fee paid to the block producer, in gwei.
    pub priority_fee_gwei: u64,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            future_blocks: 1,
            bundle_burst: 6,
            time_to_advance_secs: 120,
            priority_fee_gwei: 2,
        }
    }
}

/// A single job entry. Unset fields fall back to [`JobDefaults`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobEntry {
    /// Path to the job module directory (contains `metadata.json`).
    pub path: String,

    pub future_blocks: Option<u64>,
    pub bundle_burst: Option<u32>,
    pub time_to_advance_secs: Option<u64>,
    pub priority_fee_gwei: Option<u64>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KeeperConfig::default();
        assert_eq!(config.forks.start_port, 10_000);
        assert_eq!(config.forks.end_port(), 10_100);
        assert_eq!(config.job_defaults.bundle_burst, 6);
        assert!(config.relay.simulate_bundle);
        assert_eq!(config.relay.endpoints.len(), 1);
    }

    #[test]
    fn test_partial_toml_merges_over_defaults() {
        let toml = r#"
            [rpc]
            chain_id = 5

            [[jobs]]
            path = "./jobs/sample"
            bundle_burst = 2
        "#;
        let config: KeeperConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.rpc.chain_id, 5);
        // untouched sections keep their defaults
        assert_eq!(config.rpc.http_url, "http://127.0.0.1:8545");
        assert_eq!(config.jobs.len(), 1);
        assert_eq!(config.jobs[0].bundle_burst, Some(2));
        assert_eq!(config.jobs[0].future_blocks, None);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        // the whole config is serialized to JSON for job subprocesses
        let config = KeeperConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: KeeperConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rpc.chain_id, config.rpc.chain_id);
        assert_eq!(back.relay.endpoints, config.relay.endpoints);
    }
}
