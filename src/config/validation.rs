//! Structural validation of the loaded configuration.
//!
//! Runs once at startup. Any validation error is fatal: a keeper with a
//! half-valid config must not start dispatching work.

use crate::config::schema::KeeperConfig;

/// A single validation failure, pointing at the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the full configuration, collecting every failure.
pub fn validate_config(config: &KeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rpc.http_url.is_empty() {
        errors.push(err("rpc.http_url", "must not be empty"));
    }
    if config.rpc.ws_url.is_empty() {
        errors.push(err("rpc.ws_url", "must not be empty"));
    }
    if config.rpc.chain_id == 0 {
        errors.push(err("rpc.chain_id", "must be non-zero"));
    }

    if config.relay.endpoints.is_empty() {
        errors.push(err(
            "relay.endpoints",
            "at least one relay must be configured",
        ));
    }
    for (i, endpoint) in config.relay.endpoints.iter().enumerate() {
        if endpoint.parse::<url::Url>().is_err() {
            errors.push(err(
                &format!("relay.endpoints[{}]", i),
                "is not a valid URL",
            ));
        }
    }

    if config.forks.max_ports == 0 {
        errors.push(err("forks.max_ports", "must be at least 1"));
    }

    for (i, job) in config.jobs.iter().enumerate() {
        if job.path.is_empty() {
            errors.push(err(&format!("jobs[{}].path", i), "must not be empty"));
        }
    }

    if config.runner.program.is_empty() {
        errors.push(err("runner.program", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn err(field: &str, message: &str) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}
