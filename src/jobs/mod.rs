//! Job definitions: metadata plus populated per-job configuration.

pub mod metadata;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::schema::{JobDefaults, JobEntry};

pub use metadata::{load_metadata, JobMetadata, MetadataError};

/// Per-job configuration with every field made concrete by merging the job
/// entry over the process-wide defaults. Immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulatedJobConfig {
    pub path: String,
    pub future_blocks: u64,
    pub bundle_burst: u32,
    pub time_to_advance_secs: u64,
    pub priority_fee_gwei: u64,
}

/// A fully loaded job: populated config plus metadata.
#[derive(Debug, Clone)]
pub struct JobObject {
    pub config: PopulatedJobConfig,
    pub metadata: JobMetadata,
}

/// Merge a job entry with the defaults.
pub fn populate_job_config(entry: &JobEntry, defaults: &JobDefaults) -> PopulatedJobConfig {
    PopulatedJobConfig {
        path: entry.path.clone(),
        future_blocks: entry.future_blocks.unwrap_or(defaults.future_blocks),
        bundle_burst: entry.bundle_burst.unwrap_or(defaults.bundle_burst),
        time_to_advance_secs: entry
            .time_to_advance_secs
            .unwrap_or(defaults.time_to_advance_secs),
        priority_fee_gwei: entry.priority_fee_gwei.unwrap_or(defaults.priority_fee_gwei),
    }
}

/// Load a job from its config entry: merge defaults and read metadata.
pub fn load_job(entry: &JobEntry, defaults: &JobDefaults) -> Result<JobObject, MetadataError> {
    let config = populate_job_config(entry, defaults);
    let metadata = load_metadata(Path::new(&config.path))?;
    Ok(JobObject { config, metadata })
}
