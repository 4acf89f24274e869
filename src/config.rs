use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CloudShardError, JobConfigError, Result};

/// How a job becomes eligible for launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobExecutionType {
    /// Triggered on a recurring cron schedule; each fire enqueues one full
    /// set of shards.
    Transient,
    /// Always eligible; re-enqueued after its shards finish or are killed.
    Daemon,
}

impl std::fmt::Display for JobExecutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobExecutionType::Transient => write!(f, "TRANSIENT"),
            JobExecutionType::Daemon => write!(f, "DAEMON"),
        }
    }
}

/// Registered definition of a cloud job. Immutable once stored; changed only
/// through an explicit update, which tears down in-flight work first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudJobConfig {
    pub job_name: String,
    pub execution_type: JobExecutionType,
    /// Cron expression, required for transient jobs. Seconds-resolution
    /// format as understood by [`cron::Schedule`].
    #[serde(default)]
    pub cron_expression: String,
    pub sharding_total_count: u32,
    /// Per-shard parameter strings; absent items default to "".
    #[serde(default)]
    pub sharding_item_parameters: HashMap<u32, String>,
    #[serde(default)]
    pub job_parameter: String,
    pub cpu_count: f64,
    pub memory_mb: f64,
    pub app_url: String,
    pub bootstrap_script: String,
}

impl CloudJobConfig {
    /// Check the definition before it is admitted to the config store.
    pub fn validate(&self) -> Result<()> {
        if self.job_name.is_empty() {
            return Err(invalid("job name must not be empty"));
        }
        if self.sharding_total_count < 1 {
            return Err(invalid("sharding total count must be at least 1"));
        }
        if self.cpu_count <= 0.0 {
            return Err(invalid("cpu count must be positive"));
        }
        if self.memory_mb <= 0.0 {
            return Err(invalid("memory must be positive"));
        }
        if self.app_url.is_empty() {
            return Err(invalid("app url must not be empty"));
        }
        if self.bootstrap_script.is_empty() {
            return Err(invalid("bootstrap script must not be empty"));
        }
        if self.execution_type == JobExecutionType::Transient {
            cron::Schedule::from_str(&self.cron_expression).map_err(|e| {
                CloudShardError::InvalidCron {
                    expression: self.cron_expression.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> CloudShardError {
    JobConfigError::Invalid(reason.to_string()).into()
}
