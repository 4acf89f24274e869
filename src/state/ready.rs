use std::collections::HashSet;
use std::sync::Arc;

use crate::config::JobExecutionType;
use crate::context::{ExecutionType, JobContext};
use crate::error::Result;
use crate::registry::RegistryCenter;
use crate::state::config::ConfigService;

const READY_ROOT: &str = "/state/ready";

fn ready_path(job_name: &str) -> String {
    format!("{READY_ROOT}/{job_name}")
}

/// Queue of job names awaiting the next offer cycle.
///
/// A transient job may be enqueued several times (the entry keeps a count);
/// a daemon job appears at most once.
pub struct ReadyService {
    registry: Arc<dyn RegistryCenter>,
    config_service: Arc<ConfigService>,
}

impl ReadyService {
    pub fn new(registry: Arc<dyn RegistryCenter>, config_service: Arc<ConfigService>) -> Self {
        Self {
            registry,
            config_service,
        }
    }

    /// Enqueue a transient job fired by its cron trigger. No-op if the job
    /// was deregistered or is not transient.
    pub async fn add_transient(&self, job_name: &str) -> Result<()> {
        let Some(config) = self.config_service.load(job_name).await? else {
            return Ok(());
        };
        if config.execution_type != JobExecutionType::Transient {
            return Ok(());
        }
        let path = ready_path(job_name);
        let count = match self.registry.get(&path).await? {
            Some(value) => value.parse::<u64>().unwrap_or(0) + 1,
            None => 1,
        };
        self.registry.persist(&path, &count.to_string()).await?;
        tracing::debug!(job_name, count, "Transient job enqueued");
        Ok(())
    }

    /// Enqueue a daemon job. Idempotent; a no-op if the job no longer exists
    /// or is not a daemon.
    pub async fn add_daemon(&self, job_name: &str) -> Result<()> {
        let Some(config) = self.config_service.load(job_name).await? else {
            return Ok(());
        };
        if config.execution_type != JobExecutionType::Daemon {
            return Ok(());
        }
        let path = ready_path(job_name);
        if self.registry.exists(&path).await? {
            return Ok(());
        }
        self.registry.persist(&path, "1").await?;
        tracing::debug!(job_name, "Daemon job enqueued");
        Ok(())
    }

    /// Job contexts for every enqueued job outside `ineligible_job_names`,
    /// each covering the full shard range. Entries whose config has
    /// disappeared are dropped from the queue.
    pub async fn eligible_job_contexts(
        &self,
        ineligible_job_names: &HashSet<String>,
    ) -> Result<Vec<JobContext>> {
        let mut contexts = Vec::new();
        for job_name in self.registry.get_children(READY_ROOT).await? {
            if ineligible_job_names.contains(&job_name) {
                continue;
            }
            match self.config_service.load(&job_name).await? {
                Some(config) => {
                    let execution_type = match config.execution_type {
                        JobExecutionType::Daemon => ExecutionType::Daemon,
                        JobExecutionType::Transient => ExecutionType::Ready,
                    };
                    contexts.push(JobContext::from_config(config, execution_type));
                }
                None => {
                    tracing::info!(%job_name, "Removing ready entry without config");
                    self.registry.remove(&ready_path(&job_name)).await?;
                }
            }
        }
        Ok(contexts)
    }

    /// Drop queue entries for the given jobs entirely, whatever their count.
    pub async fn remove(&self, job_names: &[String]) -> Result<()> {
        for job_name in job_names {
            self.registry.remove(&ready_path(job_name)).await?;
        }
        Ok(())
    }
}
