use std::sync::Arc;

use crate::context::{ExecutionType, JobContext, TaskContext, TaskMetaInfo};
use crate::error::Result;
use crate::registry::RegistryCenter;
use crate::state::config::ConfigService;
use crate::state::running::RunningService;

const FAILOVER_ROOT: &str = "/state/failover";

fn job_path(job_name: &str) -> String {
    format!("{FAILOVER_ROOT}/{job_name}")
}

fn task_path(meta: &TaskMetaInfo) -> String {
    format!("{FAILOVER_ROOT}/{}/{}", meta.job_name, meta)
}

/// Per-job queue of shards whose last run ended abnormally and need to be
/// re-launched ahead of fresh work.
pub struct FailoverService {
    registry: Arc<dyn RegistryCenter>,
    config_service: Arc<ConfigService>,
    running_service: Arc<RunningService>,
}

impl FailoverService {
    pub fn new(
        registry: Arc<dyn RegistryCenter>,
        config_service: Arc<ConfigService>,
        running_service: Arc<RunningService>,
    ) -> Self {
        Self {
            registry,
            config_service,
            running_service,
        }
    }

    /// Record a shard for re-launch. Deduplicated by meta; shards of
    /// deregistered jobs and shards that are running again are skipped.
    pub async fn add(&self, context: &TaskContext) -> Result<()> {
        if self.config_service.load(context.job_name()).await?.is_none() {
            return Ok(());
        }
        let meta = context.meta_info();
        if self.running_service.is_task_running(meta).await {
            return Ok(());
        }
        let path = task_path(meta);
        if self.registry.exists(&path).await? {
            return Ok(());
        }
        self.registry.persist(&path, &context.id()).await?;
        tracing::debug!(task_meta = %meta, "Failover task recorded");
        Ok(())
    }

    /// Job contexts for every queued failover shard, grouped per job.
    /// Shards already running at gather time are left queued for a later
    /// cycle; jobs without a config are dropped from the queue.
    pub async fn eligible_job_contexts(&self) -> Result<Vec<JobContext>> {
        let mut contexts = Vec::new();
        for job_name in self.registry.get_children(FAILOVER_ROOT).await? {
            let Some(config) = self.config_service.load(&job_name).await? else {
                tracing::info!(%job_name, "Removing failover entries without config");
                self.registry.remove(&job_path(&job_name)).await?;
                continue;
            };
            let mut items = Vec::new();
            for task_key in self.registry.get_children(&job_path(&job_name)).await? {
                let Ok(meta) = TaskMetaInfo::parse(&task_key) else {
                    continue;
                };
                if self.running_service.is_task_running(&meta).await {
                    continue;
                }
                if !items.contains(&meta.sharding_item) {
                    items.push(meta.sharding_item);
                }
            }
            if !items.is_empty() {
                contexts.push(JobContext {
                    job_config: config,
                    assigned_sharding_items: items,
                    execution_type: ExecutionType::Failover,
                });
            }
        }
        Ok(contexts)
    }

    /// Drop queue entries for launched shards.
    pub async fn remove(&self, metas: &[TaskMetaInfo]) -> Result<()> {
        for meta in metas {
            self.registry.remove(&task_path(meta)).await?;
        }
        Ok(())
    }
}
