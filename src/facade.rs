use std::collections::HashSet;
use std::sync::Arc;

use crate::config::CloudJobConfig;
use crate::context::{ExecutionType, JobContext, TaskContext, TaskMetaInfo};
use crate::error::Result;
use crate::registry::RegistryCenter;
use crate::state::{ConfigService, FailoverService, ReadyService, RunningService};

/// Composite view over the config store, ready queue, running set, and
/// failover queue, as consumed by the scheduler engine. Plain composition;
/// the sub-services stay individually reachable for the producer manager.
pub struct FacadeService {
    config_service: Arc<ConfigService>,
    ready_service: Arc<ReadyService>,
    running_service: Arc<RunningService>,
    failover_service: Arc<FailoverService>,
}

impl FacadeService {
    pub fn new(registry: Arc<dyn RegistryCenter>) -> Self {
        let config_service = Arc::new(ConfigService::new(registry.clone()));
        let running_service = Arc::new(RunningService::new(registry.clone()));
        let ready_service = Arc::new(ReadyService::new(registry.clone(), config_service.clone()));
        let failover_service = Arc::new(FailoverService::new(
            registry,
            config_service.clone(),
            running_service.clone(),
        ));
        Self {
            config_service,
            ready_service,
            running_service,
            failover_service,
        }
    }

    /// Begin state watches: rebuild the running-set view from the store.
    pub async fn start(&self) -> Result<()> {
        tracing::info!("Facade service starting");
        self.running_service.start().await
    }

    /// End state watches and drop cached state.
    pub async fn stop(&self) {
        tracing::info!("Facade service stopping");
        self.running_service.stop().await;
    }

    /// Jobs eligible for this offer cycle. Failover shards take precedence:
    /// a job with queued failover work appears once, as a FAILOVER context
    /// covering exactly those shards; remaining ready-queue jobs appear as
    /// READY (or DAEMON) contexts covering the full shard range.
    pub async fn eligible_job_contexts(&self) -> Result<Vec<JobContext>> {
        let mut contexts = self.failover_service.eligible_job_contexts().await?;
        let failover_jobs: HashSet<String> = contexts
            .iter()
            .map(|c| c.job_config.job_name.clone())
            .collect();
        contexts.extend(
            self.ready_service
                .eligible_job_contexts(&failover_jobs)
                .await?,
        );
        Ok(contexts)
    }

    /// Remove launched tasks from whichever queue made them eligible.
    pub async fn remove_launch_tasks_from_queue(&self, contexts: &[TaskContext]) -> Result<()> {
        let mut failover_metas = Vec::new();
        let mut ready_jobs = Vec::new();
        for context in contexts {
            match context.execution_type() {
                ExecutionType::Failover => failover_metas.push(context.meta_info().clone()),
                ExecutionType::Ready | ExecutionType::Daemon => {
                    let job_name = context.job_name().to_string();
                    if !ready_jobs.contains(&job_name) {
                        ready_jobs.push(job_name);
                    }
                }
            }
        }
        self.failover_service.remove(&failover_metas).await?;
        self.ready_service.remove(&ready_jobs).await
    }

    pub async fn add_running(&self, context: TaskContext) -> Result<()> {
        self.running_service.add(context).await
    }

    pub async fn remove_running(&self, meta: &TaskMetaInfo) -> Result<()> {
        self.running_service.remove(meta).await
    }

    pub async fn is_job_running(&self, job_name: &str) -> bool {
        self.running_service.is_job_running(job_name).await
    }

    pub async fn is_task_running(&self, meta: &TaskMetaInfo) -> bool {
        self.running_service.is_task_running(meta).await
    }

    /// Daemon liveness bookkeeping; opaque to the engine.
    pub async fn update_daemon_status(&self, context: &TaskContext, is_idle: bool) {
        self.running_service
            .update_idle(context.meta_info(), is_idle)
            .await;
    }

    /// Queue a shard for re-launch after an abnormal terminal status.
    pub async fn record_failover_task(&self, context: &TaskContext) -> Result<()> {
        self.failover_service.add(context).await
    }

    /// Re-enqueue a daemon job after a shard terminated. Checks the config
    /// store first so a racing deregister cannot resurrect the job.
    pub async fn add_daemon_job_to_ready_queue(&self, job_name: &str) -> Result<()> {
        self.ready_service.add_daemon(job_name).await
    }

    pub async fn load_job_config(&self, job_name: &str) -> Result<Option<CloudJobConfig>> {
        self.config_service.load(job_name).await
    }

    pub fn config_service(&self) -> Arc<ConfigService> {
        self.config_service.clone()
    }

    pub fn ready_service(&self) -> Arc<ReadyService> {
        self.ready_service.clone()
    }

    pub fn running_service(&self) -> Arc<RunningService> {
        self.running_service.clone()
    }

    pub fn failover_service(&self) -> Arc<FailoverService> {
        self.failover_service.clone()
    }
}
