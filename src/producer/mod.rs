//! The job lifecycle controller: registration, update, deregistration, and
//! the cron-driven producer for transient jobs.

pub mod transient;

pub use transient::TransientProducerScheduler;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::{CloudJobConfig, JobExecutionType};
use crate::error::{JobConfigError, Result};
use crate::facade::FacadeService;
use crate::lifecycle::LifecycleService;
use crate::scheduler::driver::ResourceDriver;
use crate::state::{ConfigService, ReadyService, RunningService};

/// Reconciles operator intent with running state: registers, updates, and
/// deregisters jobs, tearing down and re-queueing in-flight work as the
/// configuration demands.
///
/// Mutating operations are serialized per job name; concurrent operations on
/// the same job are totally ordered and the loser observes the post-state.
pub struct ProducerManager {
    config_service: Arc<ConfigService>,
    ready_service: Arc<ReadyService>,
    running_service: Arc<RunningService>,
    transient_producer: Arc<TransientProducerScheduler>,
    lifecycle_service: LifecycleService,
    job_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProducerManager {
    pub fn new(facade: &FacadeService, driver: Arc<dyn ResourceDriver>) -> Self {
        let running_service = facade.running_service();
        Self {
            config_service: facade.config_service(),
            ready_service: facade.ready_service(),
            running_service: running_service.clone(),
            transient_producer: Arc::new(TransientProducerScheduler::new(facade.ready_service())),
            lifecycle_service: LifecycleService::new(running_service, driver),
            job_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Load every stored job and wire its production path: transient jobs
    /// onto the cron trigger, daemon jobs into the ready queue. Idempotent.
    pub async fn startup(&self) -> Result<()> {
        self.transient_producer.start();
        let configs = self.config_service.load_all().await?;
        tracing::info!(jobs = configs.len(), "Producer manager starting");
        for config in configs {
            match config.execution_type {
                JobExecutionType::Transient => self.transient_producer.register(&config).await?,
                JobExecutionType::Daemon => {
                    self.ready_service.add_daemon(&config.job_name).await?
                }
            }
        }
        Ok(())
    }

    /// Register a new job. Fails with `AlreadyExists` if the name is taken.
    pub async fn register(&self, config: CloudJobConfig) -> Result<()> {
        config.validate()?;
        let lock = self.job_lock(&config.job_name).await;
        let _guard = lock.lock().await;
        if self.config_service.load(&config.job_name).await?.is_some() {
            return Err(JobConfigError::AlreadyExists(config.job_name).into());
        }
        self.config_service.add(&config).await?;
        match config.execution_type {
            JobExecutionType::Transient => self.transient_producer.register(&config).await?,
            JobExecutionType::Daemon => self.ready_service.add_daemon(&config.job_name).await?,
        }
        tracing::info!(job_name = %config.job_name, execution_type = %config.execution_type, "Job registered");
        Ok(())
    }

    /// Replace a job's definition. The new configuration may change shard
    /// count, resources, or schedule, so every existing instance is torn
    /// down and the job re-scheduled from a clean state.
    pub async fn update(&self, config: CloudJobConfig) -> Result<()> {
        config.validate()?;
        let lock = self.job_lock(&config.job_name).await;
        let _guard = lock.lock().await;
        if self.config_service.load(&config.job_name).await?.is_none() {
            return Err(JobConfigError::NotFound(config.job_name).into());
        }
        self.config_service.update(&config).await?;
        self.reconcile(&config.job_name).await?;
        tracing::info!(job_name = %config.job_name, "Job updated");
        Ok(())
    }

    /// Remove a job. Absent jobs are a no-op. The config entry is removed
    /// last so observers racing on status updates still see a valid config
    /// while the kills propagate.
    pub async fn deregister(&self, job_name: &str) -> Result<()> {
        let lock = self.job_lock(job_name).await;
        let _guard = lock.lock().await;
        let Some(config) = self.config_service.load(job_name).await? else {
            return Ok(());
        };
        if config.execution_type == JobExecutionType::Transient {
            self.transient_producer.deregister(&config).await;
        }
        self.reconcile(job_name).await?;
        self.config_service.remove(job_name).await?;
        tracing::info!(job_name, "Job deregistered");
        Ok(())
    }

    /// Stop the cron trigger. Running tasks are left untouched; draining
    /// them is a separate concern.
    pub async fn shutdown(&self) {
        self.transient_producer.shutdown();
    }

    /// Tear down a job's in-flight work: kill running tasks, drop them from
    /// the running set, and clear its ready-queue entry.
    async fn reconcile(&self, job_name: &str) -> Result<()> {
        self.lifecycle_service.kill_job(job_name).await?;
        for task in self.running_service.running_tasks(job_name).await {
            self.running_service.remove(task.meta_info()).await?;
        }
        self.ready_service.remove(&[job_name.to_string()]).await
    }

    async fn job_lock(&self, job_name: &str) -> Arc<Mutex<()>> {
        self.job_locks
            .lock()
            .await
            .entry(job_name.to_string())
            .or_default()
            .clone()
    }
}
