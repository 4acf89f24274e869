use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::CloudJobConfig;
use crate::error::{CloudShardError, Result};
use crate::state::ReadyService;

const TICK_INTERVAL: Duration = Duration::from_millis(500);

struct CronGroup {
    schedule: Schedule,
    next_fire: Option<DateTime<Utc>>,
    job_names: Vec<String>,
}

/// Cron-driven producer for transient jobs. Jobs sharing a cron expression
/// share one trigger group; each fire enqueues every registered job name
/// into the ready queue.
///
/// Holds only the ready service, never the producer manager: registration
/// flows one way, so the two stay acyclic.
pub struct TransientProducerScheduler {
    ready_service: Arc<ReadyService>,
    groups: Arc<Mutex<HashMap<String, CronGroup>>>,
    shutdown: CancellationToken,
    started: AtomicBool,
}

impl TransientProducerScheduler {
    pub fn new(ready_service: Arc<ReadyService>) -> Self {
        Self {
            ready_service,
            groups: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Spawn the trigger loop. Idempotent; later calls are no-ops.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let ready_service = self.ready_service.clone();
        let groups = self.groups.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        tracing::info!("Transient producer scheduler stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        fire_due_groups(&groups, &ready_service).await;
                    }
                }
            }
        });
        tracing::info!("Transient producer scheduler started");
    }

    /// Register a transient job with its cron trigger. Re-registering the
    /// same job is a no-op, so repeated startups cannot double-fire.
    pub async fn register(&self, config: &CloudJobConfig) -> Result<()> {
        let expression = config.cron_expression.clone();
        let mut groups = self.groups.lock().await;
        let group = match groups.entry(expression.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let schedule = Schedule::from_str(&expression).map_err(|e| {
                    CloudShardError::InvalidCron {
                        expression: expression.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let next_fire = schedule.after(&Utc::now()).next();
                entry.insert(CronGroup {
                    schedule,
                    next_fire,
                    job_names: Vec::new(),
                })
            }
        };
        if !group.job_names.contains(&config.job_name) {
            group.job_names.push(config.job_name.clone());
            tracing::info!(job_name = %config.job_name, cron = %expression, "Transient job registered");
        }
        Ok(())
    }

    /// Unhook a job from its trigger; empty groups are dropped.
    pub async fn deregister(&self, config: &CloudJobConfig) {
        let mut groups = self.groups.lock().await;
        if let Some(group) = groups.get_mut(&config.cron_expression) {
            group.job_names.retain(|name| name != &config.job_name);
            if group.job_names.is_empty() {
                groups.remove(&config.cron_expression);
            }
            tracing::info!(job_name = %config.job_name, "Transient job deregistered");
        }
    }

    /// Stop the trigger loop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn fire_due_groups(
    groups: &Mutex<HashMap<String, CronGroup>>,
    ready_service: &ReadyService,
) {
    let now = Utc::now();
    let mut due_jobs = Vec::new();
    {
        let mut groups = groups.lock().await;
        for group in groups.values_mut() {
            let Some(next_fire) = group.next_fire else {
                continue;
            };
            if next_fire <= now {
                due_jobs.extend(group.job_names.iter().cloned());
                group.next_fire = group.schedule.after(&now).next();
            }
        }
    }
    for job_name in due_jobs {
        tracing::debug!(%job_name, "Cron trigger fired");
        if let Err(e) = ready_service.add_transient(&job_name).await {
            tracing::error!(%job_name, error = %e, "Failed to enqueue transient job");
        }
    }
}
