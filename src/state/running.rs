use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::context::{TaskContext, TaskMetaInfo};
use crate::error::Result;
use crate::registry::RegistryCenter;

const RUNNING_ROOT: &str = "/state/running";

fn job_path(job_name: &str) -> String {
    format!("{RUNNING_ROOT}/{job_name}")
}

fn task_path(meta: &TaskMetaInfo) -> String {
    format!("{RUNNING_ROOT}/{}/{}", meta.job_name, meta)
}

/// The set of currently running task instances, grouped by job.
///
/// The registry subtree is the durable truth; a write-through cache mirrors
/// it between `start` and `stop` so the hot-path membership checks made on
/// every offer cycle stay off the store.
pub struct RunningService {
    registry: Arc<dyn RegistryCenter>,
    cache: Mutex<HashMap<String, Vec<TaskContext>>>,
    idle: Mutex<HashSet<TaskMetaInfo>>,
}

impl RunningService {
    pub fn new(registry: Arc<dyn RegistryCenter>) -> Self {
        Self {
            registry,
            cache: Mutex::new(HashMap::new()),
            idle: Mutex::new(HashSet::new()),
        }
    }

    /// Rebuild the cache from the registry. Called when the framework
    /// (re)registers, so tasks launched before a restart are still known.
    pub async fn start(&self) -> Result<()> {
        let mut loaded: HashMap<String, Vec<TaskContext>> = HashMap::new();
        for job_name in self.registry.get_children(RUNNING_ROOT).await? {
            for task_key in self.registry.get_children(&job_path(&job_name)).await? {
                let path = format!("{RUNNING_ROOT}/{job_name}/{task_key}");
                let Some(id) = self.registry.get(&path).await? else {
                    continue;
                };
                match TaskContext::parse(&id) {
                    Ok(context) => loaded.entry(job_name.clone()).or_default().push(context),
                    Err(e) => {
                        tracing::warn!(task_id = %id, error = %e, "Dropping unreadable running task");
                        self.registry.remove(&path).await?;
                    }
                }
            }
        }
        let task_count: usize = loaded.values().map(Vec::len).sum();
        tracing::info!(jobs = loaded.len(), tasks = task_count, "Running set loaded");
        *self.cache.lock().await = loaded;
        Ok(())
    }

    /// Drop the cache. The registry keeps the durable running set.
    pub async fn stop(&self) {
        self.cache.lock().await.clear();
        self.idle.lock().await.clear();
    }

    /// Insert a task into the running set. A sharding item appears at most
    /// once; re-adding an already running item is a no-op.
    pub async fn add(&self, context: TaskContext) -> Result<()> {
        let mut cache = self.cache.lock().await;
        let tasks = cache.entry(context.job_name().to_string()).or_default();
        if tasks.iter().any(|t| t.meta_info() == context.meta_info()) {
            return Ok(());
        }
        self.registry
            .persist(&task_path(context.meta_info()), &context.id())
            .await?;
        tasks.push(context);
        Ok(())
    }

    /// Remove a task on any terminal status. Unknown tasks are a no-op.
    pub async fn remove(&self, meta: &TaskMetaInfo) -> Result<()> {
        self.registry.remove(&task_path(meta)).await?;
        let mut cache = self.cache.lock().await;
        if let Some(tasks) = cache.get_mut(&meta.job_name) {
            tasks.retain(|t| t.meta_info() != meta);
            if tasks.is_empty() {
                cache.remove(&meta.job_name);
                self.registry.remove(&job_path(&meta.job_name)).await?;
            }
        }
        self.idle.lock().await.remove(meta);
        Ok(())
    }

    pub async fn running_tasks(&self, job_name: &str) -> Vec<TaskContext> {
        self.cache
            .lock()
            .await
            .get(job_name)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn is_job_running(&self, job_name: &str) -> bool {
        self.cache
            .lock()
            .await
            .get(job_name)
            .is_some_and(|tasks| !tasks.is_empty())
    }

    pub async fn is_task_running(&self, meta: &TaskMetaInfo) -> bool {
        self.cache
            .lock()
            .await
            .get(&meta.job_name)
            .is_some_and(|tasks| tasks.iter().any(|t| t.meta_info() == meta))
    }

    /// Record whether a daemon shard is between invocations. Runtime-only
    /// liveness metadata; it does not survive a restart.
    pub async fn update_idle(&self, meta: &TaskMetaInfo, is_idle: bool) {
        let mut idle = self.idle.lock().await;
        if is_idle {
            idle.insert(meta.clone());
        } else {
            idle.remove(meta);
        }
    }

    pub async fn is_idle(&self, meta: &TaskMetaInfo) -> bool {
        self.idle.lock().await.contains(meta)
    }
}
