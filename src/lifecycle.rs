use std::sync::Arc;

use crate::error::Result;
use crate::scheduler::driver::ResourceDriver;
use crate::state::RunningService;

/// Tears down every running task of a job through the resource driver.
/// Used by the admin path; errors surface to the caller.
pub struct LifecycleService {
    running_service: Arc<RunningService>,
    driver: Arc<dyn ResourceDriver>,
}

impl LifecycleService {
    pub fn new(running_service: Arc<RunningService>, driver: Arc<dyn ResourceDriver>) -> Self {
        Self {
            running_service,
            driver,
        }
    }

    /// Ask the resource manager to kill every running task of the job. The
    /// running set itself is updated by the caller (or by the TASK_KILLED
    /// status updates, whichever lands first).
    pub async fn kill_job(&self, job_name: &str) -> Result<()> {
        let tasks = self.running_service.running_tasks(job_name).await;
        tracing::info!(job_name, tasks = tasks.len(), "Killing running tasks");
        for task in tasks {
            self.driver.kill_task(&task.id()).await?;
        }
        Ok(())
    }
}
