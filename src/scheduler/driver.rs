use async_trait::async_trait;

use crate::error::DriverError;
use crate::scheduler::task::TaskInfo;

/// Handle into the resource-manager SDK. The engine and lifecycle service
/// only ever talk to the cluster through this seam, so tests and alternative
/// managers plug in without touching scheduling logic.
#[async_trait]
pub trait ResourceDriver: Send + Sync {
    /// Launch a batch of tasks against the given offers. All offers belong
    /// to one agent; unconsumed resources are returned by the manager.
    async fn launch_tasks(
        &self,
        offer_ids: Vec<String>,
        tasks: Vec<TaskInfo>,
    ) -> Result<(), DriverError>;

    /// Ask the resource manager to kill one running task.
    async fn kill_task(&self, task_id: &str) -> Result<(), DriverError>;
}
