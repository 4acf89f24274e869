use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Task states reported by the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Killed,
    Failed,
    Lost,
    Error,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskState::Staging => "TASK_STAGING",
            TaskState::Starting => "TASK_STARTING",
            TaskState::Running => "TASK_RUNNING",
            TaskState::Finished => "TASK_FINISHED",
            TaskState::Killed => "TASK_KILLED",
            TaskState::Failed => "TASK_FAILED",
            TaskState::Lost => "TASK_LOST",
            TaskState::Error => "TASK_ERROR",
        };
        f.write_str(name)
    }
}

/// A status update delivered by the resource manager. Updates for a given
/// task id arrive serialized.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub task_id: String,
    pub state: TaskState,
    /// Executor-provided detail; daemon executors report "BEGIN"/"COMPLETE"
    /// around each invocation while staying in TASK_RUNNING.
    pub message: String,
    pub source: String,
}

/// Artifact fetch instruction inside a command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandUri {
    pub value: String,
    pub extract: bool,
    pub cache: bool,
}

/// Shell invocation the executor runs after fetching its URIs.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandInfo {
    pub uris: Vec<CommandUri>,
    pub shell: bool,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorInfo {
    pub executor_id: String,
    pub command: CommandInfo,
}

/// One task launch handed to the resource driver.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    /// Full task context string; round-trips through status updates.
    pub task_id: String,
    pub name: String,
    pub slave_id: String,
    pub cpus: f64,
    pub memory_mb: f64,
    pub executor: ExecutorInfo,
    /// Serialized [`ShardingContexts`] payload for the executor.
    pub data: Vec<u8>,
}

/// Execution payload describing the shard slice a task covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardingContexts {
    pub job_name: String,
    pub sharding_total_count: u32,
    pub job_parameter: String,
    /// Parameter strings for the assigned items only; defaults to "" where
    /// the job config has no entry.
    pub sharding_item_parameters: HashMap<u32, String>,
}
