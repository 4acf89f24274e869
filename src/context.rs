use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CloudJobConfig;
use crate::error::CloudShardError;

/// Delimiter between fields of a task id string.
pub const DELIMITER: &str = "@-@";

/// Sentinel slave id carried by task requests before assignment. The real
/// agent is only known once the assignment algorithm has placed the task.
/// Must not collide with any id a resource manager hands out.
pub const PLACEHOLDER_SLAVE_ID: &str = "fake-slave";

/// Which queue a task instance was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionType {
    Ready,
    Failover,
    Daemon,
}

impl std::fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionType::Ready => write!(f, "READY"),
            ExecutionType::Failover => write!(f, "FAILOVER"),
            ExecutionType::Daemon => write!(f, "DAEMON"),
        }
    }
}

impl FromStr for ExecutionType {
    type Err = CloudShardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(ExecutionType::Ready),
            "FAILOVER" => Ok(ExecutionType::Failover),
            "DAEMON" => Ok(ExecutionType::Daemon),
            other => Err(CloudShardError::MalformedTaskId(format!(
                "unknown execution type: {other}"
            ))),
        }
    }
}

/// Identity of one shard of a job, stable across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskMetaInfo {
    pub job_name: String,
    pub sharding_item: u32,
}

impl TaskMetaInfo {
    pub fn new(job_name: impl Into<String>, sharding_item: u32) -> Self {
        Self {
            job_name: job_name.into(),
            sharding_item,
        }
    }

    /// Parse from a task id string, accepting anything that starts with
    /// `jobName@-@shardingItem`.
    pub fn parse(value: &str) -> Result<Self, CloudShardError> {
        let mut fields = value.split(DELIMITER);
        let job_name = fields
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| malformed(value))?;
        let sharding_item = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| malformed(value))?;
        Ok(Self::new(job_name, sharding_item))
    }
}

impl std::fmt::Display for TaskMetaInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.job_name, DELIMITER, self.sharding_item)
    }
}

/// Full identity of one task launch: shard plus execution type, agent, and an
/// opaque per-launch uuid. Round-trips through its string form losslessly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskContext {
    meta_info: TaskMetaInfo,
    execution_type: ExecutionType,
    slave_id: String,
    uuid: String,
}

impl TaskContext {
    /// Build a fresh context. The uuid is generated here and preserved
    /// through every later encode/decode of this context.
    pub fn new(
        job_name: impl Into<String>,
        sharding_item: u32,
        execution_type: ExecutionType,
        slave_id: impl Into<String>,
    ) -> Self {
        Self {
            meta_info: TaskMetaInfo::new(job_name, sharding_item),
            execution_type,
            slave_id: slave_id.into(),
            uuid: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Parse a task id. Accepts the five-field form
    /// `job@-@shard@-@type@-@slave@-@uuid` as well as the four-field form
    /// without a uuid, for which a fresh uuid is generated.
    pub fn parse(value: &str) -> Result<Self, CloudShardError> {
        let fields: Vec<&str> = value.split(DELIMITER).collect();
        if fields.len() != 4 && fields.len() != 5 {
            return Err(malformed(value));
        }
        if fields[0].is_empty() {
            return Err(malformed(value));
        }
        let sharding_item = fields[1].parse().map_err(|_| malformed(value))?;
        let uuid = match fields.get(4) {
            Some(uuid) => (*uuid).to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };
        Ok(Self {
            meta_info: TaskMetaInfo::new(fields[0], sharding_item),
            execution_type: fields[2].parse()?,
            slave_id: fields[3].to_string(),
            uuid,
        })
    }

    /// The task id launched to the resource manager.
    pub fn id(&self) -> String {
        format!(
            "{}{d}{}{d}{}{d}{}",
            self.meta_info,
            self.execution_type,
            self.slave_id,
            self.uuid,
            d = DELIMITER
        )
    }

    /// Human-readable task name, `jobName@-@shardingItem`.
    pub fn task_name(&self) -> String {
        self.meta_info.to_string()
    }

    /// Executor id shared by tasks launched from the same job build, so the
    /// resource manager can reuse one executor per (job, app artifact).
    pub fn executor_id(&self, app_url: &str) -> String {
        let mut hasher = DefaultHasher::new();
        app_url.hash(&mut hasher);
        format!("{}{}{}", self.meta_info.job_name, DELIMITER, hasher.finish())
    }

    pub fn meta_info(&self) -> &TaskMetaInfo {
        &self.meta_info
    }

    pub fn job_name(&self) -> &str {
        &self.meta_info.job_name
    }

    pub fn sharding_item(&self) -> u32 {
        self.meta_info.sharding_item
    }

    pub fn execution_type(&self) -> ExecutionType {
        self.execution_type
    }

    pub fn slave_id(&self) -> &str {
        &self.slave_id
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }
}

impl std::fmt::Display for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}

fn malformed(value: &str) -> CloudShardError {
    CloudShardError::MalformedTaskId(value.to_string())
}

/// One job's slice of an offer cycle: its config, the sharding items to
/// launch, and which queue made it eligible.
#[derive(Debug, Clone, PartialEq)]
pub struct JobContext {
    pub job_config: CloudJobConfig,
    pub assigned_sharding_items: Vec<u32>,
    pub execution_type: ExecutionType,
}

impl JobContext {
    /// Context covering every shard of the job, `0..sharding_total_count`.
    pub fn from_config(job_config: CloudJobConfig, execution_type: ExecutionType) -> Self {
        let assigned_sharding_items = (0..job_config.sharding_total_count).collect();
        Self {
            job_config,
            assigned_sharding_items,
            execution_type,
        }
    }
}
