use thiserror::Error;

/// Admin-surface configuration errors. Returned to callers of the producer
/// manager; never raised on the resource-manager callback path.
#[derive(Error, Debug)]
pub enum JobConfigError {
    #[error("job already exists: {0}")]
    AlreadyExists(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid job configuration: {0}")]
    Invalid(String),
}

/// Coordination-store failures.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry backend error: {0}")]
    Backend(String),
}

/// Resource-driver failures (launch/kill rejected or connection lost).
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("resource driver error: {0}")]
    Driver(String),
}

#[derive(Error, Debug)]
pub enum CloudShardError {
    #[error(transparent)]
    JobConfig(#[from] JobConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("malformed task id: {0}")]
    MalformedTaskId(String),

    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudShardError>;

/// Reasons a task assigned in an offer cycle is dropped before launch.
/// Logged on the callback path, never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentSkip {
    /// Job config disappeared between eligibility and launch.
    ConfigMissing,
    /// The sharding item is already in the running set.
    AlreadyRunning,
    /// Fewer than sharding_total_count shards were assigned this cycle.
    IntegrityViolation,
    /// The same sharding item was emitted more than once by the algorithm.
    Redundant,
}

impl std::fmt::Display for AssignmentSkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentSkip::ConfigMissing => write!(f, "config missing"),
            AssignmentSkip::AlreadyRunning => write!(f, "already running"),
            AssignmentSkip::IntegrityViolation => write!(f, "sharding integrity violation"),
            AssignmentSkip::Redundant => write!(f, "redundant assignment"),
        }
    }
}
