//! cloudshard: a framework-level cloud job scheduler.
//!
//! Accepts sharded job definitions from operators, matches them against
//! resource offers from a two-level cluster resource manager, and launches
//! task instances on chosen agents. Transient jobs fire from a cron trigger;
//! daemon jobs are always eligible and re-enqueued after completion. State
//! (configs, ready queue, running set, failover queue) lives behind a
//! pluggable coordination-store client.

pub mod config;
pub mod context;
pub mod error;
pub mod facade;
pub mod lifecycle;
pub mod producer;
pub mod registry;
pub mod scheduler;
pub mod state;

pub use config::{CloudJobConfig, JobExecutionType};
pub use context::{ExecutionType, JobContext, TaskContext, TaskMetaInfo};
pub use error::{CloudShardError, DriverError, JobConfigError, RegistryError, Result};
pub use facade::FacadeService;
pub use producer::ProducerManager;
pub use registry::{MemoryRegistryCenter, RegistryCenter};
pub use scheduler::{FrameworkScheduler, ResourceDriver, SchedulerEngine};
