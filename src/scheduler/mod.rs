//! The offer-matching side of the scheduler: the framework callback
//! contract, resource offers and leases, the pluggable assignment
//! algorithm, and the engine that ties them to the state facade.

pub mod assign;
pub mod driver;
pub mod engine;
pub mod offer;
pub mod task;

pub use assign::{AssignmentAlgorithm, FirstFitAssigner, TaskRequest, VmAssignmentResult};
pub use driver::ResourceDriver;
pub use engine::{FrameworkScheduler, SchedulerEngine};
pub use offer::{Lease, ResourceOffer};
pub use task::{ShardingContexts, TaskInfo, TaskState, TaskStatus};
