use std::collections::{BTreeMap, HashMap};

use crate::context::TaskContext;
use crate::scheduler::offer::Lease;

/// Resource demand for one shard, built from the job config. The context
/// carries the placeholder slave id until assignment binds a real agent.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub task_context: TaskContext,
    pub cpus: f64,
    pub memory_mb: f64,
}

impl TaskRequest {
    pub fn task_id(&self) -> String {
        self.task_context.id()
    }
}

/// One task placed on a VM by the algorithm.
#[derive(Debug, Clone)]
pub struct TaskAssignment {
    pub request: TaskRequest,
}

/// All placements on one VM for a cycle, with the leases they consume.
#[derive(Debug, Clone)]
pub struct VmAssignmentResult {
    pub hostname: String,
    pub slave_id: String,
    pub leases_used: Vec<Lease>,
    pub tasks_assigned: Vec<TaskAssignment>,
}

impl VmAssignmentResult {
    pub fn offer_ids(&self) -> Vec<String> {
        self.leases_used.iter().map(|l| l.offer_id.clone()).collect()
    }
}

/// Constraint-aware assignment of task requests onto resource leases.
///
/// Implementations own a lease cache (offers held across cycles until
/// consumed or expired) and an assigned-task registry, both mutated only
/// under the engine's lock.
pub trait AssignmentAlgorithm: Send {
    /// Match one batch of requests against the cached plus newly offered
    /// leases. Consumed leases leave the cache; requests that do not fit
    /// are simply absent from the results.
    fn schedule_once(&mut self, requests: Vec<TaskRequest>, leases: Vec<Lease>)
        -> Vec<VmAssignmentResult>;

    /// Record a launched placement so subsequent cycles see the task placed.
    fn task_assigned(&mut self, request: &TaskRequest, hostname: &str);

    fn expire_lease(&mut self, offer_id: &str);

    fn expire_all_leases(&mut self);

    fn expire_leases_of_slave(&mut self, slave_id: &str);
}

#[derive(Debug, Default)]
struct VmBucket {
    hostname: String,
    leases: Vec<Lease>,
    cpus: f64,
    memory_mb: f64,
}

/// Default algorithm: first-fit over agents in slave-id order.
///
/// Good enough for bounded batch sizes; fair-share or constraint plugins
/// replace it through [`AssignmentAlgorithm`].
#[derive(Debug, Default)]
pub struct FirstFitAssigner {
    lease_cache: Vec<Lease>,
    assigned_hosts: HashMap<String, String>,
}

impl FirstFitAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hostname a task id was placed on, if the placement is registered.
    pub fn assigned_host(&self, task_id: &str) -> Option<&str> {
        self.assigned_hosts.get(task_id).map(String::as_str)
    }

    pub fn cached_lease_count(&self) -> usize {
        self.lease_cache.len()
    }
}

impl AssignmentAlgorithm for FirstFitAssigner {
    fn schedule_once(
        &mut self,
        requests: Vec<TaskRequest>,
        leases: Vec<Lease>,
    ) -> Vec<VmAssignmentResult> {
        for lease in leases {
            if !self.lease_cache.iter().any(|l| l.offer_id == lease.offer_id) {
                self.lease_cache.push(lease);
            }
        }

        let mut buckets: BTreeMap<String, VmBucket> = BTreeMap::new();
        for lease in self.lease_cache.drain(..) {
            let bucket = buckets.entry(lease.slave_id.clone()).or_default();
            if bucket.hostname.is_empty() {
                bucket.hostname = lease.hostname.clone();
            }
            bucket.cpus += lease.cpus;
            bucket.memory_mb += lease.memory_mb;
            bucket.leases.push(lease);
        }

        let mut assigned: BTreeMap<String, Vec<TaskAssignment>> = BTreeMap::new();
        for request in requests {
            let fit = buckets
                .iter_mut()
                .find(|(_, b)| b.cpus >= request.cpus && b.memory_mb >= request.memory_mb);
            if let Some((slave_id, bucket)) = fit {
                bucket.cpus -= request.cpus;
                bucket.memory_mb -= request.memory_mb;
                assigned
                    .entry(slave_id.clone())
                    .or_default()
                    .push(TaskAssignment { request });
            }
        }

        let mut results = Vec::with_capacity(assigned.len());
        for (slave_id, bucket) in buckets {
            match assigned.remove(&slave_id) {
                Some(tasks_assigned) => results.push(VmAssignmentResult {
                    hostname: bucket.hostname,
                    slave_id,
                    leases_used: bucket.leases,
                    tasks_assigned,
                }),
                // Untouched agents keep their leases for the next cycle.
                None => self.lease_cache.extend(bucket.leases),
            }
        }
        results
    }

    fn task_assigned(&mut self, request: &TaskRequest, hostname: &str) {
        self.assigned_hosts
            .insert(request.task_id(), hostname.to_string());
    }

    fn expire_lease(&mut self, offer_id: &str) {
        self.lease_cache.retain(|l| l.offer_id != offer_id);
    }

    fn expire_all_leases(&mut self) {
        self.lease_cache.clear();
    }

    fn expire_leases_of_slave(&mut self, slave_id: &str) {
        self.lease_cache.retain(|l| l.slave_id != slave_id);
    }
}
