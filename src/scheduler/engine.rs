use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::CloudJobConfig;
use crate::context::{ExecutionType, JobContext, TaskContext, TaskMetaInfo, PLACEHOLDER_SLAVE_ID};
use crate::error::{AssignmentSkip, Result};
use crate::facade::FacadeService;
use crate::scheduler::assign::{AssignmentAlgorithm, TaskRequest, VmAssignmentResult};
use crate::scheduler::driver::ResourceDriver;
use crate::scheduler::offer::{Lease, ResourceOffer};
use crate::scheduler::task::{
    CommandInfo, CommandUri, ExecutorInfo, ShardingContexts, TaskInfo, TaskState, TaskStatus,
};

/// Callback contract the resource-manager SDK drives. Callbacks may arrive
/// concurrently. Implementations must absorb their own failures; nothing
/// propagates back into the SDK.
#[async_trait]
pub trait FrameworkScheduler: Send + Sync {
    async fn registered(&self, framework_id: &str, master: &str);

    async fn reregistered(&self, master: &str);

    async fn resource_offers(&self, offers: Vec<ResourceOffer>);

    async fn offer_rescinded(&self, offer_id: &str);

    async fn status_update(&self, status: TaskStatus);

    async fn framework_message(&self, executor_id: &str, slave_id: &str, data: &[u8]);

    async fn disconnected(&self);

    async fn slave_lost(&self, slave_id: &str);

    async fn executor_lost(&self, executor_id: &str, slave_id: &str, status: i32);

    async fn error(&self, message: &str);
}

/// The offer-matching and task-launching loop. Gathers eligible job
/// contexts, runs the assignment algorithm, enforces sharding integrity,
/// launches through the driver, and keeps the running set current from
/// status updates.
pub struct SchedulerEngine {
    algorithm: Mutex<Box<dyn AssignmentAlgorithm>>,
    facade: Arc<FacadeService>,
    driver: Arc<dyn ResourceDriver>,
}

impl SchedulerEngine {
    pub fn new(
        algorithm: Box<dyn AssignmentAlgorithm>,
        facade: Arc<FacadeService>,
        driver: Arc<dyn ResourceDriver>,
    ) -> Self {
        Self {
            algorithm: Mutex::new(algorithm),
            facade,
            driver,
        }
    }

    async fn on_connected(&self) {
        if let Err(e) = self.facade.start().await {
            tracing::error!(error = %e, "Failed to start facade service");
        }
        // Leases cached before the disconnect are stale on the new master.
        self.algorithm.lock().await.expire_all_leases();
    }

    async fn handle_offers(&self, offers: Vec<ResourceOffer>) -> Result<()> {
        let leases: Vec<Lease> = offers.into_iter().map(Lease::from).collect();
        let eligible = self.facade.eligible_job_contexts().await?;

        let mut pending_tasks = Vec::new();
        let mut sharding_totals: HashMap<String, u32> = HashMap::new();
        for context in &eligible {
            pending_tasks.extend(task_requests(context));
            // Failover launches are partial by definition.
            if context.execution_type != ExecutionType::Failover {
                sharding_totals.insert(
                    context.job_config.job_name.clone(),
                    context.job_config.sharding_total_count,
                );
            }
        }

        let vm_results = self
            .algorithm
            .lock()
            .await
            .schedule_once(pending_tasks, leases);
        self.log_unassigned_jobs(&eligible, &vm_results).await;
        let violations = integrity_violation_jobs(&sharding_totals, &vm_results);
        for job_name in &violations {
            tracing::warn!(
                %job_name,
                skip = %AssignmentSkip::IntegrityViolation,
                "Job not launched: resources cannot hold all sharding instances"
            );
        }

        let mut launched_this_cycle = HashSet::new();
        for vm_result in vm_results {
            self.launch_on_vm(vm_result, &violations, &mut launched_this_cycle)
                .await?;
        }
        Ok(())
    }

    /// Launch every surviving assignment of one VM as a single batch.
    async fn launch_on_vm(
        &self,
        vm_result: VmAssignmentResult,
        violations: &HashSet<String>,
        launched_this_cycle: &mut HashSet<TaskMetaInfo>,
    ) -> Result<()> {
        let mut launched_contexts = Vec::new();
        let mut task_infos = Vec::new();
        {
            let mut algorithm = self.algorithm.lock().await;
            for assignment in &vm_result.tasks_assigned {
                let placeholder = &assignment.request.task_context;
                if violations.contains(placeholder.job_name()) {
                    continue;
                }
                if self.facade.is_task_running(placeholder.meta_info()).await {
                    tracing::debug!(
                        task_meta = %placeholder.meta_info(),
                        skip = %AssignmentSkip::AlreadyRunning,
                        "Skipping assigned task"
                    );
                    continue;
                }
                if !launched_this_cycle.insert(placeholder.meta_info().clone()) {
                    tracing::debug!(
                        task_meta = %placeholder.meta_info(),
                        skip = %AssignmentSkip::Redundant,
                        "Skipping assigned task"
                    );
                    continue;
                }
                if let Some((context, task_info)) = self
                    .build_task_info(placeholder, &vm_result.slave_id)
                    .await?
                {
                    launched_contexts.push(context);
                    task_infos.push(task_info);
                }
                // Placement is recorded even when the config vanished, so
                // the algorithm's view matches what the manager saw offered.
                algorithm.task_assigned(&assignment.request, &vm_result.hostname);
            }
        }

        if task_infos.is_empty() {
            return Ok(());
        }
        tracing::info!(
            slave_id = %vm_result.slave_id,
            tasks = task_infos.len(),
            "Launching task batch"
        );
        if let Err(e) = self
            .driver
            .launch_tasks(vm_result.offer_ids(), task_infos)
            .await
        {
            tracing::error!(slave_id = %vm_result.slave_id, error = %e, "Task launch failed");
            return Ok(());
        }
        for context in &launched_contexts {
            self.facade.add_running(context.clone()).await?;
        }
        self.facade
            .remove_launch_tasks_from_queue(&launched_contexts)
            .await
    }

    /// Rebuild the context against the real agent and render the launch.
    /// `None` when the job config disappeared since eligibility (a racing
    /// deregister); the task is skipped, not failed.
    async fn build_task_info(
        &self,
        placeholder: &TaskContext,
        slave_id: &str,
    ) -> Result<Option<(TaskContext, TaskInfo)>> {
        let job_name = placeholder.job_name();
        let Some(job_config) = self.facade.load_job_config(job_name).await? else {
            tracing::info!(
                job_name,
                skip = %AssignmentSkip::ConfigMissing,
                "Skipping assigned task"
            );
            return Ok(None);
        };
        let context = TaskContext::new(
            job_name,
            placeholder.sharding_item(),
            placeholder.execution_type(),
            slave_id,
        );
        let task_info = build_task_info(&context, &job_config, slave_id)?;
        Ok(Some((context, task_info)))
    }

    async fn log_unassigned_jobs(
        &self,
        eligible: &[JobContext],
        vm_results: &[VmAssignmentResult],
    ) {
        let assigned_jobs: HashSet<&str> = vm_results
            .iter()
            .flat_map(|vm| &vm.tasks_assigned)
            .map(|a| a.request.task_context.job_name())
            .collect();
        for context in eligible {
            let job_name = &context.job_config.job_name;
            if !assigned_jobs.contains(job_name.as_str())
                && !self.facade.is_job_running(job_name).await
            {
                tracing::warn!(%job_name, "Job not assigned at this time: resources not enough");
            }
        }
    }
}

#[async_trait]
impl FrameworkScheduler for SchedulerEngine {
    async fn registered(&self, framework_id: &str, master: &str) {
        tracing::info!(framework_id, master, "Framework registered");
        self.on_connected().await;
    }

    async fn reregistered(&self, master: &str) {
        tracing::info!(master, "Framework reregistered");
        self.on_connected().await;
    }

    async fn resource_offers(&self, offers: Vec<ResourceOffer>) {
        if let Err(e) = self.handle_offers(offers).await {
            tracing::error!(error = %e, "Offer cycle aborted");
        }
    }

    async fn offer_rescinded(&self, offer_id: &str) {
        tracing::trace!(offer_id, "Offer rescinded");
        self.algorithm.lock().await.expire_lease(offer_id);
    }

    async fn status_update(&self, status: TaskStatus) {
        tracing::trace!(task_id = %status.task_id, state = %status.state, "Status update");
        let context = match TaskContext::parse(&status.task_id) {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(task_id = %status.task_id, error = %e, "Unparseable status update");
                return;
            }
        };
        let result = match status.state {
            TaskState::Running => match status.message.as_str() {
                "BEGIN" => {
                    self.facade.update_daemon_status(&context, false).await;
                    Ok(())
                }
                "COMPLETE" => {
                    self.facade.update_daemon_status(&context, true).await;
                    Ok(())
                }
                _ => Ok(()),
            },
            TaskState::Finished => self.facade.remove_running(context.meta_info()).await,
            TaskState::Killed => {
                let removed = self.facade.remove_running(context.meta_info()).await;
                // Transient jobs fire again from the trigger; daemons must
                // be re-enqueued here. The facade skips deregistered jobs.
                let requeued = self
                    .facade
                    .add_daemon_job_to_ready_queue(context.job_name())
                    .await;
                removed.and(requeued)
            }
            TaskState::Lost | TaskState::Failed | TaskState::Error => {
                tracing::warn!(
                    task_id = %status.task_id,
                    state = %status.state,
                    message = %status.message,
                    source = %status.source,
                    "Task ended abnormally"
                );
                let removed = self.facade.remove_running(context.meta_info()).await;
                let recorded = self.facade.record_failover_task(&context).await;
                let requeued = self
                    .facade
                    .add_daemon_job_to_ready_queue(context.job_name())
                    .await;
                removed.and(recorded).and(requeued)
            }
            TaskState::Staging | TaskState::Starting => Ok(()),
        };
        if let Err(e) = result {
            tracing::error!(task_id = %status.task_id, error = %e, "Status update not applied");
        }
    }

    async fn framework_message(&self, executor_id: &str, slave_id: &str, data: &[u8]) {
        tracing::trace!(executor_id, slave_id, bytes = data.len(), "Framework message");
    }

    async fn disconnected(&self) {
        tracing::warn!("Framework disconnected");
        self.facade.stop().await;
    }

    async fn slave_lost(&self, slave_id: &str) {
        tracing::warn!(slave_id, "Slave lost");
        self.algorithm.lock().await.expire_leases_of_slave(slave_id);
    }

    async fn executor_lost(&self, executor_id: &str, slave_id: &str, status: i32) {
        tracing::debug!(executor_id, slave_id, status, "Executor lost");
    }

    async fn error(&self, message: &str) {
        tracing::error!(message, "Resource manager error");
    }
}

fn task_requests(context: &JobContext) -> Vec<TaskRequest> {
    context
        .assigned_sharding_items
        .iter()
        .map(|&item| TaskRequest {
            task_context: TaskContext::new(
                &context.job_config.job_name,
                item,
                context.execution_type,
                PLACEHOLDER_SLAVE_ID,
            ),
            cpus: context.job_config.cpu_count,
            memory_mb: context.job_config.memory_mb,
        })
        .collect()
}

/// Jobs whose assigned shard count fell short of their sharding total. A
/// partial launch would break the shard contract, so the whole job waits
/// for a cycle with enough resources.
fn integrity_violation_jobs(
    sharding_totals: &HashMap<String, u32>,
    vm_results: &[VmAssignmentResult],
) -> HashSet<String> {
    let mut assigned_counts: HashMap<&str, u32> = HashMap::new();
    for vm_result in vm_results {
        for assignment in &vm_result.tasks_assigned {
            *assigned_counts
                .entry(assignment.request.task_context.job_name())
                .or_default() += 1;
        }
    }
    assigned_counts
        .into_iter()
        .filter(|(job_name, count)| {
            sharding_totals
                .get(*job_name)
                .is_some_and(|total| count < total)
        })
        .map(|(job_name, _)| job_name.to_string())
        .collect()
}

fn build_task_info(
    context: &TaskContext,
    job_config: &CloudJobConfig,
    slave_id: &str,
) -> Result<TaskInfo> {
    let item = context.sharding_item();
    let mut assigned_parameters = HashMap::with_capacity(1);
    assigned_parameters.insert(
        item,
        job_config
            .sharding_item_parameters
            .get(&item)
            .cloned()
            .unwrap_or_default(),
    );
    let sharding_contexts = ShardingContexts {
        job_name: job_config.job_name.clone(),
        sharding_total_count: job_config.sharding_total_count,
        job_parameter: job_config.job_parameter.clone(),
        sharding_item_parameters: assigned_parameters,
    };
    Ok(TaskInfo {
        task_id: context.id(),
        name: context.task_name(),
        slave_id: slave_id.to_string(),
        cpus: job_config.cpu_count,
        memory_mb: job_config.memory_mb,
        executor: ExecutorInfo {
            executor_id: context.executor_id(&job_config.app_url),
            command: CommandInfo {
                uris: vec![CommandUri {
                    value: job_config.app_url.clone(),
                    extract: true,
                    cache: false,
                }],
                shell: true,
                value: job_config.bootstrap_script.clone(),
            },
        },
        data: serde_json::to_vec(&sharding_contexts)?,
    })
}
