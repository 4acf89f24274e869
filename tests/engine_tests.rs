//! Scheduler engine tests: offer cycles, sharding integrity, status-update
//! dispatch, and lease lifecycle.


use cloudshard::context::{ExecutionType, TaskContext, TaskMetaInfo};
use cloudshard::scheduler::task::ShardingContexts;
use cloudshard::scheduler::{FrameworkScheduler, TaskState, TaskStatus};
use cloudshard::RegistryCenter;

use test_harness::{daemon_job, offer, transient_job, with_shards, TestScheduler};

fn status(task_id: &str, state: TaskState, message: &str) -> TaskStatus {
    TaskStatus {
        task_id: task_id.to_string(),
        state,
        message: message.to_string(),
        source: "SOURCE_EXECUTOR".to_string(),
    }
}

#[tokio::test]
async fn test_offer_cycle_launches_all_shards() {
    let fixture = TestScheduler::new();
    fixture.engine.registered("fw-1", "master-1").await;
    fixture
        .producer
        .register(daemon_job("daemon_test_job"))
        .await
        .unwrap();

    fixture
        .engine
        .resource_offers(vec![offer("offer-1", "slave-S0", 4.0, 4096.0)])
        .await;

    // Both shards launched in one batch on the offered agent.
    assert_eq!(fixture.driver.launch_batches().await, 1);
    let launched = fixture.driver.launched_tasks().await;
    assert_eq!(launched.len(), 2);
    for task in &launched {
        let context = TaskContext::parse(&task.task_id).unwrap();
        assert_eq!(context.job_name(), "daemon_test_job");
        assert_eq!(context.execution_type(), ExecutionType::Daemon);
        assert_eq!(context.slave_id(), "slave-S0");
        assert_eq!(task.slave_id, "slave-S0");
        assert_eq!(task.cpus, 1.0);
        assert_eq!(task.memory_mb, 128.0);
        assert!(fixture.facade.is_task_running(context.meta_info()).await);
    }

    // The ready entry was consumed by the launch.
    assert!(fixture.facade.eligible_job_contexts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_task_payload_carries_sharding_context() {
    let fixture = TestScheduler::new();
    fixture.engine.registered("fw-1", "master-1").await;
    fixture
        .producer
        .register(daemon_job("daemon_test_job"))
        .await
        .unwrap();

    fixture
        .engine
        .resource_offers(vec![offer("offer-1", "slave-S0", 4.0, 4096.0)])
        .await;

    let launched = fixture.driver.launched_tasks().await;
    let shard_0 = launched
        .iter()
        .find(|t| t.task_id.contains("@-@0@-@"))
        .unwrap();
    let payload: ShardingContexts = serde_json::from_slice(&shard_0.data).unwrap();
    assert_eq!(payload.job_name, "daemon_test_job");
    assert_eq!(payload.sharding_total_count, 2);
    assert_eq!(payload.job_parameter, "param");
    assert_eq!(payload.sharding_item_parameters.get(&0).unwrap(), "a");
    assert_eq!(payload.sharding_item_parameters.len(), 1);

    assert!(shard_0.executor.executor_id.starts_with("daemon_test_job@-@"));
    assert_eq!(shard_0.executor.command.value, "bin/start.sh");
    assert_eq!(shard_0.executor.command.uris[0].value, "http://repo.local/app.tar.gz");
    assert!(shard_0.executor.command.uris[0].extract);
    assert!(!shard_0.executor.command.uris[0].cache);
}

#[tokio::test]
async fn test_partial_assignment_defers_whole_job() {
    let fixture = TestScheduler::new();
    fixture.engine.registered("fw-1", "master-1").await;
    let config_service = fixture.facade.config_service();
    config_service
        .add(&with_shards(transient_job("transient_test_job"), 3))
        .await
        .unwrap();
    fixture
        .facade
        .ready_service()
        .add_transient("transient_test_job")
        .await
        .unwrap();

    // Room for two of the three shards only.
    fixture
        .engine
        .resource_offers(vec![offer("offer-1", "slave-S0", 2.0, 4096.0)])
        .await;

    assert_eq!(fixture.driver.launch_batches().await, 0);
    assert!(!fixture.facade.is_job_running("transient_test_job").await);
    // The job stays queued for a cycle with enough resources.
    assert_eq!(fixture.facade.eligible_job_contexts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_running_shard_is_not_launched_again() {
    let fixture = TestScheduler::new();
    fixture.engine.registered("fw-1", "master-1").await;
    fixture
        .producer
        .register(daemon_job("daemon_test_job"))
        .await
        .unwrap();
    let already_running =
        TaskContext::new("daemon_test_job", 0, ExecutionType::Daemon, "slave-S9");
    fixture.facade.add_running(already_running).await.unwrap();

    fixture
        .engine
        .resource_offers(vec![offer("offer-1", "slave-S0", 4.0, 4096.0)])
        .await;

    let launched = fixture.driver.launched_task_ids().await;
    assert_eq!(launched.len(), 1);
    let context = TaskContext::parse(&launched[0]).unwrap();
    assert_eq!(context.sharding_item(), 1);
}

#[tokio::test]
async fn test_failover_launch_may_be_partial() {
    let fixture = TestScheduler::new();
    fixture.engine.registered("fw-1", "master-1").await;
    let config_service = fixture.facade.config_service();
    config_service
        .add(&with_shards(daemon_job("daemon_test_job"), 3))
        .await
        .unwrap();
    fixture
        .facade
        .record_failover_task(&TaskContext::new(
            "daemon_test_job",
            2,
            ExecutionType::Daemon,
            "slave-S0",
        ))
        .await
        .unwrap();

    fixture
        .engine
        .resource_offers(vec![offer("offer-1", "slave-S1", 1.0, 128.0)])
        .await;

    // One shard of three relaunched: failover bypasses the integrity rule.
    let launched = fixture.driver.launched_task_ids().await;
    assert_eq!(launched.len(), 1);
    let context = TaskContext::parse(&launched[0]).unwrap();
    assert_eq!(context.sharding_item(), 2);
    assert_eq!(context.execution_type(), ExecutionType::Failover);
    // The failover entry was consumed.
    assert!(fixture.facade.eligible_job_contexts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deregistered_job_is_skipped_at_launch() {
    let fixture = TestScheduler::new();
    fixture.engine.registered("fw-1", "master-1").await;

    // A ready entry with no config left behind: nothing may launch.
    fixture
        .registry
        .persist("/state/ready/ghost_job", "1")
        .await
        .unwrap();
    fixture
        .engine
        .resource_offers(vec![offer("offer-1", "slave-S0", 4.0, 4096.0)])
        .await;

    assert_eq!(fixture.driver.launch_batches().await, 0);
}

#[tokio::test]
async fn test_leases_are_cached_across_cycles() {
    let fixture = TestScheduler::new();
    fixture.engine.registered("fw-1", "master-1").await;

    // No eligible work: the offer is cached as a lease.
    fixture
        .engine
        .resource_offers(vec![offer("offer-1", "slave-S0", 4.0, 4096.0)])
        .await;
    assert_eq!(fixture.driver.launch_batches().await, 0);

    // The next cycle launches from the cached lease alone.
    fixture
        .producer
        .register(daemon_job("daemon_test_job"))
        .await
        .unwrap();
    fixture.engine.resource_offers(Vec::new()).await;
    assert_eq!(fixture.driver.launched_tasks().await.len(), 2);
}

#[tokio::test]
async fn test_rescinded_and_lost_leases_expire() {
    let fixture = TestScheduler::new();
    fixture.engine.registered("fw-1", "master-1").await;
    fixture
        .engine
        .resource_offers(vec![
            offer("offer-1", "slave-S0", 4.0, 4096.0),
            offer("offer-2", "slave-S1", 4.0, 4096.0),
        ])
        .await;

    fixture.engine.offer_rescinded("offer-1").await;
    fixture.engine.slave_lost("slave-S1").await;

    fixture
        .producer
        .register(daemon_job("daemon_test_job"))
        .await
        .unwrap();
    fixture.engine.resource_offers(Vec::new()).await;
    assert_eq!(fixture.driver.launch_batches().await, 0);
}

#[tokio::test]
async fn test_status_finished_removes_from_running_set() {
    let fixture = TestScheduler::new();
    let context = TaskContext::new("test_job", 0, ExecutionType::Ready, "slave-S0");
    fixture.facade.add_running(context.clone()).await.unwrap();

    fixture
        .engine
        .status_update(status(&context.id(), TaskState::Finished, ""))
        .await;

    assert!(!fixture.facade.is_task_running(context.meta_info()).await);
}

#[tokio::test]
async fn test_status_killed_requeues_daemon_job() {
    let fixture = TestScheduler::new();
    fixture
        .facade
        .config_service()
        .add(&daemon_job("daemon_test_job"))
        .await
        .unwrap();
    let context = TaskContext::new("daemon_test_job", 0, ExecutionType::Daemon, "slave-S0");
    fixture.facade.add_running(context.clone()).await.unwrap();

    fixture
        .engine
        .status_update(status(&context.id(), TaskState::Killed, ""))
        .await;

    assert!(!fixture.facade.is_task_running(context.meta_info()).await);
    let contexts = fixture.facade.eligible_job_contexts().await.unwrap();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].job_config.job_name, "daemon_test_job");
    assert_eq!(contexts[0].execution_type, ExecutionType::Daemon);
}

#[tokio::test]
async fn test_status_killed_after_deregister_is_absorbed() {
    let fixture = TestScheduler::new();
    let context = TaskContext::new("daemon_test_job", 0, ExecutionType::Daemon, "slave-S0");
    fixture.facade.add_running(context.clone()).await.unwrap();

    // No config stored: the update clears the running set and nothing else.
    fixture
        .engine
        .status_update(status(&context.id(), TaskState::Killed, ""))
        .await;

    assert!(!fixture.facade.is_task_running(context.meta_info()).await);
    assert!(fixture.facade.eligible_job_contexts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_failed_records_failover() {
    let fixture = TestScheduler::new();
    fixture
        .facade
        .config_service()
        .add(&daemon_job("daemon_test_job"))
        .await
        .unwrap();
    let context = TaskContext::new("daemon_test_job", 1, ExecutionType::Daemon, "slave-S0");
    fixture.facade.add_running(context.clone()).await.unwrap();

    fixture
        .engine
        .status_update(status(&context.id(), TaskState::Failed, "oom"))
        .await;

    assert!(!fixture.facade.is_task_running(context.meta_info()).await);
    let contexts = fixture.facade.eligible_job_contexts().await.unwrap();
    // The failed shard comes back through failover; the daemon job is also
    // re-queued, but the failover context takes precedence in the merge.
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].execution_type, ExecutionType::Failover);
    assert_eq!(contexts[0].assigned_sharding_items, vec![1]);
}

#[tokio::test]
async fn test_status_running_toggles_daemon_idle_flag() {
    let fixture = TestScheduler::new();
    let context = TaskContext::new("daemon_test_job", 0, ExecutionType::Daemon, "slave-S0");
    let meta = TaskMetaInfo::new("daemon_test_job", 0);
    fixture.facade.add_running(context.clone()).await.unwrap();

    fixture
        .engine
        .status_update(status(&context.id(), TaskState::Running, "BEGIN"))
        .await;
    assert!(!fixture.facade.running_service().is_idle(&meta).await);

    fixture
        .engine
        .status_update(status(&context.id(), TaskState::Running, "COMPLETE"))
        .await;
    assert!(fixture.facade.running_service().is_idle(&meta).await);
}

#[tokio::test]
async fn test_unparseable_status_update_is_ignored() {
    let fixture = TestScheduler::new();
    fixture
        .engine
        .status_update(status("not-a-task-id", TaskState::Failed, ""))
        .await;
    assert!(fixture.facade.eligible_job_contexts().await.unwrap().is_empty());
}
