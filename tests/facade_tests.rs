//! Facade tests: eligibility merging and queue removal dispatch.


use cloudshard::context::{ExecutionType, TaskContext};

use test_harness::{daemon_job, transient_job, TestScheduler};

#[tokio::test]
async fn test_eligible_contexts_prefer_failover() {
    let fixture = TestScheduler::new();
    let config_service = fixture.facade.config_service();
    config_service.add(&transient_job("job_a")).await.unwrap();
    config_service.add(&daemon_job("job_b")).await.unwrap();

    // job_a is in both queues; the failover entry must win.
    fixture.facade.ready_service().add_transient("job_a").await.unwrap();
    fixture.facade.ready_service().add_daemon("job_b").await.unwrap();
    fixture
        .facade
        .record_failover_task(&TaskContext::new("job_a", 1, ExecutionType::Ready, "slave-S0"))
        .await
        .unwrap();

    let contexts = fixture.facade.eligible_job_contexts().await.unwrap();
    assert_eq!(contexts.len(), 2);
    let job_a = contexts
        .iter()
        .find(|c| c.job_config.job_name == "job_a")
        .unwrap();
    assert_eq!(job_a.execution_type, ExecutionType::Failover);
    assert_eq!(job_a.assigned_sharding_items, vec![1]);
    let job_b = contexts
        .iter()
        .find(|c| c.job_config.job_name == "job_b")
        .unwrap();
    assert_eq!(job_b.execution_type, ExecutionType::Daemon);
    assert_eq!(job_b.assigned_sharding_items, vec![0, 1]);
}

#[tokio::test]
async fn test_remove_launch_tasks_dispatches_by_type() {
    let fixture = TestScheduler::new();
    let config_service = fixture.facade.config_service();
    config_service.add(&transient_job("job_a")).await.unwrap();
    config_service.add(&daemon_job("job_b")).await.unwrap();

    let failover = TaskContext::new("job_a", 0, ExecutionType::Ready, "slave-S0");
    fixture.facade.record_failover_task(&failover).await.unwrap();
    fixture.facade.ready_service().add_daemon("job_b").await.unwrap();

    let launched = vec![
        TaskContext::new("job_a", 0, ExecutionType::Failover, "slave-S0"),
        TaskContext::new("job_b", 0, ExecutionType::Daemon, "slave-S0"),
        TaskContext::new("job_b", 1, ExecutionType::Daemon, "slave-S0"),
    ];
    fixture
        .facade
        .remove_launch_tasks_from_queue(&launched)
        .await
        .unwrap();

    assert!(fixture.facade.eligible_job_contexts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_daemon_requeue_checks_config_presence() {
    let fixture = TestScheduler::new();

    // Deregistered job: the re-queue must be absorbed.
    fixture
        .facade
        .add_daemon_job_to_ready_queue("ghost_job")
        .await
        .unwrap();
    assert!(fixture.facade.eligible_job_contexts().await.unwrap().is_empty());

    // Transient jobs never re-queue through the daemon path.
    let config_service = fixture.facade.config_service();
    config_service.add(&transient_job("transient_test_job")).await.unwrap();
    fixture
        .facade
        .add_daemon_job_to_ready_queue("transient_test_job")
        .await
        .unwrap();
    assert!(fixture.facade.eligible_job_contexts().await.unwrap().is_empty());

    config_service.add(&daemon_job("daemon_test_job")).await.unwrap();
    fixture
        .facade
        .add_daemon_job_to_ready_queue("daemon_test_job")
        .await
        .unwrap();
    let contexts = fixture.facade.eligible_job_contexts().await.unwrap();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].job_config.job_name, "daemon_test_job");
}

#[tokio::test]
async fn test_update_daemon_status_tracks_idle_flag() {
    let fixture = TestScheduler::new();
    let context = TaskContext::new("daemon_test_job", 0, ExecutionType::Daemon, "slave-S0");
    fixture.facade.add_running(context.clone()).await.unwrap();

    fixture.facade.update_daemon_status(&context, false).await;
    assert!(!fixture
        .facade
        .running_service()
        .is_idle(context.meta_info())
        .await);

    fixture.facade.update_daemon_status(&context, true).await;
    assert!(fixture
        .facade
        .running_service()
        .is_idle(context.meta_info())
        .await);
}
