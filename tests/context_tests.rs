//! Task context codec tests: encode/decode round-trips, field-count
//! variants, and executor id derivation.

use cloudshard::context::{ExecutionType, TaskContext, TaskMetaInfo, DELIMITER};

#[test]
fn test_task_context_round_trip() {
    let context = TaskContext::new("test_job", 3, ExecutionType::Ready, "slave-S0");
    let parsed = TaskContext::parse(&context.id()).unwrap();
    assert_eq!(parsed, context);
}

#[test]
fn test_round_trip_preserves_uuid() {
    let context = TaskContext::new("test_job", 0, ExecutionType::Failover, "slave-S1");
    assert_eq!(context.uuid().len(), 32);
    let parsed = TaskContext::parse(&context.id()).unwrap();
    assert_eq!(parsed.uuid(), context.uuid());
}

#[test]
fn test_parse_five_field_form() {
    let context = TaskContext::parse("test_job@-@1@-@DAEMON@-@slave-S0@-@abc123").unwrap();
    assert_eq!(context.job_name(), "test_job");
    assert_eq!(context.sharding_item(), 1);
    assert_eq!(context.execution_type(), ExecutionType::Daemon);
    assert_eq!(context.slave_id(), "slave-S0");
    assert_eq!(context.uuid(), "abc123");
}

#[test]
fn test_parse_four_field_form_generates_uuid() {
    let context = TaskContext::parse("test_job@-@1@-@FAILOVER@-@slave-S1").unwrap();
    assert_eq!(context.job_name(), "test_job");
    assert_eq!(context.execution_type(), ExecutionType::Failover);
    assert_eq!(context.uuid().len(), 32);
    // The id always re-encodes with all five fields.
    assert_eq!(context.id().split(DELIMITER).count(), 5);
}

#[test]
fn test_parse_rejects_malformed_ids() {
    assert!(TaskContext::parse("garbage").is_err());
    assert!(TaskContext::parse("job@-@not_a_number@-@READY@-@s@-@u").is_err());
    assert!(TaskContext::parse("job@-@0@-@UNKNOWN_TYPE@-@s@-@u").is_err());
    assert!(TaskContext::parse("job@-@0").is_err());
}

#[test]
fn test_meta_info_round_trip() {
    let meta = TaskMetaInfo::new("test_job", 7);
    assert_eq!(meta.to_string(), "test_job@-@7");
    assert_eq!(TaskMetaInfo::parse(&meta.to_string()).unwrap(), meta);
}

#[test]
fn test_meta_info_parses_prefix_of_full_id() {
    let meta = TaskMetaInfo::parse("test_job@-@2@-@READY@-@slave-S0@-@uuid").unwrap();
    assert_eq!(meta.job_name, "test_job");
    assert_eq!(meta.sharding_item, 2);
}

#[test]
fn test_task_name_is_meta_string() {
    let context = TaskContext::new("test_job", 5, ExecutionType::Ready, "slave-S0");
    assert_eq!(context.task_name(), "test_job@-@5");
}

#[test]
fn test_executor_id_stable_per_app_url() {
    let context = TaskContext::new("test_job", 0, ExecutionType::Ready, "slave-S0");
    let other_shard = TaskContext::new("test_job", 1, ExecutionType::Daemon, "slave-S1");
    let url = "http://repo.local/app-v1.tar.gz";

    // Same job build maps to the same executor, whatever the shard.
    assert_eq!(context.executor_id(url), other_shard.executor_id(url));
    assert!(context.executor_id(url).starts_with("test_job@-@"));
    assert_ne!(
        context.executor_id(url),
        context.executor_id("http://repo.local/app-v2.tar.gz")
    );
}

#[test]
fn test_execution_type_string_forms() {
    for (execution_type, name) in [
        (ExecutionType::Ready, "READY"),
        (ExecutionType::Failover, "FAILOVER"),
        (ExecutionType::Daemon, "DAEMON"),
    ] {
        assert_eq!(execution_type.to_string(), name);
        assert_eq!(name.parse::<ExecutionType>().unwrap(), execution_type);
    }
}
