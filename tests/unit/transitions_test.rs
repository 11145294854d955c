//! Tests for transition sinks

use prometheus_job_scheduler::core::{
    build_transition, InMemoryTransitionLog, JobStatus, TracingTransitionSink, TransitionSink,
};
use prometheus_job_scheduler::util::JobId;

#[test]
fn test_build_transition_stamps_time() {
    let t = build_transition(&JobId::from("a"), JobStatus::Running, Some("h1".to_string()));
    assert_eq!(t.job_id, JobId::from("a"));
    assert_eq!(t.status, JobStatus::Running);
    assert_eq!(t.detail.as_deref(), Some("h1"));
    assert!(t.created_at_ms > 0);
}

#[test]
fn test_log_keeps_order_per_job() {
    let log = InMemoryTransitionLog::new(16);
    let a = JobId::from("a");
    let b = JobId::from("b");
    log.record(build_transition(&a, JobStatus::Running, None));
    log.record(build_transition(&b, JobStatus::Running, None));
    log.record(build_transition(&a, JobStatus::Completed, None));

    assert_eq!(log.statuses_for(&a), vec![JobStatus::Running, JobStatus::Completed]);
    assert_eq!(log.statuses_for(&b), vec![JobStatus::Running]);
    assert_eq!(log.transitions().len(), 3);
}

#[test]
fn test_log_evicts_oldest() {
    let log = InMemoryTransitionLog::new(2);
    let a = JobId::from("a");
    log.record(build_transition(&a, JobStatus::Running, None));
    log.record(build_transition(&a, JobStatus::Pending, None));
    log.record(build_transition(&a, JobStatus::Running, None));

    assert_eq!(log.statuses_for(&a), vec![JobStatus::Pending, JobStatus::Running]);
}

#[test]
fn test_zero_capacity_log_records_nothing() {
    let log = InMemoryTransitionLog::new(0);
    log.record(build_transition(&JobId::from("a"), JobStatus::Failed, None));
    assert!(log.transitions().is_empty());
}

#[test]
fn test_tracing_sink_accepts_transitions() {
    let sink = TracingTransitionSink;
    sink.record(build_transition(&JobId::from("a"), JobStatus::Failed, Some("exit code 2".into())));
}
