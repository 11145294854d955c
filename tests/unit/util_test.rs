//! Tests for utility functions

use prometheus_job_scheduler::util::{now_ms, HandleId, JobId, Priority};

#[test]
fn test_job_id_display_and_conversion() {
    let id = JobId::from("encode-42");
    assert_eq!(id.as_str(), "encode-42");
    assert_eq!(id.to_string(), "encode-42");
    assert_eq!(JobId::from("encode-42".to_string()), id);
}

#[test]
fn test_generated_ids_are_unique() {
    assert_ne!(JobId::generate(), JobId::generate());
    assert_ne!(HandleId::generate(), HandleId::generate());
}

#[test]
fn test_ids_serialize_transparently() {
    let json = serde_json::to_string(&HandleId::from("h1")).unwrap();
    assert_eq!(json, "\"h1\"");
    let id: JobId = serde_json::from_str("\"job-7\"").unwrap();
    assert_eq!(id, JobId::from("job-7"));
}

#[test]
fn test_priority_is_signed() {
    let low: Priority = -3;
    let high: Priority = 7;
    assert!(high > low);
}

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(b >= a);
    assert!(a > 1_600_000_000_000);
}

#[test]
fn test_init_tracing_is_idempotent() {
    prometheus_job_scheduler::util::init_tracing();
    prometheus_job_scheduler::util::init_tracing();
    tracing::info!("tracing initialised twice");
}
