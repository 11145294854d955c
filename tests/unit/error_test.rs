//! Tests for error types

use prometheus_job_scheduler::core::SchedulerError;
use prometheus_job_scheduler::util::JobId;

#[test]
fn test_launch_error() {
    let err = SchedulerError::Launch("ffmpeg: not found".to_string());
    assert_eq!(format!("{}", err), "launch failed: ffmpeg: not found");
}

#[test]
fn test_terminate_error() {
    let err = SchedulerError::Terminate("h1".to_string());
    assert_eq!(format!("{}", err), "terminate failed: h1");
}

#[test]
fn test_already_running_error() {
    let err = SchedulerError::AlreadyRunning(JobId::from("job-1"));
    assert_eq!(format!("{}", err), "job already running: job-1");
}

#[test]
fn test_duplicate_job_error() {
    let err = SchedulerError::DuplicateJob(JobId::from("job-1"));
    assert_eq!(format!("{}", err), "duplicate job: job-1");
}

#[test]
fn test_table_full_error() {
    let err = SchedulerError::TableFull(8);
    assert_eq!(format!("{}", err), "job table full (capacity 8)");
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("max_concurrent must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid config: max_concurrent must be greater than 0"
    );
}
