//! Tests for runtime helpers

use std::sync::mpsc;
use std::time::Duration;

use prometheus_job_scheduler::core::{JobCommand, JobStatus, LoopState, SchedulerError, Spawn};
use prometheus_job_scheduler::infra::InMemoryJobTable;
use prometheus_job_scheduler::runtime::{submit_job, JobSubmission, TokioSpawner};
use prometheus_job_scheduler::util::JobId;

fn submission(id: Option<&str>) -> JobSubmission {
    JobSubmission {
        id: id.map(JobId::from),
        command: JobCommand::shell("true"),
        priority: 2,
        scheduled_time_ms: Some(500),
        dependencies: Default::default(),
    }
}

#[test]
fn test_submit_job_inserts_pending() {
    let table = InMemoryJobTable::new();
    let id = submit_job(&table, submission(Some("a")), 42).unwrap();

    assert_eq!(id, JobId::from("a"));
    let job = table.get(&id).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.priority, 2);
    assert_eq!(job.created_at_ms, 42);
    assert_eq!(job.scheduled_time_ms, Some(500));
}

#[test]
fn test_submit_job_generates_id() {
    let table = InMemoryJobTable::new();
    let a = submit_job(&table, submission(None), 1).unwrap();
    let b = submit_job(&table, submission(None), 1).unwrap();
    assert_ne!(a, b);
    assert_eq!(table.len(), 2);
}

#[test]
fn test_submit_job_rejects_duplicate() {
    let table = InMemoryJobTable::new();
    submit_job(&table, submission(Some("a")), 1).unwrap();
    let err = submit_job(&table, submission(Some("a")), 2).unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateJob(_)));
}

#[test]
fn test_submission_deserializes_with_defaults() {
    let req: JobSubmission =
        serde_json::from_str(r#"{"command": {"program": "echo", "args": ["hi"]}}"#).unwrap();
    assert!(req.id.is_none());
    assert_eq!(req.priority, 0);
    assert!(req.dependencies.is_empty());
    assert_eq!(req.command.program, "echo");
}

#[test]
fn test_owned_runtime_spawner_runs_futures() {
    let spawner = TokioSpawner::with_worker_threads(1).unwrap();
    let (tx, rx) = mpsc::channel();
    spawner.spawn(async move {
        let _ = tx.send(7);
    });
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
}

#[cfg(feature = "process-launcher")]
#[tokio::test]
async fn test_status_report_counts_jobs() {
    use prometheus_job_scheduler::builders::build_command_scheduler;
    use prometheus_job_scheduler::config::SchedulerConfig;
    use prometheus_job_scheduler::runtime::status_report;

    let parts =
        build_command_scheduler(&SchedulerConfig::default(), TokioSpawner::current()).unwrap();
    submit_job(&parts.table, submission(Some("later")), 1).unwrap();
    let mut waiting = submission(Some("waiting"));
    waiting.scheduled_time_ms = None;
    waiting.dependencies.insert(JobId::from("later"));
    submit_job(&parts.table, waiting, 2).unwrap();

    let status = status_report(&parts.scheduler, 100);

    assert_eq!(status.state, LoopState::Idle);
    assert_eq!(status.max_concurrent, 1);
    assert!(status.running.is_empty());
    assert_eq!(status.pending, 2);
    assert_eq!(status.completed, 0);
    assert_eq!(status.failed, 0);
    assert_eq!(status.blocked.len(), 2);
}
