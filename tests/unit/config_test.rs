//! Tests for configuration validation

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use prometheus_job_scheduler::config::scheduler::{
    ENV_MAX_CONCURRENT, ENV_TICK_INTERVAL_MS, ENV_TRANSITION_LOG_CAPACITY,
};
use prometheus_job_scheduler::config::{LauncherConfig, SchedulerConfig};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_default_config_is_valid() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_concurrent, 1);
    assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
    assert!(cfg.launcher.progress_from_stdout);
}

#[test]
fn test_invalid_max_concurrent() {
    let invalid = SchedulerConfig {
        max_concurrent: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_invalid_tick_interval() {
    let invalid = SchedulerConfig {
        tick_interval_ms: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_invalid_default_cwd() {
    let invalid = SchedulerConfig {
        launcher: LauncherConfig {
            default_cwd: Some(PathBuf::new()),
            ..LauncherConfig::default()
        },
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_from_json_fills_defaults() {
    let cfg = SchedulerConfig::from_json_str(r#"{"max_concurrent": 4}"#).unwrap();
    assert_eq!(cfg.max_concurrent, 4);
    assert_eq!(cfg.tick_interval_ms, 1000);
    assert_eq!(cfg.transition_log_capacity, 1024);
    assert_eq!(cfg.launcher, LauncherConfig::default());
}

#[test]
fn test_from_json_nested_launcher() {
    let input = r#"{
        "tick_interval_ms": 250,
        "launcher": {"progress_from_stdout": false, "default_cwd": "/tmp"}
    }"#;
    let cfg = SchedulerConfig::from_json_str(input).unwrap();
    assert_eq!(cfg.tick_interval(), Duration::from_millis(250));
    assert!(!cfg.launcher.progress_from_stdout);
    assert_eq!(cfg.launcher.default_cwd, Some(PathBuf::from("/tmp")));
}

#[test]
fn test_from_json_rejects_invalid_values() {
    assert!(SchedulerConfig::from_json_str(r#"{"max_concurrent": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_from_lookup_overrides_defaults() {
    let cfg = SchedulerConfig::from_lookup(lookup(&[
        (ENV_MAX_CONCURRENT, "3"),
        (ENV_TICK_INTERVAL_MS, "50"),
        (ENV_TRANSITION_LOG_CAPACITY, "16"),
    ]))
    .unwrap();
    assert_eq!(cfg.max_concurrent, 3);
    assert_eq!(cfg.tick_interval_ms, 50);
    assert_eq!(cfg.transition_log_capacity, 16);
}

#[test]
fn test_from_lookup_without_vars_uses_defaults() {
    let cfg = SchedulerConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg, SchedulerConfig::default());
}

#[test]
fn test_from_lookup_rejects_garbage() {
    let err = SchedulerConfig::from_lookup(lookup(&[(ENV_MAX_CONCURRENT, "many")])).unwrap_err();
    assert!(err.contains(ENV_MAX_CONCURRENT));
    assert!(SchedulerConfig::from_lookup(lookup(&[(ENV_TICK_INTERVAL_MS, "0")])).is_err());
}

#[test]
fn test_cpu_concurrency_is_positive() {
    let cfg = SchedulerConfig::default().with_cpu_concurrency();
    assert!(cfg.max_concurrent >= 1);
    assert!(cfg.validate().is_ok());
}
