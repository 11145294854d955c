//! Job records and the partial-update contract applied to them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util::clock::now_ms;
use crate::util::ids::{JobId, Priority};

/// Progress key holding the numeric completion percentage.
pub const PERCENT_KEY: &str = "percent";

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be selected.
    Pending,
    /// A worker process is executing the job.
    Running,
    /// The worker exited with code `0`.
    Completed,
    /// Launch, exit or runtime failure.
    Failed,
}

impl JobStatus {
    /// Whether the status is terminal (`Completed` or `Failed`).
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobFailure {
    /// The launcher rejected the command; the job never held a slot.
    Launch {
        /// Launcher error message.
        message: String,
    },
    /// The worker exited with a non-zero code.
    Exit {
        /// Process exit code.
        code: i32,
    },
    /// The worker reported an error out-of-band.
    Runtime {
        /// Error message carried by the event.
        message: String,
    },
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch { message } => write!(f, "launch failure: {message}"),
            Self::Exit { code } => write!(f, "worker exited with code {code}"),
            Self::Runtime { message } => write!(f, "worker error: {message}"),
        }
    }
}

/// Launch descriptor handed verbatim to the process launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCommand {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory, if different from the launcher's default.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl JobCommand {
    /// Command running `program` with `args`.
    pub fn new<I, A>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Command running `script` through `sh -c`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh", ["-c".to_string(), script.into()])
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// One unit of work held by the job table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Stable identifier.
    pub id: JobId,
    /// Launch descriptor.
    pub command: JobCommand,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Higher is more urgent.
    pub priority: Priority,
    /// Creation time (ms since epoch); tie-break only.
    pub created_at_ms: u128,
    /// Job is ineligible while `now < scheduled_time_ms`.
    #[serde(default)]
    pub scheduled_time_ms: Option<u128>,
    /// Jobs that must be `Completed` before this one may run.
    #[serde(default)]
    pub dependencies: BTreeSet<JobId>,
    /// Progress fields merged from worker events.
    #[serde(default)]
    pub progress: Map<String, Value>,
    /// Exit code of the last worker, once it exited.
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Failure cause when `status` is `Failed`.
    #[serde(default)]
    pub failure: Option<JobFailure>,
    /// When the last launch started (ms since epoch).
    #[serde(default)]
    pub started_at_ms: Option<u128>,
    /// When the job last settled (ms since epoch).
    #[serde(default)]
    pub finished_at_ms: Option<u128>,
}

impl JobRecord {
    /// New pending job with a generated id, priority `0`, created now.
    pub fn new(command: JobCommand) -> Self {
        Self::with_id(JobId::generate(), command)
    }

    /// New pending job with an explicit id, created now.
    pub fn with_id(id: impl Into<JobId>, command: JobCommand) -> Self {
        Self {
            id: id.into(),
            command,
            status: JobStatus::Pending,
            priority: 0,
            created_at_ms: now_ms(),
            scheduled_time_ms: None,
            dependencies: BTreeSet::new(),
            progress: Map::new(),
            exit_code: None,
            failure: None,
            started_at_ms: None,
            finished_at_ms: None,
        }
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Override the creation timestamp.
    #[must_use]
    pub const fn created_at(mut self, created_at_ms: u128) -> Self {
        self.created_at_ms = created_at_ms;
        self
    }

    /// Hold the job back until `at_ms`.
    #[must_use]
    pub const fn scheduled_at(mut self, at_ms: u128) -> Self {
        self.scheduled_time_ms = Some(at_ms);
        self
    }

    /// Add a dependency on another job.
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<JobId>) -> Self {
        self.dependencies.insert(id.into());
        self
    }

    /// Set the status directly (table seeding and tests).
    #[must_use]
    pub const fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    /// Numeric completion percentage from the progress fields, if reported.
    pub fn percent(&self) -> Option<f64> {
        self.progress.get(PERCENT_KEY).and_then(Value::as_f64)
    }

    /// Merge a patch into this record.
    ///
    /// Moving back to `Pending` or `Running` drops the previous run's exit
    /// code, failure and finish time before the rest of the patch applies.
    pub fn apply(&mut self, patch: JobPatch) {
        if let Some(status) = patch.status {
            if !status.is_finished() {
                self.exit_code = None;
                self.failure = None;
                self.finished_at_ms = None;
            }
            self.status = status;
        }
        if let Some(fields) = patch.progress {
            for (key, value) in fields {
                self.progress.insert(key, value);
            }
        }
        if patch.exit_code.is_some() {
            self.exit_code = patch.exit_code;
        }
        if patch.failure.is_some() {
            self.failure = patch.failure;
        }
        if patch.started_at_ms.is_some() {
            self.started_at_ms = patch.started_at_ms;
        }
        if patch.finished_at_ms.is_some() {
            self.finished_at_ms = patch.finished_at_ms;
        }
    }
}

/// Partial update merged into a [`JobRecord`]. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    /// New status.
    pub status: Option<JobStatus>,
    /// Progress fields inserted over the existing ones.
    pub progress: Option<Map<String, Value>>,
    /// Worker exit code.
    pub exit_code: Option<i32>,
    /// Failure cause.
    pub failure: Option<JobFailure>,
    /// Launch timestamp.
    pub started_at_ms: Option<u128>,
    /// Settlement timestamp.
    pub finished_at_ms: Option<u128>,
}

impl JobPatch {
    /// Patch changing only the status.
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch merging progress fields.
    pub fn progress(fields: Map<String, Value>) -> Self {
        Self {
            progress: Some(fields),
            ..Self::default()
        }
    }

    /// Patch marking the job `Failed` for `failure`.
    pub fn failed(failure: JobFailure) -> Self {
        let exit_code = match failure {
            JobFailure::Exit { code } => Some(code),
            _ => None,
        };
        Self {
            status: Some(JobStatus::Failed),
            exit_code,
            failure: Some(failure),
            ..Self::default()
        }
    }

    /// Set the exit code.
    #[must_use]
    pub const fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Set the launch timestamp.
    #[must_use]
    pub const fn started_at(mut self, at_ms: u128) -> Self {
        self.started_at_ms = Some(at_ms);
        self
    }

    /// Set the settlement timestamp.
    #[must_use]
    pub const fn finished_at(mut self, at_ms: u128) -> Self {
        self.finished_at_ms = Some(at_ms);
        self
    }
}
