//! Local process launcher built on `tokio::process`.
//!
//! Each launch spawns the program directly (no shell unless the command asks
//! for one) and a monitor task that owns the child:
//! - stdout lines that parse as JSON objects become progress events
//! - exit with a code becomes `Complete(code)`
//! - death by signal or a failed wait becomes `Error(..)`
//!
//! Terminating a handle kills only the direct child. Process-tree teardown is
//! left to the command itself.

use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::LauncherConfig;
use crate::core::error::SchedulerError;
use crate::core::events::WorkerEvent;
use crate::core::job::JobCommand;
use crate::core::launcher::{ProcessLauncher, ProcessTerminator};
use crate::infra::events::EventBus;
use crate::util::ids::HandleId;

/// Stderr bytes kept for error messages.
const STDERR_TAIL_BYTES: usize = 2048;

/// How long output readers may keep draining after the child exited.
///
/// Background processes that inherited the pipes keep them open; the exit
/// is reported regardless once this elapses.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

type StderrTail = Arc<Mutex<VecDeque<u8>>>;

type KillRequest = oneshot::Sender<oneshot::Sender<()>>;

/// Launches local processes and publishes their events to an [`EventBus`].
#[derive(Clone)]
pub struct CommandLauncher {
    bus: EventBus,
    config: LauncherConfig,
    children: Arc<Mutex<HashMap<HandleId, KillRequest>>>,
}

impl std::fmt::Debug for CommandLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLauncher")
            .field("config", &self.config)
            .field("children", &self.children.lock().len())
            .finish_non_exhaustive()
    }
}

impl CommandLauncher {
    /// Create a launcher publishing to `bus`.
    pub fn new(bus: EventBus, config: LauncherConfig) -> Self {
        Self {
            bus,
            config,
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bus events are published to.
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Number of children still being monitored.
    pub fn live_children(&self) -> usize {
        self.children.lock().len()
    }

    fn build(&self, command: &JobCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.config.progress_from_stdout {
            cmd.stdout(Stdio::piped());
        } else {
            cmd.stdout(Stdio::null());
        }
        if let Some(cwd) = command.cwd.as_ref().or(self.config.default_cwd.as_ref()) {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

#[async_trait]
impl ProcessLauncher for CommandLauncher {
    async fn launch(&self, command: &JobCommand) -> Result<HandleId, SchedulerError> {
        let mut child = self
            .build(command)
            .spawn()
            .map_err(|e| SchedulerError::Launch(format!("{}: {e}", command.program)))?;

        let handle = HandleId::generate();
        tracing::info!(
            handle = %handle,
            program = %command.program,
            pid = ?child.id(),
            "process spawned"
        );

        self.bus.open(&handle);
        let (kill_tx, kill_rx) = oneshot::channel();
        self.children.lock().insert(handle.clone(), kill_tx);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let monitor = Monitor {
            bus: self.bus.clone(),
            children: Arc::clone(&self.children),
            handle: handle.clone(),
        };
        tokio::spawn(monitor.run(child, stdout, stderr, kill_rx));
        Ok(handle)
    }
}

#[async_trait]
impl ProcessTerminator for CommandLauncher {
    async fn terminate(&self, handle: &HandleId) -> Result<(), SchedulerError> {
        let Some(kill) = self.children.lock().remove(handle) else {
            tracing::debug!(handle = %handle, "terminate ignored: process already exited");
            return Ok(());
        };
        let (ack_tx, ack_rx) = oneshot::channel();
        if kill.send(ack_tx).is_err() {
            return Ok(());
        }
        // A dropped ack means the child exited on its own while the request was in flight.
        let _ = ack_rx.await;
        Ok(())
    }
}

struct Monitor {
    bus: EventBus,
    children: Arc<Mutex<HashMap<HandleId, KillRequest>>>,
    handle: HandleId,
}

impl Monitor {
    async fn run(
        self,
        mut child: Child,
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
        kill_rx: oneshot::Receiver<oneshot::Sender<()>>,
    ) {
        let progress = stdout.map(|out| {
            tokio::spawn(forward_progress(self.bus.clone(), self.handle.clone(), out))
        });
        let tail: StderrTail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_BYTES)));
        let stderr_reader = stderr.map(|err| tokio::spawn(read_tail(err, Arc::clone(&tail))));

        tokio::select! {
            status = child.wait() => {
                self.children.lock().remove(&self.handle);
                drain_reader(progress).await;
                drain_reader(stderr_reader).await;
                let tail = tail_string(&tail);
                let event = match status {
                    Ok(status) => match status.code() {
                        Some(code) => {
                            if code != 0 && !tail.is_empty() {
                                tracing::debug!(
                                    handle = %self.handle,
                                    code,
                                    stderr = %tail,
                                    "worker stderr"
                                );
                            }
                            WorkerEvent::complete(self.handle.clone(), code)
                        }
                        None => WorkerEvent::error(
                            self.handle.clone(),
                            with_tail("terminated by signal", &tail),
                        ),
                    },
                    Err(e) => WorkerEvent::error(
                        self.handle.clone(),
                        with_tail(&format!("wait failed: {e}"), &tail),
                    ),
                };
                tracing::info!(handle = %self.handle, event = ?event.kind, "process exited");
                self.bus.publish(event);
            }
            request = kill_rx => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(handle = %self.handle, error = %e, "kill failed");
                }
                tracing::info!(handle = %self.handle, "process terminated");
                if let Ok(ack) = request {
                    let _ = ack.send(());
                }
                drain_reader(progress).await;
                drain_reader(stderr_reader).await;
            }
        }
    }
}

/// Wait up to [`OUTPUT_DRAIN_TIMEOUT`] for an output reader, then abort it.
async fn drain_reader(task: Option<JoinHandle<()>>) {
    let Some(mut task) = task else {
        return;
    };
    if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut task).await.is_err() {
        tracing::debug!("output still open after exit; detaching reader");
        task.abort();
    }
}

fn with_tail(message: &str, tail: &str) -> String {
    if tail.is_empty() {
        message.to_string()
    } else {
        format!("{message}: {}", tail.trim_end())
    }
}

async fn forward_progress(bus: EventBus, handle: HandleId, stdout: ChildStdout) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<Map<String, Value>>(line.trim()) {
                Ok(fields) => {
                    bus.publish(WorkerEvent::progress(handle.clone(), fields));
                }
                Err(_) => tracing::trace!(handle = %handle, line = %line, "stdout"),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(handle = %handle, error = %e, "stdout read failed");
                break;
            }
        }
    }
}

/// Keep the last [`STDERR_TAIL_BYTES`] bytes of `reader` in `tail`.
async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, tail: StderrTail) {
    let mut chunk = [0_u8; 1024];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut tail = tail.lock();
                tail.extend(&chunk[..n]);
                let excess = tail.len().saturating_sub(STDERR_TAIL_BYTES);
                tail.drain(..excess);
            }
        }
    }
}

fn tail_string(tail: &Mutex<VecDeque<u8>>) -> String {
    let tail = tail.lock();
    let (front, back) = tail.as_slices();
    let mut bytes = Vec::with_capacity(tail.len());
    bytes.extend_from_slice(front);
    bytes.extend_from_slice(back);
    String::from_utf8_lossy(&bytes).into_owned()
}
