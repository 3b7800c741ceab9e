// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core subprocess execution loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::tokens::{split, TokenizeError};

/// Poll interval while the pause flag is set.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Grace window between SIGTERM and SIGKILL on timeout.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Per-stream line callback. Fires in arrival order for its stream;
/// cross-stream order is unspecified.
pub type LineSink = Box<dyn FnMut(&str) + Send + 'static>;

/// Errors from launching a process.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid command line: {0}")]
    Tokenize(#[from] TokenizeError),
    /// Binary missing or permission denied.
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// How a supervised process ended.
///
/// Callers must discriminate: a timeout and a user stop are not exit
/// codes, and a non-zero exit still carries consumable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Process exited on its own; carries the exit code.
    Exited(i32),
    /// Timeout budget exceeded; process was terminated.
    TimedOut,
    /// Stop flag was raised; process was terminated.
    Stopped,
}

/// Result of a supervised run.
#[derive(Debug)]
pub struct RunOutput {
    pub outcome: RunOutcome,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl RunOutput {
    /// Reported return code; −1 for timeout, stop, or signal death.
    pub fn return_code(&self) -> i32 {
        match self.outcome {
            RunOutcome::Exited(code) => code,
            RunOutcome::TimedOut | RunOutcome::Stopped => -1,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Exited(0))
    }
}

/// A request to run one external command.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub command: String,
    pub timeout: Duration,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Tag in the active-process table; defaults to argv\[0\].
    pub tag: Option<String>,
}

impl RunRequest {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
            cwd: None,
            env: Vec::new(),
            tag: None,
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

#[derive(Default)]
struct Shared {
    paused: AtomicBool,
    stopped: AtomicBool,
    /// tag → pid for every tracked child.
    active: Mutex<HashMap<String, u32>>,
}

/// Supervises the external processes of one scan.
///
/// Pause suspends output consumption in ≤100 ms polls while the children
/// keep running (output backlogs in the pipe buffer). Stop terminates
/// every tracked child; stop overrides pause.
#[derive(Clone, Default)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a command to completion, capturing both streams.
    pub async fn run(&self, request: RunRequest) -> Result<RunOutput, RunError> {
        self.run_streaming(request, None, None).await
    }

    /// Run a command, firing per-line callbacks as output arrives.
    pub async fn run_streaming(
        &self,
        request: RunRequest,
        on_stdout: Option<LineSink>,
        on_stderr: Option<LineSink>,
    ) -> Result<RunOutput, RunError> {
        let tokens = split(&request.command)?;
        let program = tokens[0].clone();
        let tag = request.tag.clone().unwrap_or_else(|| program.clone());

        let mut cmd = Command::new(&program);
        cmd.args(&tokens[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        tracing::debug!(%program, command = %request.command, "spawning tool");
        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            command: request.command.clone(),
            source,
        })?;

        let pid = child.id();
        if let Some(pid) = pid {
            self.shared.active.lock().insert(tag.clone(), pid);
        }

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));

        // Two readers per child; pause throttles them, which gives
        // implicit backpressure through the pipe buffer.
        let mut stdout_task = tokio::spawn(read_lines(
            child.stdout.take(),
            Arc::clone(&self.shared),
            Arc::clone(&stdout_buf),
            on_stdout,
        ));
        let mut stderr_task = tokio::spawn(read_lines(
            child.stderr.take(),
            Arc::clone(&self.shared),
            Arc::clone(&stderr_buf),
            on_stderr,
        ));

        let waited = tokio::time::timeout(request.timeout, async {
            let _ = (&mut stdout_task).await;
            let _ = (&mut stderr_task).await;
            child.wait().await
        })
        .await;

        let outcome = match waited {
            Ok(status) => {
                let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
                if self.shared.stopped.load(Ordering::SeqCst) {
                    RunOutcome::Stopped
                } else {
                    RunOutcome::Exited(code)
                }
            }
            Err(_elapsed) => {
                tracing::warn!(%program, timeout_secs = request.timeout.as_secs(), "tool timed out");
                terminate(pid);
                if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
                // Readers hit EOF once the child is gone; a reader held
                // in the pause loop never will, so bound the drain.
                let drained = tokio::time::timeout(Duration::from_secs(1), async {
                    let _ = (&mut stdout_task).await;
                    let _ = (&mut stderr_task).await;
                })
                .await;
                if drained.is_err() {
                    stdout_task.abort();
                    stderr_task.abort();
                }
                RunOutcome::TimedOut
            }
        };

        self.shared.active.lock().remove(&tag);

        let stdout = stdout_buf.lock().join("\n");
        let stderr = stderr_buf.lock().join("\n");

        Ok(RunOutput {
            outcome,
            stdout,
            stderr,
            duration: start.elapsed(),
        })
    }

    /// Convenience wrapper returning stdout only.
    ///
    /// A non-zero exit is logged, not an error — partial output from a
    /// failed tool is still worth parsing.
    pub async fn run_capture(
        &self,
        command: impl Into<String>,
        timeout: Duration,
    ) -> Result<String, RunError> {
        let output = self.run(RunRequest::new(command, timeout)).await?;
        if !output.success() {
            tracing::warn!(
                return_code = output.return_code(),
                stderr = %crate::truncate(&output.stderr, 400),
                "tool exited non-zero"
            );
        }
        Ok(output.stdout)
    }

    /// Suspend output consumption for every tracked child.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
    }

    /// Resume output consumption.
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Terminate every tracked child and refuse further consumption.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        let active = self.shared.active.lock();
        for (tag, pid) in active.iter() {
            tracing::info!(%tag, pid, "terminating tracked process");
            terminate(Some(*pid));
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Tags of currently tracked children.
    pub fn active(&self) -> Vec<String> {
        self.shared.active.lock().keys().cloned().collect()
    }
}

async fn read_lines<R>(
    stream: Option<R>,
    shared: Arc<Shared>,
    buf: Arc<Mutex<Vec<String>>>,
    mut sink: Option<LineSink>,
) where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else { return };
    let mut lines = BufReader::new(stream).lines();
    loop {
        if shared.stopped.load(Ordering::SeqCst) {
            return;
        }
        while shared.paused.load(Ordering::SeqCst) && !shared.stopped.load(Ordering::SeqCst) {
            tokio::time::sleep(PAUSE_POLL).await;
        }
        if shared.stopped.load(Ordering::SeqCst) {
            return;
        }
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(callback) = sink.as_mut() {
                    callback(&line);
                }
                buf.lock().push(line);
            }
            Ok(None) | Err(_) => return,
        }
    }
}

/// Deliver SIGTERM so the child can exit cleanly before any SIGKILL.
#[cfg(unix)]
fn terminate(pid: Option<u32>) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    if let Some(pid) = pid {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate(_pid: Option<u32>) {}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
