use crate::process_group::{TerminationResult, signal_group};
use async_trait::async_trait;
use cmdrun_core::{
    CommandMeta, ManagedProcess, ProcessId, ProcessOutput, ProcessState, Result, RunnerError,
    RunnerOptions,
};
use nix::sys::signal::Signal;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Whether a runner can be stopped once started
#[derive(Debug, Clone)]
pub enum Cancellation {
    Cancellable(CancellationToken),
    NonCancellable,
}

struct RunningChild {
    child: Child,
    stdout: JoinHandle<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
}

enum Phase {
    Created,
    Running(RunningChild),
    /// Child claimed by a `wait` call that is parked on exit
    Waiting,
    /// Reaped by `wait`
    Finished(ProcessState),
    /// Never spawned: spawn failure or stop before start
    Unspawned(ProcessState),
}

struct RunnerInner {
    phase: Phase,
    pid: Option<ProcessId>,
    canceled: bool,
    output: ProcessOutput,
}

/// A single-use handle around one subprocess invocation
///
/// The child is placed in its own process group so `stop` can reach every
/// descendant that did not move to another group. Output is captured in
/// full and published once `wait` returns.
pub struct ProcessRunner {
    meta: CommandMeta,
    options: RunnerOptions,
    cancellation: Cancellation,
    inner: Mutex<RunnerInner>,
}

impl ProcessRunner {
    /// Cancellable runner for a job described by `meta`
    pub fn from_meta(meta: CommandMeta, options: RunnerOptions) -> Self {
        Self::build(
            meta,
            Cancellation::Cancellable(CancellationToken::new()),
            options,
        )
    }

    /// Cancellable runner for `name` with `args`, without job metadata
    pub fn from_command<S: ToString, I: IntoIterator<Item = S>>(
        name: impl Into<String>,
        args: I,
        options: RunnerOptions,
    ) -> Self {
        Self::from_meta(CommandMeta::command(name, args), options)
    }

    /// Runner for `sh -c <command_line>`. It has no cancel function, so
    /// `stop` always fails with [`RunnerError::NotCancellable`].
    pub fn from_shell(command_line: impl Into<String>, options: RunnerOptions) -> Self {
        let meta = CommandMeta::command("sh", ["-c".to_string(), command_line.into()]);
        Self::build(meta, Cancellation::NonCancellable, options)
    }

    fn build(meta: CommandMeta, cancellation: Cancellation, options: RunnerOptions) -> Self {
        Self {
            meta,
            options,
            cancellation,
            inner: Mutex::new(RunnerInner {
                phase: Phase::Created,
                pid: None,
                canceled: false,
                output: ProcessOutput::default(),
            }),
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.meta.job_id.as_deref()
    }

    pub fn program(&self) -> &str {
        &self.meta.name
    }

    pub fn args(&self) -> &[String] {
        &self.meta.args
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Process id of the spawned child, kept after it exits
    pub async fn pid(&self) -> Option<ProcessId> {
        self.inner.lock().await.pid
    }

    pub async fn is_success(&self) -> bool {
        self.state().await == ProcessState::Succeeded
    }

    /// True once a `stop` request has been accepted
    pub async fn is_canceled(&self) -> bool {
        self.inner.lock().await.canceled
    }

    pub async fn stdout(&self) -> Vec<u8> {
        self.inner.lock().await.output.stdout.clone()
    }

    pub async fn stderr(&self) -> Vec<u8> {
        self.inner.lock().await.output.stderr.clone()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.meta.name);
        command
            .args(&self.meta.args)
            .envs(&self.options.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        if let Some(dir) = &self.options.working_directory {
            command.current_dir(dir);
        }

        command
    }

    fn canceled_error(&self) -> RunnerError {
        RunnerError::Canceled {
            command: self.command_line(),
        }
    }

    async fn reap(&self, mut child: Child) -> std::io::Result<std::process::ExitStatus> {
        let token = match &self.cancellation {
            Cancellation::Cancellable(token) => token,
            Cancellation::NonCancellable => return child.wait().await,
        };

        tokio::select! {
            biased;
            status = child.wait() => status,
            _ = token.cancelled() => {
                debug!(job_id = ?self.meta.job_id, "cancellation requested; killing direct child");
                if let Err(e) = child.start_kill() {
                    debug!(job_id = ?self.meta.job_id, error = %e, "child already exited before kill");
                }
                child.wait().await
            }
        }
    }
}

fn spawn_capture<R>(reader: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            // Whatever was read before the error stays in `buf`.
            if let Err(e) = reader.read_to_end(&mut buf).await {
                warn!("Failed to read process output: {}", e);
            }
        }
        buf
    })
}

async fn join_capture(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    match handle.await {
        Ok(buf) => buf,
        Err(e) => {
            warn!("Output capture task failed: {}", e);
            Vec::new()
        }
    }
}

#[async_trait]
impl ManagedProcess for ProcessRunner {
    fn command_line(&self) -> String {
        self.meta.command_line()
    }

    fn is_cancellable(&self) -> bool {
        matches!(self.cancellation, Cancellation::Cancellable(_))
    }

    async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match &inner.phase {
            Phase::Created => {}
            Phase::Unspawned(ProcessState::Canceled) => return Err(self.canceled_error()),
            _ => return Err(RunnerError::AlreadyStarted),
        }

        let command_line = self.command_line();
        if let Some(logger) = &self.options.logger {
            logger.info(&command_line);
        }

        let mut child = match self.command().spawn() {
            Ok(child) => child,
            Err(source) => {
                warn!(
                    job_id = ?self.meta.job_id,
                    command = %command_line,
                    error = %source,
                    "failed to spawn process"
                );
                inner.phase = Phase::Unspawned(ProcessState::Failed);
                return Err(RunnerError::Spawn {
                    command: command_line,
                    source,
                });
            }
        };

        let pid = child.id();
        info!(job_id = ?self.meta.job_id, pid, command = %command_line, "spawned process");

        let stdout = spawn_capture(child.stdout.take());
        let stderr = spawn_capture(child.stderr.take());
        inner.pid = pid;
        inner.phase = Phase::Running(RunningChild {
            child,
            stdout,
            stderr,
        });

        Ok(())
    }

    async fn wait(&self) -> Result<()> {
        let running = {
            let mut inner = self.inner.lock().await;
            match std::mem::replace(&mut inner.phase, Phase::Waiting) {
                Phase::Running(running) => running,
                other => {
                    let error = match &other {
                        Phase::Created | Phase::Unspawned(_) => RunnerError::NotStarted,
                        _ => RunnerError::AlreadyWaited,
                    };
                    inner.phase = other;
                    return Err(error);
                }
            }
        };

        // The lock is released while parked so a concurrent `stop` can run.
        let RunningChild {
            child,
            stdout,
            stderr,
        } = running;
        let status = self.reap(child).await;
        let stdout = join_capture(stdout).await;
        let stderr = join_capture(stderr).await;

        let mut inner = self.inner.lock().await;
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                warn!(job_id = ?self.meta.job_id, error = %e, "failed to wait for process");
                inner.output = ProcessOutput {
                    status: None,
                    stdout,
                    stderr,
                };
                inner.phase = Phase::Finished(ProcessState::Failed);
                return Err(RunnerError::Io(e));
            }
        };

        let stderr_text = String::from_utf8_lossy(&stderr).into_owned();
        inner.output = ProcessOutput {
            status: Some(status),
            stdout,
            stderr,
        };

        let (state, result) = if status.success() {
            (ProcessState::Succeeded, Ok(()))
        } else if inner.canceled {
            (ProcessState::Canceled, Err(self.canceled_error()))
        } else {
            (
                ProcessState::Failed,
                Err(RunnerError::ExitFailure {
                    command: self.command_line(),
                    status,
                    stderr: stderr_text,
                }),
            )
        };

        debug!(job_id = ?self.meta.job_id, pid = ?inner.pid, %status, %state, "process exited");
        inner.phase = Phase::Finished(state);
        result
    }

    /// Stopping a handle that already finished is a no-op and leaves
    /// `is_canceled` false.
    async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let token = match &self.cancellation {
            Cancellation::Cancellable(token) => token,
            Cancellation::NonCancellable => return Err(RunnerError::NotCancellable),
        };

        match &inner.phase {
            Phase::Finished(_) | Phase::Unspawned(_) => {
                debug!(job_id = ?self.meta.job_id, "process already finished; nothing to stop");
                return Ok(());
            }
            Phase::Created | Phase::Running(_) | Phase::Waiting => {}
        }
        if matches!(inner.phase, Phase::Created) {
            inner.phase = Phase::Unspawned(ProcessState::Canceled);
        }

        inner.canceled = true;

        // Signal the group before the token lets `wait` reap the leader. The
        // group id is the leader's pid, so no lookup is needed once it is gone.
        if let Some(pid) = inner.pid {
            match signal_group(pid, Signal::SIGTERM) {
                TerminationResult::Success => {
                    info!(job_id = ?self.meta.job_id, pid, "sent SIGTERM to process group");
                }
                other => {
                    debug!(job_id = ?self.meta.job_id, pid, result = ?other, "process group signal skipped");
                }
            }
        }
        token.cancel();

        Ok(())
    }

    async fn state(&self) -> ProcessState {
        match &self.inner.lock().await.phase {
            Phase::Created => ProcessState::Created,
            Phase::Running(_) | Phase::Waiting => ProcessState::Running,
            Phase::Finished(state) | Phase::Unspawned(state) => *state,
        }
    }

    async fn output(&self) -> ProcessOutput {
        self.inner.lock().await.output.clone()
    }
}
