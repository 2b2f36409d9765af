use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::process::ExitStatus;

/// Unique identifier for a process
pub type ProcessId = u32;

/// Lifecycle of a managed process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Handle constructed, nothing spawned yet
    Created,
    /// Process spawned and not yet reaped
    Running,
    /// Process exited with code zero
    Succeeded,
    /// Process failed to spawn or exited unsuccessfully
    Failed,
    /// Process was stopped through its cancellation capability
    Canceled,
}

impl ProcessState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ProcessState::Succeeded | ProcessState::Failed | ProcessState::Canceled
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Created => "created",
            ProcessState::Running => "running",
            ProcessState::Succeeded => "succeeded",
            ProcessState::Failed => "failed",
            ProcessState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Output captured from a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Receives the rendered command line right before a process is spawned
pub trait CommandLogger: Send + Sync {
    fn info(&self, message: &str);
}

impl<F> CommandLogger for F
where
    F: Fn(&str) + Send + Sync,
{
    fn info(&self, message: &str) {
        self(message)
    }
}

/// Forwards command lines to the `tracing` subscriber at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl CommandLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(command = %message, "executing command");
    }
}

/// Trait representing one managed subprocess invocation
///
/// Implementations serialise `start`, `wait` and `stop` on the same handle.
/// `start`/`wait` are expected to run on one task and `stop` on another.
#[async_trait]
pub trait ManagedProcess: Send + Sync {
    /// Rendered command line of this process
    fn command_line(&self) -> String;

    /// Whether `stop` can be accepted by this handle
    fn is_cancellable(&self) -> bool;

    /// Spawn the process
    async fn start(&self) -> Result<()>;

    /// Wait for the process to exit and publish its output
    async fn wait(&self) -> Result<()>;

    /// Request termination of the process and its process group
    async fn stop(&self) -> Result<()>;

    /// Current lifecycle state
    async fn state(&self) -> ProcessState;

    /// Output published by the last `wait`
    async fn output(&self) -> ProcessOutput;

    /// Spawn the process and wait for it, returning the first error
    async fn start_and_wait(&self) -> Result<()> {
        self.start().await?;
        self.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_state_display() {
        assert_eq!(ProcessState::Created.to_string(), "created");
        assert_eq!(ProcessState::Canceled.to_string(), "canceled");
    }

    #[test]
    fn test_finished_states() {
        assert!(!ProcessState::Created.is_finished());
        assert!(!ProcessState::Running.is_finished());
        assert!(ProcessState::Succeeded.is_finished());
        assert!(ProcessState::Failed.is_finished());
        assert!(ProcessState::Canceled.is_finished());
    }

    #[test]
    fn test_closure_logger() {
        let lines = Mutex::new(Vec::new());
        let logger = |line: &str| lines.lock().unwrap().push(line.to_string());
        logger.info("echo hello");
        assert_eq!(lines.lock().unwrap().as_slice(), ["echo hello".to_string()]);
    }

    #[test]
    fn test_output_lossy() {
        let output = ProcessOutput {
            status: None,
            stdout: b"hello\n".to_vec(),
            stderr: vec![0xff, b'x'],
        };
        assert_eq!(output.stdout_lossy(), "hello\n");
        assert_eq!(output.stderr_lossy(), "\u{fffd}x");
    }

    struct Scripted {
        started: Mutex<bool>,
    }

    #[async_trait]
    impl ManagedProcess for Scripted {
        fn command_line(&self) -> String {
            "scripted".to_string()
        }

        fn is_cancellable(&self) -> bool {
            false
        }

        async fn start(&self) -> Result<()> {
            *self.started.lock().unwrap() = true;
            Ok(())
        }

        async fn wait(&self) -> Result<()> {
            Err(crate::RunnerError::AlreadyWaited)
        }

        async fn stop(&self) -> Result<()> {
            Err(crate::RunnerError::NotCancellable)
        }

        async fn state(&self) -> ProcessState {
            ProcessState::Created
        }

        async fn output(&self) -> ProcessOutput {
            ProcessOutput::default()
        }
    }

    #[tokio::test]
    async fn test_start_and_wait_runs_wait_after_start() {
        let process = Scripted {
            started: Mutex::new(false),
        };
        let result = process.start_and_wait().await;
        assert!(*process.started.lock().unwrap());
        assert!(matches!(result, Err(crate::RunnerError::AlreadyWaited)));
    }
}
