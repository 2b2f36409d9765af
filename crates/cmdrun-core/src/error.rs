use std::process::ExitStatus;
use thiserror::Error;

/// Error types for managed process operations
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to spawn process '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process '{command}' exited unsuccessfully ({status})")]
    ExitFailure {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Process '{command}' was cancelled")]
    Canceled { command: String },

    #[error("This command does not have a cancel function")]
    NotCancellable,

    #[error("Process has not been started")]
    NotStarted,

    #[error("Process has already been started")]
    AlreadyStarted,

    #[error("Process has already been waited on")]
    AlreadyWaited,

    #[error("Invalid runner options: {0}")]
    InvalidOptions(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Check if this error points at a misuse of the handle rather than at the child process
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            RunnerError::NotCancellable
                | RunnerError::NotStarted
                | RunnerError::AlreadyStarted
                | RunnerError::AlreadyWaited
                | RunnerError::InvalidOptions(_)
        )
    }

    /// Check if the child process ran and then failed or was cancelled
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            RunnerError::ExitFailure { .. } | RunnerError::Canceled { .. }
        )
    }

    /// Captured stderr attached to an exit failure
    pub fn stderr(&self) -> Option<&str> {
        match self {
            RunnerError::ExitFailure { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categorization() {
        assert!(RunnerError::NotCancellable.is_usage_error());
        assert!(RunnerError::AlreadyStarted.is_usage_error());
        assert!(RunnerError::NotStarted.is_usage_error());
        assert!(RunnerError::InvalidOptions("bad".to_string()).is_usage_error());

        let canceled = RunnerError::Canceled {
            command: "sleep 10".to_string(),
        };
        assert!(canceled.is_execution_failure());
        assert!(!canceled.is_usage_error());

        let spawn = RunnerError::Spawn {
            command: "missing".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!spawn.is_usage_error());
        assert!(!spawn.is_execution_failure());
    }

    #[test]
    fn test_error_display() {
        let error = RunnerError::NotCancellable;
        assert_eq!(
            error.to_string(),
            "This command does not have a cancel function"
        );

        let error = RunnerError::Spawn {
            command: "nope".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let display = format!("{error}");
        assert!(display.contains("Failed to spawn process 'nope'"));
    }

    #[test]
    fn test_io_error_is_neither_usage_nor_execution_failure() {
        let error: RunnerError = std::io::Error::from(std::io::ErrorKind::BrokenPipe).into();
        assert!(matches!(error, RunnerError::Io(_)));
        assert!(!error.is_usage_error());
        assert!(!error.is_execution_failure());
        assert!(error.to_string().starts_with("IO error:"));
    }

    #[test]
    fn test_stderr_only_on_exit_failure() {
        assert!(RunnerError::NotStarted.stderr().is_none());
        assert!(
            RunnerError::Canceled {
                command: "x".to_string()
            }
            .stderr()
            .is_none()
        );
    }
}
