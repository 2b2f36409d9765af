//! cmdrun - run external processes with captured output and process-group cancellation
//!
//! ```rust,no_run
//! use cmdrun::{ManagedProcess, PlatformRunner, RunnerOptions, TracingLogger};
//!
//! # async fn example() -> Result<(), cmdrun::RunnerError> {
//! let options = RunnerOptions::builder().logger(TracingLogger).build()?;
//! let runner = PlatformRunner::from_command("echo", ["hello"], options);
//! runner.start_and_wait().await?;
//! assert_eq!(runner.stdout().await, b"hello\n");
//! # Ok(())
//! # }
//! ```

pub mod logging;

pub use cmdrun_core::*;

#[cfg(unix)]
pub use cmdrun_unix::{
    Cancellation, TerminationResult, exec_command, process_group_of, signal_group,
    signal_process_group,
};

/// Process runner for the current platform
#[cfg(unix)]
pub type PlatformRunner = cmdrun_unix::ProcessRunner;

pub fn platform_name() -> &'static str {
    #[cfg(unix)]
    return cmdrun_unix::platform_name();

    #[cfg(not(unix))]
    return "unsupported";
}
