//! Unix implementation of the managed process runner
//!
//! Children are spawned into their own process group so cancellation can
//! signal the whole tree with `killpg`.

#[cfg(unix)]
mod process_group;
#[cfg(unix)]
mod process_runner;
#[cfg(unix)]
mod shell;

#[cfg(unix)]
pub use process_group::{
    TerminationResult, process_group_of, signal_group, signal_process_group,
};
#[cfg(unix)]
pub use process_runner::{Cancellation, ProcessRunner};
#[cfg(unix)]
pub use shell::exec_command;

pub fn platform_name() -> &'static str {
    "Unix"
}
