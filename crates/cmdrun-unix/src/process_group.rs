use cmdrun_core::ProcessId;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Pid as NixPid};
use tracing::{debug, warn};

/// Result of signalling a process group
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Signal was delivered to the group
    Success,
    /// Process or group was not found (already exited)
    ProcessNotFound,
    /// Permission denied (insufficient privileges)
    AccessDenied,
    /// Other error occurred
    Failed(String),
}

/// Look up the process group of `pid`
pub fn process_group_of(pid: ProcessId) -> Result<ProcessId, Errno> {
    let pgid = unistd::getpgid(Some(NixPid::from_raw(pid as i32)))?;
    Ok(pgid.as_raw() as ProcessId)
}

/// Send `sig` to the whole process group that `pid` belongs to
pub fn signal_process_group(pid: ProcessId, sig: Signal) -> TerminationResult {
    match process_group_of(pid) {
        Ok(pgid) => signal_group(pgid, sig),
        Err(Errno::ESRCH) => {
            debug!("Process {} not found while looking up its group", pid);
            TerminationResult::ProcessNotFound
        }
        Err(e) => {
            debug!("Failed to look up process group of {}: {}", pid, e);
            TerminationResult::Failed(format!("getpgid failed: {e}"))
        }
    }
}

/// Send `sig` to process group `pgid` directly
///
/// For a child spawned with `process_group(0)` the group id is its pid, and
/// that id stays reserved while any member is alive, so this reaches
/// members that outlived a reaped leader.
pub fn signal_group(pgid: ProcessId, sig: Signal) -> TerminationResult {
    match signal::killpg(NixPid::from_raw(pgid as i32), sig) {
        Ok(()) => {
            debug!("Sent {:?} to process group {}", sig, pgid);
            TerminationResult::Success
        }
        Err(Errno::ESRCH) => {
            debug!("Process group {} not found (already terminated)", pgid);
            TerminationResult::ProcessNotFound
        }
        Err(Errno::EPERM) => {
            warn!("Permission denied to signal process group {}", pgid);
            TerminationResult::AccessDenied
        }
        Err(e) => {
            warn!("Failed to send {:?} to process group {}: {}", sig, pgid, e);
            TerminationResult::Failed(format!("{sig:?} to process group failed: {e}"))
        }
    }
}
