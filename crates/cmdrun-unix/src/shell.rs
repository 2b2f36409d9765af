use cmdrun_core::{Result, RunnerError};
use std::io::Read;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Run `sh -c <command_line>` to completion and return stdout and stderr
/// interleaved in the order the child wrote them.
///
/// Both streams share one pipe. There is no handle, no cancellation and no
/// state: a non-zero exit is reported as [`RunnerError::ExitFailure`]
/// carrying the combined text.
pub async fn exec_command(command_line: &str) -> Result<String> {
    let rendered = format!("sh -c {command_line}");
    debug!(command = %rendered, "executing one-shot command");

    let (mut reader, writer) = std::io::pipe()?;

    // The command owns the write ends and must be dropped after spawn so
    // the reader sees EOF once the child side closes.
    let mut child = {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::from(writer.try_clone()?))
            .stderr(Stdio::from(writer));
        command.spawn().map_err(|source| RunnerError::Spawn {
            command: rendered.clone(),
            source,
        })?
    };

    let combined = tokio::task::spawn_blocking(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map(|_| buf)
    });

    let (status, combined) = tokio::join!(child.wait(), combined);
    let status = status?;
    let combined = match combined {
        Ok(read) => read?,
        Err(e) => {
            warn!("Output capture task failed: {}", e);
            Vec::new()
        }
    };
    let output = String::from_utf8_lossy(&combined).into_owned();

    if !status.success() {
        return Err(RunnerError::ExitFailure {
            command: rendered,
            status,
            stderr: output,
        });
    }

    Ok(output)
}
