use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::ToolError;

/// Timeout applied when a caller does not ask for one.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Captured result of a command that exited on its own.
///
/// Empty streams are left out rather than reported as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    fn from_parts(stdout: Vec<u8>, stderr: Vec<u8>, status: ExitStatus) -> Self {
        Self {
            stdout: non_empty(&stdout),
            stderr: non_empty(&stderr),
            exit_code: status.code(),
        }
    }
}

fn non_empty(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Build the host shell invocation for a full command line.
#[cfg(unix)]
pub fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    // Own process group, so a timeout can take down everything the shell started.
    cmd.process_group(0);
    cmd
}

#[cfg(windows)]
pub fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Run a command to completion or until `timeout` elapses.
///
/// stdout and stderr are drained concurrently with the wait so a chatty child
/// can never block on a full pipe. On timeout the process (and on Unix its
/// whole process group) is killed and reaped before the error is returned.
pub async fn run_command(mut cmd: Command, timeout: Duration) -> Result<CommandOutput, ToolError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| ToolError::CommandSpawnFailure(e.to_string()))?;
    // Taken now: `id()` is gone once the shell has been reaped, but its
    // background children may still hold the pipes open.
    let pgid = child.id();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let collected = tokio::time::timeout(timeout, async {
        let (status, stdout, stderr) =
            tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
        Ok::<_, io::Error>((status?, stdout?, stderr?))
    })
    .await;

    match collected {
        Ok(Ok((status, stdout, stderr))) => {
            debug!(code = ?status.code(), "command exited");
            Ok(CommandOutput::from_parts(stdout, stderr, status))
        }
        Ok(Err(e)) => {
            terminate(&mut child, pgid).await;
            Err(ToolError::CommandFailed(e.to_string()))
        }
        Err(_) => {
            let timeout_ms = timeout.as_millis() as u64;
            warn!(timeout_ms, pid = ?pgid, "command exceeded its deadline, killing");
            terminate(&mut child, pgid).await;
            Err(ToolError::CommandTimeout { timeout_ms })
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kill the child's process group, then the child itself, and wait for it so
/// no zombie is left behind.
async fn terminate(child: &mut Child, pgid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = pgid {
        kill_process_group(pgid).await;
    }
    #[cfg(not(unix))]
    let _ = pgid;
    if let Err(e) = child.kill().await {
        debug!(error = %e, "child already gone");
    }
}

/// Kill a process group by its leader's ID
#[cfg(unix)]
async fn kill_process_group(pgid: u32) {
    let _ = Command::new("kill")
        .args(["-9", "--", &format!("-{pgid}")])
        .output()
        .await;
}
