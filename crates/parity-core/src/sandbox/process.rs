//! Timeout-bounded shell execution with partial output capture.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::{SandboxError, SandboxResult};
use crate::domain::ExecutionResult;

/// How long to keep draining pipes after the process exits or is killed.
///
/// Background grandchildren can hold a pipe open indefinitely.
const PIPE_GRACE: Duration = Duration::from_millis(500);

type Sink = Arc<Mutex<Vec<u8>>>;

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

async fn drain<R: AsyncRead + Unpin>(mut pipe: R, sink: Sink) {
    let mut buf = [0u8; 8192];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Ok(mut bytes) = sink.lock() {
                    bytes.extend_from_slice(&buf[..n]);
                }
            }
        }
    }
}

async fn settle(handles: Vec<JoinHandle<()>>) {
    for mut handle in handles {
        if tokio::time::timeout(PIPE_GRACE, &mut handle).await.is_err() {
            handle.abort();
        }
    }
}

fn captured(sink: &Sink) -> String {
    sink.lock()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn combine(stdout: &Sink, stderr: &Sink) -> String {
    let mut output = captured(stdout);
    let err = captured(stderr);
    if !err.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&err);
    }
    output
}

/// The spawned shell's process group. Every process the command started is
/// killed when this is dropped or [`kill`](Self::kill)ed.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Run `command` through the platform shell in `cwd` with a hard timeout.
///
/// On unix the shell leads its own process group. When the command
/// finishes, times out or is cancelled, the whole group is killed, so no
/// background or grandchild process outlives the call. On timeout the
/// result has `timed_out == true` and whatever output was captured so far.
/// A wait interrupted by a signal is reported as
/// [`SandboxError::Cancelled`]. Dropping the returned future kills the
/// group too.
pub async fn run_shell(
    command: &str,
    cwd: &Path,
    timeout: Duration,
    env: &[(String, String)],
) -> SandboxResult<ExecutionResult> {
    let start = Instant::now();

    let mut cmd = shell_command(command);
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    for (key, value) in env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|source| SandboxError::Spawn {
        command: command.to_string(),
        source,
    })?;
    let mut group = ProcessGroup { pgid: child.id() };
    debug!(command = %command, cwd = %cwd.display(), "spawned");

    let stdout: Sink = Arc::default();
    let stderr: Sink = Arc::default();
    let mut readers = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        readers.push(tokio::spawn(drain(pipe, stdout.clone())));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(tokio::spawn(drain(pipe, stderr.clone())));
    }

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            group.kill();
            settle(readers).await;
            Ok(ExecutionResult::completed(
                combine(&stdout, &stderr),
                status.code().unwrap_or(-1),
                start.elapsed(),
            ))
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::Interrupted => {
            group.kill();
            let _ = child.start_kill();
            Err(SandboxError::Cancelled)
        }
        Ok(Err(e)) => {
            warn!(command = %command, error = %e, "wait failed; returning partial output");
            group.kill();
            let _ = child.start_kill();
            settle(readers).await;
            let mut output = combine(&stdout, &stderr);
            output.push_str(&format!("\n[wait failed: {e}]"));
            Ok(ExecutionResult::completed(output, -1, start.elapsed()))
        }
        Err(_elapsed) => {
            warn!(command = %command, timeout_ms = timeout.as_millis() as u64, "command timed out; killing");
            group.kill();
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill timed-out command");
            }
            settle(readers).await;
            Ok(ExecutionResult::timed_out(
                combine(&stdout, &stderr),
                start.elapsed(),
            ))
        }
    }
}
