// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with a soft-signal-then-hard-kill timeout
//! escalation.

use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, Command};

/// Where the child's stdin comes from.
pub enum StdinSource<'a> {
    /// No stdin (closed immediately).
    None,
    /// Write this payload to a pipe, then close it.
    Payload(&'a str),
    /// Redirect a file directly to stdin ("write prompt to a
    /// temporary file; execute the configured command with that path
    /// redirected to standard input").
    File(&'a Path),
}

/// Grace period between the soft terminate signal and the uninterruptible
/// hard kill ("At D + 5s, send an uninterruptible kill").
pub const HARD_KILL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SubprocessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

/// Put the child in its own process group so a timeout kill can target the
/// whole group, not just the immediate child ("runs the child
/// detached and signals the negative-pid group"). No-op on platforms
/// without process groups.
pub fn detach_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

/// Send the soft terminate signal to a child (and its process group where
/// supported).
fn soft_terminate(child: &Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            // Negative pid targets the whole process group.
            let _ = kill(Pid::from_raw(-(pid as i32)), Signal::SIGTERM);
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child;
    }
}

/// Run a command, streaming stdout/stderr observers while enforcing a
/// soft-then-hard-kill timeout. `stdin_payload`, if present, is written to
/// the child's stdin and the pipe is then closed so the child sees EOF.
///
/// On timeout: sends a terminate signal immediately, waits `HARD_KILL_GRACE`
/// more, then force-kills. Whatever was captured before the kill is
/// preserved in the result ("Terminated by timeout → {error:
/// timeout, output: whatever was captured}").
pub async fn run_with_escalating_kill(
    mut cmd: Command,
    soft_deadline: Duration,
    stdin: StdinSource<'_>,
) -> std::io::Result<SubprocessOutput> {
    use std::process::Stdio;

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    match &stdin {
        StdinSource::None => {
            cmd.stdin(Stdio::null());
        }
        StdinSource::Payload(_) => {
            cmd.stdin(Stdio::piped());
        }
        StdinSource::File(path) => {
            let file = std::fs::File::open(path)?;
            cmd.stdin(Stdio::from(file));
        }
    }
    detach_process_group(&mut cmd);

    let mut child = cmd.spawn()?;

    if let StdinSource::Payload(payload) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            let _ = pipe.write_all(payload.as_bytes()).await;
            let _ = pipe.shutdown().await;
        }
    }

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let stdout_task = tokio::spawn(async move { read_to_string(&mut stdout_pipe).await });
    let stderr_task = tokio::spawn(async move { read_to_string(&mut stderr_pipe).await });

    match tokio::time::timeout(soft_deadline, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok(SubprocessOutput {
                stdout,
                stderr,
                exit_code: status.code(),
                timed_out: false,
            })
        }
        Ok(Err(e)) => Err(e),
        Err(_elapsed) => {
            tracing::warn!("provider call exceeded soft deadline, sending terminate signal");
            soft_terminate(&child);

            let hard_kill = tokio::time::timeout(HARD_KILL_GRACE, child.wait()).await;
            if hard_kill.is_err() {
                tracing::warn!("provider call ignored terminate signal, sending hard kill");
                let _ = child.start_kill();
                let _ = child.wait().await;
            }

            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok(SubprocessOutput {
                stdout,
                stderr,
                exit_code: None,
                timed_out: true,
            })
        }
    }
}

async fn read_to_string<R: AsyncRead + Unpin>(pipe: &mut Option<R>) -> String {
    use tokio::io::AsyncReadExt;
    let Some(pipe) = pipe else {
        return String::new();
    };
    let mut buf = String::new();
    let _ = pipe.read_to_string(&mut buf).await;
    buf
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
