//! Child processes with a deadline and bounded captured output.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// What a finished (or killed) child left behind.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes read past the limit and dropped, per stream.
    pub stdout_dropped: usize,
    pub stderr_dropped: usize,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Trimmed stderr with a marker when bytes were dropped.
    pub fn stderr_summary(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stderr).trim().to_string();
        if self.stderr_dropped > 0 {
            text.push_str(&format!(" [{} more bytes]", self.stderr_dropped));
        }
        text
    }
}

/// Run `cmd`, feeding it `stdin` if given, and kill it after `timeout`.
///
/// Both pipes are drained on their own threads so a chatty child cannot block
/// on a full pipe. At most `limit` bytes per stream are kept.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = timeout.as_secs()))]
pub fn run_bounded(
    mut cmd: Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
    limit: usize,
) -> Result<ProcessOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn().context("spawn command")?;
    debug!(pid = child.id(), "child spawned");

    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => Some(thread::spawn(move || {
            // A child that exits without reading its input closes the pipe early.
            if let Err(err) = pipe.write_all(&input) {
                debug!(%err, "stdin closed before all input was written");
            }
        })),
        (Some(_), None) => return Err(anyhow!("stdin was not piped")),
        _ => None,
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_reader = thread::spawn(move || drain(stdout, limit));
    let stderr_reader = thread::spawn(move || drain(stderr, limit));

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!("deadline passed, killing child");
            child.kill().context("kill command")?;
            (child.wait().context("reap killed command")?, true)
        }
    };

    if let Some(handle) = writer
        && handle.join().is_err()
    {
        warn!("stdin writer thread panicked");
    }
    let (stdout, stdout_dropped) = join_reader(stdout_reader).context("collect stdout")?;
    let (stderr, stderr_dropped) = join_reader(stderr_reader).context("collect stderr")?;
    if stdout_dropped > 0 || stderr_dropped > 0 {
        warn!(stdout_dropped, stderr_dropped, "child output exceeded limit");
    }

    debug!(code = ?status.code(), timed_out, "child finished");
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        stdout_dropped,
        stderr_dropped,
        timed_out,
    })
}

fn join_reader(handle: JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

fn drain<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok((kept, dropped));
        }
        let room = limit.saturating_sub(kept.len()).min(n);
        kept.extend_from_slice(&chunk[..room]);
        dropped += n - room;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_both_streams() {
        let out = run_bounded(
            sh("echo out; echo err >&2"),
            None,
            Duration::from_secs(10),
            1024,
        )
        .expect("run");
        assert!(out.success());
        assert_eq!(out.stdout_text(), "out\n");
        assert_eq!(out.stderr_summary(), "err");
    }

    #[test]
    fn feeds_stdin() {
        let out = run_bounded(
            sh("cat"),
            Some(b"hello".to_vec()),
            Duration::from_secs(10),
            1024,
        )
        .expect("run");
        assert_eq!(out.stdout, b"hello");
    }

    #[test]
    fn truncates_past_limit() {
        let out = run_bounded(sh("printf 0123456789"), None, Duration::from_secs(10), 4)
            .expect("run");
        assert_eq!(out.stdout, b"0123");
        assert_eq!(out.stdout_dropped, 6);
    }

    #[test]
    fn kills_on_timeout() {
        let out = run_bounded(sh("sleep 5"), None, Duration::from_millis(100), 1024).expect("run");
        assert!(out.timed_out);
        assert!(!out.success());
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = run_bounded(
            Command::new("definitely-not-a-real-program-xyz"),
            None,
            Duration::from_secs(1),
            16,
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn"));
    }
}
