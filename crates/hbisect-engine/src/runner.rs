//! Trial execution.
//!
//! One trial is one child process run with the rendered environment.
//! The launch sits behind [`TrialRunner`] so the search logic can be
//! exercised against an in-process simulator; the real implementation
//! captures stdout and stderr into a single temp file and enforces the
//! sign-encoded timeout with a watchdog thread. A user interrupt at the
//! terminal reaches a live child through the foreground process group;
//! the driver installs no handler of its own.

use std::io::{Read, Seek, SeekFrom, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use hbisect_error::{BisectError, Result};

/// Captured result of one trial.
#[derive(Debug, Clone, Default)]
pub struct TrialOutput {
    /// Whether the child exited successfully (after timeout-sign
    /// adjustment).
    pub exit_ok: bool,
    /// Whether the watchdog fired.
    pub timed_out: bool,
    /// Combined stdout+stderr bytes.
    pub output: Vec<u8>,
    /// Human-readable failure description, empty on success.
    pub status: String,
}

/// Something that can run one trial with extra environment variables.
pub trait TrialRunner {
    /// Run the test command once. An `Err` here means the trial could
    /// not be executed at all and is never classified as a failing
    /// outcome.
    fn run_trial(&mut self, env: &[(String, String)]) -> Result<TrialOutput>;

    /// The command line, for narrative output and the final report.
    fn command_line(&self) -> String;

    /// Just the program name.
    fn program(&self) -> &str;
}

/// The test command and its timeout policy.
///
/// A positive timeout kills the run after that many seconds and counts
/// it as a failure; a negative timeout uses the magnitude but counts a
/// timeout as a pass; zero runs to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: i64,
}

/// Process-backed [`TrialRunner`].
pub struct ProcessRunner {
    spec: CommandSpec,
}

/// Grace polls between the interrupt and the kill, 250ms apart.
const KILL_GRACE_POLLS: u32 = 100;
const KILL_GRACE_STEP: Duration = Duration::from_millis(250);

impl ProcessRunner {
    #[must_use]
    pub fn new(spec: CommandSpec) -> ProcessRunner {
        ProcessRunner { spec }
    }

    /// Wait for the child with a watchdog: on expiry deliver an
    /// interrupt, give the child a grace period to be reaped, then kill.
    fn wait_with_watchdog(&self, child: &mut Child) -> Result<(ExitStatus, bool)> {
        let secs = self.spec.timeout_secs.unsigned_abs();
        let pid = child.id();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_in_watchdog = Arc::clone(&fired);
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let watchdog = thread::spawn(move || {
            match done_rx.recv_timeout(Duration::from_secs(secs)) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => {}
            }
            fired_in_watchdog.store(true, Ordering::SeqCst);
            debug!(pid, secs, "trial timed out, interrupting");
            send_interrupt(pid);
            for _ in 0..KILL_GRACE_POLLS {
                match done_rx.recv_timeout(KILL_GRACE_STEP) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }
            debug!(pid, "trial ignored interrupt, killing");
            send_kill(pid);
        });

        let status = child.wait();
        let _ = done_tx.send(());
        let _ = watchdog.join();
        Ok((status?, fired.load(Ordering::SeqCst)))
    }
}

impl TrialRunner for ProcessRunner {
    fn run_trial(&mut self, env: &[(String, String)]) -> Result<TrialOutput> {
        let capture = tempfile::tempfile()?;

        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(capture.try_clone()?))
            .stderr(Stdio::from(capture.try_clone()?));
        for (k, v) in env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|source| BisectError::Spawn {
            command: self.spec.program.clone(),
            source,
        })?;

        let (status, timed_out) = if self.spec.timeout_secs == 0 {
            (child.wait()?, false)
        } else {
            self.wait_with_watchdog(&mut child)?
        };

        let mut capture = capture;
        capture.seek(SeekFrom::Start(0))?;
        let mut output = Vec::new();
        capture.read_to_end(&mut output)?;

        let mut exit_ok = status.success();
        let mut describe = if exit_ok {
            String::new()
        } else {
            status.to_string()
        };
        if timed_out {
            let pass = self.spec.timeout_secs < 0;
            let secs = self.spec.timeout_secs.unsigned_abs();
            print!(
                "Timeout after {} seconds ({}): ",
                secs,
                if pass { "pass" } else { "fail" }
            );
            let _ = std::io::stdout().flush();
            if pass {
                exit_ok = true;
                describe.clear();
            } else if describe.is_empty() {
                describe = "timed out".to_owned();
            }
        }

        Ok(TrialOutput {
            exit_ok,
            timed_out,
            output,
            status: describe,
        })
    }

    fn command_line(&self) -> String {
        let mut line = self.spec.program.clone();
        for a in &self.spec.args {
            line.push(' ');
            line.push_str(a);
        }
        line
    }

    fn program(&self) -> &str {
        &self.spec.program
    }
}

#[cfg(unix)]
fn send_interrupt(pid: u32) {
    // The watchdog only has the pid; Child lives on the waiting thread.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGINT);
    }
}

#[cfg(not(unix))]
fn send_interrupt(_pid: u32) {}

#[cfg(unix)]
fn send_kill(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn send_kill(_pid: u32) {}
