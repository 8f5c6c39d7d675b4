//! Captured process output.

use crate::error::{ExecError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Exit code reported when a one-shot process hit its ceiling and was
/// killed before it could report one.
pub const TIMED_OUT_EXIT_CODE: i32 = 124;

/// Exit code reported when the OS gives none (for example a signal kill).
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Append-only line buffer fed by one stdio reader task.
///
/// Readers append while the process runs; the owner freezes the buffer
/// into an immutable `String` only after the completion signal.
#[derive(Debug, Clone, Default)]
pub(crate) struct CaptureBuffer {
    inner: Arc<Mutex<String>>,
}

impl CaptureBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append one received line followed by a line terminator.
    pub(crate) fn push_line(&self, line: &str) {
        let mut buffer = self.inner.lock();
        buffer.push_str(line);
        buffer.push('\n');
    }

    /// Take the captured text. Called once, after the readers are done.
    pub(crate) fn freeze(&self) -> String {
        std::mem::take(&mut *self.inner.lock())
    }
}

/// Outcome of one one-shot execution.
///
/// Produced once by [`ManagedProcess::run_and_capture`](crate::ManagedProcess::run_and_capture)
/// and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    command: String,
    stdout: String,
    stderr: String,
    exit_code: i32,
    timed_out: bool,
    timeout_ms: u64,
}

impl ProcessResult {
    pub(crate) fn completed(
        command: String,
        stdout: String,
        stderr: String,
        exit_code: i32,
    ) -> Self {
        Self {
            command,
            stdout,
            stderr,
            exit_code,
            timed_out: false,
            timeout_ms: 0,
        }
    }

    pub(crate) fn timed_out_after(
        command: String,
        stdout: String,
        stderr: String,
        timeout_ms: u64,
    ) -> Self {
        Self {
            command,
            stdout,
            stderr,
            exit_code: TIMED_OUT_EXIT_CODE,
            timed_out: true,
            timeout_ms,
        }
    }

    /// Captured standard output.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Captured standard error.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Exit code, [`TIMED_OUT_EXIT_CODE`] when the ceiling was hit.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Whether the process was killed at the ceiling.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Whether the process ran to completion with exit code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// The command line that produced this result.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Turn a timed-out result into [`ExecError::Timeout`].
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if the ceiling was hit.
    pub fn ensure_completed(&self) -> Result<&Self> {
        if self.timed_out {
            return Err(ExecError::timeout(&self.command, self.timeout_ms));
        }
        Ok(self)
    }

    /// Split into `(stdout, stderr, exit_code)`.
    #[must_use]
    pub fn into_parts(self) -> (String, String, i32) {
        (self.stdout, self.stderr, self.exit_code)
    }
}
