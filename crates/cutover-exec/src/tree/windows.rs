//! Windows process trees.
//!
//! Children are started in their own console process group without a
//! window; the tree is killed with `taskkill /T /F`, which walks the
//! parent/child relationships the OS records.

use super::ProcessTree;
use crate::error::{ExecError, Result};
use std::process::{Command as StdCommand, Stdio};
use tokio::process::Command;
use tracing::debug;

const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// `taskkill` exit code when no matching process exists.
const TASKKILL_NOT_FOUND: i32 = 128;

/// `taskkill` based [`ProcessTree`].
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsProcessTree;

impl WindowsProcessTree {
    /// Create the Windows implementation.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessTree for WindowsProcessTree {
    fn prepare_spawn(&self, command: &mut Command) {
        command.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
    }

    fn is_alive(&self, pid: u32) -> bool {
        let filter = format!("PID eq {pid}");
        StdCommand::new("tasklist")
            .args(["/FI", &filter, "/NH", "/FO", "CSV"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map(|output| String::from_utf8_lossy(&output.stdout).contains(&format!("\"{pid}\"")))
            .unwrap_or(false)
    }

    fn kill_tree(&self, pid: u32) -> Result<()> {
        debug!(pid, "killing process tree");
        let status = StdCommand::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        match status.code() {
            Some(0 | TASKKILL_NOT_FOUND) => Ok(()),
            Some(code) if !self.is_alive(pid) => {
                debug!(pid, code, "taskkill reported failure but process is gone");
                Ok(())
            }
            code => Err(ExecError::Io(std::io::Error::other(format!(
                "taskkill exited with {code:?} for pid {pid}"
            )))),
        }
    }
}
