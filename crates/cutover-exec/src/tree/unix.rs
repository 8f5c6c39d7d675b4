//! Unix process trees: one process group per spawned tool.
//!
//! The child is made leader of a fresh process group at spawn, so a single
//! `killpg` reaches every helper that stayed in the group. On Linux,
//! descendants that moved to another group or session are found through
//! `/proc` and killed individually first.

use super::ProcessTree;
use crate::error::{ExecError, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
#[cfg(target_os = "linux")]
use std::collections::HashSet;
use tokio::process::Command;
use tracing::debug;

/// Process-group based [`ProcessTree`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixProcessTree;

impl UnixProcessTree {
    /// Create the Unix implementation.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn to_pid(pid: u32) -> Pid {
    Pid::from_raw(pid as i32)
}

fn ignore_missing(result: nix::Result<()>) -> Result<()> {
    match result {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(ExecError::Io(errno.into())),
    }
}

impl ProcessTree for UnixProcessTree {
    fn prepare_spawn(&self, command: &mut Command) {
        command.process_group(0);
    }

    fn is_alive(&self, pid: u32) -> bool {
        matches!(kill(to_pid(pid), None), Ok(()) | Err(Errno::EPERM)) && !is_zombie(pid)
    }

    fn kill_tree(&self, pid: u32) -> Result<()> {
        let descendants = descendant_pids(pid);
        for child in descendants.iter().rev() {
            let _ = kill(to_pid(*child), Signal::SIGKILL);
        }
        debug!(pid, descendants = descendants.len(), "killing process group");

        ignore_missing(killpg(to_pid(pid), Signal::SIGKILL))?;
        ignore_missing(kill(to_pid(pid), Signal::SIGKILL))
    }

    fn kill_orphans(&self, pid: u32) {
        // A group id stays reserved while any member is alive.
        if let Err(errno) = killpg(to_pid(pid), Signal::SIGKILL) {
            if errno != Errno::ESRCH {
                debug!(pid, %errno, "could not signal leftover process group");
            }
        }
    }
}

/// All descendants of `root`, parents before children.
#[cfg(target_os = "linux")]
fn descendant_pids(root: u32) -> Vec<u32> {
    let table = process_table();
    let mut found = Vec::new();
    let mut pending = vec![root];
    let mut seen = HashSet::new();

    while let Some(parent) = pending.pop() {
        if !seen.insert(parent) {
            continue;
        }
        for &(pid, ppid) in &table {
            if ppid == parent {
                found.push(pid);
                pending.push(pid);
            }
        }
    }
    found
}

#[cfg(not(target_os = "linux"))]
fn descendant_pids(_root: u32) -> Vec<u32> {
    Vec::new()
}

/// `(pid, ppid)` for every process visible in `/proc`.
#[cfg(target_os = "linux")]
fn process_table() -> Vec<(u32, u32)> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };

    entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .filter_map(|pid| {
            let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
            parse_ppid(&stat).map(|ppid| (pid, ppid))
        })
        .collect()
}

/// A killed process waiting to be reaped still answers `kill(pid, 0)`.
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| parse_state(&stat))
        .is_some_and(|state| matches!(state, 'Z' | 'X'))
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}

/// Process state letter from a `/proc/<pid>/stat` line.
#[cfg(any(target_os = "linux", test))]
fn parse_state(stat: &str) -> Option<char> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().next()?.chars().next()
}

/// Parent PID from a `/proc/<pid>/stat` line: `pid (comm) state ppid ...`.
///
/// `comm` may itself contain spaces and parentheses, so parsing starts
/// after the last `)`.
#[cfg(any(target_os = "linux", test))]
fn parse_ppid(stat: &str) -> Option<u32> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().nth(1)?.parse().ok()
}
