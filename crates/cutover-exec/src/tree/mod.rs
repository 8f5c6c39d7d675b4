//! Process-tree capability.
//!
//! A spawned tool may start helper children of its own (port-forward
//! clients do), and those must die with it. Each platform provides a
//! [`ProcessTree`] implementation; [`platform_tree`] returns the one for
//! the current target.

use crate::error::Result;
use std::fmt;
use std::sync::Arc;
use tokio::process::Command;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::UnixProcessTree;
#[cfg(windows)]
pub use windows::WindowsProcessTree;

/// Platform operations on a process and everything it spawns.
///
/// Contract for [`kill_tree`](ProcessTree::kill_tree): it kills the root and
/// all descendants, succeeds when the processes are already gone, and may be
/// called any number of times.
pub trait ProcessTree: Send + Sync + fmt::Debug {
    /// Configure a command before spawning so its descendants can later be
    /// found and killed together.
    fn prepare_spawn(&self, command: &mut Command);

    /// Whether a process with this PID currently exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// Forcibly kill the process rooted at `pid` and all its descendants.
    ///
    /// # Errors
    ///
    /// Returns an error only when the OS refuses the kill for a reason
    /// other than the processes being gone.
    fn kill_tree(&self, pid: u32) -> Result<()>;

    /// Kill whatever the root at `pid` left behind after it was reaped.
    ///
    /// Only mechanisms that cannot hit an unrelated process once `pid` is
    /// free for reuse belong here; the default does nothing.
    fn kill_orphans(&self, _pid: u32) {}

    /// Release any platform resource tied to the tree. Called once on the
    /// disposal path.
    fn release(&self, _pid: u32) {}
}

/// The process-tree implementation for the current platform.
#[must_use]
pub fn platform_tree() -> Arc<dyn ProcessTree> {
    #[cfg(unix)]
    {
        Arc::new(UnixProcessTree::new())
    }

    #[cfg(windows)]
    {
        Arc::new(WindowsProcessTree::new())
    }

    #[cfg(not(any(unix, windows)))]
    {
        compile_error!("Unsupported platform");
    }
}
