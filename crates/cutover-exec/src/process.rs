//! Managed child processes.
//!
//! A [`ManagedProcess`] owns at most one OS process at a time and two ways
//! of running it:
//!
//! - **one-shot**: [`run_and_capture`](ManagedProcess::run_and_capture)
//!   drains stdout and stderr concurrently, waits for exit or the hard
//!   ceiling, and always returns a [`ProcessResult`];
//! - **long-lived**: [`start`](ManagedProcess::start),
//!   [`ensure_running`](ManagedProcess::ensure_running) and
//!   [`stop`](ManagedProcess::stop) for tunnels that run until told
//!   otherwise.
//!
//! Whatever path is taken, the process tree is killed before the OS handle
//! is released: explicit `stop`, ceiling expiry, a dropped future, or the
//! `ManagedProcess` itself being dropped.

use crate::config::ExecConfig;
use crate::error::{ExecError, Result};
use crate::output::{CaptureBuffer, ProcessResult, UNKNOWN_EXIT_CODE};
use crate::spec::ProcessSpec;
use crate::tree::{platform_tree, ProcessTree};
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lifecycle of a [`ManagedProcess`].
///
/// Disposal is not a state: it is the value being dropped or
/// [`close`](ManagedProcess::close)d.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Nothing has been spawned yet.
    Unstarted,
    /// A process is running.
    Running,
    /// The process exited on its own with this code.
    Exited(i32),
    /// The process tree was killed (explicit stop or ceiling expiry).
    Terminated,
}

/// Owner of one external process.
pub struct ManagedProcess {
    spec: ProcessSpec,
    config: ExecConfig,
    tree: Arc<dyn ProcessTree>,
    child: Option<Child>,
    pid: Option<u32>,
    state: ProcessState,
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("command", &self.spec.command_line())
            .field("pid", &self.pid)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Kills a tree on drop unless disarmed; covers a one-shot future being
/// dropped mid-run.
struct TreeGuard<'a> {
    tree: &'a dyn ProcessTree,
    pid: Option<u32>,
}

impl TreeGuard<'_> {
    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for TreeGuard<'_> {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            info!(pid, "one-shot run abandoned, killing process tree");
            let _ = self.tree.kill_tree(pid);
            self.tree.release(pid);
        }
    }
}

impl ManagedProcess {
    /// Create an unstarted process using the current platform's tree
    /// implementation.
    #[must_use]
    pub fn new(spec: ProcessSpec, config: ExecConfig) -> Self {
        Self::with_tree(spec, config, platform_tree())
    }

    /// Create an unstarted process with an explicit tree implementation.
    #[must_use]
    pub fn with_tree(spec: ProcessSpec, config: ExecConfig, tree: Arc<dyn ProcessTree>) -> Self {
        Self {
            spec,
            config,
            tree,
            child: None,
            pid: None,
            state: ProcessState::Unstarted,
        }
    }

    /// Run `spec` once and capture its output.
    ///
    /// # Errors
    ///
    /// See [`run_and_capture`](Self::run_and_capture).
    pub async fn run(spec: ProcessSpec, config: ExecConfig) -> Result<ProcessResult> {
        Self::new(spec, config).run_and_capture().await
    }

    /// The process specification.
    #[must_use]
    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// Timing configuration.
    #[must_use]
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// PID of the running process, if any.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn command(&self, capture: bool) -> Command {
        let mut command = Command::new(self.spec.program());
        command
            .args(self.spec.arguments())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        if let Some(dir) = self.spec.working_dir() {
            command.current_dir(dir);
        }
        self.tree.prepare_spawn(&mut command);
        command
    }

    fn spawn(&self, capture: bool) -> Result<Child> {
        self.spec.validate()?;
        self.command(capture)
            .spawn()
            .map_err(|e| ExecError::start_failure(self.spec.program(), e))
    }

    fn release(&mut self, state: ProcessState) {
        if let Some(pid) = self.pid.take() {
            self.tree.release(pid);
        }
        self.state = state;
    }

    /// Run the process to completion, capturing stdout and stderr.
    ///
    /// Both streams are drained concurrently, line by line. The call
    /// returns when the process exits or when
    /// [`ExecConfig::command_timeout`] elapses; in the latter case the
    /// tree is killed and the result carries whatever was captured plus
    /// [`TIMED_OUT_EXIT_CODE`](crate::TIMED_OUT_EXIT_CODE).
    ///
    /// A non-zero exit is a normal result, not an error.
    ///
    /// # Errors
    ///
    /// - [`ExecError::StartFailure`] if the executable cannot be started
    /// - [`ExecError::InvalidArgument`] if the spec holds a rejected argument
    /// - [`ExecError::Io`] if waiting on the child fails
    pub async fn run_and_capture(&mut self) -> Result<ProcessResult> {
        self.stop().await;

        let mut child = self.spawn(true)?;
        let pid = child.id();
        let command = self.spec.command_line();
        self.pid = pid;
        self.state = ProcessState::Running;
        debug!(%command, ?pid, "started one-shot process");

        let tree = Arc::clone(&self.tree);
        let mut guard = TreeGuard {
            tree: tree.as_ref(),
            pid,
        };

        let stdout = CaptureBuffer::new();
        let stderr = CaptureBuffer::new();
        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stream) = child.stdout.take() {
            readers.push(tokio::spawn(drain_lines(stream, stdout.clone())));
        }
        if let Some(stream) = child.stderr.take() {
            readers.push(tokio::spawn(drain_lines(stream, stderr.clone())));
        }

        let ceiling = self.config.command_timeout;
        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        let mut exit: Option<ExitStatus> = None;
        let waited = timeout(ceiling, async {
            exit = Some(child.wait().await?);
            join_readers(&mut readers).await;
            Ok::<(), std::io::Error>(())
        })
        .await;

        let timed_out = match waited {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                self.force_kill(pid, &mut child).await;
                finish_readers(&mut readers, self.config.kill_grace).await;
                guard.disarm();
                self.release(ProcessState::Terminated);
                return Err(ExecError::Io(e));
            }
            Err(_) if exit.is_some() => {
                // The root exited but something it left behind still holds a pipe.
                if let Some(pid) = pid {
                    info!(pid, %command, "process exited, clearing leftover descendants");
                    tree.kill_orphans(pid);
                }
                finish_readers(&mut readers, self.config.kill_grace).await;
                false
            }
            Err(_) => {
                info!(
                    ?pid,
                    %command,
                    timeout_ms = ceiling_ms,
                    "ceiling reached, terminating process tree"
                );
                self.force_kill(pid, &mut child).await;
                finish_readers(&mut readers, self.config.kill_grace).await;
                true
            }
        };
        guard.disarm();

        let (stdout, stderr) = (stdout.freeze(), stderr.freeze());
        if timed_out {
            self.release(ProcessState::Terminated);
            return Ok(ProcessResult::timed_out_after(
                command,
                stdout,
                stderr,
                ceiling_ms,
            ));
        }

        let code = exit.and_then(|status| status.code()).unwrap_or(UNKNOWN_EXIT_CODE);
        debug!(%command, exit_code = code, "one-shot process exited");
        self.release(ProcessState::Exited(code));
        Ok(ProcessResult::completed(command, stdout, stderr, code))
    }

    async fn force_kill(&self, pid: Option<u32>, child: &mut Child) {
        if let Some(pid) = pid {
            if let Err(e) = self.tree.kill_tree(pid) {
                warn!(pid, error = %e, "process tree kill failed, killing root only");
                let _ = child.start_kill();
            }
        } else {
            let _ = child.start_kill();
        }
        if timeout(self.config.kill_grace, child.wait()).await.is_err() {
            warn!(?pid, "killed process was not reaped within grace period");
        }
    }

    /// Launch the process without waiting and without capturing stdio.
    ///
    /// Anything this value was already running is stopped first. Callers
    /// should wait [`ExecConfig::settle_delay`] before the first
    /// [`ensure_running`](Self::ensure_running).
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::StartFailure`] if the executable cannot be
    /// started.
    pub async fn start(&mut self) -> Result<()> {
        self.stop().await;

        let child = self.spawn(false)?;
        self.pid = child.id();
        self.child = Some(child);
        self.state = ProcessState::Running;
        info!(command = %self.spec, pid = ?self.pid, "started long-lived process");
        Ok(())
    }

    /// Whether the long-lived process is still running.
    ///
    /// Observing an exit moves the state to [`ProcessState::Exited`].
    pub fn ensure_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                let code = status.code().unwrap_or(UNKNOWN_EXIT_CODE);
                debug!(command = %self.spec, exit_code = code, "long-lived process exited");
                self.child = None;
                self.release(ProcessState::Exited(code));
                false
            }
            Err(e) => {
                warn!(command = %self.spec, error = %e, "could not query process status");
                false
            }
        }
    }

    /// Kill the process and its entire tree.
    ///
    /// Idempotent: a no-op when nothing is running, and safe when the
    /// process is exiting on its own at the same moment.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Ok(Some(status)) = child.try_wait() {
            let code = status.code().unwrap_or(UNKNOWN_EXIT_CODE);
            debug!(command = %self.spec, exit_code = code, "process already exited before stop");
            self.release(ProcessState::Exited(code));
            return;
        }

        let pid = self.pid;
        info!(command = %self.spec, ?pid, "stopping process tree");
        self.force_kill(pid, &mut child).await;
        self.release(ProcessState::Terminated);
    }

    /// Stop the process and release everything this value owns.
    pub async fn close(mut self) {
        self.stop().await;
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if matches!(child.try_wait(), Ok(None)) {
                if let Some(pid) = self.pid {
                    info!(pid, command = %self.spec, "disposing running process, killing tree");
                    if self.tree.kill_tree(pid).is_err() {
                        let _ = child.start_kill();
                    }
                }
            }
            // kill_on_drop plus tokio's orphan reaping collect the root.
        }
        if let Some(pid) = self.pid.take() {
            self.tree.release(pid);
        }
    }
}

/// Read `stream` line by line into `buffer` until EOF.
async fn drain_lines<R>(stream: R, buffer: CaptureBuffer)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                while matches!(line.last(), Some(b'\n' | b'\r')) {
                    line.pop();
                }
                buffer.push_line(&String::from_utf8_lossy(&line));
            }
            Err(e) => {
                debug!(error = %e, "stdio reader stopped");
                break;
            }
        }
    }
}

/// Await every reader; cancellation-safe, finished handles are removed.
async fn join_readers(readers: &mut Vec<JoinHandle<()>>) {
    while let Some(handle) = readers.last_mut() {
        let _ = handle.await;
        readers.pop();
    }
}

/// Give readers `grace` to hit EOF after a kill, then abort the rest.
async fn finish_readers(readers: &mut Vec<JoinHandle<()>>, grace: std::time::Duration) {
    if timeout(grace, join_readers(readers)).await.is_err() {
        for handle in readers.drain(..) {
            handle.abort();
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::TIMED_OUT_EXIT_CODE;
    use std::time::{Duration, Instant};

    fn fast_config() -> ExecConfig {
        ExecConfig::default()
            .with_command_timeout(Duration::from_secs(5))
            .with_kill_grace(Duration::from_millis(500))
            .with_settle_delay(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_missing_executable_is_start_failure() {
        let spec = ProcessSpec::new("/definitely/not/a/real/tool-7f3a");
        let started = Instant::now();
        let err = ManagedProcess::run(spec, fast_config())
            .await
            .expect_err("spawn must fail");
        assert!(matches!(err, ExecError::StartFailure { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_invalid_argument_is_reported_before_spawn() {
        let spec = ProcessSpec::new("echo").arg("bad\nvalue");
        let err = ManagedProcess::run(spec, fast_config())
            .await
            .expect_err("argument must be rejected");
        assert!(matches!(err, ExecError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_start_failure_for_long_lived() {
        let mut process = ManagedProcess::new(ProcessSpec::new("/no/such/tunnel"), fast_config());
        let err = process.start().await.expect_err("spawn must fail");
        assert!(matches!(err, ExecError::StartFailure { .. }));
        assert_eq!(process.state(), ProcessState::Unstarted);
        assert!(!process.ensure_running());
    }

    #[tokio::test]
    async fn test_stop_on_unstarted_is_noop() {
        let mut process = ManagedProcess::new(ProcessSpec::new("true"), fast_config());
        process.stop().await;
        process.stop().await;
        assert_eq!(process.state(), ProcessState::Unstarted);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn sh(script: &str) -> ProcessSpec {
            ProcessSpec::new("sh").args(["-c", script])
        }

        async fn wait_until_gone(tree: &dyn ProcessTree, pid: u32) -> bool {
            for _ in 0..100 {
                if !tree.is_alive(pid) {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            false
        }

        #[tokio::test]
        async fn test_captures_both_streams() {
            let result = ManagedProcess::run(sh("echo out1; echo err1 >&2; echo out2"), fast_config())
                .await
                .expect("sh runs");
            assert!(result.success());
            assert_eq!(result.stdout(), "out1\nout2\n");
            assert_eq!(result.stderr(), "err1\n");
        }

        #[tokio::test]
        async fn test_non_zero_exit_is_a_result() {
            let result = ManagedProcess::run(sh("echo nope >&2; exit 3"), fast_config())
                .await
                .expect("sh runs");
            assert_eq!(result.exit_code(), 3);
            assert!(!result.success());
            assert!(!result.timed_out());
            assert_eq!(result.stderr(), "nope\n");
        }

        #[tokio::test]
        async fn test_final_line_without_newline_is_terminated() {
            let result = ManagedProcess::run(sh("printf 42"), fast_config())
                .await
                .expect("sh runs");
            assert_eq!(result.stdout(), "42\n");
        }

        #[tokio::test]
        async fn test_large_output_on_one_stream_does_not_deadlock() {
            // Far beyond a pipe buffer on stderr while stdout stays idle.
            let script = "i=0; while [ $i -lt 20000 ]; do echo line-$i-xxxxxxxxxxxxxxxx >&2; i=$((i+1)); done; echo done";
            let result = ManagedProcess::run(sh(script), fast_config().with_command_timeout(Duration::from_secs(20)))
                .await
                .expect("sh runs");
            assert!(!result.timed_out());
            assert_eq!(result.stdout(), "done\n");
            assert_eq!(result.stderr().lines().count(), 20000);
        }

        #[tokio::test]
        async fn test_ceiling_kills_and_returns_partial_output() {
            let config = fast_config().with_command_timeout(Duration::from_millis(300));
            let mut process = ManagedProcess::new(sh("echo started; echo $$ >&2; sleep 30"), config);
            let started = Instant::now();
            let result = process.run_and_capture().await.expect("sh runs");

            assert!(started.elapsed() < Duration::from_millis(300) + Duration::from_secs(2));
            assert!(result.timed_out());
            assert_eq!(result.exit_code(), TIMED_OUT_EXIT_CODE);
            assert_eq!(result.stdout(), "started\n");
            assert_eq!(process.state(), ProcessState::Terminated);

            let pid: u32 = result.stderr().trim().parse().expect("pid on stderr");
            let tree = crate::tree::UnixProcessTree::new();
            assert!(wait_until_gone(&tree, pid).await, "timed out process still running");
        }

        #[tokio::test]
        async fn test_ceiling_kills_grandchildren() {
            let config = fast_config().with_command_timeout(Duration::from_millis(300));
            let result = ManagedProcess::run(sh("sleep 30 & echo $!; wait"), config)
                .await
                .expect("sh runs");
            assert!(result.timed_out());
            let grandchild: u32 = result.stdout().trim().parse().expect("pid on stdout");
            let tree = crate::tree::UnixProcessTree::new();
            assert!(wait_until_gone(&tree, grandchild).await, "grandchild survived");
        }

        #[tokio::test]
        async fn test_long_lived_start_and_stop_twice() {
            let mut process = ManagedProcess::new(ProcessSpec::new("sleep").arg("30"), fast_config());
            process.start().await.expect("sleep starts");
            let pid = process.pid().expect("pid while running");
            assert!(process.ensure_running());
            assert_eq!(process.state(), ProcessState::Running);

            process.stop().await;
            assert_eq!(process.state(), ProcessState::Terminated);
            assert!(process.pid().is_none());
            process.stop().await;
            assert_eq!(process.state(), ProcessState::Terminated);
            assert!(!process.ensure_running());

            let tree = crate::tree::UnixProcessTree::new();
            assert!(wait_until_gone(&tree, pid).await);
        }

        #[tokio::test]
        async fn test_stop_kills_helper_children() {
            let mut process = ManagedProcess::new(sh("sleep 30 & sleep 30 & wait"), fast_config());
            process.start().await.expect("sh starts");
            tokio::time::sleep(Duration::from_millis(200)).await;
            let root = process.pid().expect("pid");

            let children: Vec<u32> = std::fs::read_dir("/proc")
                .map(|entries| {
                    entries
                        .flatten()
                        .filter_map(|e| e.file_name().to_str()?.parse::<u32>().ok())
                        .filter(|pid| {
                            std::fs::read_to_string(format!("/proc/{pid}/stat"))
                                .ok()
                                .and_then(|s| s[s.rfind(')')? + 1..].split_whitespace().nth(1)?.parse::<u32>().ok())
                                == Some(root)
                        })
                        .collect()
                })
                .unwrap_or_default();

            process.stop().await;
            let tree = crate::tree::UnixProcessTree::new();
            for child in children {
                assert!(wait_until_gone(&tree, child).await, "helper {child} survived stop");
            }
        }

        #[tokio::test]
        async fn test_natural_exit_then_stop_is_clean() {
            let mut process = ManagedProcess::new(ProcessSpec::new("true"), fast_config());
            process.start().await.expect("true starts");
            tokio::time::sleep(Duration::from_millis(200)).await;
            assert!(!process.ensure_running());
            assert_eq!(process.state(), ProcessState::Exited(0));
            process.stop().await;
            assert_eq!(process.state(), ProcessState::Exited(0));
        }

        #[tokio::test]
        async fn test_drop_kills_running_tree() {
            let pid = {
                let mut process = ManagedProcess::new(ProcessSpec::new("sleep").arg("30"), fast_config());
                process.start().await.expect("sleep starts");
                process.pid().expect("pid")
            };
            let tree = crate::tree::UnixProcessTree::new();
            assert!(wait_until_gone(&tree, pid).await, "dropped process still running");
        }

        #[tokio::test]
        async fn test_restart_stops_previous_process() {
            let mut process = ManagedProcess::new(ProcessSpec::new("sleep").arg("30"), fast_config());
            process.start().await.expect("first start");
            let first = process.pid().expect("pid");
            process.start().await.expect("second start");
            let second = process.pid().expect("pid");
            assert_ne!(first, second);

            let tree = crate::tree::UnixProcessTree::new();
            assert!(wait_until_gone(&tree, first).await);
            process.close().await;
            assert!(wait_until_gone(&tree, second).await);
        }

        #[tokio::test]
        async fn test_working_directory_is_applied() {
            let dir = tempfile::tempdir().expect("tempdir");
            let spec = ProcessSpec::new("pwd").current_dir(dir.path());
            let result = ManagedProcess::run(spec, fast_config()).await.expect("pwd runs");
            let reported = std::fs::canonicalize(result.stdout().trim()).expect("path");
            let expected = std::fs::canonicalize(dir.path()).expect("path");
            assert_eq!(reported, expected);
        }
    }
}
