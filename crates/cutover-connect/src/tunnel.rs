//! Port-forward tunnels.
//!
//! A tunnel is a long-lived [`ManagedProcess`] bound to a local/remote port
//! pair. [`establish_and_probe`] starts it, waits until the process stays
//! up and the caller's probe succeeds, and tears it down itself when
//! either never happens.

use crate::error::{ConnectError, Result};
use crate::retry::RetryPolicy;
use cutover_exec::{ExecConfig, ManagedProcess, ProcessSpec};
use std::future::{Future, ready};
use std::path::PathBuf;
use tokio::time::sleep;
use tracing::{info, warn};

/// Cluster-tool port-forward command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortForward {
    tool: PathBuf,
    kubeconfig: Option<PathBuf>,
    namespace: String,
    target: String,
    local_port: u16,
    remote_port: u16,
}

impl PortForward {
    /// Forward `local_port` to `remote_port` of `target` (`pod/x`,
    /// `deployment/y` or a bare pod name) in `namespace`.
    #[must_use]
    pub fn new(
        tool: impl Into<PathBuf>,
        namespace: impl Into<String>,
        target: impl Into<String>,
        local_port: u16,
        remote_port: u16,
    ) -> Self {
        Self {
            tool: tool.into(),
            kubeconfig: None,
            namespace: namespace.into(),
            target: target.into(),
            local_port,
            remote_port,
        }
    }

    /// Use an explicit kubeconfig file.
    #[must_use]
    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    /// `[--kubeconfig K] -n NS port-forward TARGET L:R`
    #[must_use]
    pub fn spec(&self) -> ProcessSpec {
        let mut spec = ProcessSpec::new(&self.tool);
        if let Some(kubeconfig) = &self.kubeconfig {
            spec = spec.arg("--kubeconfig").arg(kubeconfig.to_string_lossy());
        }
        spec.args([
            "-n".to_string(),
            self.namespace.clone(),
            "port-forward".to_string(),
            self.target.clone(),
            format!("{}:{}", self.local_port, self.remote_port),
        ])
    }

    /// An unstarted tunnel listening on `local_host`.
    #[must_use]
    pub fn into_tunnel(self, config: ExecConfig, local_host: impl Into<String>) -> TunnelHandle {
        let process = ManagedProcess::new(self.spec(), config);
        TunnelHandle::new(process, local_host, self.local_port, self.remote_port)
    }
}

/// A tunnel process and the ports it binds. Dropping it kills the tunnel's
/// process tree.
#[derive(Debug)]
pub struct TunnelHandle {
    process: ManagedProcess,
    local_host: String,
    local_port: u16,
    remote_port: u16,
}

impl TunnelHandle {
    /// Wrap a (normally unstarted) process.
    #[must_use]
    pub fn new(process: ManagedProcess, local_host: impl Into<String>, local_port: u16, remote_port: u16) -> Self {
        Self {
            process,
            local_host: local_host.into(),
            local_port,
            remote_port,
        }
    }

    /// Local port.
    #[must_use]
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Remote port.
    #[must_use]
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// `host:port` clients connect to.
    #[must_use]
    pub fn local_address(&self) -> String {
        format!("{}:{}", self.local_host, self.local_port)
    }

    /// The underlying process.
    #[must_use]
    pub fn process(&self) -> &ManagedProcess {
        &self.process
    }

    /// Whether the tunnel process is still running.
    pub fn is_alive(&mut self) -> bool {
        self.process.ensure_running()
    }

    /// Start the tunnel process.
    ///
    /// # Errors
    ///
    /// [`ConnectError::Exec`] when the process cannot be started.
    pub async fn open(&mut self) -> Result<()> {
        self.process.start().await?;
        info!(
            command = %self.process.spec(),
            local = %self.local_address(),
            remote_port = self.remote_port,
            "tunnel started"
        );
        Ok(())
    }

    /// Kill the tunnel's process tree. Idempotent.
    pub async fn stop(&mut self) {
        if self.process.pid().is_some() {
            info!(local = %self.local_address(), "closing tunnel");
        }
        self.process.stop().await;
    }

    /// Stop and release the tunnel.
    pub async fn close(mut self) {
        self.stop().await;
    }
}

/// Open `tunnel` and wait until `probe` reports the target reachable
/// through it.
///
/// Sequence: start, wait the settle delay, poll "process still running",
/// then poll `probe` (which receives the 1-based attempt number). Both
/// polls use `policy`. On any failure the tunnel is stopped before the
/// error is returned; on success the caller owns the live tunnel.
///
/// # Errors
///
/// - [`ConnectError::Exec`] if the process cannot start
/// - [`ConnectError::TunnelExited`] if it does not stay up
/// - [`ConnectError::Exhausted`] if `probe` never succeeds
pub async fn establish_and_probe<F, Fut>(tunnel: TunnelHandle, policy: &RetryPolicy, mut probe: F) -> Result<TunnelHandle>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    let (tunnel, ()) = establish_and_fetch(tunnel, policy, |attempt| {
        let reachable = probe(attempt);
        async move { reachable.await.then_some(()) }
    })
    .await?;
    Ok(tunnel)
}

/// [`establish_and_probe`] for a probe that reads something through the
/// tunnel. Returns the live tunnel and the first value the probe yields.
///
/// # Errors
///
/// As [`establish_and_probe`].
pub async fn establish_and_fetch<T, F, Fut>(
    mut tunnel: TunnelHandle,
    policy: &RetryPolicy,
    probe: F,
) -> Result<(TunnelHandle, T)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    tunnel.open().await?;
    sleep(tunnel.process.config().settle_delay).await;

    if let Err(ConnectError::Exhausted { attempts }) = policy.poll(|_| ready(tunnel.is_alive())).await {
        let command = tunnel.process.spec().command_line();
        warn!(%command, attempts, "tunnel process is not running");
        tunnel.stop().await;
        return Err(ConnectError::tunnel_exited(command, attempts));
    }

    match policy.poll_for(probe).await {
        Ok((value, attempt)) => {
            info!(local = %tunnel.local_address(), attempt, "tunnel ready");
            Ok((tunnel, value))
        }
        Err(e) => {
            warn!(local = %tunnel.local_address(), error = %e, "target unreachable through tunnel, tearing down");
            tunnel.stop().await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use std::time::Duration;

    #[test]
    fn test_port_forward_spec() {
        let spec = PortForward::new("/usr/bin/kubectl", "shop", "orders-db-5d8f-x2k", 27099, 27017)
            .with_kubeconfig(Some(PathBuf::from("/home/ops/my configs/kube")))
            .spec();
        assert_eq!(spec.program(), std::path::Path::new("/usr/bin/kubectl"));
        assert_eq!(
            spec.arguments(),
            [
                "--kubeconfig",
                "/home/ops/my configs/kube",
                "-n",
                "shop",
                "port-forward",
                "orders-db-5d8f-x2k",
                "27099:27017"
            ]
        );
    }

    #[test]
    fn test_port_forward_without_kubeconfig() {
        let spec = PortForward::new("kubectl", "shop", "deployment/forwarder", 1, 2).spec();
        assert_eq!(spec.arguments(), ["-n", "shop", "port-forward", "deployment/forwarder", "1:2"]);
    }

    #[test]
    fn test_handle_addresses() {
        let tunnel = PortForward::new("kubectl", "ns", "pod", 27099, 27017)
            .into_tunnel(ExecConfig::default(), "localhost");
        assert_eq!(tunnel.local_port(), 27099);
        assert_eq!(tunnel.remote_port(), 27017);
        assert_eq!(tunnel.local_address(), "localhost:27099");
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::default()
                .with_max_attempts(3)
                .with_interval(Duration::from_millis(50)),
        )
    }

    fn fast_exec() -> ExecConfig {
        ExecConfig::default()
            .with_settle_delay(Duration::from_millis(100))
            .with_kill_grace(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_start_failure_is_exec_error() {
        let process = ManagedProcess::new(ProcessSpec::new("/no/such/port-forwarder"), fast_exec());
        let tunnel = TunnelHandle::new(process, "localhost", 1, 2);
        let err = establish_and_probe(tunnel, &fast_policy(), |_| ready(true))
            .await
            .expect_err("cannot start");
        assert!(matches!(err, ConnectError::Exec(_)));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        fn sleeper() -> TunnelHandle {
            let process = ManagedProcess::new(ProcessSpec::new("sleep").arg("30"), fast_exec());
            TunnelHandle::new(process, "localhost", 27099, 27017)
        }

        fn pid_alive(pid: u32) -> bool {
            std::fs::read_to_string(format!("/proc/{pid}/stat"))
                .ok()
                .and_then(|stat| {
                    let state = stat[stat.rfind(')')? + 1..].split_whitespace().next()?.to_string();
                    Some(state != "Z" && state != "X")
                })
                .unwrap_or(false)
        }

        #[tokio::test]
        async fn test_ready_on_third_probe_keeps_tunnel_open() {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);
            let mut tunnel = establish_and_probe(sleeper(), &fast_policy(), move |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                ready(attempt == 3)
            })
            .await
            .expect("ready on third attempt");

            assert_eq!(calls.load(Ordering::SeqCst), 3);
            assert!(tunnel.is_alive());
            tunnel.close().await;
        }

        #[tokio::test]
        async fn test_exhausted_probe_tears_tunnel_down() {
            let dir = tempfile::tempdir().expect("tempdir");
            let pid_file = dir.path().join("tunnel.pid");
            let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.display());
            let process = ManagedProcess::new(ProcessSpec::new("sh").args(["-c", script.as_str()]), fast_exec());
            let tunnel = TunnelHandle::new(process, "localhost", 27099, 27017);

            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);
            let err = establish_and_probe(tunnel, &fast_policy(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                ready(false)
            })
            .await
            .expect_err("never ready");

            assert!(matches!(err, ConnectError::Exhausted { attempts: 3 }));
            assert_eq!(calls.load(Ordering::SeqCst), 3);

            let pid: u32 = std::fs::read_to_string(&pid_file)
                .expect("tunnel wrote its pid")
                .trim()
                .parse()
                .expect("pid");
            let mut gone = false;
            for _ in 0..50 {
                if !pid_alive(pid) {
                    gone = true;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            assert!(gone, "tunnel process {pid} survived exhaustion");
        }

        #[tokio::test]
        async fn test_fetch_returns_first_value() {
            let (tunnel, value) = establish_and_fetch(sleeper(), &fast_policy(), |attempt| {
                ready((attempt >= 2).then(|| format!("primary seen on attempt {attempt}")))
            })
            .await
            .expect("value on second attempt");

            assert_eq!(value, "primary seen on attempt 2");
            tunnel.close().await;
        }

        #[tokio::test]
        async fn test_fetch_exhaustion_is_reported() {
            let err = establish_and_fetch(sleeper(), &fast_policy(), |_| ready(None::<u8>))
                .await
                .expect_err("nothing fetched");
            assert!(matches!(err, ConnectError::Exhausted { attempts: 3 }));
        }

        #[tokio::test]
        async fn test_tunnel_that_exits_is_reported() {
            let process = ManagedProcess::new(ProcessSpec::new("true"), fast_exec());
            let tunnel = TunnelHandle::new(process, "localhost", 1, 2);
            let err = establish_and_probe(tunnel, &fast_policy(), |_| ready(true))
                .await
                .expect_err("process exits immediately");
            assert!(matches!(err, ConnectError::TunnelExited { attempts: 3, .. }));
        }

        #[tokio::test]
        async fn test_stop_is_idempotent() {
            let mut tunnel = sleeper();
            tunnel.open().await.expect("start");
            assert!(tunnel.is_alive());
            tunnel.stop().await;
            tunnel.stop().await;
            assert!(!tunnel.is_alive());
        }
    }
}
