//! Settings file and the run context built from it.

use crate::cli::{Cli, ClusterMode, ToolArgs};
use crate::error::CliError;
use cutover_connect::{NetworkConfig, RetryConfig, RetryPolicy};
use cutover_exec::{ExecConfig, ExecutableLocator, ResolvedTool, ToolRequirement};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Explicit tool paths from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// `dig` executable.
    pub dig: Option<PathBuf>,
    /// `curl` executable.
    pub curl: Option<PathBuf>,
    /// `kubectl` executable.
    pub kubectl: Option<PathBuf>,
    /// `oc` executable.
    pub oc: Option<PathBuf>,
    /// `mongo` shell executable.
    pub mongo: Option<PathBuf>,
    /// Kubeconfig passed to `kubectl`.
    pub kubeconfig: Option<PathBuf>,
}

impl ToolPaths {
    /// Flag values win over file values.
    fn merge(self, flags: &ToolArgs) -> Self {
        Self {
            dig: flags.dig.clone().or(self.dig),
            curl: flags.curl.clone().or(self.curl),
            kubectl: flags.kubectl.clone().or(self.kubectl),
            oc: flags.oc.clone().or(self.oc),
            mongo: flags.mongo.clone().or(self.mongo),
            kubeconfig: flags.kubeconfig.clone().or(self.kubeconfig),
        }
    }
}

/// Contents of the optional JSON settings file.
///
/// Every section is optional; durations are milliseconds.
///
/// ```json
/// {
///   "exec": { "command_timeout": 20000 },
///   "retry": { "max_attempts": 5, "interval": 2000 },
///   "network": { "dns_resolver": "1.1.1.1" },
///   "tools": { "kubectl": "/opt/bin/kubectl" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Process timing.
    pub exec: ExecConfig,
    /// Poll budget.
    pub retry: RetryConfig,
    /// Addresses and ports.
    pub network: NetworkConfig,
    /// Tool paths.
    pub tools: ToolPaths,
}

impl Settings {
    /// Read a settings file.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("cannot read {}: {e}", path.display())))?;
        let settings = serde_json::from_str(&text)
            .map_err(|e| CliError::Config(format!("invalid settings in {}: {e}", path.display())))?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Read `path` when given, defaults otherwise.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_optional(path: Option<&Path>) -> Result<Self, CliError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Apply command-line overrides.
    #[must_use]
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(seconds) = cli.timeout {
            self.exec = self.exec.with_command_timeout(Duration::from_secs(seconds));
        }
        self.tools = self.tools.merge(&cli.tools);
        self
    }
}

/// Everything a command needs to run tools: timing, poll budget, network
/// addresses and where the tools live.
#[derive(Debug, Clone)]
pub struct Context {
    /// Process timing.
    pub exec: ExecConfig,
    /// Poll policy for tunnels.
    pub retry: RetryPolicy,
    /// Addresses and ports.
    pub network: NetworkConfig,
    /// Tool paths.
    pub tools: ToolPaths,
    locator: ExecutableLocator,
}

impl Context {
    /// Build a context that searches `PATH`.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self::with_locator(settings, ExecutableLocator::from_env())
    }

    /// Build a context with an explicit locator.
    #[must_use]
    pub fn with_locator(settings: Settings, locator: ExecutableLocator) -> Self {
        Self {
            exec: settings.exec,
            retry: RetryPolicy::new(settings.retry),
            network: settings.network,
            tools: settings.tools,
            locator,
        }
    }

    /// The `dig` requirement.
    #[must_use]
    pub fn dig(&self) -> ToolRequirement {
        ToolRequirement::new("dig", "--dig").with_supplied_path(self.tools.dig.clone())
    }

    /// The `curl` requirement; probed for `--dns-servers` when `probe` is set.
    #[must_use]
    pub fn curl(&self, probe: bool) -> ToolRequirement {
        let requirement = ToolRequirement::new("curl", "--curl").with_supplied_path(self.tools.curl.clone());
        if probe {
            requirement.with_capability_probe(["--dns-servers", self.network.dns_resolver.as_str(), "google.com"])
        } else {
            requirement
        }
    }

    /// The `kubectl` requirement.
    #[must_use]
    pub fn kubectl(&self) -> ToolRequirement {
        ToolRequirement::new("kubectl", "--kubectl").with_supplied_path(self.tools.kubectl.clone())
    }

    /// The `oc` requirement.
    #[must_use]
    pub fn oc(&self) -> ToolRequirement {
        ToolRequirement::new("oc", "--oc").with_supplied_path(self.tools.oc.clone())
    }

    /// Requirement for the tool driving `mode`.
    #[must_use]
    pub fn cluster_tool(&self, mode: ClusterMode) -> ToolRequirement {
        match mode {
            ClusterMode::Kubectl => self.kubectl(),
            ClusterMode::Oc => self.oc(),
        }
    }

    /// The `mongo` shell requirement.
    #[must_use]
    pub fn mongo(&self) -> ToolRequirement {
        ToolRequirement::new("mongo", "--mongo").with_supplied_path(self.tools.mongo.clone())
    }

    /// Resolve and probe a requirement.
    ///
    /// # Errors
    ///
    /// Returns `Exec` if the tool is missing or unsupported.
    pub async fn require(&self, requirement: &ToolRequirement) -> Result<ResolvedTool, CliError> {
        Ok(self.locator.require(requirement, &self.exec).await?)
    }

    /// Resolve and probe a requirement, reporting rather than failing on an
    /// unsupported tool.
    ///
    /// # Errors
    ///
    /// Returns `Exec` if the tool is missing.
    pub async fn check(&self, requirement: &ToolRequirement) -> Result<ResolvedTool, CliError> {
        Ok(self.locator.check(requirement, &self.exec).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::load_optional(None).expect("defaults");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.network.dns_resolver, "8.8.8.8");
        assert_eq!(settings.retry.max_attempts, 3);
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"retry": {{"max_attempts": 5}}, "exec": {{"command_timeout": 2500}}, "tools": {{"dig": "/opt/dig"}}}}"#
        )
        .expect("write");

        let settings = Settings::load(file.path()).expect("load");
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.interval, Duration::from_secs(1));
        assert_eq!(settings.exec.command_timeout, Duration::from_millis(2500));
        assert_eq!(settings.exec.settle_delay, ExecConfig::default().settle_delay);
        assert_eq!(settings.tools.dig, Some(PathBuf::from("/opt/dig")));
        assert_eq!(settings.network, NetworkConfig::default());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").expect("write");
        assert!(matches!(Settings::load(file.path()), Err(CliError::Config(_))));
        assert!(matches!(
            Settings::load(Path::new("/nonexistent/cutover.json")),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_flags_override_file() {
        let settings = Settings {
            tools: ToolPaths {
                dig: Some(PathBuf::from("/file/dig")),
                curl: Some(PathBuf::from("/file/curl")),
                ..ToolPaths::default()
            },
            ..Settings::default()
        };
        let cli = Cli::parse_from(["cutover", "--dig", "/flag/dig", "--timeout", "3", "tools"]);

        let settings = settings.with_overrides(&cli);
        assert_eq!(settings.tools.dig, Some(PathBuf::from("/flag/dig")));
        assert_eq!(settings.tools.curl, Some(PathBuf::from("/file/curl")));
        assert_eq!(settings.exec.command_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_curl_probe_uses_configured_resolver() {
        let mut settings = Settings::default();
        settings.network.dns_resolver = "1.1.1.1".to_string();
        let context = Context::new(settings);

        let probed = context.curl(true);
        assert_eq!(
            probed.capability_probe.as_deref(),
            Some(["--dns-servers".to_string(), "1.1.1.1".to_string(), "google.com".to_string()].as_slice())
        );
        assert!(context.curl(false).capability_probe.is_none());
        assert_eq!(context.kubectl().option_hint, "--kubectl");
        assert_eq!(context.cluster_tool(ClusterMode::Oc).option_hint, "--oc");
        assert_eq!(context.cluster_tool(ClusterMode::Kubectl).name, "kubectl");
    }
}
