//! Clients for the external tools.
//!
//! Each client turns one question ("what does this host resolve to?",
//! "which pods exist?") into a [`ProcessSpec`], runs it under the
//! configured ceiling and hands the captured output to an extractor.

use std::path::PathBuf;

use cutover_connect::{NetworkConfig, PortForward, TunnelHandle};
use cutover_exec::{ExecConfig, ManagedProcess, ProcessResult, ProcessSpec};
use cutover_extract::classify::{DIG, ErrorMarkers, KUBECTL, MONGO_SHELL, OPENSHIFT};
use cutover_extract::mongo::{parse_cluster_info, parse_shell_int, parse_shell_list, user_databases};
use cutover_extract::{
    CollectionStatistics, DnsPropagation, ExtractError, MongoClusterInfo, MongoSecret, SecretPayload,
    UptimeProbeResult, extract_uptime, kube::parse_resource_names, scaled_confirmed,
};
use tracing::{debug, info};

use crate::cli::ClusterMode;
use crate::error::CliError;

/// Run a one-shot command and reject timed-out results.
async fn run(spec: ProcessSpec, config: ExecConfig) -> Result<ProcessResult, CliError> {
    let result = ManagedProcess::run(spec, config).await?;
    result.ensure_completed()?;
    debug!(command = %result.command(), exit_code = result.exit_code(), "tool finished");
    Ok(result)
}

/// DNS lookups through `dig`.
#[derive(Debug, Clone)]
pub struct DigClient {
    tool: PathBuf,
    config: ExecConfig,
}

impl DigClient {
    /// Creates a client for the `dig` at `tool`.
    #[must_use]
    pub fn new(tool: impl Into<PathBuf>, config: ExecConfig) -> Self {
        Self {
            tool: tool.into(),
            config,
        }
    }

    /// `dig @resolver host`.
    #[must_use]
    pub fn spec(&self, resolver: &str, host: &str) -> ProcessSpec {
        ProcessSpec::new(&self.tool).args([format!("@{resolver}"), host.to_string()])
    }

    /// Query `resolver` for `host`.
    ///
    /// # Errors
    ///
    /// Exec errors, or remote errors when the resolver cannot be reached.
    pub async fn query(&self, resolver: &str, host: &str) -> Result<DnsPropagation, CliError> {
        let result = run(self.spec(resolver, host), self.config).await?;
        DIG.check(result.stderr())?;
        Ok(DnsPropagation::from_output(host, result.stdout())?)
    }
}

/// Where one URL lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTarget {
    /// `true` for `https`.
    pub https: bool,
    /// Host name.
    pub host: String,
    /// Explicit or scheme default port.
    pub port: u16,
    /// Path, `/` when absent.
    pub path: String,
}

impl UrlTarget {
    /// Parse `scheme://host[:port][/path]`. A missing scheme means https.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an unknown scheme, an empty host or a bad port.
    pub fn parse(url: &str, network: &NetworkConfig) -> Result<Self, CliError> {
        let (https, rest) = if let Some(rest) = url.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (false, rest)
        } else if url.contains("://") {
            return Err(CliError::InvalidArgument(format!("unsupported scheme in '{url}'")));
        } else {
            (true, url)
        };

        let (authority, path) = rest.find('/').map_or((rest, "/"), |i| rest.split_at(i));
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| CliError::InvalidArgument(format!("invalid port in '{url}'")))?;
                (host, port)
            }
            None => (authority, network.port_for(https)),
        };
        if host.is_empty() {
            return Err(CliError::InvalidArgument(format!("missing host in '{url}'")));
        }

        Ok(Self {
            https,
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// Normalised URL with an explicit port.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{scheme}://{}:{}{}", self.host, self.port, self.path)
    }
}

/// How `curl` finds the address of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Pin the host to this address.
    Static(&'a str),
    /// Ask this resolver.
    Resolver(&'a str),
}

/// HTTP probes through `curl`.
#[derive(Debug, Clone)]
pub struct CurlClient {
    tool: PathBuf,
    config: ExecConfig,
}

impl CurlClient {
    /// Creates a client for the `curl` at `tool`.
    #[must_use]
    pub fn new(tool: impl Into<PathBuf>, config: ExecConfig) -> Self {
        Self {
            tool: tool.into(),
            config,
        }
    }

    /// `curl -Lvs --no-sessionid (--resolve host:port:ip | --dns-servers ns) url`.
    #[must_use]
    pub fn spec(&self, target: &UrlTarget, resolution: Resolution<'_>) -> ProcessSpec {
        let spec = ProcessSpec::new(&self.tool).args(["-Lvs", "--no-sessionid"]);
        let spec = match resolution {
            Resolution::Static(ip) => spec.arg("--resolve").arg(format!("{}:{}:{ip}", target.host, target.port)),
            Resolution::Resolver(ns) => spec.arg("--dns-servers").arg(ns),
        };
        spec.arg(target.url())
    }

    /// Probe one target. An unreachable host is a sentinel row, not an error.
    ///
    /// # Errors
    ///
    /// Exec errors only (start failure, timeout).
    pub async fn probe(&self, target: &UrlTarget, resolution: Resolution<'_>) -> Result<UptimeProbeResult, CliError> {
        let result = run(self.spec(target, resolution), self.config).await?;
        Ok(extract_uptime(&target.host, &target.path, result.stderr(), result.stdout()))
    }
}

/// Error markers for a cluster tool.
const fn cluster_markers(mode: ClusterMode) -> &'static ErrorMarkers {
    match mode {
        ClusterMode::Kubectl => &KUBECTL,
        ClusterMode::Oc => &OPENSHIFT,
    }
}

/// Namespaced `kubectl` (or `oc`) calls.
#[derive(Debug, Clone)]
pub struct KubectlClient {
    tool: PathBuf,
    kubeconfig: Option<PathBuf>,
    namespace: String,
    mode: ClusterMode,
    config: ExecConfig,
}

impl KubectlClient {
    /// Creates a `kubectl` client for `namespace`.
    #[must_use]
    pub fn new(tool: impl Into<PathBuf>, namespace: impl Into<String>, config: ExecConfig) -> Self {
        Self {
            tool: tool.into(),
            kubeconfig: None,
            namespace: namespace.into(),
            mode: ClusterMode::Kubectl,
            config,
        }
    }

    /// Pass `--kubeconfig` on every call.
    #[must_use]
    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    /// Talk the given tool dialect.
    #[must_use]
    pub fn with_mode(mut self, mode: ClusterMode) -> Self {
        self.mode = mode;
        self
    }

    /// `kubectl [--kubeconfig K] -n NS <args>`.
    #[must_use]
    pub fn spec<I, S>(&self, args: I) -> ProcessSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = ProcessSpec::new(&self.tool);
        if let Some(kubeconfig) = &self.kubeconfig {
            spec = spec.arg("--kubeconfig").arg(kubeconfig.to_string_lossy());
        }
        spec.args(["-n", self.namespace.as_str()]).args(args)
    }

    /// Resource kind scaled by [`scale`](Self::scale): `deployment`, or
    /// `dc` (deployment config) on OpenShift.
    #[must_use]
    pub const fn deployment_kind(&self) -> &'static str {
        match self.mode {
            ClusterMode::Kubectl => "deployment",
            ClusterMode::Oc => "dc",
        }
    }

    async fn names(&self, kind: &str) -> Result<Vec<String>, CliError> {
        let result = run(self.spec(["get", kind, "-o", "name"]), self.config).await?;
        Ok(parse_resource_names(result.stdout(), result.stderr(), cluster_markers(self.mode))?)
    }

    /// Pod names in the namespace.
    ///
    /// # Errors
    ///
    /// Exec or remote errors.
    pub async fn pod_names(&self) -> Result<Vec<String>, CliError> {
        self.names("pods").await
    }

    /// Secret names in the namespace.
    ///
    /// # Errors
    ///
    /// Exec or remote errors.
    pub async fn secret_names(&self) -> Result<Vec<String>, CliError> {
        self.names("secrets").await
    }

    /// Deployment names in the namespace.
    ///
    /// # Errors
    ///
    /// Exec or remote errors.
    pub async fn deployment_names(&self) -> Result<Vec<String>, CliError> {
        self.names(self.deployment_kind()).await
    }

    /// Fetch and decode one secret.
    ///
    /// # Errors
    ///
    /// Exec, remote or decode errors.
    pub async fn secret(&self, name: &str) -> Result<SecretPayload, CliError> {
        let result = run(self.spec(["get", "secret", name, "-o", "json"]), self.config).await?;
        cluster_markers(self.mode).check(result.stderr())?;
        Ok(SecretPayload::from_json(result.stdout())?)
    }

    /// Set one key of a secret, leaving the others untouched.
    ///
    /// # Errors
    ///
    /// Exec or remote errors.
    pub async fn set_secret_value(&self, name: &str, key: &str, value: &str) -> Result<(), CliError> {
        let patch = serde_json::json!({ "stringData": { key: value } }).to_string();
        let result = run(
            self.spec(["patch", "secret", name, "--type", "merge", "-p", patch.as_str()]),
            self.config,
        )
        .await?;
        cluster_markers(self.mode).check(result.stderr())?;
        info!(secret = name, key, "secret updated");
        Ok(())
    }

    /// Set the replica count of a deployment.
    ///
    /// # Errors
    ///
    /// Exec or remote errors, or a remote operation error when the tool
    /// does not confirm the change.
    pub async fn scale(&self, deployment: &str, replicas: u32) -> Result<(), CliError> {
        let target = format!("{}/{deployment}", self.deployment_kind());
        let result = run(
            self.spec(["scale".to_string(), format!("--replicas={replicas}"), target.clone()]),
            self.config,
        )
        .await?;
        cluster_markers(self.mode).check(result.stderr())?;
        if !scaled_confirmed(result.stdout()) {
            return Err(ExtractError::remote_operation(format!("{target} was not scaled: {}", result.stdout())).into());
        }
        info!(%target, replicas, "scaled");
        Ok(())
    }

    /// A port-forward tunnel to `target`, not yet opened.
    #[must_use]
    pub fn port_forward(&self, target: &str, network: &NetworkConfig) -> TunnelHandle {
        PortForward::new(
            &self.tool,
            self.namespace.as_str(),
            target,
            network.local_database_port,
            network.remote_database_port,
        )
        .with_kubeconfig(self.kubeconfig.clone())
        .into_tunnel(self.config, network.local_host.as_str())
    }
}

/// User the database shell authenticates as.
const ADMIN_USER: &str = "admin";

/// Database holding the admin credentials.
const ADMIN_DATABASE: &str = "admin";

/// Collections with this in their name belong to the server.
const SYSTEM_COLLECTION_MARKER: &str = "system";

/// `mongo --eval` calls, authenticated as the admin user unless noted.
#[derive(Debug, Clone)]
pub struct MongoClient {
    tool: PathBuf,
    config: ExecConfig,
}

impl MongoClient {
    /// Creates a client for the shell at `tool`.
    #[must_use]
    pub fn new(tool: impl Into<PathBuf>, config: ExecConfig) -> Self {
        Self {
            tool: tool.into(),
            config,
        }
    }

    /// `mongo [db] --host H -u admin -p P --authenticationDatabase admin --eval E --quiet`.
    #[must_use]
    pub fn spec(&self, host: &str, database: Option<&str>, secret: &MongoSecret, eval: &str) -> ProcessSpec {
        ProcessSpec::new(&self.tool)
            .args(database)
            .args(["--host", host, "-u", ADMIN_USER, "-p", secret.admin_password.as_str()])
            .args(["--authenticationDatabase", ADMIN_DATABASE, "--eval", eval, "--quiet"])
    }

    /// `mongo --host H --eval E --quiet`, without credentials.
    #[must_use]
    pub fn anonymous_spec(&self, host: &str, eval: &str) -> ProcessSpec {
        ProcessSpec::new(&self.tool).args(["--host", host, "--eval", eval, "--quiet"])
    }

    /// Run an eval and return its standard output.
    ///
    /// Standard error is classified first; a non-zero exit with no marker
    /// is still a remote operation error, so a failed shell never reaches
    /// the scalar parsers.
    async fn eval(&self, spec: ProcessSpec) -> Result<String, CliError> {
        let result = run(spec, self.config).await?;
        MONGO_SHELL.check(result.stderr())?;
        if !result.success() {
            let output = [result.stderr(), result.stdout()]
                .into_iter()
                .map(str::trim)
                .find(|text| !text.is_empty())
                .unwrap_or("no output");
            return Err(ExtractError::remote_operation(format!("exit code {}: {output}", result.exit_code())).into());
        }
        let (stdout, _, _) = result.into_parts();
        Ok(stdout)
    }

    /// Whether the server answers a ping.
    pub async fn is_up(&self, host: &str, secret: &MongoSecret) -> bool {
        match ManagedProcess::run(self.spec(host, None, secret, "db.runCommand('ping')"), self.config).await {
            Ok(result) => result.success(),
            Err(e) => {
                debug!(host, error = %e, "ping could not run");
                false
            }
        }
    }

    /// Non-internal database names.
    ///
    /// # Errors
    ///
    /// Exec, remote or JSON errors.
    pub async fn user_databases(&self, host: &str, secret: &MongoSecret) -> Result<Vec<String>, CliError> {
        let output = self.eval(self.spec(host, None, secret, "db.getMongo().getDBNames()")).await?;
        Ok(user_databases(parse_shell_list(&output)?))
    }

    /// Connections with an operation in progress, seen from `database`.
    ///
    /// # Errors
    ///
    /// Exec, remote or parse errors.
    pub async fn active_connections(&self, host: &str, secret: &MongoSecret, database: &str) -> Result<i64, CliError> {
        let eval = "db.serverStatus().connections.active";
        let output = self.eval(self.spec(host, Some(database), secret, eval)).await?;
        Ok(parse_shell_int(&output)?)
    }

    /// Collection names of `database`, server collections excluded.
    ///
    /// # Errors
    ///
    /// Exec, remote or JSON errors.
    pub async fn collection_names(&self, host: &str, secret: &MongoSecret, database: &str) -> Result<Vec<String>, CliError> {
        let output = self.eval(self.spec(host, Some(database), secret, "db.getCollectionNames()")).await?;
        Ok(parse_shell_list(&output)?
            .into_iter()
            .filter(|name| !name.contains(SYSTEM_COLLECTION_MARKER))
            .collect())
    }

    /// Sample document size, document count and data size of one collection.
    ///
    /// # Errors
    ///
    /// Exec, remote or parse errors.
    pub async fn collection_statistics(
        &self,
        host: &str,
        secret: &MongoSecret,
        database: &str,
        collection: &str,
    ) -> Result<CollectionStatistics, CliError> {
        let collection = format!("db.getCollection('{collection}')");
        let document_size = format!("Object.bsonsize({collection}.findOne())");
        let document_count = format!("{collection}.count()");
        let collection_size = format!("{collection}.dataSize()");

        let document_size = self.eval(self.spec(host, Some(database), secret, &document_size)).await?;
        let document_count = self.eval(self.spec(host, Some(database), secret, &document_count)).await?;
        let collection_size = self.eval(self.spec(host, Some(database), secret, &collection_size)).await?;
        Ok(CollectionStatistics::from_outputs(&document_size, &document_count, &collection_size)?)
    }

    /// Replica set view of the member behind `host`.
    ///
    /// # Errors
    ///
    /// Exec, remote or JSON errors.
    pub async fn cluster_info(&self, host: &str) -> Result<MongoClusterInfo, CliError> {
        let output = self.eval(self.anonymous_spec(host, "JSON.stringify(db.isMaster())")).await?;
        Ok(parse_cluster_info(&output)?)
    }
}
