//! Command-line argument parsing with clap.

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// cutover - migration cutover checks driven by cluster tools.
#[derive(Parser, Debug, Clone)]
#[command(name = "cutover")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Settings file (JSON).
    #[arg(short, long, env = "CUTOVER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Ceiling for each tool invocation, in seconds.
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Explicit tool paths.
    #[command(flatten)]
    pub tools: ToolArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Tool path overrides; each falls back to the settings file, then `PATH`.
#[derive(Args, Debug, Clone, Default)]
pub struct ToolArgs {
    /// Path to the `dig` executable.
    #[arg(long, value_name = "PATH", global = true)]
    pub dig: Option<PathBuf>,

    /// Path to the `curl` executable.
    #[arg(long, value_name = "PATH", global = true)]
    pub curl: Option<PathBuf>,

    /// Path to the `kubectl` executable.
    #[arg(long, value_name = "PATH", global = true)]
    pub kubectl: Option<PathBuf>,

    /// Path to the `oc` executable.
    #[arg(long, value_name = "PATH", global = true)]
    pub oc: Option<PathBuf>,

    /// Path to the `mongo` shell executable.
    #[arg(long, value_name = "PATH", global = true)]
    pub mongo: Option<PathBuf>,

    /// Kubeconfig file passed to `kubectl`.
    #[arg(long, value_name = "FILE", global = true)]
    pub kubeconfig: Option<PathBuf>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resolve and probe the external tools.
    Tools,

    /// Check that hosts resolve to the new target.
    Dns(DnsArgs),

    /// Probe URLs and report address, TLS and HTTP status.
    Uptime(UptimeArgs),

    /// Show a decoded cluster secret.
    Secret(SecretArgs),

    /// Report active database connections per pod.
    MongoConnections(MongoConnectionsArgs),

    /// Report collection sizes per pod and database.
    MongoSize(MongoSizeArgs),

    /// Point a database forwarder at the replica set primary.
    MongoPrimary(MongoPrimaryArgs),

    /// Set the replica count of deployments.
    Scale(ScaleArgs),
}

/// Cluster tool dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ClusterMode {
    /// `kubectl` against Kubernetes or k3s.
    #[default]
    Kubectl,
    /// `oc` against OpenShift.
    Oc,
}

/// Arguments for the dns command.
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("expectation").required(true).args(["a_record", "cname"])))]
pub struct DnsArgs {
    /// Hosts to query.
    #[arg(required = true)]
    pub hosts: Vec<String>,

    /// Expected A record address (exact match).
    #[arg(long, value_name = "IP")]
    pub a_record: Option<String>,

    /// Expected CNAME target (substring match).
    #[arg(long, value_name = "HOST")]
    pub cname: Option<String>,

    /// Resolver to query instead of the configured one.
    #[arg(long, value_name = "IP")]
    pub dns: Option<String>,
}

/// Arguments for the uptime command.
#[derive(Args, Debug, Clone)]
pub struct UptimeArgs {
    /// URLs to probe (`https://host[:port]/path`; scheme defaults to https).
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Connect to this address instead of resolving the host.
    #[arg(long, value_name = "IP")]
    pub static_ip: Option<String>,
}

/// Arguments for the secret command.
#[derive(Args, Debug, Clone)]
pub struct SecretArgs {
    /// Secret name.
    pub name: String,

    /// Namespace holding the secret.
    #[arg(short, long)]
    pub namespace: String,

    /// Print decoded values instead of masking them.
    #[arg(long)]
    pub show_values: bool,
}

/// Arguments for the mongo-connections command.
#[derive(Args, Debug, Clone)]
pub struct MongoConnectionsArgs {
    /// Namespace holding the database pods.
    #[arg(short, long)]
    pub namespace: String,

    /// Only pods whose name starts with this prefix.
    #[arg(short, long)]
    pub prefix: Option<String>,
}

/// Arguments for the mongo-size command.
#[derive(Args, Debug, Clone)]
pub struct MongoSizeArgs {
    /// Namespace holding the database pods.
    #[arg(short, long)]
    pub namespace: String,

    /// Only pods whose name starts with this prefix.
    #[arg(short, long)]
    pub prefix: Option<String>,
}

/// Arguments for the mongo-primary command.
#[derive(Args, Debug, Clone)]
pub struct MongoPrimaryArgs {
    /// Forwarder deployment; its secret carries the same name.
    #[arg(default_value = "mongo-forwarder")]
    pub deployment: String,

    /// Namespace holding the forwarder.
    #[arg(short, long)]
    pub namespace: String,

    /// Report the replica set view without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Pause between scaling the forwarder down and back up.
    #[arg(long, value_name = "SECONDS", default_value_t = 5)]
    pub restart_delay: u64,
}

/// Arguments for the scale command.
#[derive(Args, Debug, Clone)]
pub struct ScaleArgs {
    /// Namespace (project) holding the deployments.
    #[arg(short, long)]
    pub namespace: String,

    /// Replicas per deployment.
    #[arg(short, long, default_value_t = 0)]
    pub replicas: u32,

    /// Only deployments whose name contains this text; all when absent.
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Cluster tool to drive.
    #[arg(short, long, value_enum, default_value_t = ClusterMode::Kubectl)]
    pub mode: ClusterMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_tools() {
        let cli = Cli::parse_from(["cutover", "tools"]);
        assert!(matches!(cli.command, Commands::Tools));
        assert_eq!(cli.format, Format::Table);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_dns_requires_expectation() {
        assert!(Cli::try_parse_from(["cutover", "dns", "shop.example.com"]).is_err());
        assert!(
            Cli::try_parse_from(["cutover", "dns", "a.example.com", "--a-record", "1.2.3.4", "--cname", "x"])
                .is_err()
        );

        let cli = Cli::parse_from(["cutover", "dns", "a.example.com", "b.example.com", "--cname", "lb.example.net"]);
        let Commands::Dns(args) = cli.command else {
            unreachable!("parsed dns");
        };
        assert_eq!(args.hosts, ["a.example.com", "b.example.com"]);
        assert_eq!(args.cname.as_deref(), Some("lb.example.net"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "cutover", "secret", "orders-db", "-n", "shop", "--format", "json", "-vv", "--kubectl", "/opt/kubectl",
            "--timeout", "30",
        ]);
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.timeout, Some(30));
        assert_eq!(cli.tools.kubectl, Some(PathBuf::from("/opt/kubectl")));
    }

    #[test]
    fn test_mongo_connections_args() {
        let cli = Cli::parse_from(["cutover", "mongo-connections", "-n", "shop", "-p", "orders"]);
        let Commands::MongoConnections(args) = cli.command else {
            unreachable!("parsed mongo-connections");
        };
        assert_eq!(args.namespace, "shop");
        assert_eq!(args.prefix.as_deref(), Some("orders"));
    }

    #[test]
    fn test_scale_args() {
        let cli = Cli::parse_from(["cutover", "scale", "-n", "shop", "--mode", "oc", "-r", "2", "--oc", "/opt/oc"]);
        let Commands::Scale(args) = cli.command else {
            unreachable!("parsed scale");
        };
        assert_eq!(args.mode, ClusterMode::Oc);
        assert_eq!(args.replicas, 2);
        assert!(args.prefix.is_none());
        assert_eq!(cli.tools.oc, Some(PathBuf::from("/opt/oc")));

        assert!(Cli::try_parse_from(["cutover", "scale", "-n", "shop", "-r", "-1"]).is_err());
    }

    #[test]
    fn test_mongo_primary_defaults() {
        let cli = Cli::parse_from(["cutover", "mongo-primary", "-n", "shop"]);
        let Commands::MongoPrimary(args) = cli.command else {
            unreachable!("parsed mongo-primary");
        };
        assert_eq!(args.deployment, "mongo-forwarder");
        assert_eq!(args.restart_delay, 5);
        assert!(!args.dry_run);
    }
}
