//! Point a database forwarder at the replica set primary.
//!
//! The forwarder deployment relays to one replica set member, named in its
//! secret. Reading `isMaster` through the forwarder tells whether that
//! member is still primary; when it is not, the secret is pointed at the
//! primary and the forwarder is restarted by scaling it to zero and back.

use std::io::Write;
use std::time::Duration;

use cutover_connect::establish_and_fetch;
use cutover_extract::{ExtractError, MongoClusterInfo};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::cli::MongoPrimaryArgs;
use crate::client::{KubectlClient, MongoClient};
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, write_footer};
use crate::settings::Context;

/// Forwarder secret key naming the member to relay to.
pub const FORWARD_TARGET_KEY: &str = "SOCAT_FORWARD_IP";

/// Handler for the mongo-primary command.
pub struct MongoPrimaryCommand<'a> {
    context: &'a Context,
}

impl<'a> MongoPrimaryCommand<'a> {
    /// Creates a new mongo-primary command handler.
    #[must_use]
    pub const fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Executes the mongo-primary command.
    ///
    /// # Errors
    ///
    /// Returns error if a tool is missing, the replica set view cannot be
    /// read through the forwarder, the set has no primary, or updating the
    /// forwarder fails.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &MongoPrimaryArgs,
    ) -> Result<(), CliError> {
        let kubectl = self.context.require(&self.context.kubectl()).await?;
        let mongo = self.context.require(&self.context.mongo()).await?;
        let kubectl = KubectlClient::new(kubectl.path, args.namespace.as_str(), self.context.exec)
            .with_kubeconfig(self.context.tools.kubeconfig.clone());
        let mongo = MongoClient::new(mongo.path, self.context.exec);

        let info = self.read_cluster_info(&kubectl, &mongo, &args.deployment).await?;
        info!(
            replica_set = %info.set_name,
            connected_to = %info.me,
            primary = %info.primary,
            is_primary = info.is_master,
            "read replica set view"
        );

        let action = if info.is_master {
            PrimaryAction::AlreadyPrimary
        } else if info.primary.is_empty() {
            return Err(ExtractError::remote_operation(format!("replica set '{}' reports no primary", info.set_name)).into());
        } else if args.dry_run {
            PrimaryAction::DryRun
        } else {
            let restart_delay = Duration::from_secs(args.restart_delay);
            Self::repoint(&kubectl, &args.deployment, &info.primary, restart_delay).await?;
            PrimaryAction::Repointed
        };

        let report = PrimaryReport {
            namespace: args.namespace.clone(),
            deployment: args.deployment.clone(),
            replica_set: info.set_name,
            is_primary: info.is_master,
            connected_to: info.me,
            primary: info.primary,
            action,
        };
        format.write(out, &report)
    }

    async fn read_cluster_info(
        &self,
        kubectl: &KubectlClient,
        mongo: &MongoClient,
        deployment: &str,
    ) -> Result<MongoClusterInfo, CliError> {
        let host = self.context.network.forwarded_database_host();
        let tunnel = kubectl.port_forward(&format!("deployment/{deployment}"), &self.context.network);
        let (tunnel, info) = establish_and_fetch(tunnel, &self.context.retry, |attempt| {
            let mongo = mongo.clone();
            let host = host.clone();
            async move {
                match mongo.cluster_info(&host).await {
                    Ok(info) => Some(info),
                    Err(e) => {
                        debug!(attempt, error = %e, "replica set view not readable yet");
                        None
                    }
                }
            }
        })
        .await?;
        tunnel.close().await;
        Ok(info)
    }

    async fn repoint(
        kubectl: &KubectlClient,
        deployment: &str,
        primary: &str,
        restart_delay: Duration,
    ) -> Result<(), CliError> {
        kubectl.set_secret_value(deployment, FORWARD_TARGET_KEY, primary).await?;
        kubectl.scale(deployment, 0).await?;
        sleep(restart_delay).await;
        kubectl.scale(deployment, 1).await?;
        info!(deployment, primary, "forwarder restarted against primary");
        Ok(())
    }
}

/// What was done to the forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAction {
    /// The forwarder already relays to the primary.
    AlreadyPrimary,
    /// A change was needed but not made.
    DryRun,
    /// Secret updated and forwarder restarted.
    Repointed,
}

impl PrimaryAction {
    const fn label(self) -> &'static str {
        match self {
            Self::AlreadyPrimary => "none, already connected to primary",
            Self::DryRun => "none (dry run), forwarder should be repointed",
            Self::Repointed => "secret updated, forwarder restarted",
        }
    }
}

/// Replica set view seen through the forwarder.
#[derive(Debug, Clone, Serialize)]
pub struct PrimaryReport {
    /// Namespace.
    pub namespace: String,
    /// Forwarder deployment.
    pub deployment: String,
    /// Replica set name.
    pub replica_set: String,
    /// Whether the forwarder relays to the primary.
    pub is_primary: bool,
    /// Member the forwarder relays to.
    pub connected_to: String,
    /// Primary member.
    pub primary: String,
    /// Outcome.
    pub action: PrimaryAction,
}

impl TableDisplay for PrimaryReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Forwarder:    {}/{}", self.namespace, self.deployment)?;
        writeln!(writer, "ReplSet name: {}", self.replica_set)?;
        writeln!(writer, "Is primary?   {}", if self.is_primary { "Yes" } else { "No" })?;
        writeln!(writer, "Connected to: {}", self.connected_to)?;
        writeln!(writer, "Primary:      {}", self.primary)?;
        write_footer(writer, &format!("Action: {}", self.action.label()))
    }
}
