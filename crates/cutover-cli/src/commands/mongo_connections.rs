//! Active database connections per pod.
//!
//! For every database pod: find the service's secret, forward the database
//! port, wait until the shell can ping through the tunnel, then count
//! active connections per user database. A pod that cannot be reached
//! becomes a row and the next pod is processed.

use std::io::Write;

use cutover_extract::{MongoSecret, truncate_display};
use serde::Serialize;
use tracing::{info, warn};

use super::database::{NO_SECRET, PodDatabase, failure_note};
use crate::cli::MongoConnectionsArgs;
use crate::client::{KubectlClient, MongoClient};
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, write_footer, write_header};
use crate::settings::Context;

/// Handler for the mongo-connections command.
pub struct MongoConnectionsCommand<'a> {
    context: &'a Context,
}

impl<'a> MongoConnectionsCommand<'a> {
    /// Creates a new mongo-connections command handler.
    #[must_use]
    pub const fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Executes the mongo-connections command.
    ///
    /// # Errors
    ///
    /// Returns error if a tool is missing, pods or secrets cannot be
    /// listed, or output fails. Per-pod failures are rows.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &MongoConnectionsArgs,
    ) -> Result<(), CliError> {
        let kubectl = self.context.require(&self.context.kubectl()).await?;
        let mongo = self.context.require(&self.context.mongo()).await?;
        let kubectl = KubectlClient::new(kubectl.path, args.namespace.as_str(), self.context.exec)
            .with_kubeconfig(self.context.tools.kubeconfig.clone());
        let mongo = MongoClient::new(mongo.path, self.context.exec);

        let pods: Vec<String> = kubectl
            .pod_names()
            .await?
            .into_iter()
            .filter(|pod| args.prefix.as_deref().is_none_or(|prefix| pod.starts_with(prefix)))
            .collect();
        let secrets = kubectl.secret_names().await?;
        info!(namespace = %args.namespace, pods = pods.len(), secrets = secrets.len(), "discovered pods and secrets");

        let mut rows = Vec::new();
        for pod in &pods {
            match self.inspect(&kubectl, &mongo, pod, &secrets).await {
                Ok(pod_rows) => rows.extend(pod_rows),
                Err(e) if e.is_per_item() => {
                    warn!(pod = %pod, error = %e, "skipping pod");
                    rows.push(ConnectionRow::failed(pod, failure_note(&e)));
                }
                Err(e) => return Err(e),
            }
        }

        let report = ConnectionReport {
            namespace: args.namespace.clone(),
            rows,
        };
        format.write(out, &report)
    }

    async fn inspect(
        &self,
        kubectl: &KubectlClient,
        mongo: &MongoClient,
        pod: &str,
        secrets: &[String],
    ) -> Result<Vec<ConnectionRow>, CliError> {
        let Some(database) = PodDatabase::open(self.context, kubectl, mongo, pod, secrets).await? else {
            return Ok(vec![ConnectionRow::failed(pod, NO_SECRET.to_string())]);
        };

        let rows = Self::count(mongo, &database.host, &database.secret, pod).await;
        database.close().await;
        rows
    }

    async fn count(
        mongo: &MongoClient,
        host: &str,
        secret: &MongoSecret,
        pod: &str,
    ) -> Result<Vec<ConnectionRow>, CliError> {
        let mut rows = Vec::new();
        for database in mongo.user_databases(host, secret).await? {
            let active = mongo.active_connections(host, secret, &database).await?;
            rows.push(ConnectionRow {
                pod: pod.to_string(),
                database: Some(database),
                active_connections: Some(active),
                safe_to_scale_down: ScaleDown::from_active(active),
                note: None,
            });
        }
        Ok(rows)
    }
}

/// Whether a deployment can be scaled down without cutting clients off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDown {
    /// No active connections.
    Yes,
    /// Clients are still connected.
    No,
    /// The database could not be inspected.
    Unknown,
}

impl ScaleDown {
    /// Verdict for an active connection count.
    #[must_use]
    pub const fn from_active(active: i64) -> Self {
        if active == 0 { Self::Yes } else { Self::No }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
            Self::Unknown => "Unknown",
        }
    }
}

/// One database on one pod, or a pod that could not be inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionRow {
    /// Pod name.
    pub pod: String,
    /// Database name.
    pub database: Option<String>,
    /// Active connection count.
    pub active_connections: Option<i64>,
    /// Verdict.
    pub safe_to_scale_down: ScaleDown,
    /// Why the pod could not be inspected.
    pub note: Option<String>,
}

impl ConnectionRow {
    fn failed(pod: &str, note: String) -> Self {
        Self {
            pod: pod.to_string(),
            database: None,
            active_connections: None,
            safe_to_scale_down: ScaleDown::Unknown,
            note: Some(note),
        }
    }
}

/// Connection counts for a namespace.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    /// Namespace.
    pub namespace: String,
    /// Rows in pod order.
    pub rows: Vec<ConnectionRow>,
}

impl TableDisplay for ConnectionReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        write_header(
            writer,
            &format!("{:<33} {:<40} {:<8} {}", "POD", "DATABASE", "ACTIVE", "SAFE TO SCALE DOWN"),
        )?;
        for row in &self.rows {
            let database = row.database.as_deref().or(row.note.as_deref()).unwrap_or("-");
            let active = row
                .active_connections
                .map_or_else(String::new, |count| count.to_string());
            writeln!(
                writer,
                "{:<33} {:<40} {:<8} {}",
                truncate_display(&row.pod, 30),
                database,
                active,
                row.safe_to_scale_down.label()
            )?;
        }
        let idle = self
            .rows
            .iter()
            .filter(|r| r.safe_to_scale_down == ScaleDown::Yes)
            .count();
        write_footer(writer, &format!("Idle databases: {idle}/{}", self.rows.len()))
    }
}
