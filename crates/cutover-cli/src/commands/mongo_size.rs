//! Collection sizes per pod and database.
//!
//! Walks the same pods as `mongo-connections`, then measures every
//! non-system collection of every user database.

use std::io::Write;

use cutover_extract::{CollectionStatistics, pod_to_service_name, truncate_display};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::database::{NO_SECRET, PodDatabase, failure_note};
use crate::cli::MongoSizeArgs;
use crate::client::{KubectlClient, MongoClient};
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, write_footer, write_header};
use crate::settings::Context;

/// Handler for the mongo-size command.
pub struct MongoSizeCommand<'a> {
    context: &'a Context,
}

impl<'a> MongoSizeCommand<'a> {
    /// Creates a new mongo-size command handler.
    #[must_use]
    pub const fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Executes the mongo-size command.
    ///
    /// # Errors
    ///
    /// Returns error if a tool is missing, pods or secrets cannot be
    /// listed, or output fails. Per-pod failures are rows.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &MongoSizeArgs,
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
        info!(namespace = %args.namespace, pods = pods.len(), "measuring collections");

        let mut rows = Vec::new();
        for pod in &pods {
            match self.measure(&kubectl, &mongo, pod, &secrets).await {
                Ok(pod_rows) => rows.extend(pod_rows),
                Err(e) if e.is_per_item() => {
                    warn!(pod = %pod, error = %e, "skipping pod");
                    rows.push(SizeRow::failed(pod, failure_note(&e)));
                }
                Err(e) => return Err(e),
            }
        }

        let report = SizeReport {
            namespace: args.namespace.clone(),
            rows,
        };
        format.write(out, &report)
    }

    async fn measure(
        &self,
        kubectl: &KubectlClient,
        mongo: &MongoClient,
        pod: &str,
        secrets: &[String],
    ) -> Result<Vec<SizeRow>, CliError> {
        let Some(database) = PodDatabase::open(self.context, kubectl, mongo, pod, secrets).await? else {
            return Ok(vec![SizeRow::failed(pod, NO_SECRET.to_string())]);
        };

        let service = pod_to_service_name(pod).unwrap_or_else(|| pod.to_string());
        let rows = Self::collections(mongo, &database, &service).await;
        database.close().await;
        rows
    }

    async fn collections(mongo: &MongoClient, database: &PodDatabase, service: &str) -> Result<Vec<SizeRow>, CliError> {
        let (host, secret) = (database.host.as_str(), &database.secret);

        let mut rows = Vec::new();
        for name in mongo.user_databases(host, secret).await? {
            for collection in mongo.collection_names(host, secret, &name).await? {
                debug!(database = %name, %collection, "measuring collection");
                let statistics = mongo.collection_statistics(host, secret, &name, &collection).await?;
                rows.push(SizeRow {
                    service: service.to_string(),
                    database: Some(name.clone()),
                    collection: Some(collection),
                    statistics: Some(statistics),
                    note: None,
                });
            }
        }
        Ok(rows)
    }
}

/// One collection, or a pod that could not be measured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeRow {
    /// Service the pod belongs to (the pod name when it has no service
    /// suffix).
    pub service: String,
    /// Database name.
    pub database: Option<String>,
    /// Collection name.
    pub collection: Option<String>,
    /// Sizes in bytes.
    #[serde(flatten)]
    pub statistics: Option<CollectionStatistics>,
    /// Why the pod could not be measured.
    pub note: Option<String>,
}

impl SizeRow {
    fn failed(pod: &str, note: String) -> Self {
        Self {
            service: pod.to_string(),
            database: None,
            collection: None,
            statistics: None,
            note: Some(note),
        }
    }
}

/// Collection sizes for a namespace.
#[derive(Debug, Clone, Serialize)]
pub struct SizeReport {
    /// Namespace.
    pub namespace: String,
    /// Rows in pod, database and collection order.
    pub rows: Vec<SizeRow>,
}

impl TableDisplay for SizeReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        write_header(
            writer,
            &format!(
                "{:<30} {:<20} {:<30} {:>10} {:>10} {:>14}",
                "SERVICE", "DATABASE", "COLLECTION", "DOC", "AVG DOC", "SIZE"
            ),
        )?;

        for row in &self.rows {
            match &row.statistics {
                Some(stats) => writeln!(
                    writer,
                    "{:<30} {:<20} {:<30} {:>10} {:>10} {:>14}",
                    truncate_display(&row.service, 30),
                    row.database.as_deref().unwrap_or("-"),
                    truncate_display(row.collection.as_deref().unwrap_or("-"), 30),
                    stats.document_size,
                    stats.average_document_size,
                    stats.collection_size
                )?,
                None => writeln!(
                    writer,
                    "{:<30} {}",
                    truncate_display(&row.service, 30),
                    row.note.as_deref().unwrap_or("-")
                )?,
            }
        }

        let total: i64 = self
            .rows
            .iter()
            .filter_map(|row| row.statistics.map(|stats| stats.collection_size))
            .sum();
        let measured = self.rows.iter().filter(|r| r.statistics.is_some()).count();
        write_footer(writer, &format!("Total: {total} bytes in {measured} collections"))
    }
}
