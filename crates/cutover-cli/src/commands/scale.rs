//! Deployment replica scaling.

use std::io::Write;

use cutover_extract::text::single_line;
use cutover_extract::truncate_display;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::ScaleArgs;
use crate::client::KubectlClient;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, write_footer, write_header};
use crate::settings::Context;

/// Handler for the scale command.
pub struct ScaleCommand<'a> {
    context: &'a Context,
}

impl<'a> ScaleCommand<'a> {
    /// Creates a new scale command handler.
    #[must_use]
    pub const fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Scales every matching deployment, one row each. A deployment that
    /// fails to scale is a row and the next one is processed.
    ///
    /// # Errors
    ///
    /// Returns error if the cluster tool is missing, deployments cannot be
    /// listed, or output fails.
    pub async fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat, args: &ScaleArgs) -> Result<(), CliError> {
        let tool = self.context.require(&self.context.cluster_tool(args.mode)).await?;
        let kubectl = KubectlClient::new(tool.path, args.namespace.as_str(), self.context.exec)
            .with_kubeconfig(self.context.tools.kubeconfig.clone())
            .with_mode(args.mode);

        if args.prefix.is_none() {
            warn!(namespace = %args.namespace, "no prefix given, scaling every deployment");
        }
        let deployments: Vec<String> = kubectl
            .deployment_names()
            .await?
            .into_iter()
            .filter(|name| args.prefix.as_deref().is_none_or(|prefix| name.contains(prefix)))
            .collect();
        info!(namespace = %args.namespace, deployments = deployments.len(), replicas = args.replicas, "scaling");

        let mut rows = Vec::with_capacity(deployments.len());
        for deployment in deployments {
            let error = match kubectl.scale(&deployment, args.replicas).await {
                Ok(()) => None,
                Err(e) if e.is_per_item() => {
                    warn!(%deployment, error = %e, "scale failed");
                    Some(single_line(&e.to_string()))
                }
                Err(e) => return Err(e),
            };
            rows.push(ScaleRow {
                deployment,
                replicas: args.replicas,
                error,
            });
        }

        let report = ScaleReport {
            namespace: args.namespace.clone(),
            kind: kubectl.deployment_kind().to_string(),
            rows,
        };
        format.write(out, &report)
    }
}

/// One deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleRow {
    /// Deployment name.
    pub deployment: String,
    /// Requested replicas.
    pub replicas: u32,
    /// Why scaling failed.
    pub error: Option<String>,
}

/// Scaling outcome for a namespace.
#[derive(Debug, Clone, Serialize)]
pub struct ScaleReport {
    /// Namespace.
    pub namespace: String,
    /// Resource kind scaled.
    pub kind: String,
    /// Rows in listing order.
    pub rows: Vec<ScaleRow>,
}

impl TableDisplay for ScaleReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        write_header(writer, &format!("{:<40} {:<9} {}", "DEPLOYMENT", "REPLICAS", "STATUS"))?;
        for row in &self.rows {
            let status = row
                .error
                .as_deref()
                .map_or_else(|| "OK".to_string(), |error| truncate_display(error, 20));
            writeln!(writer, "{:<40} {:<9} {}", row.deployment, row.replicas, status)?;
        }
        let scaled = self.rows.iter().filter(|r| r.error.is_none()).count();
        write_footer(writer, &format!("Scaled: {scaled}/{} ({})", self.rows.len(), self.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ClusterMode, Format};

    #[test]
    fn test_table_marks_failures() {
        let report = ScaleReport {
            namespace: "shop".into(),
            kind: "deployment".into(),
            rows: vec![
                ScaleRow {
                    deployment: "orders".into(),
                    replicas: 0,
                    error: None,
                },
                ScaleRow {
                    deployment: "billing".into(),
                    replicas: 0,
                    error: Some("remote operation error: forbidden".into()),
                },
            ],
        };

        let mut buf = Vec::new();
        OutputFormat::new(Format::Table).write(&mut buf, &report).expect("write");
        let out = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[2].starts_with("orders") && lines[2].ends_with("OK"));
        assert!(lines[3].starts_with("billing") && lines[3].contains("remote operation"));
        assert!(out.contains("Scaled: 1/2 (deployment)"));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::settings::{Settings, ToolPaths};
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
            path
        }

        /// Fake `oc`: three deployment configs, `billing` is forbidden.
        const OC: &str = r#"case "$*" in
  *"get dc"*) printf 'deploymentconfig.apps.openshift.io/orders-api\ndeploymentconfig.apps.openshift.io/billing-api\ndeploymentconfig.apps.openshift.io/web\n' ;;
  *"dc/billing-api"*) echo 'Error from server (Forbidden): cannot scale' >&2 ; exit 1 ;;
  *scale*) echo "deploymentconfig.apps.openshift.io/${5#dc/} scaled" ;;
esac"#;

        #[tokio::test]
        async fn test_oc_mode_scales_matching_configs() {
            let dir = tempfile::tempdir().expect("tempdir");
            let context = Context::new(Settings {
                tools: ToolPaths {
                    oc: Some(script(dir.path(), "oc", OC)),
                    ..ToolPaths::default()
                },
                ..Settings::default()
            });
            let args = ScaleArgs {
                namespace: "shop".into(),
                replicas: 0,
                prefix: Some("-api".into()),
                mode: ClusterMode::Oc,
            };

            let mut buf = Vec::new();
            ScaleCommand::new(&context)
                .execute(&mut buf, &OutputFormat::new(Format::Json), &args)
                .await
                .expect("execute");
            let report: serde_json::Value = serde_json::from_slice(&buf).expect("json");
            let rows = report["rows"].as_array().expect("rows");

            assert_eq!(report["kind"], "dc");
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0]["deployment"], "orders-api");
            assert!(rows[0]["error"].is_null());
            assert_eq!(rows[1]["deployment"], "billing-api");
            assert!(rows[1]["error"].as_str().is_some_and(|e| e.contains("Forbidden")));
        }

        #[tokio::test]
        async fn test_missing_oc_names_option() {
            let dir = tempfile::tempdir().expect("tempdir");
            let context = Context::with_locator(
                Settings::default(),
                cutover_exec::ExecutableLocator::with_search_path(dir.path()),
            );
            let args = ScaleArgs {
                namespace: "shop".into(),
                replicas: 1,
                prefix: None,
                mode: ClusterMode::Oc,
            };

            let err = ScaleCommand::new(&context)
                .execute(&mut Vec::<u8>::new(), &OutputFormat::new(Format::Table), &args)
                .await
                .expect_err("oc missing");
            assert!(err.to_string().contains("--oc"));
        }
    }
}
