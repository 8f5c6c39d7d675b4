//! HTTP uptime probe.

use std::io::Write;

use cutover_extract::probe::UNRESOLVED;
use cutover_extract::{UptimeProbeResult, truncate_display};
use serde::Serialize;
use tracing::warn;

use crate::cli::UptimeArgs;
use crate::client::{CurlClient, Resolution, UrlTarget};
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, write_footer, write_header};
use crate::settings::Context;

/// Handler for the uptime command.
pub struct UptimeCommand<'a> {
    context: &'a Context,
}

impl<'a> UptimeCommand<'a> {
    /// Creates a new uptime command handler.
    #[must_use]
    pub const fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Probes every URL, one row each.
    ///
    /// All URLs are parsed before `curl` runs. Without `--static-ip`,
    /// `curl` must support `--dns-servers`.
    ///
    /// # Errors
    ///
    /// Returns error for an invalid URL, a missing or unsupported `curl`,
    /// or when output fails.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &UptimeArgs,
    ) -> Result<(), CliError> {
        let targets = args
            .urls
            .iter()
            .map(|url| UrlTarget::parse(url, &self.context.network))
            .collect::<Result<Vec<_>, _>>()?;

        let curl = self.context.require(&self.context.curl(args.static_ip.is_none())).await?;
        let client = CurlClient::new(curl.path, self.context.exec);
        let resolution = args.static_ip.as_deref().map_or(
            Resolution::Resolver(&self.context.network.dns_resolver),
            Resolution::Static,
        );

        let mut probes = Vec::with_capacity(targets.len());
        for target in &targets {
            let probe = match client.probe(target, resolution).await {
                Ok(result) => UptimeRow {
                    url: target.url(),
                    result,
                    error: None,
                },
                Err(e) if e.is_per_item() => {
                    warn!(url = %target.url(), error = %e, "probe failed");
                    UptimeRow {
                        url: target.url(),
                        result: UptimeProbeResult::unresolved(&target.host, &target.path),
                        error: Some(e.to_string()),
                    }
                }
                Err(e) => return Err(e),
            };
            probes.push(probe);
        }

        format.write(out, &UptimeReport { probes })
    }
}

/// One probed URL.
#[derive(Debug, Clone, Serialize)]
pub struct UptimeRow {
    /// Normalised URL.
    pub url: String,
    /// Extracted probe fields.
    #[serde(flatten)]
    pub result: UptimeProbeResult,
    /// Probe failure (timeout, start failure).
    pub error: Option<String>,
}

/// All probe rows.
#[derive(Debug, Clone, Serialize)]
pub struct UptimeReport {
    /// Rows in argument order.
    pub probes: Vec<UptimeRow>,
}

impl TableDisplay for UptimeReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        write_header(
            writer,
            &format!(
                "{:<30} {:<24} {:<6} {:<20} {:<6} {}",
                "HOST", "IP", "PORT", "PATH", "STATUS", "TLS"
            ),
        )?;

        for row in &self.probes {
            let probe = &row.result;
            let (ip, port) = if probe.is_resolved() {
                (probe.ip.clone(), probe.port.to_string())
            } else {
                (UNRESOLVED.to_string(), "-".to_string())
            };
            let tls = row.error.as_deref().unwrap_or(&probe.tls);
            writeln!(
                writer,
                "{:<30} {:<24} {:<6} {:<20} {:<6} {}",
                truncate_display(&probe.host, 30),
                ip,
                port,
                truncate_display(&probe.path, 20),
                if probe.http_status.is_empty() { "-" } else { probe.http_status.as_str() },
                truncate_display(tls, 60),
            )?;
        }

        let up = self.probes.iter().filter(|r| r.result.is_success()).count();
        write_footer(writer, &format!("Up: {up}/{}", self.probes.len()))
    }
}
