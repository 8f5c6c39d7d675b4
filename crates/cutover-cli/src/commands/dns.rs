//! DNS propagation check.
//!
//! Each host is queried at the resolver and its answer compared with the
//! expected A record or CNAME target. A failed query becomes a row for
//! that host and the remaining hosts are still checked.

use std::io::Write;

use cutover_extract::{DnsAnswerRecord, DnsExpectation, PropagationStatus, truncate_display};
use serde::Serialize;
use tracing::warn;

use crate::cli::DnsArgs;
use crate::client::DigClient;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, write_footer, write_header};
use crate::settings::Context;

/// Destination shown when the resolver returned no records.
pub const NO_ANSWER: &str = "No answer from NS";

/// Handler for the dns command.
pub struct DnsCommand<'a> {
    context: &'a Context,
}

impl<'a> DnsCommand<'a> {
    /// Creates a new dns command handler.
    #[must_use]
    pub const fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Executes the dns command.
    ///
    /// # Errors
    ///
    /// Returns error if `dig` cannot be resolved or output fails.
    pub async fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat, args: &DnsArgs) -> Result<(), CliError> {
        let expectation = expectation(args)?;
        let dig = self.context.require(&self.context.dig()).await?;
        let client = DigClient::new(dig.path, self.context.exec);
        let resolver = args.dns.as_deref().unwrap_or(&self.context.network.dns_resolver);

        let mut hosts = Vec::with_capacity(args.hosts.len());
        for host in &args.hosts {
            let report = match client.query(resolver, host).await {
                Ok(answer) => HostReport {
                    host: host.clone(),
                    status: Some(answer.evaluate(&expectation)),
                    records: answer.records,
                    error: None,
                },
                Err(e) if e.is_per_item() => {
                    warn!(host = %host, error = %e, "dns query failed");
                    HostReport {
                        host: host.clone(),
                        status: None,
                        records: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
                Err(e) => return Err(e),
            };
            hosts.push(report);
        }

        let report = DnsReport {
            resolver: resolver.to_string(),
            expectation,
            hosts,
        };
        format.write(out, &report)
    }
}

fn expectation(args: &DnsArgs) -> Result<DnsExpectation, CliError> {
    match (&args.a_record, &args.cname) {
        (Some(address), None) => Ok(DnsExpectation::ARecord(address.clone())),
        (None, Some(target)) => Ok(DnsExpectation::Cname(target.clone())),
        _ => Err(CliError::InvalidArgument(
            "exactly one of --a-record or --cname is required".into(),
        )),
    }
}

/// Answer and verdict for one host.
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    /// Queried host.
    pub host: String,
    /// Verdict, absent when the query failed.
    pub status: Option<PropagationStatus>,
    /// Records in resolver order.
    pub records: Vec<DnsAnswerRecord>,
    /// Query failure.
    pub error: Option<String>,
}

/// Propagation check result.
#[derive(Debug, Clone, Serialize)]
pub struct DnsReport {
    /// Resolver that was queried.
    pub resolver: String,
    /// What the hosts should resolve to.
    pub expectation: DnsExpectation,
    /// One entry per host, in argument order.
    pub hosts: Vec<HostReport>,
}

impl TableDisplay for DnsReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        write_header(
            writer,
            &format!("{:<30} {:<6} {:<33} {:<6} {}", "HOST", "TYPE", "DESTINATION", "TTL", "PROPAGATED"),
        )?;

        for host in &self.hosts {
            let name = truncate_display(&host.host, 30);
            if let Some(error) = &host.error {
                writeln!(writer, "{name:<30} {:<6} {:<33} {:<6} ?", "-", truncate_display(error, 30), "")?;
            } else if host.records.is_empty() {
                writeln!(writer, "{name:<30} {:<6} {NO_ANSWER:<33} {:<6} No", "-", "")?;
            }
            for record in &host.records {
                let verdict = if self.expectation.is_met_by(record) { "Yes" } else { "No" };
                writeln!(
                    writer,
                    "{name:<30} {:<6} {:<33} {:<6} {verdict}",
                    record.record_type,
                    truncate_display(&record.destination, 30),
                    record.ttl,
                )?;
            }
        }

        let propagated = self
            .hosts
            .iter()
            .filter(|h| h.status.is_some_and(PropagationStatus::is_propagated))
            .count();
        write_footer(writer, &format!("Propagated: {propagated}/{} (resolver {})", self.hosts.len(), self.resolver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;

    fn record(record_type: &str, destination: &str) -> DnsAnswerRecord {
        DnsAnswerRecord {
            source: "shop.example.com.".into(),
            ttl: 300,
            class: "IN".into(),
            record_type: record_type.into(),
            destination: destination.into(),
        }
    }

    fn render(report: &DnsReport) -> String {
        let mut buf = Vec::new();
        OutputFormat::new(Format::Table).write(&mut buf, report).expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn test_table_rows_per_record_and_no_answer() {
        let report = DnsReport {
            resolver: "8.8.8.8".into(),
            expectation: DnsExpectation::ARecord("10.1.2.3".into()),
            hosts: vec![
                HostReport {
                    host: "shop.example.com".into(),
                    status: Some(PropagationStatus::Propagated),
                    records: vec![record("A", "10.9.9.9"), record("A", "10.1.2.3")],
                    error: None,
                },
                HostReport {
                    host: "old.example.com".into(),
                    status: Some(PropagationStatus::NoAnswer),
                    records: Vec::new(),
                    error: None,
                },
            ],
        };

        let out = render(&report);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[2].contains("10.9.9.9") && lines[2].ends_with("No"));
        assert!(lines[3].contains("10.1.2.3") && lines[3].ends_with("Yes"));
        assert!(lines[4].starts_with("old.example.com") && lines[4].contains(NO_ANSWER));
        assert!(out.contains("Propagated: 1/2 (resolver 8.8.8.8)"));
    }

    #[test]
    fn test_error_row() {
        let report = DnsReport {
            resolver: "8.8.8.8".into(),
            expectation: DnsExpectation::Cname("lb.example.net".into()),
            hosts: vec![HostReport {
                host: "shop.example.com".into(),
                status: None,
                records: Vec::new(),
                error: Some("remote connection failed".into()),
            }],
        };

        let out = render(&report);
        assert!(out.contains("remote connection failed"));
        assert!(out.contains("Propagated: 0/1"));
    }

    #[test]
    fn test_expectation_from_args() {
        let args = DnsArgs {
            hosts: vec!["a".into()],
            a_record: None,
            cname: Some("lb.example.net".into()),
            dns: None,
        };
        assert_eq!(expectation(&args).expect("cname"), DnsExpectation::Cname("lb.example.net".into()));

        let args = DnsArgs { a_record: None, cname: None, ..args };
        assert!(matches!(expectation(&args), Err(CliError::InvalidArgument(_))));
    }
}
