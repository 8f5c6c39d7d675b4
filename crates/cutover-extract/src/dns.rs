//! DNS resolver (`dig`) answer extraction and propagation checks.

use crate::classify::DIG;
use crate::error::Result;
use serde::Serialize;
use tracing::warn;

/// Marker of the line introducing the answers.
const ANSWER_MARKER: &str = "ANSWER SECTION";

/// Marker of the section that follows the answers.
const AUTHORITY_MARKER: &str = "AUTHORITY SECTION";

/// One line of a resolver answer section:
/// `name TTL CLASS TYPE value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsAnswerRecord {
    /// Owner name, as printed (usually with a trailing dot).
    pub source: String,
    /// Time to live in seconds.
    pub ttl: u32,
    /// Class token, normally `IN`.
    pub class: String,
    /// Record type token (`A`, `CNAME`, ...).
    pub record_type: String,
    /// Record data. Multi-token data such as `MX` preference and host is
    /// kept space-joined.
    pub destination: String,
}

impl DnsAnswerRecord {
    fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let source = tokens.next()?.to_string();
        let ttl = tokens.next()?.parse().ok()?;
        let class = tokens.next()?.to_string();
        let record_type = tokens.next()?.to_string();
        let destination = tokens.collect::<Vec<_>>().join(" ");
        if destination.is_empty() {
            return None;
        }

        Some(Self {
            source,
            ttl,
            class,
            record_type,
            destination,
        })
    }
}

/// Extract the answer records from resolver output, in resolver order.
///
/// Output without an answer section, or with an empty one, yields an empty
/// list: "no records" is a valid propagation result. Lines inside the
/// section that do not fit the five-token format are skipped.
///
/// # Errors
///
/// Returns a remote error when the resolver itself reported a failure
/// (unreachable server, unresolvable server name).
pub fn extract_answer_section(output: &str) -> Result<Vec<DnsAnswerRecord>> {
    DIG.check(output)?;

    let records = output
        .lines()
        .skip_while(|line| !line.contains(ANSWER_MARKER))
        .skip(1)
        .take_while(|line| !line.contains(AUTHORITY_MARKER) && !line.trim_start().starts_with(";;"))
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';'))
        .filter_map(|line| {
            let record = DnsAnswerRecord::parse(line);
            if record.is_none() {
                warn!(line, "skipping malformed answer line");
            }
            record
        })
        .collect();

    Ok(records)
}

/// What a host is expected to resolve to after cutover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DnsExpectation {
    /// Some record's data equals this address exactly.
    ARecord(String),
    /// Some record's data contains this target name.
    Cname(String),
}

impl DnsExpectation {
    /// Whether one record satisfies the expectation.
    #[must_use]
    pub fn is_met_by(&self, record: &DnsAnswerRecord) -> bool {
        match self {
            Self::ARecord(address) => record.destination == *address,
            Self::Cname(target) => record.destination.contains(target.as_str()),
        }
    }
}

/// Outcome of comparing a resolver answer with the expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationStatus {
    /// At least one record matches.
    Propagated,
    /// The resolver returned no records.
    NoAnswer,
    /// Records came back but none match.
    Mismatch,
}

impl PropagationStatus {
    /// Whether the change is visible at the resolver.
    #[must_use]
    pub fn is_propagated(self) -> bool {
        matches!(self, Self::Propagated)
    }
}

/// Resolver answer for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsPropagation {
    /// Queried host.
    pub host: String,
    /// Records in resolver order.
    pub records: Vec<DnsAnswerRecord>,
}

impl DnsPropagation {
    /// Extract the answer for `host` from resolver output.
    ///
    /// # Errors
    ///
    /// See [`extract_answer_section`].
    pub fn from_output(host: impl Into<String>, output: &str) -> Result<Self> {
        Ok(Self {
            host: host.into(),
            records: extract_answer_section(output)?,
        })
    }

    /// Compare the answer with `expectation`.
    #[must_use]
    pub fn evaluate(&self, expectation: &DnsExpectation) -> PropagationStatus {
        if self.records.is_empty() {
            PropagationStatus::NoAnswer
        } else if self.records.iter().any(|r| expectation.is_met_by(r)) {
            PropagationStatus::Propagated
        } else {
            PropagationStatus::Mismatch
        }
    }
}
