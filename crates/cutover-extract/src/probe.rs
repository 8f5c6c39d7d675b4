//! HTTP probe (`curl -v`) extraction.
//!
//! curl writes its diagnostics to stderr: `* Connected to host (ip) port N`,
//! `*  SSL certificate verify ok.` and `< HTTP/1.1 200 OK`. The response
//! body goes to stdout.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

/// Resolved-address value when the host could not be resolved or reached.
pub const UNRESOLVED: &str = "could not resolve host";

/// TLS summary when the connection was not TLS.
pub const NO_TLS: &str = "no TLS";

const CONNECTED_MARKER: &str = "Connected to";
const TLS_MARKER: &str = "SSL cert";
const STATUS_MARKER: &str = "< HTTP/";

static CONNECTED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<host>[a-zA-Z0-9.-]*) \((?P<ip>[0-9a-fA-F.:]+)\) port (?P<port>[0-9]{1,5})")
        .unwrap_or_else(|_| unreachable!())
});

static STATUS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9]{3}\b").unwrap_or_else(|_| unreachable!()));

/// Result of probing one URL. Always fully populated.
///
/// Resolution failure is signalled by [`ip`](Self::ip) holding
/// [`UNRESOLVED`], not by an error; check [`is_resolved`](Self::is_resolved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UptimeProbeResult {
    /// Host name, as reported by the tool (or as requested when unresolved).
    pub host: String,
    /// Address the tool connected to, or [`UNRESOLVED`].
    pub ip: String,
    /// Port the tool connected to, `0` when unresolved.
    pub port: u16,
    /// Requested path.
    pub path: String,
    /// One-line certificate summary, [`NO_TLS`] for plain HTTP, empty when
    /// unresolved.
    pub tls: String,
    /// Three-digit status code of the first response, empty when
    /// unresolved.
    pub http_status: String,
    /// Response body.
    pub body: String,
}

impl UptimeProbeResult {
    /// Row for a host that could not be resolved or reached.
    #[must_use]
    pub fn unresolved(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ip: UNRESOLVED.to_string(),
            port: 0,
            path: path.into(),
            tls: String::new(),
            http_status: String::new(),
            body: String::new(),
        }
    }

    /// Whether the host resolved and answered.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.ip != UNRESOLVED
    }

    /// Whether the first response was a 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.http_status.starts_with('2')
    }

    /// Whether TLS was used and the certificate check passed.
    #[must_use]
    pub fn tls_ok(&self) -> bool {
        !self.tls.is_empty() && self.tls != NO_TLS && !self.tls.contains("problem")
    }
}

/// Build a probe result from curl's verbose `diagnostics` (stderr) and
/// `body` (stdout).
///
/// Never fails: when the connection or status marker is missing the
/// [`UptimeProbeResult::unresolved`] row is returned.
#[must_use]
pub fn extract_uptime(
    requested_host: &str,
    path: &str,
    diagnostics: &str,
    body: &str,
) -> UptimeProbeResult {
    let tls = diagnostics
        .lines()
        .find(|line| line.contains(TLS_MARKER))
        .map_or_else(
            || NO_TLS.to_string(),
            |line| line.trim_start_matches(['*', ' ']).trim_end().to_string(),
        );

    let connected = diagnostics
        .lines()
        .find(|line| line.contains(CONNECTED_MARKER))
        .and_then(|line| CONNECTED_REGEX.captures(line));
    let status = diagnostics
        .lines()
        .find(|line| line.contains(STATUS_MARKER))
        .and_then(|line| {
            let rest = line.split_once(STATUS_MARKER).map_or(line, |(_, rest)| rest);
            STATUS_REGEX.find(rest)
        });

    let (Some(connected), Some(status)) = (connected, status) else {
        warn!(host = requested_host, path, "probe output missing connection or status, host unresolved");
        return UptimeProbeResult::unresolved(requested_host, path);
    };

    let Ok(port) = connected["port"].parse() else {
        return UptimeProbeResult::unresolved(requested_host, path);
    };

    UptimeProbeResult {
        host: connected["host"].to_string(),
        ip: connected["ip"].to_string(),
        port,
        path: path.to_string(),
        tls,
        http_status: status.as_str().to_string(),
        body: body.to_string(),
    }
}
