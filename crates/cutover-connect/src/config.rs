//! Retry and network configuration.

use cutover_exec::config::millis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded polling behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first one included. `0` behaves as `1`.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    #[serde(with = "millis")]
    pub interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl RetryConfig {
    /// Whether another attempt may follow attempt number `attempt`
    /// (1-based).
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Set the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the pause between attempts.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Addresses and ports the workflows use, passed explicitly instead of
/// living in globals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Resolver queried for propagation checks.
    pub dns_resolver: String,
    /// Plain HTTP port.
    pub http_port: u16,
    /// HTTPS port.
    pub https_port: u16,
    /// Local end of database tunnels.
    pub local_database_port: u16,
    /// Database port inside the cluster.
    pub remote_database_port: u16,
    /// Host the local end of a tunnel listens on.
    pub local_host: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            dns_resolver: "8.8.8.8".to_string(),
            http_port: 80,
            https_port: 443,
            local_database_port: 27099,
            remote_database_port: 27017,
            local_host: "localhost".to_string(),
        }
    }
}

impl NetworkConfig {
    /// `host:port` of the local end of a database tunnel.
    #[must_use]
    pub fn forwarded_database_host(&self) -> String {
        format!("{}:{}", self.local_host, self.local_database_port)
    }

    /// Port for a scheme.
    #[must_use]
    pub const fn port_for(&self, https: bool) -> u16 {
        if https { self.https_port } else { self.http_port }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_retry_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.interval, Duration::from_secs(1));
    }

    #[test_case(3, 1, true ; "first of three")]
    #[test_case(3, 2, true ; "second of three")]
    #[test_case(3, 3, false ; "budget spent")]
    #[test_case(1, 1, false ; "single attempt")]
    #[test_case(0, 1, false ; "zero behaves as one")]
    fn test_should_retry(max_attempts: u32, attempt: u32, expected: bool) {
        let config = RetryConfig::default().with_max_attempts(max_attempts);
        assert_eq!(config.should_retry(attempt), expected);
    }

    #[test]
    fn test_network_defaults() {
        let network = NetworkConfig::default();
        assert_eq!(network.dns_resolver, "8.8.8.8");
        assert_eq!(network.forwarded_database_host(), "localhost:27099");
        assert_eq!(network.remote_database_port, 27017);
        assert_eq!(network.port_for(true), 443);
        assert_eq!(network.port_for(false), 80);
    }

    #[test]
    fn test_partial_json() {
        let retry: RetryConfig = serde_json::from_str(r#"{"interval": 250}"#).expect("json");
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.interval, Duration::from_millis(250));

        let network: NetworkConfig = serde_json::from_str(r#"{"dns_resolver": "1.1.1.1"}"#).expect("json");
        assert_eq!(network.dns_resolver, "1.1.1.1");
        assert_eq!(network.local_database_port, 27099);
    }
}
