//! Execution timing configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default hard ceiling for one-shot commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay before a freshly started long-lived process is checked.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Default time allowed for a killed process tree to be reaped.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(1);

/// Default ceiling for capability probes.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timing knobs shared by every [`ManagedProcess`](crate::ManagedProcess).
///
/// Passed explicitly at construction; there is no process-wide default
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Hard ceiling for one-shot commands.
    #[serde(with = "millis")]
    pub command_timeout: Duration,
    /// Delay callers wait after starting a long-lived process.
    #[serde(with = "millis")]
    pub settle_delay: Duration,
    /// How long to wait for a killed tree to exit before giving up.
    #[serde(with = "millis")]
    pub kill_grace: Duration,
    /// Ceiling for capability probes.
    #[serde(with = "millis")]
    pub probe_timeout: Duration,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            kill_grace: DEFAULT_KILL_GRACE,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl ExecConfig {
    /// Set the one-shot command ceiling.
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the settle delay for long-lived processes.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the reap grace period after a forced kill.
    #[must_use]
    pub const fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Set the capability probe ceiling.
    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// The config used for capability probes: same knobs, shorter ceiling.
    #[must_use]
    pub const fn for_probe(self) -> Self {
        self.with_command_timeout(self.probe_timeout)
    }
}

/// Serialize durations as integer milliseconds.
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a duration as milliseconds.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    /// Deserialize a duration from milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
