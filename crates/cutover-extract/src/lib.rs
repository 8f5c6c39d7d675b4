//! Output extraction for cutover.
//!
//! Pure parsers, one per tool dialect, turning captured text into typed
//! records. Nothing here performs I/O.
//!
//! - [`dns`]: resolver answer sections and propagation checks
//! - [`probe`]: HTTP probe diagnostics with sentinel fallbacks
//! - [`secret`]: base64 secret payloads
//! - [`eval`] and [`mongo`]: shell `--eval` scalars and JSON records
//! - [`kube`]: cluster resource names and command confirmations
//!
//! Output that may carry error prose is checked with [`classify`] before
//! any positional parsing.
//!
//! # Example
//!
//! ```rust
//! use cutover_extract::{DnsExpectation, DnsPropagation, PropagationStatus};
//!
//! let output = ";; ANSWER SECTION:\nshop.example.com. 300 IN A 203.0.113.10\n";
//! let answer = DnsPropagation::from_output("shop.example.com", output)?;
//! let status = answer.evaluate(&DnsExpectation::ARecord("203.0.113.10".into()));
//! assert_eq!(status, PropagationStatus::Propagated);
//! # Ok::<(), cutover_extract::ExtractError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod classify;
pub mod dns;
pub mod error;
pub mod eval;
pub mod kube;
pub mod mongo;
pub mod probe;
pub mod secret;
pub mod text;

pub use classify::ErrorMarkers;
pub use dns::{DnsAnswerRecord, DnsExpectation, DnsPropagation, PropagationStatus, extract_answer_section};
pub use error::{ExtractError, Result};
pub use eval::{parse_int, parse_string_list};
pub use kube::{pod_to_service_name, resource_names, scaled_confirmed};
pub use mongo::{CollectionStatistics, MongoClusterInfo, MongoSecret};
pub use probe::{UptimeProbeResult, extract_uptime};
pub use secret::SecretPayload;
pub use text::truncate_display;
