//! # cutover-cli
//!
//! Command-line front-end for migration cutover checks.
//!
//! Provides commands for:
//! - Resolving the external tools (`dig`, `curl`, `kubectl`, `mongo`)
//! - DNS propagation checks
//! - HTTP uptime probes
//! - Secret inspection
//! - Active database connection counts per pod
//!
//! # Architecture
//!
//! Commands never talk to a cluster or a server directly. They drive the
//! external tools through [`client`], which runs them with `cutover-exec`
//! and parses their output with `cutover-extract`. Tunnels and readiness
//! polling come from `cutover-connect`.
//!
//! ```text
//! ┌─────────────┐   ProcessSpec    ┌──────────────┐   stdout/stderr   ┌─────────────────┐
//! │ cutover-cli │─────────────────►│ cutover-exec │──────────────────►│ cutover-extract │
//! └─────────────┘                  └──────────────┘                   └─────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod client;
pub mod commands;
pub mod error;
pub mod output;
pub mod settings;

pub use cli::{Cli, Commands, Format, LogFormat};
pub use error::CliError;
pub use output::OutputFormat;
pub use settings::{Context, Settings};
