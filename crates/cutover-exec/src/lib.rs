//! External process execution for cutover.
//!
//! This crate runs the command-line tools the migration workflows drive
//! (`dig`, `curl`, `kubectl`, `mongo`, ...) and guarantees that nothing it
//! spawns outlives the value that owns it.
//!
//! # Features
//!
//! - Tool resolution on the search path with explicit-path overrides and
//!   capability probes
//! - One-shot runs with concurrent stdout/stderr capture and a hard ceiling
//! - Long-lived processes (tunnels) with idempotent stop
//! - Whole process-tree termination on every exit path, including drop
//!
//! # Example
//!
//! ```rust,no_run
//! use cutover_exec::{ExecConfig, ExecutableLocator, ManagedProcess, ProcessSpec};
//!
//! # async fn example() -> cutover_exec::Result<()> {
//! let locator = ExecutableLocator::from_env();
//! if let Some(dig) = locator.resolve(None, "dig") {
//!     let spec = ProcessSpec::new(dig).args(["@8.8.8.8", "example.com"]);
//!     let result = ManagedProcess::run(spec, ExecConfig::default()).await?;
//!     println!("{}", result.stdout());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod locator;
pub mod output;
pub mod process;
pub mod spec;
pub mod tree;

pub use config::ExecConfig;
pub use error::{ExecError, Result};
pub use locator::{ExecutableLocator, ResolvedTool, ToolRequirement};
pub use output::{ProcessResult, TIMED_OUT_EXIT_CODE, UNKNOWN_EXIT_CODE};
pub use process::{ManagedProcess, ProcessState};
pub use spec::{parse_arguments, validate_argument, ProcessSpec};
pub use tree::{platform_tree, ProcessTree};
