//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`tools`] - Tool resolution report
//! - [`dns`] - DNS propagation check
//! - [`uptime`] - HTTP uptime probe
//! - [`secret`] - Secret inspection
//! - [`mongo_connections`] - Active database connections per pod
//! - [`mongo_size`] - Collection sizes per pod
//! - [`mongo_primary`] - Forwarder repointing to the replica set primary
//! - [`scale`] - Deployment replica scaling

mod database;
pub mod dns;
pub mod mongo_connections;
pub mod mongo_primary;
pub mod mongo_size;
pub mod scale;
pub mod secret;
pub mod tools;
pub mod uptime;

pub use database::{NO_SECRET, UNREACHABLE};
pub use dns::DnsCommand;
pub use mongo_connections::MongoConnectionsCommand;
pub use mongo_primary::MongoPrimaryCommand;
pub use mongo_size::MongoSizeCommand;
pub use scale::ScaleCommand;
pub use secret::SecretCommand;
pub use tools::ToolsCommand;
pub use uptime::UptimeCommand;
