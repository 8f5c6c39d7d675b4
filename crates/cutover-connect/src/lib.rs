//! Tunnels and bounded connectivity polling for cutover.
//!
//! Workflows that talk to an in-cluster service first open a port-forward
//! tunnel, then poll the service through it. [`RetryPolicy`] is the one
//! poll loop used for every such wait, and [`establish_and_probe`] combines
//! it with a [`TunnelHandle`] so a caller either receives a live tunnel or
//! an error with the tunnel already torn down. [`establish_and_fetch`] does
//! the same for a probe that reads a value through the tunnel.
//!
//! # Example
//!
//! ```rust,no_run
//! use cutover_connect::{establish_and_probe, NetworkConfig, PortForward, RetryPolicy};
//! use cutover_exec::ExecConfig;
//!
//! # async fn example() -> cutover_connect::Result<()> {
//! let network = NetworkConfig::default();
//! let tunnel = PortForward::new("kubectl", "shop", "orders-db-5d8f-x2k",
//!         network.local_database_port, network.remote_database_port)
//!     .into_tunnel(ExecConfig::default(), network.local_host.clone());
//!
//! let tunnel = establish_and_probe(tunnel, &RetryPolicy::default(), |_| async { true }).await?;
//! println!("forwarding on {}", tunnel.local_address());
//! tunnel.close().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod retry;
pub mod tunnel;

pub use config::{NetworkConfig, RetryConfig};
pub use error::{ConnectError, Result};
pub use retry::RetryPolicy;
pub use tunnel::{establish_and_fetch, establish_and_probe, PortForward, TunnelHandle};
