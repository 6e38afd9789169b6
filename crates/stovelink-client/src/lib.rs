//! Stove client: transport session, request/response correlator,
//! multi-cadence poll scheduler, and the client facade.
//!
//! The facade is the single entry point. It keeps one persistent
//! connection to the device, polls every known command on its cadence
//! tier, and exposes the decoded results:
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use stovelink_client::{StoveClient, StoveConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = StoveClient::new(StoveConfig::new("192.168.1.158"));
//!
//!     let mut updates = client.subscribe();
//!     while let Ok(update) = updates.recv().await {
//!         println!("{} = {}", update.command, update.value);
//!     }
//!     client.close().await;
//! }
//! ```
//!
//! Connection loss is never fatal: the client reconnects with capped
//! backoff and surfaces staleness through
//! [`ConnectionState`](stovelink_core::ConnectionState).

pub mod cli;
pub mod config;
pub mod correlator;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod stove;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{ConfigFile, DEFAULT_PORT, StoveConfig, default_config_path};
pub use correlator::{Correlator, UnsolicitedAnswer};
pub use error::{ClientError, ClientResult};
pub use scheduler::{PollScheduler, TierEvent};
pub use session::{Session, SessionFrames, SessionWriter};
pub use stove::StoveClient;
