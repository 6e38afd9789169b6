//! Core types for the stovelink client: the command registry, decoded
//! values, the stove snapshot, connection state, and tracing setup.

pub mod command;
pub mod event;
pub mod snapshot;
pub mod tracing;
pub mod value;

pub use command::{COMMANDS, CadenceTier, Command, SeriesKey, ValueRule};
pub use event::{ConnectionState, StoveUpdate};
pub use snapshot::{SnapshotEntry, StoveSnapshot};
pub use tracing::{LogFormat, TracingConfig, TracingError, init_tracing};
pub use value::{BurnPhase, StoveValue, ValueError, ValueResult, parse_series};
