//! Events delivered to consumers of the client facade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::StoveValue;

/// One decoded per-command update, delivered as responses arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoveUpdate {
    /// Device key the update belongs to.
    pub command: String,
    /// The decoded value.
    pub value: StoveValue,
    /// When the answer frame was decoded.
    pub received_at: DateTime<Utc>,
}

impl StoveUpdate {
    /// Creates an update stamped with the current time.
    pub fn now(command: impl Into<String>, value: StoveValue) -> Self {
        Self {
            command: command.into(),
            value,
            received_at: Utc::now(),
        }
    }
}

/// Connection lifecycle state of the client facade.
///
/// Drives whether polling is active and lets consumers mark their sensors
/// unavailable instead of crashing when the link goes stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session; a retry may be scheduled.
    #[default]
    Disconnected,
    /// Session being established, identity tier not yet fetched.
    Connecting,
    /// Session live, polling active.
    Connected,
    /// Session live but recent state cycles produced no answers.
    Degraded,
}

impl ConnectionState {
    /// True if a transport session currently exists.
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Connected | Self::Degraded)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Degraded => "degraded",
        };
        write!(f, "{}", label)
    }
}
