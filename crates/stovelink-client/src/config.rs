//! Client configuration.
//!
//! The only piece the host has to provide is the device address; everything
//! else defaults to values validated against observed device behavior. The
//! polling intervals are deliberately configurable: the firmware
//! documentation does not pin them down, it only describes relative
//! cadence (live state sub-minute, statistics minute-scale).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, ClientResult};

/// Fixed device port for the stove protocol.
pub const DEFAULT_PORT: u16 = 8080;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct StoveConfig {
    /// Device host name or IP.
    pub host: String,

    /// Device port.
    pub port: u16,

    /// Time allowed for the TCP connect.
    pub connect_timeout: Duration,

    /// Time allowed for each correlated request.
    pub request_timeout: Duration,

    /// Interval between live-state polling cycles.
    pub state_interval: Duration,

    /// Interval between statistics polling cycles.
    pub statistics_interval: Duration,

    /// First reconnect backoff delay.
    pub initial_backoff: Duration,

    /// Backoff cap.
    pub max_backoff: Duration,

    /// Backoff growth factor.
    pub backoff_multiplier: f64,

    /// Consecutive fully-failed state cycles before the link is reported
    /// degraded.
    pub degraded_after: u32,

    /// Further fully-failed state cycles, after degradation, before the
    /// session is torn down and reconnected.
    pub reconnect_after: u32,
}

impl StoveConfig {
    /// Creates a configuration for the given device host with defaults.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            state_interval: Duration::from_secs(5),
            statistics_interval: Duration::from_secs(60),
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
            backoff_multiplier: 2.0,
            degraded_after: 3,
            reconnect_after: 3,
        }
    }

    /// Builder: set the device port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder: set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder: set the state-tier polling interval.
    pub fn with_state_interval(mut self, interval: Duration) -> Self {
        self.state_interval = interval;
        self
    }

    /// Builder: set the statistics-tier polling interval.
    pub fn with_statistics_interval(mut self, interval: Duration) -> Self {
        self.statistics_interval = interval;
        self
    }

    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Builder: set degradation thresholds.
    pub fn with_degradation(mut self, degraded_after: u32, reconnect_after: u32) -> Self {
        self.degraded_after = degraded_after.max(1);
        self.reconnect_after = reconnect_after.max(1);
        self
    }

    /// The `host:port` address of the device.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Backoff delay before connect attempt `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_backoff.as_secs_f64();
        let delay = base * self.backoff_multiplier.powi(attempt as i32 - 1);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}

/// Optional TOML config file merged over the defaults.
///
/// All fields are optional; command-line flags win over the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Device host name or IP.
    pub host: Option<String>,
    /// Device port.
    pub port: Option<u16>,
    /// State-tier polling interval in seconds.
    pub state_interval_secs: Option<u64>,
    /// Statistics-tier polling interval in seconds.
    pub statistics_interval_secs: Option<u64>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Loads and parses a TOML config file.
    pub fn load(path: &Path) -> ClientResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            ClientError::config(format!("cannot read {}: {}", path.display(), err))
        })?;
        toml::from_str(&text)
            .map_err(|err| ClientError::config(format!("cannot parse {}: {}", path.display(), err)))
    }

    /// Applies file values on top of a configuration.
    pub fn apply(&self, mut config: StoveConfig) -> StoveConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.state_interval_secs {
            config.state_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.statistics_interval_secs {
            config.statistics_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }
}

/// Default config file location (`<config dir>/stovelink/config.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stovelink").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = StoveConfig::new("stove.local");
        assert_eq!(config.host, "stove.local");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.state_interval, Duration::from_secs(5));
        assert_eq!(config.statistics_interval, Duration::from_secs(60));
        assert_eq!(config.degraded_after, 3);
        assert_eq!(config.addr(), "stove.local:8080");
    }

    #[test]
    fn builders() {
        let config = StoveConfig::new("10.0.0.7")
            .with_port(9000)
            .with_state_interval(Duration::from_secs(2))
            .with_degradation(5, 2);

        assert_eq!(config.addr(), "10.0.0.7:9000");
        assert_eq!(config.state_interval, Duration::from_secs(2));
        assert_eq!(config.degraded_after, 5);
        assert_eq!(config.reconnect_after, 2);
    }

    #[test]
    fn degradation_thresholds_never_zero() {
        let config = StoveConfig::new("h").with_degradation(0, 0);
        assert_eq!(config.degraded_after, 1);
        assert_eq!(config.reconnect_after, 1);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = StoveConfig::new("h").with_backoff(
            Duration::from_secs(2),
            Duration::from_secs(30),
            2.0,
        );

        assert_eq!(config.backoff_delay(0), Duration::ZERO);
        assert_eq!(config.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(8));
        assert_eq!(config.backoff_delay(10), Duration::from_secs(30));
    }

    #[test]
    fn config_file_overlay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "host = \"192.168.1.158\"\nport = 8081\nstate_interval_secs = 3"
        )
        .unwrap();

        let parsed = ConfigFile::load(file.path()).unwrap();
        assert_eq!(parsed.host.as_deref(), Some("192.168.1.158"));

        let config = parsed.apply(StoveConfig::new("ignored"));
        assert_eq!(config.port, 8081);
        assert_eq!(config.state_interval, Duration::from_secs(3));
        // Request timeout untouched by the file.
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn config_file_missing() {
        let result = ConfigFile::load(Path::new("/nonexistent/stovelink.toml"));
        assert!(matches!(result, Err(ClientError::Config { .. })));
    }

    #[test]
    fn config_file_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = [not toml").unwrap();
        assert!(matches!(
            ConfigFile::load(file.path()),
            Err(ClientError::Config { .. })
        ));
    }
}
