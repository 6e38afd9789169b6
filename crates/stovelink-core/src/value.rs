//! Decoded value model for stove readings.
//!
//! The device answers every request with a plain text value. How that text
//! is interpreted (integer, decimal, enum code, free text, or a
//! semicolon-delimited history series) is declared per command in the
//! [`crate::command`] registry; this module holds the decoded
//! representation and the burn-phase interpretation of `appPhase` codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for value parsing.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors that can occur while interpreting a raw device value.
#[derive(Debug, Error)]
pub enum ValueError {
    /// The raw text did not parse as the expected number type.
    #[error("'{raw}' is not a valid {expected}")]
    InvalidNumber {
        raw: String,
        expected: &'static str,
    },

    /// An enum-coded value was outside its declared range.
    #[error("enum code {code} out of range (max {max})")]
    EnumOutOfRange { code: i64, max: u8 },
}

/// A decoded stove reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoveValue {
    /// Whole-number reading (counters, error codes, enum codes).
    Integer(i64),
    /// Fractional reading (temperature, performance percentages).
    Decimal(f64),
    /// Free-text reading (device identity fields).
    Text(String),
    /// Ordered history series (performance samples).
    Series(Vec<i64>),
}

impl StoveValue {
    /// Returns the integer value, if this is an integer reading.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a float for both integer and decimal readings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Decimal(x) => Some(*x),
            _ => None,
        }
    }

    /// Returns the text value, if this is a text reading.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the series samples, if this is a series reading.
    pub fn as_series(&self) -> Option<&[i64]> {
        match self {
            Self::Series(samples) => Some(samples),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoveValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Decimal(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
            Self::Series(samples) => {
                let joined: Vec<String> = samples.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", joined.join(";"))
            }
        }
    }
}

/// Burn phase reported by the stove through `appPhase`.
///
/// Codes observed from the device firmware; anything outside 0..=4 is kept
/// as a raw integer by callers rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnPhase {
    /// No fire, stove cold.
    Idle,
    /// Fire lit, combustion chamber warming up.
    HeatingUp,
    /// Stable combustion.
    Burning,
    /// Ember bed low, refuelling recommended.
    AddWood,
    /// Ember bed still sufficient, refuelling discouraged.
    DontAddWood,
}

impl BurnPhase {
    /// Maps a device phase code to a burn phase.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Idle),
            1 => Some(Self::HeatingUp),
            2 => Some(Self::Burning),
            3 => Some(Self::AddWood),
            4 => Some(Self::DontAddWood),
            _ => None,
        }
    }

    /// The device code for this phase.
    pub fn code(&self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::HeatingUp => 1,
            Self::Burning => 2,
            Self::AddWood => 3,
            Self::DontAddWood => 4,
        }
    }
}

impl std::fmt::Display for BurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::HeatingUp => "heating up",
            Self::Burning => "burning",
            Self::AddWood => "add wood",
            Self::DontAddWood => "don't add wood",
        };
        write!(f, "{}", label)
    }
}

/// Parses a semicolon-delimited series into exactly `expected` samples.
///
/// The device occasionally sends short or over-long histories; the result
/// is truncated or zero-padded to the expected length so downstream
/// consumers always see a fixed-width series. Blank tokens between
/// delimiters are skipped. With `expected == 0` the samples are returned
/// as parsed.
pub fn parse_series(raw: &str, expected: usize) -> Vec<i64> {
    let mut samples: Vec<i64> = raw
        .split(';')
        .filter_map(|token| {
            let token = token.trim();
            if token.is_empty() {
                return None;
            }
            match token.parse::<i64>() {
                Ok(n) => Some(n),
                Err(_) => token.parse::<f64>().ok().map(|x| x.round() as i64),
            }
        })
        .collect();

    if expected > 0 && samples.len() != expected {
        tracing::debug!(
            got = samples.len(),
            expected = expected,
            "series length mismatch, adjusting"
        );
        samples.resize(expected, 0);
    }
    samples
}
