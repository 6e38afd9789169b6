//! The command registry: every value the stove exposes, with its polling
//! cadence and parsing rule.
//!
//! Commands are static. They are declared once in [`COMMANDS`] and never
//! mutated; the poll scheduler iterates them in declared order and the
//! correlator matches responses back by command name, which is the only
//! correlation key the protocol offers.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::{StoveValue, ValueError, ValueResult, parse_series};

/// Polling cadence class of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceTier {
    /// Live operating state, polled on a sub-minute interval.
    State,
    /// Performance statistics, polled on a minute-scale interval.
    Statistics,
    /// Static identity fields, fetched once per connection.
    Info,
}

impl CadenceTier {
    /// True if commands in this tier are re-fetched on a repeating schedule.
    pub fn is_repeating(&self) -> bool {
        !matches!(self, Self::Info)
    }
}

impl std::fmt::Display for CadenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::State => "state",
            Self::Statistics => "statistics",
            Self::Info => "info",
        };
        write!(f, "{}", label)
    }
}

/// How a command's raw text value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRule {
    /// Whole number.
    Integer,
    /// Fractional number.
    Decimal,
    /// Integer code with a declared maximum (e.g. burn phase 0-4).
    Enum { max: u8 },
    /// Free text, kept verbatim.
    Text,
    /// Semicolon-delimited history; expected length derived from the
    /// command's bracketed key.
    Series,
}

/// A named, read-only value exposed by the stove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// Device key, sent verbatim in `_req=` frames and echoed in answers.
    pub name: &'static str,
    /// Polling cadence.
    pub tier: CadenceTier,
    /// Parsing rule for the answer text.
    pub rule: ValueRule,
}

/// All commands the client knows, in polling order within each tier.
pub const COMMANDS: &[Command] = &[
    // Live state
    Command {
        name: "appPhase",
        tier: CadenceTier::State,
        rule: ValueRule::Enum { max: 4 },
    },
    Command {
        name: "appT",
        tier: CadenceTier::State,
        rule: ValueRule::Decimal,
    },
    Command {
        name: "appAufheiz",
        tier: CadenceTier::State,
        rule: ValueRule::Decimal,
    },
    Command {
        name: "appP",
        tier: CadenceTier::State,
        rule: ValueRule::Decimal,
    },
    Command {
        name: "appNach",
        tier: CadenceTier::State,
        rule: ValueRule::Integer,
    },
    Command {
        name: "appErr",
        tier: CadenceTier::State,
        rule: ValueRule::Integer,
    },
    // Statistics
    Command {
        name: "appPTx",
        tier: CadenceTier::Statistics,
        rule: ValueRule::Integer,
    },
    Command {
        name: "appP30Tx",
        tier: CadenceTier::Statistics,
        rule: ValueRule::Integer,
    },
    Command {
        name: "appPT[0;59]",
        tier: CadenceTier::Statistics,
        rule: ValueRule::Series,
    },
    Command {
        name: "appP30T[0;29]",
        tier: CadenceTier::Statistics,
        rule: ValueRule::Series,
    },
    Command {
        name: "appIQDarst",
        tier: CadenceTier::Statistics,
        rule: ValueRule::Integer,
    },
    // Identity
    Command {
        name: "_oemdev",
        tier: CadenceTier::Info,
        rule: ValueRule::Text,
    },
    Command {
        name: "_oemver",
        tier: CadenceTier::Info,
        rule: ValueRule::Text,
    },
    Command {
        name: "_wversion",
        tier: CadenceTier::Info,
        rule: ValueRule::Text,
    },
    Command {
        name: "_oemser",
        tier: CadenceTier::Info,
        rule: ValueRule::Text,
    },
    Command {
        name: "_ledBri",
        tier: CadenceTier::Info,
        rule: ValueRule::Integer,
    },
];

impl Command {
    /// Looks up a command by its device key.
    pub fn find(name: &str) -> Option<&'static Command> {
        COMMANDS.iter().find(|cmd| cmd.name == name)
    }

    /// Commands of the given tier, in declared order.
    pub fn for_tier(tier: CadenceTier) -> impl Iterator<Item = &'static Command> {
        COMMANDS.iter().filter(move |cmd| cmd.tier == tier)
    }

    /// Interprets a raw answer text according to this command's rule.
    pub fn parse_value(&self, raw: &str) -> ValueResult<StoveValue> {
        let raw = raw.trim();
        match self.rule {
            ValueRule::Integer => parse_integer(raw).map(StoveValue::Integer),
            ValueRule::Decimal => raw
                .parse::<f64>()
                .map(StoveValue::Decimal)
                .map_err(|_| ValueError::InvalidNumber {
                    raw: raw.to_string(),
                    expected: "decimal",
                }),
            ValueRule::Enum { max } => {
                let code = parse_integer(raw)?;
                if code < 0 || code > i64::from(max) {
                    return Err(ValueError::EnumOutOfRange { code, max });
                }
                Ok(StoveValue::Integer(code))
            }
            ValueRule::Text => Ok(StoveValue::Text(raw.to_string())),
            ValueRule::Series => {
                let expected = SeriesKey::parse(self.name).map_or(0, |key| key.sample_count());
                Ok(StoveValue::Series(parse_series(raw, expected)))
            }
        }
    }

    /// Display alias for well-known state keys, used by presentation code.
    /// The snapshot itself is keyed strictly by device key.
    pub fn alias(&self) -> Option<&'static str> {
        match self.name {
            "appT" => Some("temperature"),
            "appP" => Some("performance"),
            "appPhase" => Some("phase"),
            "appAufheiz" => Some("heat-up"),
            "appErr" => Some("error"),
            "_oemser" => Some("serial"),
            "_wversion" => Some("firmware"),
            "_oemver" => Some("oem-version"),
            _ => None,
        }
    }
}

fn parse_integer(raw: &str) -> ValueResult<i64> {
    raw.parse::<i64>().map_err(|_| ValueError::InvalidNumber {
        raw: raw.to_string(),
        expected: "integer",
    })
}

/// A bracketed history key like `appPT[0;59]`: base name plus the inclusive
/// sample index range the device reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesKey {
    /// Key without the bracket suffix (e.g. `appPT`).
    pub base: String,
    /// First sample index.
    pub start: usize,
    /// Last sample index, inclusive.
    pub end: usize,
}

impl SeriesKey {
    /// Parses a `name[a;b]` key. Returns `None` for non-series keys or
    /// an inverted range.
    pub fn parse(name: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^(?P<base>[A-Za-z0-9_]+)\[(?P<start>\d+);(?P<end>\d+)\]$")
                .expect("series key pattern is valid")
        });

        let captures = pattern.captures(name)?;
        let base = captures["base"].to_string();
        let start: usize = captures["start"].parse().ok()?;
        let end: usize = captures["end"].parse().ok()?;
        if end < start {
            return None;
        }
        Some(Self { base, start, end })
    }

    /// Number of samples the range covers.
    pub fn sample_count(&self) -> usize {
        self.end - self.start + 1
    }
}
