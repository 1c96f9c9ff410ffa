//! Request identity - `CHG-YYYY-NNN` and `EXC-YYYY-NNN`
//!
//! Sequence numbers are allocated per year as one more than the highest
//! existing number for that year, zero-padded to three digits.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static REQUEST_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]{3})-(\d{4})-(\d{3,})$").expect("static regex"));

/// Request type prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestPrefix {
    /// Change request
    Chg,
    /// Exception request
    Exc,
}

impl RequestPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPrefix::Chg => "CHG",
            RequestPrefix::Exc => "EXC",
        }
    }

    /// Storage subdirectory for requests of this type
    pub fn dir_name(&self) -> &'static str {
        match self {
            RequestPrefix::Chg => "changes",
            RequestPrefix::Exc => "exceptions",
        }
    }
}

impl fmt::Display for RequestPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RequestPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CHG" => Ok(RequestPrefix::Chg),
            "EXC" => Ok(RequestPrefix::Exc),
            _ => Err(IdParseError::UnknownPrefix(s.to_string())),
        }
    }
}

/// Errors from parsing or allocating a request ID
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("Invalid request ID format: '{0}' (expected e.g. CHG-2026-001)")]
    InvalidFormat(String),

    #[error("Unknown request prefix: '{0}'")]
    UnknownPrefix(String),

    #[error("No {prefix} sequence numbers left for {year}")]
    SequenceExhausted { prefix: RequestPrefix, year: i32 },
}

/// A request identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId {
    prefix: RequestPrefix,
    year: i32,
    sequence: u32,
}

impl RequestId {
    pub fn new(prefix: RequestPrefix, year: i32, sequence: u32) -> Self {
        Self {
            prefix,
            year,
            sequence,
        }
    }

    /// Next ID for `year` given the IDs already allocated
    pub fn next<'a, I>(prefix: RequestPrefix, year: i32, existing: I) -> Result<Self, IdParseError>
    where
        I: IntoIterator<Item = &'a RequestId>,
    {
        let max = existing
            .into_iter()
            .filter(|id| id.prefix == prefix && id.year == year)
            .map(|id| id.sequence)
            .max()
            .unwrap_or(0);
        let sequence = max
            .checked_add(1)
            .ok_or(IdParseError::SequenceExhausted { prefix, year })?;
        Ok(Self::new(prefix, year, sequence))
    }

    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        let caps = REQUEST_ID
            .captures(s.trim())
            .ok_or_else(|| IdParseError::InvalidFormat(s.to_string()))?;

        let prefix = caps[1].parse()?;
        let year = caps[2]
            .parse()
            .map_err(|_| IdParseError::InvalidFormat(s.to_string()))?;
        let sequence = caps[3]
            .parse()
            .map_err(|_| IdParseError::InvalidFormat(s.to_string()))?;

        Ok(Self::new(prefix, year, sequence))
    }

    pub fn prefix(&self) -> RequestPrefix {
        self.prefix
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:04}-{:03}", self.prefix, self.year, self.sequence)
    }
}

impl FromStr for RequestId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
