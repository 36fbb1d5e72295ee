//! Timestamp value type shared by parsers, the converter and viewers.
//!
//! A [`Timestamp`] is one instant on either the ELAPSED line (nanoseconds since
//! boot, from the boot or monotonic clock) or the REAL line (nanoseconds since
//! the Unix epoch). REAL timestamps are reconciled onto one numeric line when
//! they are created, so ordering is always a plain integer comparison.
//!
//! Timestamps minted by different converters carry different offsets and must
//! not be compared with each other. This is not checked at runtime.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::error::TimeError;
use crate::time_utils;

/// Clock domain of a [`Timestamp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimestampType {
    Elapsed,
    Real,
}

impl TimestampType {
    pub fn as_str(self) -> &'static str {
        match self {
            TimestampType::Elapsed => "ELAPSED",
            TimestampType::Real => "REAL",
        }
    }
}

impl fmt::Display for TimestampType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single instant in integer nanoseconds.
///
/// Equality and ordering consider `value_ns` only.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Timestamp {
    #[serde(rename = "type")]
    timestamp_type: TimestampType,
    value_ns: i64,
}

impl Timestamp {
    /// Construct directly from a raw nanosecond value.
    pub const fn new(timestamp_type: TimestampType, value_ns: i64) -> Self {
        Self {
            timestamp_type,
            value_ns,
        }
    }

    /// Construct from an elapsed-clock reading.
    ///
    /// REAL timestamps need the real-to-elapsed offset, which is added here so
    /// that later comparisons need no offset at all.
    pub fn from_elapsed(
        timestamp_type: TimestampType,
        elapsed_ns: i64,
        real_to_elapsed_offset_ns: Option<i64>,
    ) -> Result<Self, TimeError> {
        match timestamp_type {
            TimestampType::Elapsed => Ok(Self::new(TimestampType::Elapsed, elapsed_ns)),
            TimestampType::Real => {
                let offset = real_to_elapsed_offset_ns.ok_or(TimeError::MissingOffset {
                    requested: TimestampType::Real,
                })?;
                let value = elapsed_ns.checked_add(offset).ok_or(TimeError::Overflow)?;
                Ok(Self::new(TimestampType::Real, value))
            }
        }
    }

    pub fn get_type(&self) -> TimestampType {
        self.timestamp_type
    }

    pub fn get_value_ns(&self) -> i64 {
        self.value_ns
    }

    /// Same instant value, tagged with another domain.
    pub fn in_type(&self, timestamp_type: TimestampType) -> Self {
        Self::new(timestamp_type, self.value_ns)
    }

    pub fn add(&self, ns: i64) -> Result<Self, TimeError> {
        let value = self.value_ns.checked_add(ns).ok_or(TimeError::Overflow)?;
        Ok(Self::new(self.timestamp_type, value))
    }

    pub fn minus(&self, ns: i64) -> Result<Self, TimeError> {
        let value = self.value_ns.checked_sub(ns).ok_or(TimeError::Overflow)?;
        Ok(Self::new(self.timestamp_type, value))
    }

    pub fn times(&self, n: i64) -> Result<Self, TimeError> {
        let value = self.value_ns.checked_mul(n).ok_or(TimeError::Overflow)?;
        Ok(Self::new(self.timestamp_type, value))
    }

    /// Integer division, truncating toward zero.
    pub fn div(&self, n: i64) -> Result<Self, TimeError> {
        if n == 0 {
            return Err(TimeError::DivisionByZero);
        }
        let value = self.value_ns.checked_div(n).ok_or(TimeError::Overflow)?;
        Ok(Self::new(self.timestamp_type, value))
    }

    /// Sum of two timestamps of the same domain.
    pub fn plus_timestamp(&self, other: &Timestamp) -> Result<Self, TimeError> {
        self.check_same_type(other)?;
        self.add(other.value_ns)
    }

    /// Difference of two timestamps of the same domain.
    pub fn minus_timestamp(&self, other: &Timestamp) -> Result<Self, TimeError> {
        self.check_same_type(other)?;
        self.minus(other.value_ns)
    }

    fn check_same_type(&self, other: &Timestamp) -> Result<(), TimeError> {
        if self.timestamp_type != other.timestamp_type {
            return Err(TimeError::TimestampTypeMismatch {
                expected: self.timestamp_type,
                actual: other.timestamp_type,
            });
        }
        Ok(())
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.value_ns == other.value_ns
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value_ns.cmp(&other.value_ns)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp_type {
            TimestampType::Elapsed => {
                f.write_str(&time_utils::format_elapsed_ns(self.value_ns, false))
            }
            TimestampType::Real => f.write_str(&time_utils::format_real_ns(self.value_ns, 0)),
        }
    }
}

/// Inclusive range between two timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl TimeRange {
    pub fn new(from: Timestamp, to: Timestamp) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, ts: &Timestamp) -> bool {
        self.from <= *ts && *ts <= self.to
    }

    pub fn duration_ns(&self) -> i64 {
        self.to.get_value_ns().saturating_sub(self.from.get_value_ns())
    }
}
