//! Error types for the time-domain engine and payload statistics.
//!
//! Library code returns these typed errors; the session loader and the CLI wrap
//! them in `anyhow` with context.

use thiserror::Error;

use crate::converter::OffsetKind;
use crate::timestamp::TimestampType;

/// Errors raised while minting, converting, parsing or searching timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// A cross-domain conversion was requested before the required offset was known.
    #[error("missing offset: cannot make {requested} timestamp without a real-to-elapsed offset")]
    MissingOffset { requested: TimestampType },

    /// An offset was initialized a second time with a different value.
    #[error("{offset} offset already initialized to {current}ns, refusing {attempted}ns")]
    AlreadyInitialized {
        offset: OffsetKind,
        current: i64,
        attempted: i64,
    },

    /// Two timestamp domains were mixed where only one is allowed.
    #[error("timestamp type mismatch: expected {expected}, got {actual}")]
    TimestampTypeMismatch {
        expected: TimestampType,
        actual: TimestampType,
    },

    /// Closest-index search over an empty sequence.
    #[error("no timestamps available (requested {requested} timestamp)")]
    NoTimestampsAvailable { requested: TimestampType },

    /// A trace's timestamps decrease at the given entry.
    #[error("timestamps out of order at entry {index}")]
    UnsortedTimestamps { index: usize },

    #[error("invalid timestamp format: '{0}'")]
    InvalidHumanTimestamp(String),

    #[error("unknown timezone: '{0}'")]
    UnknownTimezone(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("nanosecond arithmetic overflow")]
    Overflow,
}

/// Errors raised while aggregating install operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("unknown install operation type {code} in partition '{partition}'")]
    UnknownOperationType { code: i32, partition: String },

    /// A block or byte sum does not fit in 64 bits.
    #[error("block or byte count overflow in partition '{partition}'")]
    Overflow { partition: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_offset_names_requested_type() {
        let err = TimeError::MissingOffset {
            requested: TimestampType::Real,
        };
        assert!(err.to_string().contains("REAL"));
    }

    #[test]
    fn test_no_timestamps_names_requested_type() {
        let err = TimeError::NoTimestampsAvailable {
            requested: TimestampType::Elapsed,
        };
        assert_eq!(
            err.to_string(),
            "no timestamps available (requested ELAPSED timestamp)"
        );
    }

    #[test]
    fn test_unknown_operation_message() {
        let err = PayloadError::UnknownOperationType {
            code: 42,
            partition: "system".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unknown install operation type 42 in partition 'system'"
        );
    }
}
