//! Batched user-facing notifications.
//!
//! Loaders push [`Notification`]s into a [`Notifications`] collector that the
//! caller owns. The caller drains the batch once loading is finished and
//! decides how to surface it.

use std::fmt;

use serde::Serialize;

use crate::converter::OffsetKind;

/// A non-fatal problem found while loading a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A trace carried an offset that disagrees with the one already in use.
    ConflictingOffset {
        trace: String,
        offset: OffsetKind,
        current: i64,
        ignored: i64,
    },
    /// A trace has no entries and cannot be navigated.
    EmptyTrace { trace: String },
    /// A real-clock trace was loaded but no trace supplied a real-to-elapsed offset.
    MissingRealTimestamps { trace: String },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::ConflictingOffset {
                trace,
                offset,
                current,
                ignored,
            } => write!(
                f,
                "{trace}: ignoring {offset} offset {ignored}ns, session uses {current}ns"
            ),
            Notification::EmptyTrace { trace } => write!(f, "{trace}: trace has no entries"),
            Notification::MissingRealTimestamps { trace } => {
                write!(f, "{trace}: real timestamps unavailable, no offset in bundle")
            }
        }
    }
}

/// Collector for notifications raised during one operation.
#[derive(Debug, Default)]
pub struct Notifications {
    pending: Vec<Notification>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        self.pending.push(notification);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Take the current batch, leaving the collector empty.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.pending)
    }
}
