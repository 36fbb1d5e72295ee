//! Traces, trace positions and synchronized navigation.
//!
//! Every trace kind is described by a static [`TraceKindConfig`] entry. A single
//! generic [`Presenter`] uses that table to work out which traces it must follow
//! and which entry of each trace corresponds to the current position.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TimeError;
use crate::search::closest_index;
use crate::timestamp::{TimeRange, Timestamp};

/// Trace sources understood by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    SurfaceFlinger,
    WindowManager,
    Transactions,
    ProtoLog,
    InputMethod,
    ScreenRecording,
    ViewCapture,
    EventLog,
}

/// Static description of a trace kind.
#[derive(Debug)]
pub struct TraceKindConfig {
    pub name: &'static str,
    /// Other kinds a presenter of this kind also follows.
    pub dependencies: &'static [TraceKind],
}

impl TraceKind {
    pub const ALL: [TraceKind; 8] = [
        TraceKind::SurfaceFlinger,
        TraceKind::WindowManager,
        TraceKind::Transactions,
        TraceKind::ProtoLog,
        TraceKind::InputMethod,
        TraceKind::ScreenRecording,
        TraceKind::ViewCapture,
        TraceKind::EventLog,
    ];

    pub fn config(self) -> &'static TraceKindConfig {
        match self {
            TraceKind::SurfaceFlinger => &TraceKindConfig {
                name: "SurfaceFlinger",
                dependencies: &[],
            },
            TraceKind::WindowManager => &TraceKindConfig {
                name: "WindowManager",
                dependencies: &[],
            },
            TraceKind::Transactions => &TraceKindConfig {
                name: "Transactions",
                dependencies: &[TraceKind::SurfaceFlinger],
            },
            TraceKind::ProtoLog => &TraceKindConfig {
                name: "ProtoLog",
                dependencies: &[],
            },
            TraceKind::InputMethod => &TraceKindConfig {
                name: "InputMethod",
                dependencies: &[TraceKind::SurfaceFlinger, TraceKind::WindowManager],
            },
            TraceKind::ScreenRecording => &TraceKindConfig {
                name: "ScreenRecording",
                dependencies: &[],
            },
            TraceKind::ViewCapture => &TraceKindConfig {
                name: "ViewCapture",
                dependencies: &[],
            },
            TraceKind::EventLog => &TraceKindConfig {
                name: "EventLog",
                dependencies: &[],
            },
        }
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config().name)
    }
}

/// One trace: its entries' timestamps in entry-index order.
#[derive(Debug, Clone)]
pub struct Trace {
    name: String,
    kind: TraceKind,
    timestamps: Vec<Timestamp>,
}

impl Trace {
    /// Create a trace; timestamps must be non-decreasing.
    pub fn new(
        name: impl Into<String>,
        kind: TraceKind,
        timestamps: Vec<Timestamp>,
    ) -> Result<Self, TimeError> {
        if let Some(pos) = timestamps.windows(2).position(|w| w[0] > w[1]) {
            return Err(TimeError::UnsortedTimestamps { index: pos + 1 });
        }
        Ok(Self {
            name: name.into(),
            kind,
            timestamps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TraceKind {
        self.kind
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn time_range(&self) -> Option<TimeRange> {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => Some(TimeRange::new(*first, *last)),
            _ => None,
        }
    }

    /// Entry shown at `target`; see [`closest_index`].
    pub fn find_closest_entry(&self, target: &Timestamp) -> Result<Option<usize>, TimeError> {
        closest_index(&self.timestamps, target)
    }
}

/// All traces of a session.
#[derive(Debug, Clone, Default)]
pub struct Traces {
    traces: Vec<Trace>,
}

impl Traces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trace> {
        self.traces.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Trace> {
        self.traces.iter().find(|t| t.name == name)
    }

    pub fn of_kind(&self, kind: TraceKind) -> impl Iterator<Item = &Trace> {
        self.traces.iter().filter(move |t| t.kind == kind)
    }

    /// Distinct kinds, in first-loaded order.
    pub fn kinds(&self) -> Vec<TraceKind> {
        let mut kinds = Vec::new();
        for trace in &self.traces {
            if !kinds.contains(&trace.kind) {
                kinds.push(trace.kind);
            }
        }
        kinds
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Range from the earliest first entry to the latest last entry.
    pub fn full_time_range(&self) -> Option<TimeRange> {
        let ranges: Vec<TimeRange> = self.traces.iter().filter_map(Trace::time_range).collect();
        let from = ranges.iter().map(|r| r.from).min()?;
        let to = ranges.iter().map(|r| r.to).max()?;
        Some(TimeRange::new(from, to))
    }
}

/// Current navigation position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracePosition {
    pub timestamp: Timestamp,
    /// Entry explicitly selected by the user, as (trace name, entry index).
    pub entry: Option<(String, usize)>,
}

impl TracePosition {
    pub fn from_timestamp(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            entry: None,
        }
    }

    /// Position of a specific entry; `None` if the trace or index does not exist.
    pub fn from_entry(traces: &Traces, trace_name: &str, index: usize) -> Option<Self> {
        let timestamp = *traces.get(trace_name)?.timestamps().get(index)?;
        Some(Self {
            timestamp,
            entry: Some((trace_name.to_string(), index)),
        })
    }
}

/// Entry of one trace at the current position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPosition {
    pub trace: String,
    pub kind: TraceKind,
    pub index: Option<usize>,
    pub timestamp: Option<Timestamp>,
}

/// What a presenter shows after a position update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenterUpdate {
    pub kind: TraceKind,
    pub entries: Vec<EntryPosition>,
}

/// Generic presenter for one trace kind and its dependencies.
#[derive(Debug, Clone, Copy)]
pub struct Presenter {
    kind: TraceKind,
}

impl Presenter {
    pub fn new(kind: TraceKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> TraceKind {
        self.kind
    }

    /// Kinds this presenter follows, its own first.
    pub fn followed_kinds(&self) -> Vec<TraceKind> {
        let mut kinds = vec![self.kind];
        kinds.extend(self.kind.config().dependencies.iter().copied());
        kinds
    }

    pub fn on_position_update(
        &self,
        traces: &Traces,
        position: &TracePosition,
    ) -> Result<PresenterUpdate, TimeError> {
        let mut entries = Vec::new();
        for kind in self.followed_kinds() {
            for trace in traces.of_kind(kind) {
                let index = match &position.entry {
                    Some((name, index)) if name == trace.name() => Some(*index),
                    _ if trace.is_empty() => None,
                    _ => trace.find_closest_entry(&position.timestamp)?,
                };
                entries.push(EntryPosition {
                    trace: trace.name().to_string(),
                    kind,
                    index,
                    timestamp: index.and_then(|i| trace.timestamps().get(i).copied()),
                });
            }
        }
        Ok(PresenterUpdate {
            kind: self.kind,
            entries,
        })
    }
}
