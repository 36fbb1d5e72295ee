//! Loading a trace bundle into a synchronized session.
//!
//! A bundle is the JSON hand-off from the trace parsers: per-trace raw clock
//! readings plus whatever clock offsets each trace's metadata carried. Loading
//! happens in three passes:
//!
//! 1. Offsets are taken from the first trace that supplies them. Conflicting
//!    offsets from later traces are reported and ignored.
//! 2. Every reading is minted through the session's [`TimestampConverter`].
//! 3. The display UTC offset is derived from the first real timestamp.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::converter::{OffsetKind, TimestampConverter, TimezoneInfo};
use crate::error::TimeError;
use crate::notifier::{Notification, Notifications};
use crate::timestamp::Timestamp;
use crate::traces::{Presenter, PresenterUpdate, Trace, TraceKind, TracePosition, Traces};

/// Clock a trace's raw readings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    Boot,
    Monotonic,
    Real,
}

/// One trace as handed over by its parser.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceDescriptor {
    pub name: String,
    pub kind: TraceKind,
    pub clock: ClockSource,
    #[serde(default)]
    pub real_to_monotonic_offset_ns: Option<i64>,
    #[serde(default)]
    pub real_to_boot_offset_ns: Option<i64>,
    pub timestamps_ns: Vec<i64>,
}

/// A whole bundle of traces recorded together.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundleDescriptor {
    #[serde(default)]
    pub timezone: Option<TimezoneInfo>,
    pub traces: Vec<TraceDescriptor>,
}

/// Loaded traces plus the converter that minted their timestamps.
#[derive(Debug)]
pub struct Session {
    converter: TimestampConverter,
    traces: Traces,
}

impl Session {
    /// Read a bundle descriptor from a JSON file and load it.
    pub fn load(
        path: &Path,
        timezone_override: Option<TimezoneInfo>,
        notifications: &mut Notifications,
    ) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read bundle {}", path.display()))?;
        let mut desc: BundleDescriptor = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse bundle {}", path.display()))?;
        if timezone_override.is_some() {
            desc.timezone = timezone_override;
        }
        Self::from_descriptor(desc, notifications)
    }

    pub fn from_descriptor(
        desc: BundleDescriptor,
        notifications: &mut Notifications,
    ) -> Result<Self> {
        if desc.traces.is_empty() {
            bail!("Bundle contains no traces");
        }

        let mut converter = TimestampConverter::new(desc.timezone.unwrap_or_default());
        for trace in &desc.traces {
            init_trace_offsets(&mut converter, trace, notifications)?;
        }
        info!(
            real_to_boot = ?converter.real_to_boot_offset_ns(),
            real_to_monotonic = ?converter.real_to_monotonic_offset_ns(),
            "Initialized session offsets"
        );

        let mut traces = Traces::new();
        for trace in desc.traces {
            let timestamps = mint_timestamps(&mut converter, &trace, notifications)
                .with_context(|| format!("Failed to load trace '{}'", trace.name))?;
            if timestamps.is_empty() {
                warn!("Trace {} has no entries", trace.name);
                notifications.push(Notification::EmptyTrace {
                    trace: trace.name.clone(),
                });
            }
            debug!("Loaded {} entries from {}", timestamps.len(), trace.name);
            let loaded = Trace::new(trace.name.clone(), trace.kind, timestamps)
                .with_context(|| format!("Invalid trace '{}'", trace.name))?;
            traces.push(loaded);
        }

        if let Some(first) = traces.full_time_range().map(|r| r.from) {
            converter
                .initialize_utc_offset(&first)
                .context("Failed to derive UTC offset")?;
        }

        Ok(Self { converter, traces })
    }

    pub fn converter(&self) -> &TimestampConverter {
        &self.converter
    }

    pub fn converter_mut(&mut self) -> &mut TimestampConverter {
        &mut self.converter
    }

    pub fn traces(&self) -> &Traces {
        &self.traces
    }

    /// Parse a user-supplied time in this session's domain.
    pub fn parse_time(&mut self, text: &str) -> Result<Timestamp> {
        self.converter
            .make_timestamp_from_human(text)
            .with_context(|| format!("Invalid time '{text}'"))
    }

    /// Update one presenter per loaded trace kind.
    pub fn seek(&self, position: &TracePosition) -> Result<Vec<PresenterUpdate>, TimeError> {
        self.traces
            .kinds()
            .into_iter()
            .map(|kind| Presenter::new(kind).on_position_update(&self.traces, position))
            .collect()
    }
}

fn init_trace_offsets(
    converter: &mut TimestampConverter,
    trace: &TraceDescriptor,
    notifications: &mut Notifications,
) -> Result<()> {
    let offsets = [
        (OffsetKind::RealToMonotonic, trace.real_to_monotonic_offset_ns),
        (OffsetKind::RealToBoot, trace.real_to_boot_offset_ns),
    ];
    for (kind, value) in offsets {
        let Some(ns) = value else { continue };
        let result = match kind {
            OffsetKind::RealToMonotonic => converter.set_real_to_monotonic_offset_ns(ns),
            OffsetKind::RealToBoot => converter.set_real_to_boot_offset_ns(ns),
        };
        match result {
            Ok(()) => {}
            Err(TimeError::AlreadyInitialized {
                offset,
                current,
                attempted,
            }) => {
                warn!(
                    "Trace {} carries {} offset {}ns, keeping {}ns",
                    trace.name, offset, attempted, current
                );
                notifications.push(Notification::ConflictingOffset {
                    trace: trace.name.clone(),
                    offset,
                    current,
                    ignored: attempted,
                });
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn mint_timestamps(
    converter: &mut TimestampConverter,
    trace: &TraceDescriptor,
    notifications: &mut Notifications,
) -> Result<Vec<Timestamp>> {
    if trace.clock == ClockSource::Real
        && !converter.can_make_real_timestamps()
        && !trace.timestamps_ns.is_empty()
    {
        notifications.push(Notification::MissingRealTimestamps {
            trace: trace.name.clone(),
        });
    }

    let mut timestamps = Vec::with_capacity(trace.timestamps_ns.len());
    for &ns in &trace.timestamps_ns {
        let ts = match trace.clock {
            ClockSource::Boot => converter.make_timestamp_from_boot_ns(ns)?,
            ClockSource::Monotonic => converter.make_timestamp_from_monotonic_ns(ns)?,
            ClockSource::Real => converter.make_timestamp_from_real_ns(ns)?,
        };
        timestamps.push(ts);
    }
    Ok(timestamps)
}
