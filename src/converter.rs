//! Per-session timestamp factory and cross-domain offset holder.
//!
//! One [`TimestampConverter`] exists per loaded trace bundle. It knows the
//! real-to-monotonic and real-to-boot offsets, mints every [`Timestamp`] of the
//! session, and keeps the UTC offset used for displaying real timestamps.
//!
//! # Offset initialization
//!
//! Each offset moves `Uninitialized -> Initializing -> Initialized` exactly once.
//! Initializing again with the same value is a no-op; a different value is
//! rejected with [`TimeError::AlreadyInitialized`] and nothing changes.

use std::fmt;

use chrono::{Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::TimeError;
use crate::time_utils::{self, NS_PER_MIN, NS_PER_MS};
use crate::timestamp::{Timestamp, TimestampType};

/// Timezone used for displaying real timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimezoneInfo {
    /// IANA timezone name, e.g. `Europe/London`.
    pub timezone: String,
    pub locale: String,
    /// Explicit UTC offset; takes precedence over the timezone database.
    #[serde(default)]
    pub utc_offset_ms: Option<i64>,
}

impl Default for TimezoneInfo {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            locale: "en-US".to_string(),
            utc_offset_ms: None,
        }
    }
}

/// Which cross-domain offset an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OffsetKind {
    RealToMonotonic,
    RealToBoot,
}

impl fmt::Display for OffsetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetKind::RealToMonotonic => f.write_str("real-to-monotonic"),
            OffsetKind::RealToBoot => f.write_str("real-to-boot"),
        }
    }
}

/// One-shot offset cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetState {
    #[default]
    Uninitialized,
    /// Value staged but not yet committed.
    Initializing(i64),
    Initialized(i64),
}

impl OffsetState {
    /// Committed value, if any.
    pub fn get(&self) -> Option<i64> {
        match self {
            OffsetState::Initialized(ns) => Some(*ns),
            _ => None,
        }
    }

    fn check(&self, kind: OffsetKind, ns: i64) -> Result<(), TimeError> {
        match self {
            OffsetState::Initialized(current) if *current != ns => {
                Err(TimeError::AlreadyInitialized {
                    offset: kind,
                    current: *current,
                    attempted: ns,
                })
            }
            _ => Ok(()),
        }
    }

    fn stage(&mut self, ns: i64) {
        if *self == OffsetState::Uninitialized {
            *self = OffsetState::Initializing(ns);
        }
    }

    fn commit(&mut self) {
        if let OffsetState::Initializing(ns) = *self {
            *self = OffsetState::Initialized(ns);
        }
    }
}

/// Display offset between UTC and the session timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UtcOffset {
    value_ns: Option<i64>,
}

impl UtcOffset {
    pub fn is_initialized(&self) -> bool {
        self.value_ns.is_some()
    }

    pub fn value_ns(&self) -> Option<i64> {
        self.value_ns
    }

    fn initialize(&mut self, value_ns: i64) {
        self.value_ns = Some(value_ns);
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = self.value_ns.unwrap_or(0);
        let sign = if ns < 0 { '-' } else { '+' };
        let minutes = ns.unsigned_abs() / NS_PER_MIN as u64;
        write!(f, "UTC{sign}{:02}:{:02}", minutes / 60, minutes % 60)
    }
}

/// Session-wide timestamp factory.
#[derive(Debug, Clone, Default)]
pub struct TimestampConverter {
    timezone_info: TimezoneInfo,
    real_to_monotonic: OffsetState,
    real_to_boot: OffsetState,
    utc_offset: UtcOffset,
    created_type: Option<TimestampType>,
}

impl TimestampConverter {
    pub fn new(timezone_info: TimezoneInfo) -> Self {
        Self {
            timezone_info,
            ..Self::default()
        }
    }

    /// Create a converter with its offsets already known.
    pub fn with_offsets(
        timezone_info: TimezoneInfo,
        real_to_monotonic_ns: Option<i64>,
        real_to_boot_ns: Option<i64>,
    ) -> Result<Self, TimeError> {
        let mut converter = Self::new(timezone_info);
        converter.initialize_offsets(real_to_monotonic_ns, real_to_boot_ns)?;
        Ok(converter)
    }

    /// Set the cross-domain offsets.
    ///
    /// Both offsets are validated before either is committed, so a conflict on
    /// one leaves the other untouched too.
    pub fn initialize_offsets(
        &mut self,
        real_to_monotonic_ns: Option<i64>,
        real_to_boot_ns: Option<i64>,
    ) -> Result<(), TimeError> {
        if let Some(ns) = real_to_monotonic_ns {
            self.real_to_monotonic
                .check(OffsetKind::RealToMonotonic, ns)?;
        }
        if let Some(ns) = real_to_boot_ns {
            self.real_to_boot.check(OffsetKind::RealToBoot, ns)?;
        }

        if let Some(ns) = real_to_monotonic_ns {
            self.real_to_monotonic.stage(ns);
        }
        if let Some(ns) = real_to_boot_ns {
            self.real_to_boot.stage(ns);
        }
        self.real_to_monotonic.commit();
        self.real_to_boot.commit();
        Ok(())
    }

    pub fn set_real_to_monotonic_offset_ns(&mut self, ns: i64) -> Result<(), TimeError> {
        self.initialize_offsets(Some(ns), None)
    }

    pub fn set_real_to_boot_offset_ns(&mut self, ns: i64) -> Result<(), TimeError> {
        self.initialize_offsets(None, Some(ns))
    }

    pub fn real_to_monotonic_offset_ns(&self) -> Option<i64> {
        self.real_to_monotonic.get()
    }

    pub fn real_to_boot_offset_ns(&self) -> Option<i64> {
        self.real_to_boot.get()
    }

    pub fn offset_state(&self, kind: OffsetKind) -> OffsetState {
        match kind {
            OffsetKind::RealToMonotonic => self.real_to_monotonic,
            OffsetKind::RealToBoot => self.real_to_boot,
        }
    }

    pub fn timezone_info(&self) -> &TimezoneInfo {
        &self.timezone_info
    }

    pub fn utc_offset(&self) -> UtcOffset {
        self.utc_offset
    }

    /// Domain of the timestamps minted so far, if any.
    pub fn created_type(&self) -> Option<TimestampType> {
        self.created_type
    }

    pub fn can_make_real_timestamps(&self) -> bool {
        self.real_to_monotonic.get().is_some() || self.real_to_boot.get().is_some()
    }

    /// Boot-clock reading: REAL when the boot offset is known, ELAPSED otherwise.
    pub fn make_timestamp_from_boot_ns(&mut self, ns: i64) -> Result<Timestamp, TimeError> {
        match self.real_to_boot.get() {
            Some(offset) => self.make_real(ns, offset),
            None => self.make_elapsed(ns),
        }
    }

    /// Monotonic-clock reading: REAL when the monotonic offset is known, ELAPSED otherwise.
    pub fn make_timestamp_from_monotonic_ns(&mut self, ns: i64) -> Result<Timestamp, TimeError> {
        match self.real_to_monotonic.get() {
            Some(offset) => self.make_real(ns, offset),
            None => self.make_elapsed(ns),
        }
    }

    /// REAL timestamp reconciled with the session offset (`ns + offset`).
    ///
    /// The real-to-boot offset is preferred over real-to-monotonic. Fails with
    /// [`TimeError::MissingOffset`] when neither is known.
    pub fn make_timestamp_from_real_ns(&mut self, ns: i64) -> Result<Timestamp, TimeError> {
        let offset = self.elapsed_offset().ok_or(TimeError::MissingOffset {
            requested: TimestampType::Real,
        })?;
        self.make_real(ns, offset)
    }

    /// Raw value in the session's domain, without any offset.
    pub fn make_timestamp_from_ns(&mut self, ns: i64) -> Result<Timestamp, TimeError> {
        if self.can_make_real_timestamps() {
            self.make_real(ns, 0)
        } else {
            self.make_elapsed(ns)
        }
    }

    /// Zero in the session's domain. Does not fix the session domain.
    pub fn make_zero_timestamp(&self) -> Timestamp {
        if self.can_make_real_timestamps() {
            Timestamp::new(TimestampType::Real, 0)
        } else {
            Timestamp::new(TimestampType::Elapsed, 0)
        }
    }

    /// Parse user input: `1h2m3s`, a bare nanosecond count, or a local date-time.
    pub fn make_timestamp_from_human(&mut self, text: &str) -> Result<Timestamp, TimeError> {
        if time_utils::is_ns_format(text) {
            let ns = text
                .trim()
                .parse::<i64>()
                .map_err(|_| TimeError::InvalidHumanTimestamp(text.to_string()))?;
            return self.make_timestamp_from_ns(ns);
        }
        if time_utils::is_human_elapsed_format(text) {
            // Elapsed input goes through whichever offset the session has.
            let ns = time_utils::parse_human_elapsed(text)?;
            return match self.elapsed_offset() {
                Some(offset) => self.make_real(ns, offset),
                None => self.make_elapsed(ns),
            };
        }
        if time_utils::is_real_date_time_format(text) {
            if !self.can_make_real_timestamps() {
                return Err(TimeError::MissingOffset {
                    requested: TimestampType::Real,
                });
            }
            let local_ns = time_utils::parse_real_date_time(text)?;
            // Local input needs the UTC offset; derive it here if nothing has yet.
            self.initialize_utc_offset(&Timestamp::new(TimestampType::Real, local_ns))?;
            let utc_ns = local_ns
                .checked_sub(self.utc_offset.value_ns().unwrap_or(0))
                .ok_or(TimeError::Overflow)?;
            return self.make_real(utc_ns, 0);
        }
        Err(TimeError::InvalidHumanTimestamp(text.to_string()))
    }

    /// Derive the display UTC offset from a reference instant.
    ///
    /// Only takes effect once, and only when real timestamps can be made.
    pub fn initialize_utc_offset(&mut self, reference: &Timestamp) -> Result<(), TimeError> {
        if self.utc_offset.is_initialized() || !self.can_make_real_timestamps() {
            return Ok(());
        }
        let offset_ns = match self.timezone_info.utc_offset_ms {
            Some(ms) => ms.checked_mul(NS_PER_MS).ok_or(TimeError::Overflow)?,
            None => timezone_offset_ns(&self.timezone_info.timezone, reference.get_value_ns())?,
        };
        self.utc_offset.initialize(offset_ns);
        Ok(())
    }

    /// Boot-clock nanoseconds of a timestamp, when they can be recovered.
    pub fn try_get_boot_time_ns(&self, ts: &Timestamp) -> Option<i64> {
        match ts.get_type() {
            TimestampType::Elapsed => Some(ts.get_value_ns()),
            TimestampType::Real => self
                .real_to_boot
                .get()
                .and_then(|offset| ts.get_value_ns().checked_sub(offset)),
        }
    }

    pub fn try_get_real_time_ns(&self, ts: &Timestamp) -> Option<i64> {
        match ts.get_type() {
            TimestampType::Real => Some(ts.get_value_ns()),
            TimestampType::Elapsed => None,
        }
    }

    /// Human-readable form; real timestamps are shown in the session timezone.
    pub fn format(&self, ts: &Timestamp) -> String {
        match ts.get_type() {
            TimestampType::Elapsed => time_utils::format_elapsed_ns(ts.get_value_ns(), false),
            TimestampType::Real => time_utils::format_real_ns(
                ts.get_value_ns(),
                self.utc_offset.value_ns().unwrap_or(0),
            ),
        }
    }

    fn elapsed_offset(&self) -> Option<i64> {
        self.real_to_boot.get().or(self.real_to_monotonic.get())
    }

    fn make_real(&mut self, ns: i64, offset: i64) -> Result<Timestamp, TimeError> {
        let ts = Timestamp::from_elapsed(TimestampType::Real, ns, Some(offset))?;
        self.check_type(TimestampType::Real)?;
        Ok(ts)
    }

    fn make_elapsed(&mut self, ns: i64) -> Result<Timestamp, TimeError> {
        self.check_type(TimestampType::Elapsed)?;
        Ok(Timestamp::new(TimestampType::Elapsed, ns))
    }

    fn check_type(&mut self, requested: TimestampType) -> Result<(), TimeError> {
        match self.created_type {
            None => {
                self.created_type = Some(requested);
                Ok(())
            }
            Some(created) if created == requested => Ok(()),
            Some(created) => Err(TimeError::TimestampTypeMismatch {
                expected: created,
                actual: requested,
            }),
        }
    }
}

fn timezone_offset_ns(timezone: &str, utc_ns: i64) -> Result<i64, TimeError> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| TimeError::UnknownTimezone(timezone.to_string()))?;
    let utc = Utc.timestamp_nanos(utc_ns).naive_utc();
    let offset_secs = tz.offset_from_utc_datetime(&utc).fix().local_minus_utc();
    Ok(i64::from(offset_secs) * time_utils::NS_PER_S)
}
