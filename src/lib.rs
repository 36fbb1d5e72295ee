//! tracetime - clock-domain timestamps, multi-trace synchronization and OTA
//! payload statistics.
//!
//! # Modules
//!
//! - [`timestamp`] - `Timestamp` value type and time ranges
//! - [`converter`] - per-session `TimestampConverter` owning clock offsets
//! - [`search`] - binary searches and closest-entry lookup
//! - [`time_utils`] - formatting, parsing and integer rounding helpers
//! - [`traces`] - traces, positions and the generic presenter
//! - [`session`] - loading a trace bundle into a session
//! - [`notifier`] - batched user notifications
//! - [`payload`] - install-operation statistics
//!
//! # Example
//!
//! ```
//! use tracetime::{search, TimestampConverter, TimezoneInfo};
//!
//! let mut converter =
//!     TimestampConverter::with_offsets(TimezoneInfo::default(), None, Some(1_000)).unwrap();
//! let timestamps: Vec<_> = [10, 20, 30]
//!     .iter()
//!     .map(|ns| converter.make_timestamp_from_boot_ns(*ns).unwrap())
//!     .collect();
//! let target = converter.make_timestamp_from_boot_ns(25).unwrap();
//! assert_eq!(search::closest_index(&timestamps, &target).unwrap(), Some(1));
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod notifier;
pub mod payload;
pub mod search;
pub mod session;
pub mod time_utils;
pub mod timestamp;
pub mod traces;

pub use config::{Config, OutputFormat};
pub use converter::{OffsetKind, TimestampConverter, TimezoneInfo, UtcOffset};
pub use error::{PayloadError, TimeError};
pub use notifier::{Notification, Notifications};
pub use payload::{
    display_blocks, num_blocks, operated_block_statistics, operated_payload_statistics,
    BlockIndex, Manifest, OperationStatistics, OperationType,
};
pub use session::{BundleDescriptor, Session};
pub use timestamp::{TimeRange, Timestamp, TimestampType};
pub use traces::{Presenter, Trace, TraceKind, TracePosition, Traces};
