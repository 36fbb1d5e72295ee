//! Fixture helpers for tracetime integration tests.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

/// 2022-11-10T22:04:54Z in nanoseconds since the epoch.
pub const BOOT_OFFSET_NS: i64 = 1_668_117_894_000_000_000;

/// Run the tracetime binary with the given arguments.
pub fn run_tracetime(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tracetime"))
        .args(args)
        .output()
        .expect("Failed to run tracetime")
}

pub fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Write `contents` to `name` inside a fresh temp dir.
pub fn write_fixture(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("Failed to write fixture");
    (dir, path)
}

/// Three boot-clock traces; only SurfaceFlinger carries the real-to-boot offset.
pub fn bundle_json(extra_traces: &str) -> String {
    format!(
        r#"{{
  "timezone": {{"timezone": "UTC", "locale": "en-US"}},
  "traces": [
    {{"name": "sf", "kind": "surface_flinger", "clock": "boot",
      "real_to_boot_offset_ns": {BOOT_OFFSET_NS},
      "timestamps_ns": [0, 100000000, 200000000]}},
    {{"name": "wm", "kind": "window_manager", "clock": "boot",
      "timestamps_ns": [50000000, 150000000]}},
    {{"name": "ime", "kind": "input_method", "clock": "boot",
      "timestamps_ns": [120000000]}}{extra_traces}
  ]
}}"#
    )
}

/// Two partitions touching REPLACE, BSDIFF and ZERO operations.
pub const MANIFEST_JSON: &str = r#"{
  "blockSize": 4096,
  "partitions": [
    {"partitionName": "system", "operations": [
      {"type": 0, "dstExtents": [{"startBlock": 0, "numBlocks": 5}], "dataLength": 100},
      {"type": 3, "dstExtents": [{"startBlock": 5, "numBlocks": 3}], "dataLength": 100}
    ]},
    {"partitionName": "vendor", "operations": [
      {"type": 3, "dstExtents": [{"startBlock": 0, "numBlocks": 2}], "dataLength": 250},
      {"type": 6, "dstExtents": [{"startBlock": 2, "numBlocks": 10}]}
    ]}
  ]
}"#;
