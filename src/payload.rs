//! OTA payload install-operation statistics.
//!
//! The manifest parser hands over partitions of install operations. Each
//! operation has a numeric type code, the destination block extents it writes
//! and the length of its data blob in the payload. The folds here group those
//! operations by type label and sum blocks or bytes.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::PayloadError;
use crate::search::last_lower_or_equal;
use crate::time_utils::divide_and_round;

/// Install operation kinds, by their manifest type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Replace,
    ReplaceBz,
    Move,
    Bsdiff,
    SourceCopy,
    SourceBsdiff,
    Zero,
    Discard,
    ReplaceXz,
    Puffdiff,
    BrotliBsdiff,
    Zucchini,
    Lz4diffBsdiff,
    Lz4diffPuffdiff,
}

static OPERATION_TYPES: [(i32, OperationType, &str); 14] = [
    (0, OperationType::Replace, "REPLACE"),
    (1, OperationType::ReplaceBz, "REPLACE_BZ"),
    (2, OperationType::Move, "MOVE"),
    (3, OperationType::Bsdiff, "BSDIFF"),
    (4, OperationType::SourceCopy, "SOURCE_COPY"),
    (5, OperationType::SourceBsdiff, "SOURCE_BSDIFF"),
    (6, OperationType::Zero, "ZERO"),
    (7, OperationType::Discard, "DISCARD"),
    (8, OperationType::ReplaceXz, "REPLACE_XZ"),
    (9, OperationType::Puffdiff, "PUFFDIFF"),
    (10, OperationType::BrotliBsdiff, "BROTLI_BSDIFF"),
    (11, OperationType::Zucchini, "ZUCCHINI"),
    (12, OperationType::Lz4diffBsdiff, "LZ4DIFF_BSDIFF"),
    (13, OperationType::Lz4diffPuffdiff, "LZ4DIFF_PUFFDIFF"),
];

impl OperationType {
    pub fn from_code(code: i32) -> Option<Self> {
        OPERATION_TYPES
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(_, op, _)| *op)
    }

    pub fn code(self) -> i32 {
        self.entry().0
    }

    pub fn label(self) -> &'static str {
        self.entry().2
    }

    fn entry(self) -> &'static (i32, OperationType, &'static str) {
        // Every variant has exactly one row in the table.
        &OPERATION_TYPES[self as usize]
    }
}

/// Contiguous run of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extent {
    pub start_block: u64,
    pub num_blocks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOperation {
    /// Raw manifest type code.
    #[serde(rename = "type")]
    pub op_type: i32,
    #[serde(default)]
    pub dst_extents: Vec<Extent>,
    #[serde(default)]
    pub data_length: u64,
}

impl InstallOperation {
    pub fn operation_type(&self) -> Option<OperationType> {
        OperationType::from_code(self.op_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    #[serde(default)]
    pub partition_name: String,
    pub operations: Vec<InstallOperation>,
}

fn default_block_size() -> u64 {
    4096
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    pub partitions: Vec<Partition>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    /// Blocks written across all partitions.
    pub fn total_blocks(&self) -> Result<u64, PayloadError> {
        let mut total: u64 = 0;
        for partition in &self.partitions {
            for op in &partition.operations {
                total = num_blocks(&op.dst_extents)
                    .and_then(|n| total.checked_add(n))
                    .ok_or_else(|| overflow(partition))?;
            }
        }
        Ok(total)
    }
}

/// Per-label totals, in first-seen label order.
///
/// A label only appears once an operation of that type was seen, so a type
/// with no operations is absent rather than zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationStatistics {
    entries: Vec<(&'static str, u64)>,
    /// Sum over all entries. Bounds every entry, so it is the only checked add.
    total: u64,
}

impl OperationStatistics {
    /// Returns `None` if the running total would overflow; nothing is changed then.
    fn add(&mut self, label: &'static str, value: u64) -> Option<()> {
        self.total = self.total.checked_add(value)?;
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some((_, sum)) => *sum += value,
            None => self.entries.push((label, value)),
        }
        Some(())
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| *v)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Share of the total per label, in whole percent rounded half up.
    pub fn percentages(&self) -> Vec<(&'static str, u64)> {
        let total = self.total();
        self.entries
            .iter()
            .map(|(label, value)| {
                (*label, percent(*value, total))
            })
            .collect()
    }
}

fn percent(value: u64, total: u64) -> u64 {
    if let Some(scaled) = value.checked_mul(100) {
        return divide_and_round(scaled, total).unwrap_or(0);
    }
    // value * 100 only fits in u128; total >= value here, so the result is <= 100
    let (scaled, total) = (u128::from(value) * 100, u128::from(total));
    let (quotient, remainder) = (scaled / total, scaled % total);
    let rounded = if remainder >= total - remainder {
        quotient + 1
    } else {
        quotient
    };
    u64::try_from(rounded).unwrap_or(100)
}

impl Serialize for OperationStatistics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Sum of block counts over a run of extents, `None` on overflow.
pub fn num_blocks(extents: &[Extent]) -> Option<u64> {
    extents
        .iter()
        .try_fold(0u64, |sum, e| sum.checked_add(e.num_blocks))
}

fn overflow(partition: &Partition) -> PayloadError {
    PayloadError::Overflow {
        partition: partition.partition_name.clone(),
    }
}

/// Render extents as `(start,count)(start,count)...`.
pub fn display_blocks(extents: &[Extent]) -> String {
    let mut out = String::new();
    for e in extents {
        // Writing to a String cannot fail.
        let _ = write!(out, "({},{})", e.start_block, e.num_blocks);
    }
    out
}

/// Blocks written per operation type.
pub fn operated_block_statistics(
    partitions: &[Partition],
) -> Result<OperationStatistics, PayloadError> {
    fold_operations(partitions, |op| num_blocks(&op.dst_extents))
}

/// Payload bytes per operation type.
pub fn operated_payload_statistics(
    partitions: &[Partition],
) -> Result<OperationStatistics, PayloadError> {
    fold_operations(partitions, |op| Some(op.data_length))
}

fn fold_operations(
    partitions: &[Partition],
    value: impl Fn(&InstallOperation) -> Option<u64>,
) -> Result<OperationStatistics, PayloadError> {
    let mut stats = OperationStatistics::default();
    for partition in partitions {
        for op in &partition.operations {
            let op_type =
                op.operation_type()
                    .ok_or_else(|| PayloadError::UnknownOperationType {
                        code: op.op_type,
                        partition: partition.partition_name.clone(),
                    })?;
            value(op)
                .and_then(|v| stats.add(op_type.label(), v))
                .ok_or_else(|| overflow(partition))?;
        }
    }
    Ok(stats)
}

/// Which operation wrote a given destination block.
#[derive(Debug, Clone)]
pub struct BlockIndex {
    /// (start_block, end_block exclusive, label), sorted by start block.
    ranges: Vec<(u64, u64, &'static str)>,
    starts: Vec<u64>,
}

impl BlockIndex {
    /// Index the destination extents of one partition.
    pub fn new(partition: &Partition) -> Result<Self, PayloadError> {
        let mut ranges = Vec::new();
        for op in &partition.operations {
            let op_type =
                op.operation_type()
                    .ok_or_else(|| PayloadError::UnknownOperationType {
                        code: op.op_type,
                        partition: partition.partition_name.clone(),
                    })?;
            for e in op.dst_extents.iter().filter(|e| e.num_blocks > 0) {
                ranges.push((
                    e.start_block,
                    e.start_block.saturating_add(e.num_blocks),
                    op_type.label(),
                ));
            }
        }
        ranges.sort_by_key(|r| r.0);
        let starts = ranges.iter().map(|r| r.0).collect();
        Ok(Self { ranges, starts })
    }

    /// Label of the operation that wrote `block`, if any.
    pub fn query(&self, block: u64) -> Option<&'static str> {
        let i = last_lower_or_equal(&self.starts, &block)?;
        let (_, end, label) = self.ranges[i];
        (block < end).then_some(label)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(code: i32, extents: &[(u64, u64)], data_length: u64) -> InstallOperation {
        InstallOperation {
            op_type: code,
            dst_extents: extents
                .iter()
                .map(|&(start_block, num_blocks)| Extent {
                    start_block,
                    num_blocks,
                })
                .collect(),
            data_length,
        }
    }

    fn partition(name: &str, operations: Vec<InstallOperation>) -> Partition {
        Partition {
            partition_name: name.to_string(),
            operations,
        }
    }

    #[test]
    fn test_type_table_is_consistent() {
        for (code, op_type, label) in OPERATION_TYPES {
            assert_eq!(OperationType::from_code(code), Some(op_type));
            assert_eq!(op_type.code(), code);
            assert_eq!(op_type.label(), label);
        }
        assert_eq!(OperationType::from_code(14), None);
        assert_eq!(OperationType::from_code(-1), None);
    }

    #[test]
    fn test_single_replace_block_statistics() {
        let partitions = vec![partition("system", vec![op(0, &[(0, 5)], 0)])];
        let stats = operated_block_statistics(&partitions).unwrap();
        assert_eq!(stats.iter().collect::<Vec<_>>(), vec![("REPLACE", 5)]);
    }

    #[test]
    fn test_absent_type_is_not_zero() {
        let partitions = vec![partition(
            "system",
            vec![op(0, &[(0, 5)], 10), op(6, &[], 0)],
        )];
        let stats = operated_block_statistics(&partitions).unwrap();
        // ZERO was seen with no blocks: present with 0.
        assert_eq!(stats.get("ZERO"), Some(0));
        // BSDIFF was never seen: absent.
        assert_eq!(stats.get("BSDIFF"), None);
        assert!(!stats.contains("BSDIFF"));
        assert_eq!(stats.len(), 2);
    }

    #[test]
    fn test_payload_statistics_sum_data_length() {
        let partitions = vec![
            partition("system", vec![op(3, &[(0, 1)], 100)]),
            partition("vendor", vec![op(3, &[(7, 9)], 250)]),
        ];
        let stats = operated_payload_statistics(&partitions).unwrap();
        assert_eq!(stats.get("BSDIFF"), Some(350));
        let blocks = operated_block_statistics(&partitions).unwrap();
        assert_eq!(blocks.get("BSDIFF"), Some(10));
    }

    #[test]
    fn test_first_seen_order() {
        let partitions = vec![
            partition("system", vec![op(6, &[(0, 1)], 0), op(0, &[(1, 1)], 0)]),
            partition("vendor", vec![op(4, &[(0, 1)], 0), op(6, &[(1, 1)], 0)]),
        ];
        let stats = operated_block_statistics(&partitions).unwrap();
        let labels: Vec<&str> = stats.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["ZERO", "REPLACE", "SOURCE_COPY"]);
        assert_eq!(stats.get("ZERO"), Some(2));
    }

    #[test]
    fn test_unknown_type_fails_fast() {
        let partitions = vec![partition("odm", vec![op(0, &[(0, 1)], 0), op(99, &[], 0)])];
        assert_eq!(
            operated_block_statistics(&partitions).unwrap_err(),
            PayloadError::UnknownOperationType {
                code: 99,
                partition: "odm".to_string()
            }
        );
    }

    #[test]
    fn test_empty_partitions() {
        assert!(operated_block_statistics(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_num_and_display_blocks() {
        let extents = [
            Extent {
                start_block: 0,
                num_blocks: 3,
            },
            Extent {
                start_block: 10,
                num_blocks: 2,
            },
        ];
        assert_eq!(num_blocks(&extents), Some(5));
        assert_eq!(display_blocks(&extents), "(0,3)(10,2)");
        assert_eq!(num_blocks(&[]), Some(0));
        assert_eq!(display_blocks(&[]), "");
    }

    #[test]
    fn test_percentages_round_half_up() {
        let partitions = vec![partition(
            "system",
            vec![op(0, &[(0, 1)], 0), op(3, &[(1, 1)], 0), op(4, &[(2, 6)], 0)],
        )];
        let stats = operated_block_statistics(&partitions).unwrap();
        assert_eq!(stats.total(), 8);
        // 12.5% rounds up, 75% exact
        assert_eq!(
            stats.percentages(),
            vec![("REPLACE", 13), ("BSDIFF", 13), ("SOURCE_COPY", 75)]
        );
        assert!(OperationStatistics::default().percentages().is_empty());
    }

    #[test]
    fn test_block_index_probes() {
        let labels = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]
            .map(|code| OperationType::from_code(code).unwrap().label());
        let operations = (0..11)
            .map(|i| op(i as i32, &[(i, 1)], 0))
            .collect::<Vec<_>>();
        let index = BlockIndex::new(&partition("system", operations)).unwrap();
        assert_eq!(index.len(), 11);
        for probe in 0..11u64 {
            assert_eq!(index.query(probe), Some(labels[probe as usize]));
        }
        assert_eq!(index.query(11), None);
    }

    #[test]
    fn test_block_sum_overflow_is_an_error() {
        let partitions = vec![partition(
            "system",
            vec![op(0, &[(0, u64::MAX)], 0), op(0, &[(0, 1)], 0)],
        )];
        assert_eq!(
            operated_block_statistics(&partitions).unwrap_err(),
            PayloadError::Overflow {
                partition: "system".to_string()
            }
        );

        let extents = [
            Extent {
                start_block: 0,
                num_blocks: u64::MAX,
            },
            Extent {
                start_block: 1,
                num_blocks: 1,
            },
        ];
        assert_eq!(num_blocks(&extents), None);
        let manifest = Manifest {
            block_size: 4096,
            partitions: vec![partition("vendor", vec![op(0, &[(0, u64::MAX), (1, 1)], 0)])],
        };
        assert!(manifest.total_blocks().is_err());
    }

    #[test]
    fn test_payload_sum_overflow_across_labels() {
        let partitions = vec![
            partition("system", vec![op(0, &[], u64::MAX)]),
            partition("vendor", vec![op(3, &[], 1)]),
        ];
        assert_eq!(
            operated_payload_statistics(&partitions).unwrap_err(),
            PayloadError::Overflow {
                partition: "vendor".to_string()
            }
        );
    }

    #[test]
    fn test_percentages_of_huge_values() {
        let partitions = vec![partition(
            "system",
            vec![op(0, &[], u64::MAX / 2), op(3, &[], u64::MAX / 2)],
        )];
        let stats = operated_payload_statistics(&partitions).unwrap();
        assert_eq!(stats.percentages(), vec![("REPLACE", 50), ("BSDIFF", 50)]);
    }

    #[test]
    fn test_block_index_gaps() {
        let index = BlockIndex::new(&partition(
            "system",
            vec![op(0, &[(10, 5)], 0), op(6, &[(0, 2)], 0)],
        ))
        .unwrap();
        assert_eq!(index.query(1), Some("ZERO"));
        assert_eq!(index.query(5), None);
        assert_eq!(index.query(14), Some("REPLACE"));
        assert_eq!(index.query(15), None);
    }

    #[test]
    fn test_manifest_json() {
        let json = r#"{
            "blockSize": 4096,
            "partitions": [
                {"partitionName": "system", "operations": [
                    {"type": 0, "dstExtents": [{"startBlock": 0, "numBlocks": 5}], "dataLength": 20480},
                    {"type": 6, "dstExtents": [{"startBlock": 5, "numBlocks": 3}]}
                ]}
            ]
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.total_blocks().unwrap(), 8);
        let stats = operated_payload_statistics(&manifest.partitions).unwrap();
        assert_eq!(serde_json::to_string(&stats).unwrap(), r#"{"REPLACE":20480,"ZERO":0}"#);
    }
}
