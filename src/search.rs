//! Binary searches over sorted (non-decreasing) slices.
//!
//! All searches are O(log n) with O(1) extra space. Results for unsorted input
//! are meaningless.

use crate::error::TimeError;
use crate::timestamp::Timestamp;

/// Index of the first element `>= target`, or `None` if every element is smaller.
pub fn first_greater_or_equal<T: Ord>(values: &[T], target: &T) -> Option<usize> {
    let index = values.partition_point(|v| v < target);
    (index < values.len()).then_some(index)
}

/// Index of the first element `> target`, or `None` if none is larger.
pub fn first_greater<T: Ord>(values: &[T], target: &T) -> Option<usize> {
    let index = values.partition_point(|v| v <= target);
    (index < values.len()).then_some(index)
}

/// Index of the last element `<= target`.
///
/// When several elements equal `target` the lowest such index is returned.
/// Returns `None` when `target` precedes the first element.
pub fn last_lower_or_equal<T: Ord>(values: &[T], target: &T) -> Option<usize> {
    match first_greater_or_equal(values, target) {
        Some(index) if values[index] == *target => Some(index),
        Some(index) => index.checked_sub(1),
        None => values.len().checked_sub(1),
    }
}

/// Index of the last element `< target`, or `None` if none is smaller.
pub fn last_lower<T: Ord>(values: &[T], target: &T) -> Option<usize> {
    values.partition_point(|v| v < target).checked_sub(1)
}

/// Entry index to show for `target` in a trace with the given timestamps.
///
/// Returns the index of the last timestamp `<= target` (lowest index among
/// exact matches), the last index when `target` is past the end, and
/// `Ok(None)` when `target` is before the first timestamp.
pub fn closest_index(
    timestamps: &[Timestamp],
    target: &Timestamp,
) -> Result<Option<usize>, TimeError> {
    if timestamps.is_empty() {
        return Err(TimeError::NoTimestampsAvailable {
            requested: target.get_type(),
        });
    }
    debug_assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    Ok(last_lower_or_equal(timestamps, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::TimestampType;

    fn elapsed(values: &[i64]) -> Vec<Timestamp> {
        values
            .iter()
            .map(|v| Timestamp::new(TimestampType::Elapsed, *v))
            .collect()
    }

    fn at(value: i64) -> Timestamp {
        Timestamp::new(TimestampType::Elapsed, value)
    }

    #[test]
    fn test_first_greater_or_equal() {
        let values = [10, 20, 20, 30];
        assert_eq!(first_greater_or_equal(&values, &5), Some(0));
        assert_eq!(first_greater_or_equal(&values, &20), Some(1));
        assert_eq!(first_greater_or_equal(&values, &25), Some(3));
        assert_eq!(first_greater_or_equal(&values, &31), None);
        assert_eq!(first_greater_or_equal::<i32>(&[], &1), None);
    }

    #[test]
    fn test_first_greater() {
        let values = [10, 20, 20, 30];
        assert_eq!(first_greater(&values, &20), Some(3));
        assert_eq!(first_greater(&values, &30), None);
    }

    #[test]
    fn test_last_lower() {
        let values = [10, 20, 20, 30];
        assert_eq!(last_lower(&values, &20), Some(0));
        assert_eq!(last_lower(&values, &10), None);
        assert_eq!(last_lower(&values, &100), Some(3));
    }

    #[test]
    fn test_closest_index_exact_and_between() {
        let ts = elapsed(&[10, 20, 30]);
        assert_eq!(closest_index(&ts, &at(10)).unwrap(), Some(0));
        assert_eq!(closest_index(&ts, &at(25)).unwrap(), Some(1));
        assert_eq!(closest_index(&ts, &at(30)).unwrap(), Some(2));
    }

    #[test]
    fn test_closest_index_after_last_returns_last() {
        let ts = elapsed(&[10, 20, 30]);
        assert_eq!(closest_index(&ts, &at(1_000)).unwrap(), Some(2));
    }

    #[test]
    fn test_closest_index_before_first_is_not_found() {
        let ts = elapsed(&[10, 20, 30]);
        assert_eq!(closest_index(&ts, &at(9)).unwrap(), None);
        assert_eq!(closest_index(&ts, &at(i64::MIN)).unwrap(), None);
    }

    #[test]
    fn test_closest_index_ties_return_lowest_index() {
        let ts = elapsed(&[10, 20, 20, 20, 30]);
        assert_eq!(closest_index(&ts, &at(20)).unwrap(), Some(1));
        // Past the tie run, the last of the run is the last lower-or-equal entry.
        assert_eq!(closest_index(&ts, &at(25)).unwrap(), Some(3));
    }

    #[test]
    fn test_closest_index_empty_names_domain() {
        let target = Timestamp::new(TimestampType::Real, 5);
        assert_eq!(
            closest_index(&[], &target).unwrap_err(),
            TimeError::NoTimestampsAvailable {
                requested: TimestampType::Real
            }
        );
    }

    #[test]
    fn test_closest_index_postcondition() {
        let ts = elapsed(&[1, 3, 3, 7, 8, 8, 8, 12, 20]);
        for target in 1..25 {
            let target = at(target);
            let i = closest_index(&ts, &target).unwrap().unwrap();
            assert!(ts[i] <= target);
            assert!(i == ts.len() - 1 || ts[i + 1] > target || ts[i] == target);
            if ts[i] == target {
                assert!(i == 0 || ts[i - 1] < target);
            }
        }
    }
}
