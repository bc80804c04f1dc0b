//! Rank-based query bounds.
//!
//! Converts signed start/stop ranks (negative indices count from the end)
//! into an absolute `(offset, count)` window over the ascending score-key
//! sequence. The underlying scan always proceeds ascending; a reverse
//! query mirrors the window and direction is realized purely in how
//! results are later presented.

use sable_common::SableResult;
use sable_kv::Snapshot;

use crate::codec;

/// Normalize `(start, stop)` ranks against a known cardinality.
///
/// Returns `None` for an empty window. The scan primitive clamps to the
/// available entries, so no further bound check is performed here.
pub fn rank_window(cardinality: u64, start: i64, stop: i64, reverse: bool) -> Option<(u64, u64)> {
    if cardinality == 0 {
        return None;
    }
    let n = cardinality as i64;

    let start = if start < 0 {
        (start + n).max(0)
    } else if start >= n {
        return None;
    } else {
        start
    };

    let stop = if stop < 0 {
        (stop + n).max(0)
    } else if stop >= n {
        n - 1
    } else {
        stop
    };

    if stop < start {
        return None;
    }
    let count = (stop - start + 1) as u64;

    if reverse {
        // Mirror the window so the ascending scan yields the same members
        // the descending view would.
        Some(((n - stop - 1) as u64, count))
    } else {
        Some((start as u64, count))
    }
}

/// Resolve a rank window for `set` under `snapshot`.
///
/// An absent meta record means the set does not exist: empty window.
pub fn resolve<S: Snapshot>(
    snapshot: &S,
    set: &[u8],
    start: i64,
    stop: i64,
    reverse: bool,
) -> SableResult<Option<(u64, u64)>> {
    match snapshot.get(&codec::meta_key(set))? {
        None => Ok(None),
        Some(raw) => {
            let cardinality = codec::decode_u64(&raw)?;
            Ok(rank_window(cardinality, start, stop, reverse))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::rank_window;

    #[test]
    fn test_empty_set_has_no_window() {
        assert_eq!(rank_window(0, 0, -1, false), None);
        assert_eq!(rank_window(0, 0, 10, true), None);
    }

    #[test]
    fn test_full_range_via_negative_stop() {
        assert_eq!(rank_window(5, 0, -1, false), Some((0, 5)));
    }

    #[test]
    fn test_plain_positive_window() {
        assert_eq!(rank_window(10, 2, 4, false), Some((2, 3)));
    }

    #[test]
    fn test_negative_start_counts_from_end() {
        // Last two elements.
        assert_eq!(rank_window(5, -2, -1, false), Some((3, 2)));
    }

    #[test]
    fn test_start_below_negative_cardinality_clamps_to_zero() {
        assert_eq!(rank_window(3, -100, -1, false), Some((0, 3)));
    }

    #[test]
    fn test_stop_beyond_cardinality_clamps_to_last() {
        assert_eq!(rank_window(3, 0, 100, false), Some((0, 3)));
    }

    #[test]
    fn test_start_at_or_past_cardinality_is_empty() {
        assert_eq!(rank_window(3, 3, 5, false), None);
        assert_eq!(rank_window(3, 7, 9, false), None);
    }

    #[test]
    fn test_degenerate_window_after_normalization_is_empty() {
        // start=2, stop normalized to 1.
        assert_eq!(rank_window(3, 2, -2, false), None);
    }

    #[test]
    fn test_reverse_mirrors_offset() {
        // n=5, ranks 0..=1 in the descending view are the two highest
        // scores: ascending offsets 3..=4.
        assert_eq!(rank_window(5, 0, 1, true), Some((3, 2)));
        // Full reverse range scans everything.
        assert_eq!(rank_window(5, 0, -1, true), Some((0, 5)));
    }

    #[test]
    fn test_reverse_middle_window() {
        // n=6, reverse ranks 1..=3 map to ascending offsets 2..=4.
        assert_eq!(rank_window(6, 1, 3, true), Some((2, 3)));
    }

    #[test]
    fn test_single_element_windows() {
        assert_eq!(rank_window(1, 0, 0, false), Some((0, 1)));
        assert_eq!(rank_window(1, 0, -1, true), Some((0, 1)));
        assert_eq!(rank_window(4, -1, -1, false), Some((3, 1)));
    }
}
