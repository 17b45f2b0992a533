//! Weekly (§4.D) and daily (§4.E) planners: deterministic pre-computation of
//! the program grid each broadcast channel's switcher branch (§4.G) and
//! schedule lookup (§4.F) read from.

pub mod daily;
pub mod weekly;

pub use self::{daily::DailyPlanner, weekly::WeeklyPlanner};

use crate::store::TimeOfDay;

/// Number of contiguous 30-minute blocks covering `[3600, 86400)` seconds
/// since 03:00 (the 03:00–04:00 test-pattern hour is outside this grid).
pub const TOTAL_BLOCKS: usize = 46;

/// Seconds since 03:00 at which the programming window (past the leading
/// test-pattern hour) begins.
pub const PROGRAMMING_START_SEC: u32 = 3600;

/// Length of one programming block, in seconds.
pub const BLOCK_LEN_SEC: u32 = 1800;

/// Start of block `k`, in seconds since 03:00.
#[must_use]
pub fn block_start_sec(k: usize) -> u32 {
    PROGRAMMING_START_SEC + BLOCK_LEN_SEC * k as u32
}

/// Which of the five scheduled [`TimeOfDay`] buckets block `k` falls in, and
/// `k`'s index within that bucket's slot array.
///
/// Panics if `k >= TOTAL_BLOCKS`.
#[must_use]
pub fn block_period_index(k: usize) -> (TimeOfDay, usize) {
    assert!(k < TOTAL_BLOCKS, "block index {} out of range", k);

    let mut start = 0;
    for (tod, count) in TimeOfDay::SCHEDULED {
        if k < start + count {
            return (tod, k - start);
        }
        start += count;
    }
    unreachable!("TimeOfDay::SCHEDULED slot counts must sum to TOTAL_BLOCKS");
}

#[cfg(test)]
mod spec {
    use super::*;

    #[test]
    fn period_index_covers_every_block_exactly_once() {
        let mut seen = std::collections::HashMap::new();
        for k in 0..TOTAL_BLOCKS {
            let (tod, i) = block_period_index(k);
            *seen.entry(tod_key(tod)).or_insert(0) += 1;
            assert!(i < slot_count(tod));
        }
        assert_eq!(seen.values().sum::<usize>(), TOTAL_BLOCKS);
    }

    #[test]
    fn block_starts_are_contiguous_half_hours() {
        for k in 0..TOTAL_BLOCKS {
            assert_eq!(
                block_start_sec(k),
                PROGRAMMING_START_SEC + 1800 * k as u32
            );
        }
    }

    fn tod_key(tod: TimeOfDay) -> &'static str {
        match tod {
            TimeOfDay::EarlyMorning => "early_morning",
            TimeOfDay::LateMorning => "late_morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
            TimeOfDay::Any => "any",
        }
    }

    fn slot_count(tod: TimeOfDay) -> usize {
        TimeOfDay::SCHEDULED
            .iter()
            .find(|(t, _)| *t == tod)
            .map_or(0, |(_, c)| *c)
    }
}
