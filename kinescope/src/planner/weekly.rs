//! Weekly planner (§4.D): generates, for each broadcast channel, a
//! time-of-day slot map of series assignments valid Sunday→Sunday.

use std::collections::HashMap;

use chrono::{DateTime, Datelike as _, Duration as ChronoDuration, FixedOffset, TimeZone as _, Utc};
use rand::Rng;

use crate::{
    catalog::Catalog,
    error::Error,
    store::{
        time_of_day_key, ChannelWeek, SeriesMap, Store, TimeOfDay,
        WeeklySchedule, TEST_PATTERN_SENTINEL,
    },
};

/// Weighted back-to-back run-length distribution (§4.D, §8 seed scenario 1).
const RUN_LENGTHS: [(usize, f64); 5] =
    [(2, 0.80), (3, 0.10), (4, 0.05), (5, 0.03), (6, 0.02)];

/// Generates and persists [`WeeklySchedule`]s.
#[derive(Clone, Debug)]
pub struct WeeklyPlanner {
    store: Store,
    catalog: Catalog,
}

impl WeeklyPlanner {
    /// Wraps `store`/`catalog` as a [`WeeklyPlanner`].
    #[must_use]
    pub fn new(store: Store, catalog: Catalog) -> Self {
        Self { store, catalog }
    }

    /// The most recent Sunday 00:00 in `tz`, expressed as the equivalent
    /// instant in UTC.
    #[must_use]
    pub fn week_start(now: DateTime<Utc>, tz: FixedOffset) -> DateTime<Utc> {
        let local = now.with_timezone(&tz);
        let back_days = i64::from(local.weekday().num_days_from_sunday());
        let midnight = tz
            .ymd(local.year(), local.month(), local.day())
            .and_hms(0, 0, 0);
        (midnight - ChronoDuration::days(back_days)).with_timezone(&Utc)
    }

    /// Whether the stored plan needs regenerating (§3): missing, or its
    /// `week_start` predates the most recent Sunday midnight.
    pub async fn needs_regeneration(
        &self,
        now: DateTime<Utc>,
        tz: FixedOffset,
    ) -> bool {
        match self.store.load_weekly_schedule().await {
            None => true,
            Some(plan) => plan.week_start < Self::week_start(now, tz),
        }
    }

    /// Returns the current [`WeeklySchedule`], regenerating and persisting a
    /// fresh one first if [`Self::needs_regeneration`].
    ///
    /// # Errors
    ///
    /// If persisting a freshly generated plan fails.
    pub async fn ensure_current(
        &self,
        now: DateTime<Utc>,
        tz: FixedOffset,
        rng: &mut impl Rng,
    ) -> Result<WeeklySchedule, Error> {
        if !self.needs_regeneration(now, tz).await {
            if let Some(plan) = self.store.load_weekly_schedule().await {
                return Ok(plan);
            }
        }
        self.generate(now, tz, rng).await
    }

    /// Unconditionally generates, persists and returns a fresh
    /// [`WeeklySchedule`]. Does not touch cursors.
    ///
    /// # Errors
    ///
    /// If persisting the generated plan fails.
    pub async fn generate(
        &self,
        now: DateTime<Utc>,
        tz: FixedOffset,
        rng: &mut impl Rng,
    ) -> Result<WeeklySchedule, Error> {
        let channels = self.store.load_channels().await;
        let series = self.store.load_series().await;

        let mut plan = WeeklySchedule {
            week_start: Self::week_start(now, tz),
            generated_tz: tz,
            channels: HashMap::new(),
        };

        for (channel_id, channel) in &channels {
            if !channel.is_broadcast() {
                continue;
            }
            let filter = channel
                .series_filter
                .as_ref()
                .expect("is_broadcast() guarantees series_filter is Some");

            let mut week = ChannelWeek::default();
            for (tod, slot_count) in TimeOfDay::SCHEDULED {
                let eligible =
                    self.eligible_series(filter, &series, tod).await;
                let slots = if eligible.is_empty() {
                    vec![TEST_PATTERN_SENTINEL.to_owned(); slot_count]
                } else {
                    Self::fill_slots(&eligible, slot_count, rng)
                };
                let _ = week.time_slots.insert(time_of_day_key(tod), slots);
            }
            let _ = plan.channels.insert(channel_id.clone(), week);
        }

        self.store.save_weekly_schedule(&plan).await?;

        let mut meta = self.store.load_schedule_meta().await;
        meta.weekly_generated_at = Some(now);
        self.store.save_schedule_meta(&meta).await?;

        Ok(plan)
    }

    async fn eligible_series(
        &self,
        filter: &std::collections::HashSet<String>,
        series: &SeriesMap,
        tod: TimeOfDay,
    ) -> Vec<String> {
        let mut eligible = Vec::new();
        for s in filter {
            let Some(meta) = series.get(s) else {
                continue;
            };
            if !meta.time_of_day.matches(tod) {
                continue;
            }
            if self.catalog.episodes_of(s).await.is_empty() {
                continue;
            }
            eligible.push(s.clone());
        }
        eligible
    }

    /// Fills `slot_count` slots by repeatedly choosing a uniformly random
    /// series from `eligible` and appending it back-to-back for a weighted
    /// run length, truncating the final run to fit.
    fn fill_slots(
        eligible: &[String],
        slot_count: usize,
        rng: &mut impl Rng,
    ) -> Vec<String> {
        let mut slots = Vec::with_capacity(slot_count);
        while slots.len() < slot_count {
            let series = &eligible[rng.gen_range(0, eligible.len())];
            let run = Self::sample_run_length(rng);
            for _ in 0..run {
                if slots.len() >= slot_count {
                    break;
                }
                slots.push(series.clone());
            }
        }
        slots
    }

    fn sample_run_length(rng: &mut impl Rng) -> usize {
        let roll: f64 = rng.gen();
        let mut cumulative = 0.0;
        for (len, weight) in RUN_LENGTHS {
            cumulative += weight;
            if roll < cumulative {
                return len;
            }
        }
        RUN_LENGTHS[RUN_LENGTHS.len() - 1].0
    }
}

#[cfg(test)]
mod spec {
    use rand::{rngs::StdRng, SeedableRng as _};

    use super::*;

    /// Seed scenario 1: over 1,000 trials of filling a 10-slot bucket, the
    /// empirical run-length histogram matches the weighted distribution
    /// within ±3% per bin.
    #[test]
    fn run_length_distribution_matches_weights_within_3_percent() {
        let mut rng = StdRng::seed_from_u64(42);
        let eligible = vec!["only".to_owned()];

        let mut histogram: HashMap<usize, u32> = HashMap::new();
        let trials = 1_000;
        for _ in 0..trials {
            let slots = WeeklyPlanner::fill_slots(&eligible, 10, &mut rng);
            // Recover run lengths by scanning contiguous repeats; since
            // there's only one series, every fill is one or more runs
            // concatenated until 10 slots are reached (last one truncated).
            let mut i = 0;
            while i < slots.len() {
                let mut j = i;
                while j < slots.len() && slots[j] == slots[i] {
                    j += 1;
                }
                if j < slots.len() {
                    // Only count runs strictly inside the slot array: the
                    // final (possibly truncated) run is excluded.
                    *histogram.entry(j - i).or_insert(0) += 1;
                }
                i = j;
            }
        }

        let total: u32 = histogram.values().sum();
        for (len, weight) in RUN_LENGTHS {
            let observed =
                f64::from(*histogram.get(&len).unwrap_or(&0)) / f64::from(total);
            assert!(
                (observed - weight).abs() < 0.03,
                "run length {} observed {:.3}, expected {:.3}",
                len,
                observed,
                weight,
            );
        }
    }

    #[test]
    fn week_start_is_most_recent_sunday_midnight() {
        let tz = FixedOffset::east(0);
        // 2026-07-28 is a Tuesday.
        let tuesday = Utc.ymd(2026, 7, 28).and_hms(15, 30, 0);
        let start = WeeklyPlanner::week_start(tuesday, tz);

        assert_eq!(start, Utc.ymd(2026, 7, 26).and_hms(0, 0, 0));
    }

    #[test]
    fn week_start_on_sunday_itself_is_todays_midnight() {
        let tz = FixedOffset::east(0);
        let sunday = Utc.ymd(2026, 7, 26).and_hms(23, 0, 0);
        let start = WeeklyPlanner::week_start(sunday, tz);

        assert_eq!(start, Utc.ymd(2026, 7, 26).and_hms(0, 0, 0));
    }
}
