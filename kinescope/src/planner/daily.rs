//! Daily planner (§4.E): expands the weekly plan into an ordered,
//! second-indexed list of segments covering one 24-hour "broadcast day"
//! starting at 03:00.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Timelike as _, Utc};
use rand::{seq::SliceRandom as _, Rng};

use crate::{
    catalog::Catalog,
    cursor,
    error::Error,
    store::{
        time_of_day_key, ChannelWeek, DailySchedule, EpisodeCursors, Segment,
        SegmentKind, Store, Video, WeeklySchedule, TEST_PATTERN_SENTINEL,
    },
};

use super::{block_period_index, block_start_sec, BLOCK_LEN_SEC, TOTAL_BLOCKS};

/// Duration thresholds selecting a block structure (§4.E table), in seconds.
const VERY_SHORT_MAX: f64 = 600.0;
const SHORT_MAX: f64 = 900.0;
const MEDIUM_MAX: f64 = 1680.0;
const LONG_MAX: f64 = 3480.0;

/// How many episodes a block of this structure plays, and across how many
/// contiguous 30-minute blocks.
fn block_structure(duration_sec: f64) -> (usize, usize) {
    if duration_sec < VERY_SHORT_MAX {
        (3, 1)
    } else if duration_sec < SHORT_MAX {
        (2, 1)
    } else if duration_sec < MEDIUM_MAX {
        (1, 1)
    } else if duration_sec < LONG_MAX {
        (1, 2)
    } else {
        (1, ((duration_sec / f64::from(BLOCK_LEN_SEC)).ceil() as usize).max(1))
    }
}

/// Generates and persists [`DailySchedule`]s.
#[derive(Clone, Debug)]
pub struct DailyPlanner {
    store: Store,
    catalog: Catalog,
}

impl DailyPlanner {
    /// Wraps `store`/`catalog` as a [`DailyPlanner`].
    #[must_use]
    pub fn new(store: Store, catalog: Catalog) -> Self {
        Self { store, catalog }
    }

    /// Local 03:00 of the broadcast day `now` falls into (yesterday's, if
    /// it's not yet 03:00 local), expressed as the equivalent UTC instant.
    #[must_use]
    pub fn schedule_date(now: DateTime<Utc>, tz: FixedOffset) -> DateTime<Utc> {
        let local = now.with_timezone(&tz);
        let date = if local.hour() < 3 {
            local.date() - ChronoDuration::days(1)
        } else {
            local.date()
        };
        date.and_hms(3, 0, 0).with_timezone(&Utc)
    }

    /// Whether the stored plan needs regenerating (§3): missing, or it is
    /// past 03:00 local and the stored `schedule_date` is not today's.
    pub async fn needs_regeneration(
        &self,
        now: DateTime<Utc>,
        tz: FixedOffset,
    ) -> bool {
        let local = now.with_timezone(&tz);
        match self.store.load_daily_schedule().await {
            None => true,
            Some(plan) => {
                local.hour() >= 3 && plan.schedule_date != Self::schedule_date(now, tz)
            }
        }
    }

    /// Returns the current [`DailySchedule`], regenerating and persisting a
    /// fresh one first if [`Self::needs_regeneration`].
    ///
    /// # Errors
    ///
    /// If persisting a freshly generated plan fails.
    pub async fn ensure_current(
        &self,
        weekly: &WeeklySchedule,
        now: DateTime<Utc>,
        tz: FixedOffset,
        rng: &mut impl Rng,
    ) -> Result<DailySchedule, Error> {
        if !self.needs_regeneration(now, tz).await {
            if let Some(plan) = self.store.load_daily_schedule().await {
                return Ok(plan);
            }
        }
        self.generate(weekly, now, tz, rng).await
    }

    /// Unconditionally generates a fresh [`DailySchedule`] from `weekly`,
    /// persisting both it and the cursor advances it made together.
    ///
    /// # Errors
    ///
    /// If persisting the cursors or the plan fails.
    pub async fn generate(
        &self,
        weekly: &WeeklySchedule,
        now: DateTime<Utc>,
        tz: FixedOffset,
        rng: &mut impl Rng,
    ) -> Result<DailySchedule, Error> {
        let schedule_date = Self::schedule_date(now, tz);
        let commercials = self.catalog.commercials().await;
        let mut cursors = self.store.load_cursors().await;

        let mut channels = HashMap::new();
        for (channel_id, week) in &weekly.channels {
            let segments = self
                .build_channel_day(
                    channel_id,
                    week,
                    &mut cursors,
                    &commercials,
                    now,
                    rng,
                )
                .await;
            let _ = channels.insert(channel_id.clone(), segments);
        }

        let plan = DailySchedule {
            schedule_date,
            valid_from: schedule_date + ChronoDuration::hours(1),
            valid_until: schedule_date + ChronoDuration::hours(24),
            channels,
        };

        // Cursors and the plan that advanced them must land together: save
        // cursors first so a crash between the two writes never leaves a
        // persisted plan whose cursor advances were lost.
        self.store.save_cursors(&cursors).await?;
        self.store.save_daily_schedule(&plan).await?;

        let mut meta = self.store.load_schedule_meta().await;
        meta.daily_generated_at = Some(now);
        self.store.save_schedule_meta(&meta).await?;

        Ok(plan)
    }

    async fn build_channel_day(
        &self,
        channel_id: &str,
        week: &ChannelWeek,
        cursors: &mut EpisodeCursors,
        commercials: &[Video],
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Vec<Segment> {
        let mut segments =
            vec![test_pattern(0, super::PROGRAMMING_START_SEC)];

        // Blocks already emitted by a prior iteration's multi-block episode
        // (long/very_long), keyed by block index.
        let mut claimed: HashMap<usize, Vec<Segment>> = HashMap::new();

        let mut k = 0;
        while k < TOTAL_BLOCKS {
            if let Some(segs) = claimed.remove(&k) {
                segments.extend(segs);
                k += 1;
                continue;
            }

            let start = block_start_sec(k);
            let end = start + BLOCK_LEN_SEC;

            let (tod, i) = block_period_index(k);
            let series_name = week
                .time_slots
                .get(&time_of_day_key(tod))
                .and_then(|slots| slots.get(i))
                .cloned();

            let series_name = match series_name {
                Some(s) if s != TEST_PATTERN_SENTINEL => s,
                _ => {
                    segments.push(test_pattern(start, end));
                    k += 1;
                    continue;
                }
            };

            let episodes = self.catalog.episodes_of(&series_name).await;
            if episodes.is_empty() {
                segments.push(test_pattern(start, end));
                k += 1;
                continue;
            }

            let preview =
                cursor::batch::peek(cursors, channel_id, &series_name, &episodes, 0)
                    .expect("episodes is non-empty");
            let duration = self.catalog.duration_of(&preview).await;
            let (episodes_per_block, blocks_spanned) = block_structure(duration);

            if blocks_spanned > 1 {
                if k + blocks_spanned > TOTAL_BLOCKS {
                    // Can't fit the full multi-block episode before the day
                    // boundary; leave this block as test pattern and retry
                    // the series fresh tomorrow rather than truncating it.
                    segments.push(test_pattern(start, end));
                    k += 1;
                    continue;
                }

                let episode = cursor::batch::advance(
                    cursors,
                    channel_id,
                    &series_name,
                    &episodes,
                    now,
                )
                .expect("episodes is non-empty");

                let per_block = duration / blocks_spanned as f64;
                for j in 0..blocks_spanned {
                    let b_start = block_start_sec(k + j);
                    let b_end = b_start + BLOCK_LEN_SEC;
                    let base_offset = j as f64 * per_block;
                    let segs = spanned_layout(
                        &episode,
                        per_block,
                        base_offset,
                        b_start,
                        b_end,
                        commercials,
                        rng,
                    );
                    if j == 0 {
                        segments.extend(segs);
                    } else {
                        let _ = claimed.insert(k + j, segs);
                    }
                }
                k += 1;
                continue;
            }

            if episodes_per_block == 1 {
                let episode = cursor::batch::advance(
                    cursors,
                    channel_id,
                    &series_name,
                    &episodes,
                    now,
                )
                .expect("episodes is non-empty");
                segments.extend(spanned_layout(
                    &episode, duration, 0.0, start, end, commercials, rng,
                ));
            } else {
                segments.extend(
                    self.multi_episode_block(
                        channel_id,
                        &series_name,
                        &episodes,
                        episodes_per_block,
                        cursors,
                        commercials,
                        now,
                        start,
                        end,
                        rng,
                    )
                    .await,
                );
            }

            k += 1;
        }

        segments
    }

    #[allow(clippy::too_many_arguments)]
    async fn multi_episode_block(
        &self,
        channel_id: &str,
        series_name: &str,
        episodes: &[Video],
        count: usize,
        cursors: &mut EpisodeCursors,
        commercials: &[Video],
        now: DateTime<Utc>,
        start: u32,
        end: u32,
        rng: &mut impl Rng,
    ) -> Vec<Segment> {
        let mut picked = Vec::with_capacity(count);
        for _ in 0..count {
            match cursor::batch::advance(cursors, channel_id, series_name, episodes, now)
            {
                Some(ep) => {
                    let d = self.catalog.duration_of(&ep).await;
                    picked.push((ep, d));
                }
                None => break,
            }
        }
        if picked.is_empty() {
            return vec![test_pattern(start, end)];
        }

        let total: f64 = picked.iter().map(|(_, d)| d).sum();
        let budget = (f64::from(BLOCK_LEN_SEC) - total).max(0.0);
        let per_break = budget / picked.len() as f64;

        let mut pos = f64::from(start);
        let mut segs = Vec::new();
        for (episode, duration) in &picked {
            segs.extend(commercial_break(commercials, per_break, &mut pos, rng));
            segs.push(episode_segment(episode, 0.0, &mut pos, *duration));
        }

        if let Some(last) = segs.last_mut() {
            last.end_sec = end;
        }
        segs
    }
}

/// Lays out one 30-minute block (or one block of a multi-block episode) as
/// `[comm, ep-half, comm, ep-half, comm]`, with the episode split into two
/// equal halves and the commercial budget split into three equal breaks.
///
/// `block_duration` is how much of the episode this particular block plays
/// (the full episode duration for a single-block structure, or
/// `duration / blocks_spanned` for a long/very_long one); `base_offset` is
/// where, inside the *source* episode, this block's portion begins.
fn spanned_layout(
    episode: &Video,
    block_duration: f64,
    base_offset: f64,
    start: u32,
    end: u32,
    commercials: &[Video],
    rng: &mut impl Rng,
) -> Vec<Segment> {
    let budget = (f64::from(BLOCK_LEN_SEC) - block_duration).max(0.0);
    let per_break = budget / 3.0;
    let half = block_duration / 2.0;

    let mut pos = f64::from(start);
    let mut segs = Vec::with_capacity(5);
    segs.extend(commercial_break(commercials, per_break, &mut pos, rng));
    segs.push(episode_segment(episode, base_offset, &mut pos, half));
    segs.extend(commercial_break(commercials, per_break, &mut pos, rng));
    segs.push(episode_segment(episode, base_offset + half, &mut pos, half));
    segs.extend(commercial_break(commercials, per_break, &mut pos, rng));

    if let Some(last) = segs.last_mut() {
        last.end_sec = end;
    }
    segs
}

fn episode_segment(
    episode: &Video,
    base_timestamp: f64,
    pos: &mut f64,
    len: f64,
) -> Segment {
    let start = *pos;
    let end = start + len;
    *pos = end;
    Segment {
        start_sec: start.round() as u32,
        end_sec: end.round() as u32,
        kind: SegmentKind::Episode,
        video_id: Some(episode.video_id.clone()),
        series_path: episode.series_path.clone(),
        base_timestamp,
    }
}

fn test_pattern(start: u32, end: u32) -> Segment {
    Segment {
        start_sec: start,
        end_sec: end,
        kind: SegmentKind::TestPattern,
        video_id: None,
        series_path: None,
        base_timestamp: 0.0,
    }
}

/// Fills a commercial break of `budget` seconds starting at `*pos`, laying
/// commercials from a shuffled copy of `pool` end-to-end and looping the
/// sequence when it's exhausted; falls back to a single
/// `sponsors_placeholder` segment when `pool` is empty. Advances `*pos` by
/// exactly `budget`.
fn commercial_break(
    pool: &[Video],
    budget: f64,
    pos: &mut f64,
    rng: &mut impl Rng,
) -> Vec<Segment> {
    if budget <= 0.0 {
        return Vec::new();
    }
    let start = *pos;
    let target_end = start + budget;
    *pos = target_end;

    if pool.is_empty() {
        return vec![Segment {
            start_sec: start.round() as u32,
            end_sec: target_end.round() as u32,
            kind: SegmentKind::SponsorsPlaceholder,
            video_id: None,
            series_path: None,
            base_timestamp: 0.0,
        }];
    }

    let mut order: Vec<&Video> = pool.iter().collect();
    order.shuffle(rng);

    let mut segs = Vec::new();
    let mut cursor = start;
    let mut i = 0;
    // `duration_or_default` is never zero for real catalog content; the
    // guard only prevents a pathological zero-length pool entry from
    // looping forever.
    while cursor < target_end - 1e-6 && i < 10_000 {
        let video = order[i % order.len()];
        let len = video.duration_or_default().max(0.001).min(target_end - cursor);
        segs.push(Segment {
            start_sec: cursor.round() as u32,
            end_sec: (cursor + len).round() as u32,
            kind: SegmentKind::Commercial,
            video_id: Some(video.video_id.clone()),
            series_path: None,
            base_timestamp: 0.0,
        });
        cursor += len;
        i += 1;
    }

    if let Some(last) = segs.last_mut() {
        last.end_sec = target_end.round() as u32;
    }
    segs
}

#[cfg(test)]
mod spec {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, SeedableRng as _};

    use super::*;
    use crate::store::Category;

    fn commercial(id: &str, dur: f64) -> Video {
        Video {
            video_id: id.to_owned(),
            title: id.to_owned(),
            category: Category::Commercial,
            series: None,
            season: None,
            episode: None,
            duracion_sec: Some(dur),
            tags: HashSet::new(),
            loudness_lufs: None,
            series_path: None,
            commercials_path: None,
        }
    }

    fn episode(id: &str, dur: f64) -> Video {
        Video {
            video_id: id.to_owned(),
            title: id.to_owned(),
            category: Category::TvEpisode,
            series: Some("show".to_owned()),
            season: Some(1),
            episode: Some(1),
            duracion_sec: Some(dur),
            tags: HashSet::new(),
            loudness_lufs: None,
            series_path: Some("show".to_owned()),
            commercials_path: None,
        }
    }

    #[test]
    fn block_structure_table() {
        assert_eq!(block_structure(300.0), (3, 1));
        assert_eq!(block_structure(720.0), (2, 1));
        assert_eq!(block_structure(1200.0), (1, 1));
        assert_eq!(block_structure(2400.0), (1, 2));
        assert_eq!(block_structure(3600.0), (1, 2));
    }

    /// Seed scenario 2: medium episode of 1200s, no commercial pool, emits
    /// `[placeholder 200s, ep-half 600s, placeholder 200s, ep-half 600s,
    /// placeholder 200s]` summing to 1800s with base_timestamps 0 and 600.
    #[test]
    fn medium_block_layout_with_empty_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        let ep = episode("e1", 1200.0);

        let segs = spanned_layout(&ep, 1200.0, 0.0, 3600, 5400, &[], &mut rng);

        assert_eq!(segs.len(), 5);
        assert_eq!(segs[0].kind, SegmentKind::SponsorsPlaceholder);
        assert_eq!(segs[0].len_sec(), 200);
        assert_eq!(segs[1].kind, SegmentKind::Episode);
        assert_eq!(segs[1].len_sec(), 600);
        assert_eq!(segs[1].base_timestamp, 0.0);
        assert_eq!(segs[2].len_sec(), 200);
        assert_eq!(segs[3].kind, SegmentKind::Episode);
        assert_eq!(segs[3].len_sec(), 600);
        assert_eq!(segs[3].base_timestamp, 600.0);
        assert_eq!(segs[4].len_sec(), 200);

        let total: u32 = segs.iter().map(Segment::len_sec).sum();
        assert_eq!(total, 1800);
    }

    #[test]
    fn block_sums_to_1800_with_a_commercial_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        let ep = episode("e1", 1000.0);
        let pool = vec![commercial("c1", 30.0), commercial("c2", 45.0)];

        let segs = spanned_layout(&ep, 1000.0, 0.0, 0, 1800, &pool, &mut rng);
        let total: u32 = segs.iter().map(Segment::len_sec).sum();

        assert_eq!(total, 1800);
        assert_eq!(segs.first().unwrap().start_sec, 0);
        assert_eq!(segs.last().unwrap().end_sec, 1800);
    }

    #[test]
    fn empty_commercial_pool_break_yields_placeholder_of_budgeted_length() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut pos = 100.0;

        let segs = commercial_break(&[], 45.0, &mut pos, &mut rng);

        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].kind, SegmentKind::SponsorsPlaceholder);
        assert_eq!(segs[0].start_sec, 100);
        assert_eq!(segs[0].end_sec, 145);
        assert_eq!(pos, 145.0);
    }

    #[test]
    fn commercial_pool_loops_when_exhausted() {
        let mut rng = StdRng::seed_from_u64(9);
        let pool = vec![commercial("c1", 10.0)];
        let mut pos = 0.0;

        let segs = commercial_break(&pool, 35.0, &mut pos, &mut rng);
        let total: u32 = segs.iter().map(Segment::len_sec).sum();

        assert_eq!(total, 35);
        assert!(segs.len() >= 4);
    }
}
