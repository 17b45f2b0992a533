//! Schedule lookup (§4.F): binary-searches a channel's daily segment list by
//! timestamp to resolve `(content, seek offset)`. Pure — never mutates.

use chrono::{DateTime, FixedOffset, Timelike as _, Utc};

use crate::store::{ChannelId, DailySchedule, Segment, SegmentKind, VideoId};

/// What the schedule resolves to at a given instant.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolved {
    /// No plan, unknown channel, or the instant falls in a gap — play the
    /// system test pattern from its start.
    TestPattern,
    /// The scheduled segment is a sponsors placeholder.
    SponsorsPlaceholder {
        /// Offset, in seconds, into the placeholder asset.
        seek_to: f64,
    },
    /// The scheduled segment is a commercial.
    Commercial {
        /// Commercial's video id.
        video_id: VideoId,
        /// Offset, in seconds, into the commercial.
        seek_to: f64,
    },
    /// The scheduled segment is an episode.
    Episode {
        /// Episode's video id.
        video_id: VideoId,
        /// Series folder path, if the episode lives under one.
        series_path: Option<String>,
        /// Offset, in seconds, into the episode.
        seek_to: f64,
    },
}

/// Converts `now` into seconds since today's local 03:00, mapping
/// pre-03:00 instants onto yesterday's schedule (§4.F step 1).
#[must_use]
pub fn seconds_since_3am(now: DateTime<Utc>, tz: FixedOffset) -> u32 {
    let local = now.with_timezone(&tz);
    let (h, m, s) = (local.hour(), local.minute(), local.second());
    if h < 3 {
        (24 - 3) * 3600 + h * 3600 + m * 60 + s
    } else {
        (h - 3) * 3600 + m * 60 + s
    }
}

/// Resolves what `channel` should be playing at `now`, given its warmed
/// [`DailySchedule`]. Falls back to [`Resolved::TestPattern`] with
/// `seek_to=0` for an unknown channel or a gap in the plan.
#[must_use]
pub fn lookup(
    plan: &DailySchedule,
    channel: &ChannelId,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Resolved {
    let s = seconds_since_3am(now, tz);

    let Some(segments) = plan.channels.get(channel) else {
        return Resolved::TestPattern;
    };
    let Some(segment) = rightmost_covering(segments, s) else {
        return Resolved::TestPattern;
    };

    resolve(segment, s)
}

/// Rightmost segment with `start_sec <= s` that also covers `s` (i.e.
/// `s < end_sec`); binary search via [`partition_point`].
///
/// [`partition_point`]: <[Segment]>::partition_point
fn rightmost_covering(segments: &[Segment], s: u32) -> Option<&Segment> {
    let idx = segments.partition_point(|seg| seg.start_sec <= s);
    if idx == 0 {
        return None;
    }
    let segment = &segments[idx - 1];
    (s < segment.end_sec).then_some(segment)
}

fn resolve(segment: &Segment, s: u32) -> Resolved {
    let seek_to = segment.base_timestamp + f64::from(s - segment.start_sec);
    match segment.kind {
        SegmentKind::TestPattern => Resolved::TestPattern,
        SegmentKind::SponsorsPlaceholder => {
            Resolved::SponsorsPlaceholder { seek_to }
        }
        SegmentKind::Commercial => Resolved::Commercial {
            video_id: segment.video_id.clone().unwrap_or_default(),
            seek_to,
        },
        SegmentKind::Episode => Resolved::Episode {
            video_id: segment.video_id.clone().unwrap_or_default(),
            series_path: segment.series_path.clone(),
            seek_to,
        },
    }
}

#[cfg(test)]
mod spec {
    use std::collections::HashMap;

    use super::*;

    fn plan(segments: Vec<Segment>) -> DailySchedule {
        let mut channels = HashMap::new();
        let _ = channels.insert("01".to_owned(), segments);
        DailySchedule {
            schedule_date: Utc::now(),
            valid_from: Utc::now(),
            valid_until: Utc::now(),
            channels,
        }
    }

    fn seg(
        start: u32,
        end: u32,
        kind: SegmentKind,
        video_id: Option<&str>,
        base_timestamp: f64,
    ) -> Segment {
        Segment {
            start_sec: start,
            end_sec: end,
            kind,
            video_id: video_id.map(str::to_owned),
            series_path: None,
            base_timestamp,
        }
    }

    fn tz() -> FixedOffset {
        FixedOffset::east(0)
    }

    #[test]
    fn now_exactly_at_3am_maps_to_segment_0() {
        assert_eq!(seconds_since_3am(ymd_hms(2026, 7, 28, 3, 0, 0), tz()), 0);
    }

    #[test]
    fn now_at_0259_maps_into_yesterdays_night_period() {
        // 02:59 is 23h59m since the *previous* day's 03:00.
        assert_eq!(
            seconds_since_3am(ymd_hms(2026, 7, 28, 2, 59, 0), tz()),
            23 * 3600 + 59 * 60,
        );
    }

    /// Seed scenario 3: lookup at 05:00:30 on a channel whose 05:00 block
    /// begins with a 120s commercial returns the commercial with
    /// `seek_to=30`.
    #[test]
    fn lookup_at_the_boundary_of_a_commercial_resolves_seek() {
        let segments = vec![
            seg(0, 3600, SegmentKind::TestPattern, None, 0.0),
            seg(3600, 7200, SegmentKind::Episode, Some("dummy"), 0.0),
            seg(7200, 7320, SegmentKind::Commercial, Some("ad1"), 0.0),
            seg(7320, 9000, SegmentKind::Episode, Some("ep2"), 0.0),
        ];
        let p = plan(segments);

        // 05:00:30 local is 2h00m30s since 03:00 = 7230s.
        let now = ymd_hms(2026, 7, 28, 5, 0, 30);
        match lookup(&p, &"01".to_owned(), now, tz()) {
            Resolved::Commercial { video_id, seek_to } => {
                assert_eq!(video_id, "ad1");
                assert_eq!(seek_to, 30.0);
            }
            other => panic!("expected Commercial, got {:?}", other),
        }
    }

    #[test]
    fn unknown_channel_falls_back_to_test_pattern() {
        let p = plan(vec![seg(0, 3600, SegmentKind::TestPattern, None, 0.0)]);
        assert_eq!(
            lookup(&p, &"nope".to_owned(), Utc::now(), tz()),
            Resolved::TestPattern,
        );
    }

    #[test]
    fn gap_falls_back_to_test_pattern() {
        let segments = vec![seg(0, 100, SegmentKind::TestPattern, None, 0.0)];
        let p = plan(segments);
        let now = ymd_hms(2026, 7, 28, 3, 10, 0);
        assert_eq!(lookup(&p, &"01".to_owned(), now, tz()), Resolved::TestPattern);
    }

    #[test]
    fn lookup_is_monotone_across_a_one_second_step() {
        let segments = vec![
            seg(0, 3600, SegmentKind::TestPattern, None, 0.0),
            seg(3600, 5400, SegmentKind::Episode, Some("e"), 0.0),
        ];
        let p = plan(segments);
        let t = ymd_hms(2026, 7, 28, 4, 0, 0);
        let t_plus = t + chrono::Duration::seconds(1);

        let a = lookup(&p, &"01".to_owned(), t, tz());
        let b = lookup(&p, &"01".to_owned(), t_plus, tz());

        match (a, b) {
            (
                Resolved::Episode { video_id: a_id, .. },
                Resolved::Episode { video_id: b_id, .. },
            ) => assert_eq!(a_id, b_id),
            other => panic!("expected two Episode resolutions, got {:?}", other),
        }
    }

    fn ymd_hms(
        y: i32,
        mo: u32,
        d: u32,
        h: u32,
        mi: u32,
        s: u32,
    ) -> DateTime<Utc> {
        use chrono::TimeZone as _;
        Utc.ymd(y, mo, d).and_hms(h, mi, s)
    }
}
