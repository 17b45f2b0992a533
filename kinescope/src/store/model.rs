//! Persisted document shapes (see `SPEC_FULL.md` §3 and §6).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of a [`Video`].
pub type VideoId = String;

/// Folder name uniquely identifying a [`Series`].
pub type SeriesId = String;

/// Identifier of a [`Channel`] (`"03"` is reserved for AV input and is never
/// stored in [`Channels`]).
pub type ChannelId = String;

/// Kind of content a [`Video`] represents.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A digitized VHS tape, played back as-is via the "VCR" feature.
    VhsTape,
    /// A single chronologically-ordered TV episode of a [`Series`].
    TvEpisode,
    /// A short commercial, used to fill breaks inside a 30-minute block.
    Commercial,
    /// A standalone movie, playable on library channels.
    Movie,
}

/// A video record in `metadata.json`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Video {
    /// Unique identifier of this video.
    pub video_id: VideoId,

    /// Human-readable title.
    pub title: String,

    /// Kind of content this video represents.
    pub category: Category,

    /// Series folder name, present for [`Category::TvEpisode`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<SeriesId>,

    /// Season number, defaults to `1` when absent (see `episodes_of`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,

    /// Episode number within the season, defaults to `1` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,

    /// Duration of the video in seconds, when already known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duracion_sec: Option<f64>,

    /// Free-form tags used by the fairness picker and channel tag filters.
    #[serde(default)]
    pub tags: HashSet<String>,

    /// Measured loudness, in LUFS, when known (populated by the metadata
    /// daemon; consumed outside the core).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loudness_lufs: Option<f64>,

    /// Path of the series folder this episode lives under, relative to
    /// `videos/series/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_path: Option<String>,

    /// Path under `videos/commercials/`, for [`Category::Commercial`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commercials_path: Option<String>,
}

impl Video {
    /// Season this [`Video`] belongs to, defaulting to `1` when unset.
    #[must_use]
    pub fn season_or_default(&self) -> u32 {
        self.season.unwrap_or(1)
    }

    /// Episode number within [`Video::season_or_default`], defaulting to `1`.
    #[must_use]
    pub fn episode_or_default(&self) -> u32 {
        self.episode.unwrap_or(1)
    }

    /// Duration in seconds, defaulting to 30s for commercials of unknown
    /// length, per §4.B.
    #[must_use]
    pub fn duration_or_default(&self) -> f64 {
        self.duracion_sec.unwrap_or_else(|| match self.category {
            Category::Commercial => 30.0,
            _ => 1800.0,
        })
    }
}

/// All videos, keyed by [`VideoId`].
pub type Videos = HashMap<VideoId, Video>;

/// Time-of-day bucket a [`Series`] is eligible to air in.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// 04:00–07:00.
    EarlyMorning,
    /// 07:00–12:00.
    LateMorning,
    /// 12:00–17:00.
    Afternoon,
    /// 17:00–21:00.
    Evening,
    /// 21:00–04:00 (wraps past midnight).
    Night,
    /// Eligible in every time-of-day bucket.
    Any,
}

impl TimeOfDay {
    /// The five scheduled buckets, in the fixed order the weekly planner
    /// iterates them, paired with their fixed half-hour slot counts.
    pub const SCHEDULED: [(Self, usize); 5] = [
        (Self::EarlyMorning, 6),
        (Self::LateMorning, 10),
        (Self::Afternoon, 10),
        (Self::Evening, 8),
        (Self::Night, 12),
    ];

    /// Whether a series whose `time_of_day` is `self` may air during `slot`.
    #[must_use]
    pub fn matches(self, slot: Self) -> bool {
        self == slot || self == Self::Any
    }
}

/// A series record in `series.json`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Series {
    /// When this series was added.
    pub created: DateTime<Utc>,

    /// Time-of-day bucket this series is scheduled in.
    pub time_of_day: TimeOfDay,
}

/// All series, keyed by folder name.
pub type SeriesMap = HashMap<SeriesId, Series>;

/// Renders a series folder name as a display title (underscores → spaces).
#[must_use]
pub fn series_display_name(folder: &str) -> String {
    folder.replace('_', " ")
}

/// A channel record in `canales.json`. Channel `"03"` is reserved for AV
/// input system-wide and is never represented here.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Channel {
    /// Human-readable channel name.
    pub nombre: String,

    /// Two-digit display number (e.g. `"05"`).
    pub numero: String,

    /// Non-empty set of series folder names; presence makes this a
    /// "broadcast channel" governed by the weekly/daily plans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_filter: Option<HashSet<SeriesId>>,

    /// Ordered tag priority list used by the fairness picker's scoring.
    #[serde(default)]
    pub tags_prioridad: Vec<String>,

    /// Tags a library channel draws its candidate pool from.
    #[serde(default)]
    pub tags_incluidos: HashSet<String>,

    /// Minimum time between two plays of the same video on this channel,
    /// wire-formatted as `%H:%M:%S` (e.g. `"01:00:00"`).
    #[serde(
        default = "Channel::default_min_gap",
        with = "kinescope_serde::timelike"
    )]
    pub min_gap: std::time::Duration,

    /// Optional icon reference, opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icono: Option<String>,
}

impl Channel {
    /// Reserved id of the AV-input passthrough channel.
    pub const AV_INPUT_ID: &'static str = "03";

    fn default_min_gap() -> std::time::Duration {
        std::time::Duration::from_secs(60 * 60)
    }

    /// Whether this is a broadcast channel (non-empty `series_filter`).
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        matches!(&self.series_filter, Some(s) if !s.is_empty())
    }
}

/// All channels, keyed by [`ChannelId`]. Never contains
/// [`Channel::AV_INPUT_ID`].
pub type Channels = HashMap<ChannelId, Channel>;

/// The currently active channel, `canal_activo.json`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ActiveChannel {
    /// Id of the currently selected channel.
    pub canal_id: ChannelId,
}

/// Play statistics for one video, as stored in `plays.json`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PlayStats {
    /// Count of reported `played` completions.
    #[serde(default)]
    pub plays: u64,

    /// Timestamp of the most recent reported completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_played: Option<DateTime<Utc>>,
}

/// All play stats, keyed by [`VideoId`].
pub type Plays = HashMap<VideoId, PlayStats>;

/// Global tag configuration, `configuracion.json`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Configuracion {
    /// Tag groups available for channel/video tagging, `tags.json`.
    #[serde(default)]
    pub tag_groups: HashMap<String, Vec<String>>,
}

/// Cursor state for one `(channel, series)` pair.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CursorEntry {
    /// −1 means "not started"; otherwise an index into `episodes_of(series)`.
    pub last_index: i64,

    /// Season of the episode at `last_index`, for read-back convenience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,

    /// Episode number of the episode at `last_index`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,

    /// When this entry was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl CursorEntry {
    /// A fresh, not-yet-started cursor.
    #[must_use]
    pub fn unstarted(now: DateTime<Utc>) -> Self {
        Self {
            last_index: -1,
            season: None,
            episode: None,
            updated_at: now,
        }
    }
}

/// `episode_cursors.json`: `channel → series → CursorEntry`.
pub type EpisodeCursors = HashMap<ChannelId, HashMap<SeriesId, CursorEntry>>;

/// Kind of segment, per §3.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// The leading 03:00–04:00 hour, and any fallback period.
    TestPattern,
    /// A filler segment used when the commercial pool is empty.
    SponsorsPlaceholder,
    /// A commercial drawn from the pool.
    Commercial,
    /// A piece of a TV episode.
    Episode,
}

/// One contiguous piece of programming inside a [`DailySchedule`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Segment {
    /// Start, in seconds since 03:00 of `schedule_date`.
    pub start_sec: u32,
    /// End (exclusive), in seconds since 03:00 of `schedule_date`.
    pub end_sec: u32,
    /// What this segment plays.
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    /// Video identifier, for `commercial`/`episode` segments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,
    /// Series folder, for `episode` segments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_path: Option<String>,
    /// Seek offset inside the source video at which this segment begins.
    #[serde(default)]
    pub base_timestamp: f64,
}

impl Segment {
    /// Length of this segment, in seconds.
    #[must_use]
    pub fn len_sec(&self) -> u32 {
        self.end_sec - self.start_sec
    }
}

/// `weekly_schedule.json`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WeeklySchedule {
    /// Most recent Sunday 00:00 local, in UTC.
    pub week_start: DateTime<Utc>,
    /// Local offset this plan was generated under (diagnostic: lets an
    /// operator tell a stale plan from a timezone misconfiguration without
    /// reaching for `week_start`'s raw UTC instant).
    #[serde(with = "kinescope_serde::timezone")]
    pub generated_tz: chrono::FixedOffset,
    /// Per-channel time-of-day slot maps.
    pub channels: HashMap<ChannelId, ChannelWeek>,
}

/// One channel's slice of the [`WeeklySchedule`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ChannelWeek {
    /// Series assigned to each half-hour slot, per time-of-day bucket.
    /// Entries are either a series folder name, or the sentinel
    /// [`TEST_PATTERN_SENTINEL`].
    pub time_slots: HashMap<TimeOfDayKey, Vec<String>>,
}

/// Sentinel value occupying a weekly-schedule slot with no eligible series.
pub const TEST_PATTERN_SENTINEL: &str = "__test_pattern__";

/// JSON object keys are always strings, so [`ChannelWeek::time_slots`] is
/// keyed by the canonical string form of a scheduled [`TimeOfDay`] (see
/// [`time_of_day_key`]) rather than by the enum itself.
pub type TimeOfDayKey = String;

/// Renders one of the five scheduled [`TimeOfDay`] buckets as its canonical
/// JSON object key.
#[must_use]
pub fn time_of_day_key(tod: TimeOfDay) -> TimeOfDayKey {
    match tod {
        TimeOfDay::EarlyMorning => "early_morning",
        TimeOfDay::LateMorning => "late_morning",
        TimeOfDay::Afternoon => "afternoon",
        TimeOfDay::Evening => "evening",
        TimeOfDay::Night => "night",
        TimeOfDay::Any => "any",
    }
    .to_owned()
}

/// `daily_schedule.json`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DailySchedule {
    /// Local calendar date this plan covers (03:00 → next-day 03:00).
    pub schedule_date: DateTime<Utc>,
    /// `schedule_date` at 04:00.
    pub valid_from: DateTime<Utc>,
    /// `schedule_date + 1 day` at 03:00.
    pub valid_until: DateTime<Utc>,
    /// Per-channel ordered, contiguous segment lists.
    pub channels: HashMap<ChannelId, Vec<Segment>>,
}

/// `schedule_meta.json`: last-generation timestamps, used to cheaply decide
/// whether the weekly/daily plans need regenerating without re-parsing them.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ScheduleMeta {
    /// When the weekly plan was last (re)generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_generated_at: Option<DateTime<Utc>>,
    /// When the daily plan was last (re)generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_generated_at: Option<DateTime<Utc>>,
}

/// State advertised by the external NFC/VCR subsystem, read-only from the
/// core's perspective (the core never writes `vcr_state.json`).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct VcrState {
    /// Identifier of the currently inserted tape, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tape_id: Option<VideoId>,
    /// Seek offset the VCR subsystem currently advertises for that tape.
    #[serde(default)]
    pub seek_to: f64,
}
