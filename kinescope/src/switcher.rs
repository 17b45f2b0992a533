//! Channel switcher (§4.G): the hot path invoked on every player tick.
//! Dispatches across the AV-input, broadcast and library branches and,
//! for the library branch only, applies the sticky/cooldown/pending-pick
//! anti-bounce windows described in §5.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use rand::Rng;
use serde::Serialize;

use crate::{
    catalog::Catalog,
    fairness::FairnessPicker,
    lookup::{self, Resolved},
    store::{Channel, ChannelId, DailySchedule, VideoId},
};

/// Which branch of §4.G produced a [`Selection`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Modo {
    /// AV-input passthrough (channel `"03"`).
    AvInput,
    /// A broadcast channel, resolved via the daily schedule.
    Broadcast,
    /// A library channel, resolved via the fairness picker.
    Library,
}

/// What the switcher picked, carrying every field the `/api/next_video`
/// response needs (§6); the HTTP layer only has to serialize this.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Selection {
    /// Id of the chosen video, absent only for [`Modo::AvInput`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,
    /// Web-servable URL of the chosen asset.
    pub video_url: String,
    /// Offset, in seconds, to seek to inside `video_url`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek_to: Option<f64>,
    /// Display number of the active channel.
    pub canal_numero: String,
    /// Display name of the active channel.
    pub canal_nombre: String,
    /// Which branch produced this selection.
    pub modo: Modo,
    /// Present and `true` when `modo` is [`Modo::Broadcast`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<bool>,
    /// Present and `true` when a sticky pick was reused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky: Option<bool>,
    /// Present and `true` during the cooldown window (no mutation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<bool>,
    /// Present and `true` when an unconfirmed pending pick was reused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reused: Option<bool>,
    /// Present and `true` when the library branch had no candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_videos: Option<bool>,
}

impl Selection {
    fn av_input() -> Self {
        Self {
            video_id: None,
            video_url: "av_input://03".to_owned(),
            seek_to: None,
            canal_numero: Channel::AV_INPUT_ID.to_owned(),
            canal_nombre: "AV Input".to_owned(),
            modo: Modo::AvInput,
            broadcast: None,
            sticky: None,
            cooldown: None,
            reused: None,
            no_videos: None,
        }
    }
}

fn sticky_window() -> ChronoDuration {
    ChronoDuration::milliseconds(1000)
}
fn cooldown_window() -> ChronoDuration {
    ChronoDuration::milliseconds(1500)
}
fn pending_dedupe_window() -> ChronoDuration {
    ChronoDuration::seconds(12)
}

#[derive(Default)]
struct ChannelState {
    shown: HashSet<VideoId>,
    previous_tags: HashSet<String>,
    pending: Option<(VideoId, DateTime<Utc>)>,
    last_pick_at: Option<DateTime<Utc>>,
    last_selection: Option<Selection>,
}

struct State {
    channels: HashMap<ChannelId, ChannelState>,
    force_next: bool,
}

/// Owns the in-memory anti-bounce state for every library channel.
#[derive(Debug)]
pub struct Switcher {
    catalog: Catalog,
    fairness: FairnessPicker,
    state: Mutex<State>,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("channels", &self.channels.len())
            .field("force_next", &self.force_next)
            .finish()
    }
}

impl std::fmt::Debug for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelState")
            .field("shown", &self.shown.len())
            .field("pending", &self.pending)
            .field("last_pick_at", &self.last_pick_at)
            .finish()
    }
}

impl Switcher {
    /// Wraps `catalog`/`fairness` as a [`Switcher`] with empty anti-bounce
    /// state.
    #[must_use]
    pub fn new(catalog: Catalog, fairness: FairnessPicker) -> Self {
        Self {
            catalog,
            fairness,
            state: Mutex::new(State {
                channels: HashMap::new(),
                force_next: false,
            }),
        }
    }

    /// Raises the one-shot force-next flag; consumed atomically by the next
    /// [`Switcher::next_video`] call on any channel (§4.G, §5).
    pub fn raise_force_next(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.force_next = true;
    }

    /// Resolves what `channel_id` should play right now (§4.G).
    pub async fn next_video(
        &self,
        channel_id: &ChannelId,
        channel: &Channel,
        plan: Option<&DailySchedule>,
        tz: FixedOffset,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Selection {
        if channel_id == Channel::AV_INPUT_ID {
            return Selection::av_input();
        }

        if channel.is_broadcast() {
            if let Some(plan) = plan {
                let resolved = lookup::lookup(plan, channel_id, now, tz);
                return broadcast_selection(channel, resolved);
            }
            kinescope_log::log::warn!(
                "No warm daily plan for broadcast channel '{}', \
                 falling back to the fairness picker",
                channel_id,
            );
        }

        self.library_pick(channel_id, channel, now, rng).await
    }

    async fn library_pick(
        &self,
        channel_id: &ChannelId,
        channel: &Channel,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Selection {
        let force_next = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut state.force_next, false)
        };

        if !force_next {
            if let Some(selection) = self.try_anti_bounce(channel_id, now) {
                return selection;
            }
        }

        let (shown, previous_tags) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let entry = state.channels.entry(channel_id.clone()).or_default();
            (entry.shown.clone(), entry.previous_tags.clone())
        };

        let mut pick =
            self.fairness.pick(&self.catalog, channel, &shown, &previous_tags, now, rng).await;
        if pick.is_none() && !shown.is_empty() {
            // Shown list exhausted the candidate set: reset and recurse once.
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.channels.entry(channel_id.clone()).or_default().shown.clear();
            drop(state);
            pick = self
                .fairness
                .pick(&self.catalog, channel, &HashSet::new(), &previous_tags, now, rng)
                .await;
        }

        let Some(pick) = pick else {
            return Selection {
                video_id: None,
                video_url: String::new(),
                seek_to: None,
                canal_numero: channel.numero.clone(),
                canal_nombre: channel.nombre.clone(),
                modo: Modo::Library,
                broadcast: None,
                sticky: None,
                cooldown: None,
                reused: None,
                no_videos: Some(true),
            };
        };

        let selection = Selection {
            video_id: Some(pick.video.video_id.clone()),
            video_url: library_video_url(&pick.video),
            seek_to: Some(0.0),
            canal_numero: channel.numero.clone(),
            canal_nombre: channel.nombre.clone(),
            modo: Modo::Library,
            broadcast: None,
            sticky: Some(false),
            cooldown: None,
            reused: Some(false),
            no_videos: None,
        };

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let entry = state.channels.entry(channel_id.clone()).or_default();
        let _ = entry.shown.insert(pick.video.video_id.clone());
        entry.previous_tags = pick.video.tags.clone();
        entry.pending = Some((pick.video.video_id.clone(), now));
        entry.last_pick_at = Some(now);
        entry.last_selection = Some(selection.clone());

        selection
    }

    /// Applies the sticky/cooldown/pending-dedupe windows (§4.G, §5), in
    /// that priority order. Returns `None` when a fresh pick is due.
    fn try_anti_bounce(
        &self,
        channel_id: &ChannelId,
        now: DateTime<Utc>,
    ) -> Option<Selection> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let entry = state.channels.get(channel_id)?;

        if let Some(last_pick_at) = entry.last_pick_at {
            let elapsed = now - last_pick_at;
            if elapsed <= sticky_window() {
                let mut selection = entry.last_selection.clone()?;
                selection.sticky = Some(true);
                return Some(selection);
            }
            if elapsed <= cooldown_window() {
                let mut selection = entry.last_selection.clone()?;
                selection.sticky = Some(false);
                selection.cooldown = Some(true);
                return Some(selection);
            }
        }

        if let Some((pending_id, issued_at)) = &entry.pending {
            if now - *issued_at <= pending_dedupe_window() {
                let mut selection = entry.last_selection.clone()?;
                debug_assert_eq!(selection.video_id.as_ref(), Some(pending_id));
                selection.reused = Some(true);
                return Some(selection);
            }
        }

        None
    }

    /// Confirms a reported `played(video_id)` completion: clears the
    /// channel's pending pick (wherever it is) and bumps play stats.
    ///
    /// # Errors
    ///
    /// If persisting the updated play-stats document fails.
    pub async fn confirm_play(
        &self,
        video_id: &str,
        now: DateTime<Utc>,
    ) -> Result<crate::store::PlayStats, crate::error::Error> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            for entry in state.channels.values_mut() {
                if entry.pending.as_ref().map(|(id, _)| id.as_str()) == Some(video_id) {
                    entry.pending = None;
                }
            }
        }
        self.fairness.confirm_play(video_id, now).await
    }
}

fn broadcast_selection(channel: &Channel, resolved: Resolved) -> Selection {
    let (video_id, video_url, seek_to) = match resolved {
        Resolved::TestPattern => (None, "system://test_pattern".to_owned(), None),
        Resolved::SponsorsPlaceholder { seek_to } => (
            None,
            "system://sponsors_placeholder".to_owned(),
            Some(seek_to),
        ),
        Resolved::Commercial { video_id, seek_to } => (
            Some(video_id.clone()),
            format!("/videos/commercials/{}.mp4", video_id),
            Some(seek_to),
        ),
        Resolved::Episode { video_id, series_path, seek_to } => {
            let url = match &series_path {
                Some(p) => format!("/videos/series/{}/{}.mp4", p, video_id),
                None => format!("/videos/{}.mp4", video_id),
            };
            (Some(video_id), url, Some(seek_to))
        }
    };

    Selection {
        video_id,
        video_url,
        seek_to,
        canal_numero: channel.numero.clone(),
        canal_nombre: channel.nombre.clone(),
        modo: Modo::Broadcast,
        broadcast: Some(true),
        sticky: None,
        cooldown: None,
        reused: None,
        no_videos: None,
    }
}

fn library_video_url(video: &crate::store::Video) -> String {
    use crate::store::Category;
    match video.category {
        Category::TvEpisode => match &video.series_path {
            Some(p) => format!("/videos/series/{}/{}.mp4", p, video.video_id),
            None => format!("/videos/{}.mp4", video.video_id),
        },
        Category::Commercial => format!("/videos/commercials/{}.mp4", video.video_id),
        Category::VhsTape | Category::Movie => format!("/videos/{}.mp4", video.video_id),
    }
}
