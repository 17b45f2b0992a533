//! Scheduler service: the single owned value composing the store handles,
//! the warmed weekly/daily plan caches and the switcher's anti-bounce state
//! (see the "Scheduler service" glossary entry) — the unit injected into
//! every HTTP handler via `web::Data`.
//!
//! Grounded in the teacher's `vod::meta::state::manager::Manager`: an
//! `Arc`-shared handle wrapping a lock-guarded document, refreshed by a
//! periodic background job rather than on every read.

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use chrono::{DateTime, FixedOffset, Utc};
use futures::{future::FutureExt as _, sink, StreamExt as _};
use rand::{rngs::SmallRng, SeedableRng as _};
use tokio::{sync::RwLock, time};

use crate::{
    catalog::Catalog,
    cli,
    error::Error,
    fairness::FairnessPicker,
    planner::{DailyPlanner, WeeklyPlanner},
    store::{
        ActiveChannel, Channel, ChannelId, Channels, ContentRoot, DailySchedule,
        PlayStats, Series, SeriesId, SeriesMap, Store, TimeOfDay, VcrState,
        WeeklySchedule,
    },
    switcher::{Selection, Switcher},
    util::{display_panic, trigger::TriggerFile},
};

/// How often the background loop checks whether the weekly/daily plans
/// need regenerating (§5: "cooperative... periodic wake (≤ 5 s)").
const PLANNER_WAKE_INTERVAL: Duration = Duration::from_secs(5);

/// Period of the VCR-position-cache ticker stub (§5: "a one-second VCR
/// position ticker").
const VCR_TICKER_INTERVAL: Duration = Duration::from_secs(1);

/// Owns every long-lived handle the HTTP layer needs.
#[derive(Clone, Debug)]
pub struct Service {
    store: Store,
    catalog: Catalog,
    weekly_planner: WeeklyPlanner,
    daily_planner: DailyPlanner,
    switcher: Arc<Switcher>,
    tz: FixedOffset,
    weekly_cache: Arc<RwLock<WeeklySchedule>>,
    daily_cache: Arc<RwLock<DailySchedule>>,
    vcr_cache: Arc<RwLock<VcrState>>,
    rng: Arc<tokio::sync::Mutex<SmallRng>>,
    should_reload_trigger: Arc<TriggerFile>,
    force_next_trigger: Arc<TriggerFile>,
}

impl Service {
    /// Builds a [`Service`] from CLI options: opens the content root, warms
    /// the weekly and daily plan caches, and seeds the pseudo-random source
    /// from [`rand::thread_rng`] (§4.D ambient note).
    ///
    /// # Errors
    ///
    /// If the content root cannot be opened, or warming either plan fails.
    pub async fn try_new(opts: &cli::Opts) -> Result<Self, Error> {
        let root = ContentRoot::new(opts.content_root.clone());
        let store = Store::try_new(root)?;
        let catalog = Catalog::new(store.clone());
        catalog.ensure_system_videos().await;
        let weekly_planner = WeeklyPlanner::new(store.clone(), catalog.clone());
        let daily_planner = DailyPlanner::new(store.clone(), catalog.clone());
        let fairness = FairnessPicker::new(store.clone());
        let switcher = Arc::new(Switcher::new(catalog.clone(), fairness));

        let rng = SmallRng::from_rng(rand::thread_rng())
            .map_err(|e| Error::Invariant(format!("failed to seed PRNG: {}", e)))?;
        let rng = Arc::new(tokio::sync::Mutex::new(rng));

        let tz = opts.local_tz;
        let now = Utc::now();

        let weekly = {
            let mut rng = rng.lock().await;
            weekly_planner.ensure_current(now, tz, &mut *rng).await?
        };
        let daily = {
            let mut rng = rng.lock().await;
            daily_planner.ensure_current(&weekly, now, tz, &mut *rng).await?
        };

        let should_reload_trigger =
            Arc::new(TriggerFile::new(store.root().should_reload_trigger_path()));
        let force_next_trigger =
            Arc::new(TriggerFile::new(store.root().force_next_trigger_path()));

        Ok(Self {
            store,
            catalog,
            weekly_planner,
            daily_planner,
            switcher,
            tz,
            weekly_cache: Arc::new(RwLock::new(weekly)),
            daily_cache: Arc::new(RwLock::new(daily)),
            vcr_cache: Arc::new(RwLock::new(VcrState::default())),
            rng,
            should_reload_trigger,
            force_next_trigger,
        })
    }

    /// Spawns the background planner-regeneration loop and the VCR-position
    /// ticker stub, mirroring the teacher's panic-isolated periodic jobs.
    pub fn spawn_background_tasks(&self) {
        let _ = tokio::spawn(Self::planner_loop(
            self.weekly_planner.clone(),
            self.daily_planner.clone(),
            Arc::clone(&self.weekly_cache),
            Arc::clone(&self.daily_cache),
            Arc::clone(&self.rng),
            self.tz,
            PLANNER_WAKE_INTERVAL,
        ));
        let _ = tokio::spawn(Self::vcr_ticker(
            self.store.clone(),
            Arc::clone(&self.vcr_cache),
            VCR_TICKER_INTERVAL,
        ));
    }

    async fn planner_loop(
        weekly_planner: WeeklyPlanner,
        daily_planner: DailyPlanner,
        weekly_cache: Arc<RwLock<WeeklySchedule>>,
        daily_cache: Arc<RwLock<DailySchedule>>,
        rng: Arc<tokio::sync::Mutex<SmallRng>>,
        tz: FixedOffset,
        period: Duration,
    ) {
        async fn tick(
            weekly_planner: &WeeklyPlanner,
            daily_planner: &DailyPlanner,
            weekly_cache: &RwLock<WeeklySchedule>,
            daily_cache: &RwLock<DailySchedule>,
            rng: &tokio::sync::Mutex<SmallRng>,
            tz: FixedOffset,
        ) -> Result<(), Error> {
            let now = Utc::now();

            if weekly_planner.needs_regeneration(now, tz).await {
                let mut rng = rng.lock().await;
                let fresh = weekly_planner.generate(now, tz, &mut *rng).await?;
                *weekly_cache.write().await = fresh;
            }

            if daily_planner.needs_regeneration(now, tz).await {
                let weekly = weekly_cache.read().await.clone();
                let mut rng = rng.lock().await;
                let fresh = daily_planner.generate(&weekly, now, tz, &mut *rng).await?;
                *daily_cache.write().await = fresh;
            }

            Ok(())
        }

        let _ = time::interval(period)
            .then(move |_| {
                let (weekly_planner, daily_planner) =
                    (weekly_planner.clone(), daily_planner.clone());
                let (weekly_cache, daily_cache) =
                    (Arc::clone(&weekly_cache), Arc::clone(&daily_cache));
                let rng = Arc::clone(&rng);
                async move {
                    AssertUnwindSafe(tick(
                        &weekly_planner,
                        &daily_planner,
                        &weekly_cache,
                        &daily_cache,
                        &rng,
                        tz,
                    ))
                    .catch_unwind()
                    .await
                    .map_err(|p| {
                        kinescope_log::log::error!(
                            "Panicked while regenerating schedules: {}",
                            display_panic(&p),
                        )
                    })?
                    .map_err(|e| {
                        kinescope_log::log::error!(
                            "Failed to regenerate schedules: {}",
                            e,
                        )
                    })
                }
            })
            .map(Ok)
            .forward(sink::drain())
            .await;
    }

    /// Stub ticker refreshing the cached `vcr_state.json` snapshot at 1 Hz;
    /// the VCR/NFC subsystem itself is external to this crate (§6).
    async fn vcr_ticker(
        store: Store,
        vcr_cache: Arc<RwLock<VcrState>>,
        period: Duration,
    ) {
        async fn tick(store: &Store, vcr_cache: &RwLock<VcrState>) {
            let fresh = store.load_vcr_state().await;
            *vcr_cache.write().await = fresh;
        }

        let _ = time::interval(period)
            .then(move |_| {
                let (store, vcr_cache) = (store.clone(), Arc::clone(&vcr_cache));
                async move {
                    if let Err(p) =
                        AssertUnwindSafe(tick(&store, &vcr_cache)).catch_unwind().await
                    {
                        kinescope_log::log::error!(
                            "Panicked while refreshing vcr_state cache: {}",
                            display_panic(&p),
                        );
                    }
                    Ok::<_, ()>(())
                }
            })
            .map(Ok)
            .forward(sink::drain())
            .await;
    }

    /// Resolves what `channel_id` should currently play (§4.G).
    ///
    /// # Errors
    ///
    /// If `channel_id` is unknown and isn't the reserved AV-input id.
    pub async fn next_video(&self, channel_id: &ChannelId) -> Result<Selection, Error> {
        if channel_id == Channel::AV_INPUT_ID {
            let channel = Channel {
                nombre: "AV Input".to_owned(),
                numero: Channel::AV_INPUT_ID.to_owned(),
                series_filter: None,
                tags_prioridad: Vec::new(),
                tags_incluidos: std::collections::HashSet::new(),
                min_gap: std::time::Duration::from_secs(0),
                icono: None,
            };
            let now = Utc::now();
            let mut rng = self.rng.lock().await;
            return Ok(self
                .switcher
                .next_video(channel_id, &channel, None, self.tz, now, &mut *rng)
                .await);
        }

        let channels = self.store.load_channels().await;
        let channel = channels
            .get(channel_id)
            .ok_or_else(|| Error::not_found(format!("channel '{}'", channel_id)))?;

        let plan = self.daily_cache.read().await;
        let now = Utc::now();
        let mut rng = self.rng.lock().await;
        let force_next = self.force_next_trigger.poll();
        if force_next {
            self.switcher.raise_force_next();
        }
        Ok(self
            .switcher
            .next_video(channel_id, channel, Some(&plan), self.tz, now, &mut *rng)
            .await)
    }

    /// Confirms a reported `played(video_id)` completion (§4.H, §4.G).
    ///
    /// # Errors
    ///
    /// If persisting the updated play-stats document fails.
    pub async fn confirm_play(&self, video_id: &str) -> Result<PlayStats, Error> {
        self.switcher.confirm_play(video_id, Utc::now()).await
    }

    /// One-shot edge of the should-reload trigger file (`/api/should_reload`).
    #[must_use]
    pub fn should_reload(&self) -> bool {
        self.should_reload_trigger.poll()
    }

    /// All configured channels, keyed by id (never includes the reserved
    /// AV-input id).
    pub async fn channels(&self) -> Channels {
        self.store.load_channels().await
    }

    /// Switches the active channel; fails if `channel_id` is unknown and
    /// isn't the reserved AV-input id.
    ///
    /// # Errors
    ///
    /// If `channel_id` is unknown, or persisting the new selection fails.
    pub async fn set_active_channel(&self, channel_id: ChannelId) -> Result<(), Error> {
        if channel_id != Channel::AV_INPUT_ID {
            let channels = self.store.load_channels().await;
            if !channels.contains_key(&channel_id) {
                return Err(Error::not_found(format!("channel '{}'", channel_id)));
            }
        }
        self.store
            .save_active_channel(&ActiveChannel { canal_id: channel_id })
            .await
    }

    /// The currently active channel, if one has been selected.
    pub async fn active_channel(&self) -> Option<ActiveChannel> {
        self.store.load_active_channel().await
    }

    /// All configured series, keyed by folder name.
    pub async fn series(&self) -> SeriesMap {
        self.store.load_series().await
    }

    /// Updates a series' `time_of_day` bucket.
    ///
    /// # Errors
    ///
    /// If `series_id` is unknown, or persisting fails.
    pub async fn set_series_time_of_day(
        &self,
        series_id: &SeriesId,
        time_of_day: TimeOfDay,
    ) -> Result<Series, Error> {
        let mut series = self.store.load_series().await;
        let entry = series
            .get_mut(series_id)
            .ok_or_else(|| Error::not_found(format!("series '{}'", series_id)))?;
        entry.time_of_day = time_of_day;
        let updated = entry.clone();
        self.store.save_series(&series).await?;
        Ok(updated)
    }
}
