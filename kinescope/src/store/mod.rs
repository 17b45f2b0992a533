//! On-disk JSON metadata store (§4.A): a set of durable documents under a
//! content root, each saved atomically (temp file + fsync + rename), with a
//! process-wide advisory lock guarding the videos document from the
//! metadata daemon racing admin edits.

pub mod model;

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use fs2::FileExt as _;
use tokio::sync::Mutex;

use crate::{error::Error, util::fs as atomic};

pub use self::model::*;

/// Handle onto the content root's directory layout.
#[derive(Clone, Debug)]
pub struct ContentRoot(Arc<PathBuf>);

impl ContentRoot {
    /// Wraps the given directory as a [`ContentRoot`].
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self(Arc::new(root))
    }

    /// Root directory itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    fn doc(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }

    /// Path of `metadata.json`.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.doc("metadata.json")
    }
    /// Path of `series.json`.
    #[must_use]
    pub fn series_path(&self) -> PathBuf {
        self.doc("series.json")
    }
    /// Path of `canales.json`.
    #[must_use]
    pub fn canales_path(&self) -> PathBuf {
        self.doc("canales.json")
    }
    /// Path of `canal_activo.json`.
    #[must_use]
    pub fn canal_activo_path(&self) -> PathBuf {
        self.doc("canal_activo.json")
    }
    /// Path of `plays.json`.
    #[must_use]
    pub fn plays_path(&self) -> PathBuf {
        self.doc("plays.json")
    }
    /// Path of `configuracion.json`.
    #[must_use]
    pub fn configuracion_path(&self) -> PathBuf {
        self.doc("configuracion.json")
    }
    /// Path of `weekly_schedule.json`.
    #[must_use]
    pub fn weekly_schedule_path(&self) -> PathBuf {
        self.doc("weekly_schedule.json")
    }
    /// Path of `daily_schedule.json`.
    #[must_use]
    pub fn daily_schedule_path(&self) -> PathBuf {
        self.doc("daily_schedule.json")
    }
    /// Path of `episode_cursors.json`.
    #[must_use]
    pub fn episode_cursors_path(&self) -> PathBuf {
        self.doc("episode_cursors.json")
    }
    /// Path of `schedule_meta.json`.
    #[must_use]
    pub fn schedule_meta_path(&self) -> PathBuf {
        self.doc("schedule_meta.json")
    }
    /// Path of `vcr_state.json` (read-only from the core's perspective).
    #[must_use]
    pub fn vcr_state_path(&self) -> PathBuf {
        self.doc("vcr_state.json")
    }
    /// Path of the `.videos.lock` advisory lock file.
    #[must_use]
    pub fn videos_lock_path(&self) -> PathBuf {
        self.doc(".videos.lock")
    }
    /// Path of the force-next trigger file, touched by the external
    /// rotary-encoder "skip" signal.
    #[must_use]
    pub fn force_next_trigger_path(&self) -> PathBuf {
        self.doc(".trigger_force_next")
    }
    /// Path of the should-reload trigger file polled by `/api/should_reload`.
    #[must_use]
    pub fn should_reload_trigger_path(&self) -> PathBuf {
        self.doc(".trigger_should_reload")
    }

    /// Directory of library videos, `videos/<id>.mp4`.
    #[must_use]
    pub fn videos_dir(&self) -> PathBuf {
        self.0.join("videos")
    }
    /// Directory of TV episodes, `videos/series/<folder>/<id>.mp4`.
    #[must_use]
    pub fn series_dir(&self) -> PathBuf {
        self.videos_dir().join("series")
    }
    /// Directory of commercials, `videos/commercials/<id>.mp4`.
    #[must_use]
    pub fn commercials_dir(&self) -> PathBuf {
        self.videos_dir().join("commercials")
    }
    /// Directory of generated system assets (test pattern, sponsors card).
    #[must_use]
    pub fn system_dir(&self) -> PathBuf {
        self.videos_dir().join("system")
    }
    /// Directory of optional thumbnails, `thumbnails/<id>.jpg`.
    #[must_use]
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.0.join("thumbnails")
    }
}

/// Advisory, cross-process lock guarding `metadata.json` so the offline
/// metadata daemon cannot race an admin edit. All other documents are small
/// enough to be serialized purely in-process (a `tokio::sync::Mutex` each),
/// per §4.A.
#[derive(Debug)]
struct VideosLock(File);

impl VideosLock {
    fn open(root: &ContentRoot) -> Result<Self, Error> {
        std::fs::create_dir_all(root.path())?;
        let path = root.videos_lock_path();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)?;
        Ok(Self(file))
    }

    fn lock(&self) -> Result<(), Error> {
        self.0.lock_exclusive()?;
        Ok(())
    }

    fn unlock(&self) {
        let _ = self.0.unlock();
    }
}

/// The metadata store: a handle to every persisted document plus the locks
/// and per-document mutexes serializing concurrent writers.
#[derive(Clone, Debug)]
pub struct Store {
    root: ContentRoot,
    videos_lock: Arc<VideosLock>,
    videos_write: Arc<Mutex<()>>,
    doc_write: Arc<Mutex<()>>,
}

impl Store {
    /// Opens (creating the content root directory if necessary) the store.
    ///
    /// # Errors
    ///
    /// If the content root cannot be created, or the videos lock file
    /// cannot be opened.
    pub fn try_new(root: ContentRoot) -> Result<Self, Error> {
        let videos_lock = Arc::new(VideosLock::open(&root)?);
        Ok(Self {
            root,
            videos_lock,
            videos_write: Arc::new(Mutex::new(())),
            doc_write: Arc::new(Mutex::new(())),
        })
    }

    /// The content root this [`Store`] operates on.
    #[must_use]
    pub fn root(&self) -> &ContentRoot {
        &self.root
    }

    /// Loads `metadata.json`, defaulting to an empty map.
    pub async fn load_videos(&self) -> Videos {
        let path = self.root.metadata_path();
        atomic::load_or_default(&path, Videos::default)
    }

    /// Atomically persists `metadata.json` under the videos advisory lock.
    ///
    /// # Errors
    ///
    /// If the lock cannot be acquired, or the write itself fails.
    pub async fn save_videos(&self, videos: &Videos) -> Result<(), Error> {
        let _write = self.videos_write.lock().await;
        self.videos_lock.lock()?;
        let result = atomic::save_atomic(&self.root.metadata_path(), videos);
        self.videos_lock.unlock();
        result
    }

    /// Loads `series.json`, defaulting to an empty map.
    pub async fn load_series(&self) -> SeriesMap {
        atomic::load_or_default(&self.root.series_path(), SeriesMap::default)
    }

    /// Atomically persists `series.json`.
    ///
    /// # Errors
    ///
    /// If the write fails.
    pub async fn save_series(&self, series: &SeriesMap) -> Result<(), Error> {
        let _write = self.doc_write.lock().await;
        atomic::save_atomic(&self.root.series_path(), series)
    }

    /// Loads `canales.json`, defaulting to an empty map.
    pub async fn load_channels(&self) -> Channels {
        atomic::load_or_default(&self.root.canales_path(), Channels::default)
    }

    /// Atomically persists `canales.json`.
    ///
    /// # Errors
    ///
    /// If the write fails.
    pub async fn save_channels(
        &self,
        channels: &Channels,
    ) -> Result<(), Error> {
        let _write = self.doc_write.lock().await;
        atomic::save_atomic(&self.root.canales_path(), channels)
    }

    /// Loads `canal_activo.json`, `None` when absent.
    pub async fn load_active_channel(&self) -> Option<ActiveChannel> {
        atomic::load_or_default(&self.root.canal_activo_path(), || None)
    }

    /// Atomically persists `canal_activo.json`.
    ///
    /// # Errors
    ///
    /// If the write fails.
    pub async fn save_active_channel(
        &self,
        active: &ActiveChannel,
    ) -> Result<(), Error> {
        let _write = self.doc_write.lock().await;
        atomic::save_atomic(&self.root.canal_activo_path(), active)
    }

    /// Loads `plays.json`, defaulting to an empty map.
    pub async fn load_plays(&self) -> Plays {
        atomic::load_or_default(&self.root.plays_path(), Plays::default)
    }

    /// Atomically persists `plays.json`.
    ///
    /// # Errors
    ///
    /// If the write fails.
    pub async fn save_plays(&self, plays: &Plays) -> Result<(), Error> {
        let _write = self.doc_write.lock().await;
        atomic::save_atomic(&self.root.plays_path(), plays)
    }

    /// Loads `configuracion.json`, defaulting to an empty configuration.
    pub async fn load_configuracion(&self) -> Configuracion {
        atomic::load_or_default(
            &self.root.configuracion_path(),
            Configuracion::default,
        )
    }

    /// Loads `weekly_schedule.json`, `None` when absent or corrupt.
    pub async fn load_weekly_schedule(&self) -> Option<WeeklySchedule> {
        atomic::load_or_default(&self.root.weekly_schedule_path(), || None)
    }

    /// Atomically persists `weekly_schedule.json`.
    ///
    /// # Errors
    ///
    /// If the write fails.
    pub async fn save_weekly_schedule(
        &self,
        plan: &WeeklySchedule,
    ) -> Result<(), Error> {
        let _write = self.doc_write.lock().await;
        atomic::save_atomic(&self.root.weekly_schedule_path(), plan)
    }

    /// Loads `daily_schedule.json`, `None` when absent or corrupt.
    pub async fn load_daily_schedule(&self) -> Option<DailySchedule> {
        atomic::load_or_default(&self.root.daily_schedule_path(), || None)
    }

    /// Atomically persists `daily_schedule.json`.
    ///
    /// # Errors
    ///
    /// If the write fails.
    pub async fn save_daily_schedule(
        &self,
        plan: &DailySchedule,
    ) -> Result<(), Error> {
        let _write = self.doc_write.lock().await;
        atomic::save_atomic(&self.root.daily_schedule_path(), plan)
    }

    /// Loads `episode_cursors.json`, defaulting to an empty map.
    pub async fn load_cursors(&self) -> EpisodeCursors {
        atomic::load_or_default(
            &self.root.episode_cursors_path(),
            EpisodeCursors::default,
        )
    }

    /// Atomically persists `episode_cursors.json`.
    ///
    /// # Errors
    ///
    /// If the write fails.
    pub async fn save_cursors(
        &self,
        cursors: &EpisodeCursors,
    ) -> Result<(), Error> {
        let _write = self.doc_write.lock().await;
        atomic::save_atomic(&self.root.episode_cursors_path(), cursors)
    }

    /// Loads `schedule_meta.json`, defaulting to "never generated".
    pub async fn load_schedule_meta(&self) -> ScheduleMeta {
        atomic::load_or_default(
            &self.root.schedule_meta_path(),
            ScheduleMeta::default,
        )
    }

    /// Atomically persists `schedule_meta.json`.
    ///
    /// # Errors
    ///
    /// If the write fails.
    pub async fn save_schedule_meta(
        &self,
        meta: &ScheduleMeta,
    ) -> Result<(), Error> {
        let _write = self.doc_write.lock().await;
        atomic::save_atomic(&self.root.schedule_meta_path(), meta)
    }

    /// Loads `vcr_state.json`. The core never writes this document; it is
    /// owned by the external NFC/VCR subsystem.
    pub async fn load_vcr_state(&self) -> VcrState {
        atomic::load_or_default(&self.root.vcr_state_path(), VcrState::default)
    }
}

#[cfg(test)]
mod spec {
    use std::collections::HashSet;

    use tempfile::tempdir;

    use super::*;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store =
            Store::try_new(ContentRoot::new(dir.path().to_owned())).unwrap();
        (dir, store)
    }

    #[actix_rt::test]
    async fn missing_documents_default_to_empty() {
        let (_dir, store) = store();

        assert!(store.load_videos().await.is_empty());
        assert!(store.load_series().await.is_empty());
        assert!(store.load_channels().await.is_empty());
        assert!(store.load_active_channel().await.is_none());
        assert!(store.load_weekly_schedule().await.is_none());
        assert!(store.load_daily_schedule().await.is_none());
    }

    #[actix_rt::test]
    async fn save_videos_round_trips_under_lock() {
        let (_dir, store) = store();

        let mut videos = Videos::new();
        videos.insert(
            "v1".to_owned(),
            Video {
                video_id: "v1".to_owned(),
                title: "Episode 1".to_owned(),
                category: Category::TvEpisode,
                series: Some("my_show".to_owned()),
                season: None,
                episode: None,
                duracion_sec: Some(1200.0),
                tags: HashSet::new(),
                loudness_lufs: None,
                series_path: Some("my_show".to_owned()),
                commercials_path: None,
            },
        );

        store.save_videos(&videos).await.unwrap();
        let loaded = store.load_videos().await;

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["v1"].season_or_default(), 1);
    }
}
