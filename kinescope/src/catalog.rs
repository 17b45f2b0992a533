//! Content catalog (§4.B): pure read-through views over the [`crate::store`],
//! plus on-demand duration resolution via a media-probe subprocess.

use std::time::Duration;

use tokio::time;

use crate::store::{Category, Store, Video, VideoId};

/// Kind of system-owned fallback asset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SystemVideoKind {
    /// SMPTE color bars + 1 kHz tone, generated on first run.
    TestPattern,
    /// A 30s "please stand by" text card, generated on first run.
    SponsorsPlaceholder,
}

/// Read-through view over the videos document.
#[derive(Clone, Debug)]
pub struct Catalog {
    store: Store,
}

impl Catalog {
    /// Hard timeout for a single media-probe invocation (§5).
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default duration bucket used when a probe fails or times out (§5).
    pub const DEFAULT_DURATION_SEC: f64 = 1800.0;

    /// Wraps `store` as a [`Catalog`].
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Episodes of `series`, with `category=tv_episode`, sorted ascending by
    /// `(season, episode)`; missing `season`/`episode` default to `1`.
    pub async fn episodes_of(&self, series: &str) -> Vec<Video> {
        let mut episodes: Vec<Video> = self
            .store
            .load_videos()
            .await
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| {
                v.category == Category::TvEpisode
                    && v.series.as_deref() == Some(series)
            })
            .collect();

        episodes.sort_by_key(|v| (v.season_or_default(), v.episode_or_default()));
        episodes
    }

    /// All commercials (`category=commercial`); duration defaults to 30s.
    pub async fn commercials(&self) -> Vec<Video> {
        self.store
            .load_videos()
            .await
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| v.category == Category::Commercial)
            .collect()
    }

    /// A single video by id, if known.
    pub async fn video(&self, id: &str) -> Option<Video> {
        self.store.load_videos().await.remove(id)
    }

    /// Every video in the store, regardless of category. Used by the
    /// fairness picker to build its candidate pool.
    pub async fn all(&self) -> Vec<Video> {
        self.store.load_videos().await.into_iter().map(|(_, v)| v).collect()
    }

    /// Filesystem path of a system-owned fallback asset.
    #[must_use]
    pub fn system_video(&self, kind: SystemVideoKind) -> std::path::PathBuf {
        let name = match kind {
            SystemVideoKind::TestPattern => "test_pattern.mp4",
            SystemVideoKind::SponsorsPlaceholder => "sponsors_placeholder.mp4",
        };
        self.store.root().system_dir().join(name)
    }

    /// Generates whichever of the system-owned fallback assets are missing
    /// (§4.B: "both are generated on first run"). Idempotent: a kind whose
    /// file already exists on disk is left untouched. Called once at
    /// startup; failures are logged and otherwise ignored; schedule lookup
    /// degrades to a dangling `system://` URL rather than failing, which the
    /// player already has to tolerate for a not-yet-reachable file.
    pub async fn ensure_system_videos(&self) {
        for kind in [SystemVideoKind::TestPattern, SystemVideoKind::SponsorsPlaceholder]
        {
            let path = self.system_video(kind);
            if tokio::fs::metadata(&path).await.is_ok() {
                continue;
            }
            if let Err(e) = generate_system_video(kind, &path).await {
                kinescope_log::log::error!(
                    "Failed to generate system asset '{}': {}",
                    path.display(),
                    e,
                );
            }
        }
    }

    /// Resolves `video`'s duration, probing and persisting it through the
    /// store when absent. Never fails: a probe error or timeout falls back
    /// to [`Catalog::DEFAULT_DURATION_SEC`].
    pub async fn duration_of(&self, video: &Video) -> f64 {
        if let Some(d) = video.duracion_sec {
            return d;
        }

        let probed = match time::timeout(
            Self::PROBE_TIMEOUT,
            probe_duration(&self.video_path(video)),
        )
        .await
        {
            Ok(Ok(d)) => d,
            Ok(Err(e)) => {
                kinescope_log::log::warn!(
                    "Media probe failed for '{}': {}, using default duration",
                    video.video_id,
                    e,
                );
                Self::DEFAULT_DURATION_SEC
            }
            Err(_) => {
                kinescope_log::log::warn!(
                    "Media probe timed out for '{}', using default duration",
                    video.video_id,
                );
                Self::DEFAULT_DURATION_SEC
            }
        };

        let mut videos = self.store.load_videos().await;
        if let Some(v) = videos.get_mut(&video.video_id) {
            v.duracion_sec = Some(probed);
            if let Err(e) = self.store.save_videos(&videos).await {
                kinescope_log::log::error!(
                    "Failed to persist probed duration for '{}': {}",
                    video.video_id,
                    e,
                );
            }
        }

        probed
    }

    fn video_path(&self, video: &Video) -> std::path::PathBuf {
        match video.category {
            Category::TvEpisode => {
                let dir = match video.series_path.as_deref() {
                    Some(p) => self.store.root().series_dir().join(p),
                    None => self.store.root().videos_dir(),
                };
                dir.join(format!("{}.mp4", video.video_id))
            }
            Category::Commercial => self
                .store
                .root()
                .commercials_dir()
                .join(format!("{}.mp4", video.video_id)),
            Category::VhsTape | Category::Movie => self
                .store
                .root()
                .videos_dir()
                .join(format!("{}.mp4", video.video_id)),
        }
    }
}

/// Probes the duration of the file at `path` by spawning an external
/// `ffprobe`-compatible subprocess, matching the teacher's own pattern of
/// wrapping subprocess I/O in `tokio::process::Command`.
///
/// # Errors
///
/// If the subprocess cannot be spawned, exits non-zero, or its output is not
/// a parseable floating-point number of seconds.
async fn probe_duration(path: &std::path::Path) -> Result<f64, anyhow::Error> {
    let output = tokio::process::Command::new("ffprobe")
        .args(&[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("failed to spawn ffprobe: {}", e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "ffprobe exited with {}",
            output.status,
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("unparsable ffprobe output: {}", e))
}

/// Length, in seconds, of a freshly generated system asset.
const SYSTEM_VIDEO_DURATION_SEC: u32 = 30;

/// Renders one system-owned fallback asset with `ffmpeg`'s `lavfi` source
/// filters, writing it next to `dest` and renaming it into place so a
/// concurrent reader never observes a partial file.
async fn generate_system_video(
    kind: SystemVideoKind,
    dest: &std::path::Path,
) -> Result<(), anyhow::Error> {
    let dir = dest.parent().ok_or_else(|| {
        anyhow::anyhow!("'{}' has no parent directory", dest.display())
    })?;
    tokio::fs::create_dir_all(dir).await?;
    let tmp = dest.with_extension("mp4.tmp");

    let duration = SYSTEM_VIDEO_DURATION_SEC.to_string();
    let args: Vec<&str> = match kind {
        SystemVideoKind::TestPattern => vec![
            "-f",
            "lavfi",
            "-i",
            "smptebars=size=1280x720:rate=30",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=1000:sample_rate=48000",
            "-t",
            &duration,
            "-shortest",
            "-c:v",
            "libx264",
            "-c:a",
            "aac",
            "-y",
        ],
        SystemVideoKind::SponsorsPlaceholder => vec![
            "-f",
            "lavfi",
            "-i",
            "color=c=black:s=1280x720:r=30",
            "-vf",
            "drawtext=text='Please Stand By':fontsize=48:fontcolor=white:\
             x=(w-text_w)/2:y=(h-text_h)/2",
            "-t",
            &duration,
            "-c:v",
            "libx264",
            "-an",
            "-y",
        ],
    };

    let output = tokio::process::Command::new("ffmpeg")
        .args(&args)
        .arg(&tmp)
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("failed to spawn ffmpeg: {}", e))?;

    if !output.status.success() {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(anyhow::anyhow!("ffmpeg exited with {}", output.status));
    }

    tokio::fs::rename(&tmp, dest).await?;
    Ok(())
}
