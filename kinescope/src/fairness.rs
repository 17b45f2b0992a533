//! Fairness picker (§4.H): weighted selection for non-broadcast ("library")
//! channels, penalizing frequently-played videos, relaxing the anti-repeat
//! gap when it would otherwise starve the pool, and preferring tag priority.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::{
    catalog::Catalog,
    error::Error,
    store::{Category, Channel, PlayStats, Store, Video, VideoId},
};

/// A video chosen by the fairness picker, together with the age (in
/// seconds) of its last play — diagnostic, surfaced in seed scenario 5.
#[derive(Clone, Debug)]
pub struct Pick {
    /// The chosen video.
    pub video: Video,
    /// Seconds since this video was last played, or `i64::MAX` if never.
    pub age_seconds: i64,
}

/// Sort key fields, compared lexicographically ascending (§4.H). `f64`
/// fields can't derive [`Ord`], so comparison is manual.
#[derive(Clone, Copy, Debug)]
struct ScoreKey {
    plays_norm: f64,
    last_ts: i64,
    overlap: usize,
    neg_tag_score: i64,
    jitter: f64,
}

impl ScoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.plays_norm
            .partial_cmp(&other.plays_norm)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.last_ts.cmp(&other.last_ts))
            .then_with(|| self.overlap.cmp(&other.overlap))
            .then_with(|| self.neg_tag_score.cmp(&other.neg_tag_score))
            .then_with(|| {
                self.jitter.partial_cmp(&other.jitter).unwrap_or(Ordering::Equal)
            })
    }
}

/// Stateless-except-for-plays fairness picker; the per-channel "shown"
/// list, pending pick, and anti-bounce windows are owned by
/// [`crate::switcher::Switcher`], which is what calls [`FairnessPicker::pick`]
/// with the caller's current `shown` set.
#[derive(Clone, Debug)]
pub struct FairnessPicker {
    store: Store,
}

impl FairnessPicker {
    /// Wraps `store` as a [`FairnessPicker`].
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Picks the best candidate for `channel`, excluding `shown`.
    ///
    /// Returns `None` when the candidate pool (after excluding `shown`) is
    /// empty; the caller is expected to reset `shown` and retry once in that
    /// case (§4.H: "When the shown list equals the candidate set, reset it
    /// and recurse once").
    pub async fn pick(
        &self,
        catalog: &Catalog,
        channel: &Channel,
        shown: &HashSet<VideoId>,
        previous_pick_tags: &HashSet<String>,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Option<Pick> {
        let all = catalog.all().await;
        let plays = self.store.load_plays().await;

        let candidates: Vec<&Video> = all
            .iter()
            .filter(|v| is_candidate(v, channel))
            .filter(|v| !shown.contains(&v.video_id))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let min_gap = Duration::from_std(channel.min_gap)
            .unwrap_or_else(|_| Duration::max_value());
        let age_of = |v: &Video| -> i64 {
            plays
                .get(&v.video_id)
                .and_then(|p| p.last_played)
                .map_or(i64::MAX, |lp| (now - lp).num_seconds())
        };

        let gap_ok: Vec<&Video> = candidates
            .iter()
            .copied()
            .filter(|v| age_of(v) >= min_gap.num_seconds())
            .collect();

        // The gap filter emptied the set: relax it by sorting by greatest
        // age instead of dropping candidates.
        let pool: Vec<&Video> = if gap_ok.is_empty() {
            let mut by_age = candidates;
            by_age.sort_by_key(|v| std::cmp::Reverse(age_of(v)));
            by_age
        } else {
            gap_ok
        };

        let prio = &channel.tags_prioridad;
        let best = pool
            .into_iter()
            .map(|v| {
                let key = score(v, &plays, prio, previous_pick_tags, rng);
                (v, key)
            })
            .min_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(v, _)| v)?;

        Some(Pick {
            video: best.clone(),
            age_seconds: age_of(best),
        })
    }

    /// Confirms a reported `played(video_id)` completion: increments
    /// `plays` and updates `last_played`. Idempotent only in the sense that
    /// an unknown `video_id` is a no-op; a known one always increments
    /// (§8: "applying N `played(v)` events yields `plays(v) += N`").
    ///
    /// # Errors
    ///
    /// If persisting the updated play-stats document fails.
    pub async fn confirm_play(
        &self,
        video_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PlayStats, Error> {
        let mut plays = self.store.load_plays().await;
        let entry = plays.entry(video_id.to_owned()).or_default();
        entry.plays += 1;
        entry.last_played = Some(now);
        let updated = entry.clone();
        self.store.save_plays(&plays).await?;
        Ok(updated)
    }
}

fn is_candidate(video: &Video, channel: &Channel) -> bool {
    if let Some(filter) = &channel.series_filter {
        video.category == Category::TvEpisode
            && video.series.as_deref().map_or(false, |s| filter.contains(s))
    } else {
        !video.tags.is_disjoint(&channel.tags_incluidos)
    }
}

fn score(
    video: &Video,
    plays: &HashMap<VideoId, PlayStats>,
    tags_prioridad: &[String],
    previous_pick_tags: &HashSet<String>,
    rng: &mut impl Rng,
) -> ScoreKey {
    let stats = plays.get(&video.video_id);
    let play_count = stats.map_or(0, |p| p.plays);
    let duration_minutes = (video.duration_or_default() / 60.0).ceil().max(1.0);
    let plays_norm = play_count as f64 / duration_minutes;

    let last_ts = stats
        .and_then(|p| p.last_played)
        .map_or(0, |lp| lp.timestamp());

    let tag_score: i64 = video
        .tags
        .iter()
        .filter_map(|t| tags_prioridad.iter().position(|p| p == t))
        .map(|idx| tags_prioridad.len() as i64 - idx as i64)
        .sum();

    let overlap = video.tags.intersection(previous_pick_tags).count();
    let jitter = rng.gen_range(0.0, 0.01);

    ScoreKey {
        plays_norm,
        last_ts,
        overlap,
        neg_tag_score: -tag_score,
        jitter,
    }
}

#[cfg(test)]
mod spec {
    use rand::{rngs::StdRng, SeedableRng as _};

    use super::*;
    use crate::store::ContentRoot;

    fn channel(tags: &[&str]) -> Channel {
        Channel {
            nombre: "Retro".to_owned(),
            numero: "05".to_owned(),
            series_filter: None,
            tags_prioridad: vec![],
            tags_incluidos: tags.iter().map(|s| (*s).to_owned()).collect(),
            min_gap: std::time::Duration::from_secs(3600),
            icono: None,
        }
    }

    fn video(id: &str, tags: &[&str]) -> Video {
        Video {
            video_id: id.to_owned(),
            title: id.to_owned(),
            category: Category::Movie,
            series: None,
            season: None,
            episode: None,
            duracion_sec: Some(600.0),
            tags: tags.iter().map(|s| (*s).to_owned()).collect(),
            loudness_lufs: None,
            series_path: None,
            commercials_path: None,
        }
    }

    async fn picker() -> (tempfile::TempDir, FairnessPicker, Catalog, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Store::try_new(ContentRoot::new(dir.path().to_owned())).unwrap();
        (
            dir,
            FairnessPicker::new(store.clone()),
            Catalog::new(store.clone()),
            store,
        )
    }

    /// Seed scenario 5: all 5 candidates played 10 minutes ago with a 60
    /// minute gap configured; the gap filter empties the set, so it relaxes
    /// to the oldest of the five.
    #[actix_rt::test]
    async fn anti_repeat_relaxes_to_oldest_when_gap_empties_pool() {
        let (_dir, picker, catalog, store) = picker().await;
        let now = Utc::now();

        let mut videos = crate::store::Videos::new();
        let mut plays = crate::store::Plays::new();
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            let _ = videos.insert((*id).to_owned(), video(id, &["retro"]));
            let _ = plays.insert(
                (*id).to_owned(),
                PlayStats {
                    plays: 1,
                    // Stagger last_played so one is strictly oldest.
                    last_played: Some(
                        now - Duration::minutes(10) - Duration::seconds(i as i64),
                    ),
                },
            );
        }
        store.save_videos(&videos).await.unwrap();
        store.save_plays(&plays).await.unwrap();

        let channel = channel(&["retro"]);
        let mut rng = StdRng::seed_from_u64(5);
        let pick = picker
            .pick(&catalog, &channel, &HashSet::new(), &HashSet::new(), now, &mut rng)
            .await
            .unwrap();

        assert_eq!(pick.video.video_id, "e");
        assert!(pick.age_seconds >= 10 * 60);
    }

    #[actix_rt::test]
    async fn excludes_shown_videos() {
        let (_dir, picker, catalog, store) = picker().await;
        let now = Utc::now();

        let mut videos = crate::store::Videos::new();
        let _ = videos.insert("a".to_owned(), video("a", &["retro"]));
        let _ = videos.insert("b".to_owned(), video("b", &["retro"]));
        store.save_videos(&videos).await.unwrap();

        let channel = channel(&["retro"]);
        let mut rng = StdRng::seed_from_u64(1);
        let shown: HashSet<VideoId> = ["a".to_owned()].into_iter().collect();

        let pick = picker
            .pick(&catalog, &channel, &shown, &HashSet::new(), now, &mut rng)
            .await
            .unwrap();

        assert_eq!(pick.video.video_id, "b");
    }

    #[actix_rt::test]
    async fn shown_equal_to_candidates_yields_none() {
        let (_dir, picker, catalog, store) = picker().await;
        let now = Utc::now();

        let mut videos = crate::store::Videos::new();
        let _ = videos.insert("a".to_owned(), video("a", &["retro"]));
        store.save_videos(&videos).await.unwrap();

        let channel = channel(&["retro"]);
        let mut rng = StdRng::seed_from_u64(1);
        let shown: HashSet<VideoId> = ["a".to_owned()].into_iter().collect();

        let pick = picker
            .pick(&catalog, &channel, &shown, &HashSet::new(), now, &mut rng)
            .await;

        assert!(pick.is_none());
    }

    #[actix_rt::test]
    async fn confirm_play_increments_and_timestamps() {
        let (_dir, picker, _catalog, _store) = picker().await;
        let now = Utc::now();

        let stats = picker.confirm_play("a", now).await.unwrap();
        assert_eq!(stats.plays, 1);
        let stats = picker.confirm_play("a", now).await.unwrap();
        assert_eq!(stats.plays, 2);
        assert_eq!(stats.last_played, Some(now));
    }
}
