//! Episode cursor (§4.C): a per-`(channel, series)` progression pointer,
//! with independent progression per channel over the same series.

use chrono::{DateTime, Utc};

use crate::{
    catalog::Catalog,
    error::Error,
    store::{CursorEntry, EpisodeCursors, Store, Video},
};

/// The index `peek`/`advance` would read next, given the cursor's current
/// `last_index` and the `offset` requested, wrapping modulo `n`.
fn next_index(last_index: i64, offset: i64, n: i64) -> usize {
    (last_index + 1 + offset).rem_euclid(n) as usize
}

/// `Store`-free cursor mutations over an in-memory [`EpisodeCursors`] map,
/// used by the daily planner to batch many advances before a single persist
/// (§4.D/§5: cursor advances during plan generation are serialized with
/// each other and persisted together with the plan).
pub mod batch {
    use super::{next_index, CursorEntry, DateTime, EpisodeCursors, Utc, Video};

    /// Episode at `(last_index+1+offset) mod N`; never mutates `cursors`.
    #[must_use]
    pub fn peek(
        cursors: &EpisodeCursors,
        channel: &str,
        series: &str,
        episodes: &[Video],
        offset: usize,
    ) -> Option<Video> {
        if episodes.is_empty() {
            return None;
        }
        let last_index = cursors
            .get(channel)
            .and_then(|m| m.get(series))
            .map_or(-1, |c| c.last_index);
        let idx = next_index(last_index, offset as i64, episodes.len() as i64);
        Some(episodes[idx].clone())
    }

    /// Advances the `(channel, series)` cursor in `cursors`, returning the
    /// newly-current episode. A no-op (returns `None`) when `series` has no
    /// episodes.
    pub fn advance(
        cursors: &mut EpisodeCursors,
        channel: &str,
        series: &str,
        episodes: &[Video],
        now: DateTime<Utc>,
    ) -> Option<Video> {
        if episodes.is_empty() {
            return None;
        }
        let n = episodes.len() as i64;
        let entry = cursors
            .entry(channel.to_owned())
            .or_default()
            .entry(series.to_owned())
            .or_insert_with(|| CursorEntry::unstarted(now));

        let new_index = next_index(entry.last_index, 0, n) as i64;
        let episode = episodes[new_index as usize].clone();
        entry.last_index = new_index;
        entry.season = Some(episode.season_or_default());
        entry.episode = Some(episode.episode_or_default());
        entry.updated_at = now;
        Some(episode)
    }
}

/// [`Store`]-backed cursor operations, for callers outside the daily planner
/// batch (an admin "what airs next" endpoint, for example).
#[derive(Clone, Debug)]
pub struct Cursors {
    store: Store,
}

impl Cursors {
    /// Wraps `store` as [`Cursors`].
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// See [`batch::peek`]. Never mutates persisted state.
    pub async fn peek(
        &self,
        catalog: &Catalog,
        channel: &str,
        series: &str,
        offset: usize,
    ) -> Option<Video> {
        let episodes = catalog.episodes_of(series).await;
        let cursors = self.store.load_cursors().await;
        batch::peek(&cursors, channel, series, &episodes, offset)
    }

    /// See [`batch::advance`]. Persists the mutated cursor document before
    /// returning.
    ///
    /// # Errors
    ///
    /// If persisting the cursor document fails.
    pub async fn advance(
        &self,
        catalog: &Catalog,
        channel: &str,
        series: &str,
    ) -> Result<Option<Video>, Error> {
        let episodes = catalog.episodes_of(series).await;
        let mut cursors = self.store.load_cursors().await;
        let episode =
            batch::advance(&mut cursors, channel, series, &episodes, Utc::now());
        if episode.is_some() {
            self.store.save_cursors(&cursors).await?;
        }
        Ok(episode)
    }
}

#[cfg(test)]
mod spec {
    use std::collections::HashSet;

    use super::*;
    use crate::store::Category;

    fn episode(series: &str, n: u32, id: &str) -> Video {
        Video {
            video_id: id.to_owned(),
            title: format!("{} ep {}", series, n),
            category: Category::TvEpisode,
            series: Some(series.to_owned()),
            season: Some(1),
            episode: Some(n),
            duracion_sec: Some(1200.0),
            tags: HashSet::new(),
            loudness_lufs: None,
            series_path: Some(series.to_owned()),
            commercials_path: None,
        }
    }

    #[test]
    fn wraps_modulo_episode_count() {
        let episodes =
            vec![episode("s", 1, "a"), episode("s", 2, "b"), episode("s", 3, "c")];
        let mut cursors = EpisodeCursors::new();
        let now = Utc::now();

        assert_eq!(
            batch::advance(&mut cursors, "X", "s", &episodes, now)
                .unwrap()
                .video_id,
            "a"
        );
        assert_eq!(
            batch::advance(&mut cursors, "X", "s", &episodes, now)
                .unwrap()
                .video_id,
            "b"
        );
        assert_eq!(
            batch::advance(&mut cursors, "X", "s", &episodes, now)
                .unwrap()
                .video_id,
            "c"
        );
        assert_eq!(
            batch::advance(&mut cursors, "X", "s", &episodes, now)
                .unwrap()
                .video_id,
            "a"
        );
    }

    /// Seed scenario 4: cursor wrap, independent per channel.
    #[test]
    fn independent_per_channel() {
        let episodes =
            vec![episode("s", 1, "a"), episode("s", 2, "b"), episode("s", 3, "c")];
        let mut cursors = EpisodeCursors::new();
        let now = Utc::now();

        let _ = batch::advance(&mut cursors, "X", "s", &episodes, now);
        let _ = batch::advance(&mut cursors, "X", "s", &episodes, now);
        let _ = batch::advance(&mut cursors, "Y", "s", &episodes, now);
        let last =
            batch::advance(&mut cursors, "X", "s", &episodes, now).unwrap();

        assert_eq!(last.video_id, "c");
        assert_eq!(cursors["X"]["s"].last_index, 2);
        assert_eq!(cursors["Y"]["s"].last_index, 0);
    }

    #[test]
    fn peek_never_mutates() {
        let episodes = vec![episode("s", 1, "a"), episode("s", 2, "b")];
        let cursors = EpisodeCursors::new();

        let first = batch::peek(&cursors, "X", "s", &episodes, 0).unwrap();
        let second = batch::peek(&cursors, "X", "s", &episodes, 0).unwrap();

        assert_eq!(first.video_id, second.video_id);
        assert_eq!(first.video_id, "a");
        assert!(cursors.is_empty());
    }

    #[test]
    fn advance_on_empty_series_is_a_no_op() {
        let mut cursors = EpisodeCursors::new();
        let now = Utc::now();

        assert!(batch::advance(&mut cursors, "X", "empty", &[], now).is_none());
        assert!(cursors.is_empty());
    }
}
