//! One-shot mtime-edge trigger files (§5, §6): the rotary-encoder process
//! (external to this crate) signals events like "skip to next video" by
//! touching a small file. A [`TriggerFile`] remembers the mtime it last
//! observed and reports an edge exactly once per touch.

use std::{
    path::PathBuf,
    sync::Mutex,
    time::SystemTime,
};

/// Watches one file's modification time for edges.
///
/// A missing file is treated as "never triggered" rather than an error —
/// the external writer may not have run yet.
#[derive(Debug)]
pub struct TriggerFile {
    path: PathBuf,
    last_seen: Mutex<Option<SystemTime>>,
}

impl TriggerFile {
    /// Watches `path`, with no edge recorded yet.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_seen: Mutex::new(None),
        }
    }

    /// Returns `true` at most once per distinct mtime: if the file's mtime
    /// has changed since the last call (or this is the first call and the
    /// file exists), consumes the edge and returns `true`.
    pub fn poll(&self) -> bool {
        let Ok(metadata) = std::fs::metadata(&self.path) else {
            return false;
        };
        let Ok(mtime) = metadata.modified() else {
            return false;
        };

        let mut last_seen = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        let triggered = *last_seen != Some(mtime);
        *last_seen = Some(mtime);
        triggered
    }
}
