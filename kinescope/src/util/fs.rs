//! Atomic JSON persistence for the documents in [`crate::store`].
//!
//! Every document is written the same way: serialize into a temporary file
//! created next to the destination (so the final rename stays on the same
//! filesystem), flush it to disk, then rename it over the destination. A
//! reader therefore never observes a partially-written document, and a
//! disk-full failure on write leaves the previous document intact.

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::error::Error;

/// Reads and deserializes the JSON document at `path`.
///
/// Returns `default()` when the file does not exist, and also when its
/// contents fail to parse — a corrupt document is treated as absent rather
/// than fatal, matching the "never error on load" contract of [`crate::store`].
pub fn load_or_default<T, F>(path: &Path, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            kinescope_log::log::error!(
                "Discarding corrupt document '{}': {}",
                path.display(),
                e,
            );
            default()
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => default(),
        Err(e) => {
            kinescope_log::log::error!(
                "Failed to read document '{}': {}, using default",
                path.display(),
                e,
            );
            default()
        }
    }
}

/// Atomically persists `value` as the JSON document at `path`.
///
/// # Errors
///
/// If the temporary file cannot be created or written, or the final rename
/// fails (for example, the destination directory doesn't exist).
pub fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let dir = path.parent().ok_or_else(|| {
        Error::bad_request(format!(
            "'{}' has no parent directory to write into",
            path.display(),
        ))
    })?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    {
        use std::io::Write as _;
        tmp.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| Error::IoFault(e.error))?;
    Ok(())
}
