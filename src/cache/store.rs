use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CacheError;
use crate::format::OutputFormat;

/// Default cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = "image_cache";

/// Default artifact lifetime: one day.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(86_400);

// =============================================================================
// Image Cache
// =============================================================================

/// Disk cache of resized images.
///
/// Every artifact lives at `<dir>/<fingerprint>.<ext>`. An entry is fresh while
/// `now - mtime <= max_age`, both truncated to whole seconds. Stale entries are
/// removed the next time they are looked up.
///
/// The cache holds no in-memory index and no locks; the file system is the
/// only shared state, and writes are made visible atomically by renaming a
/// fully written temporary file into place.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
    max_age: Duration,
}

impl ImageCache {
    /// Create a cache handle without touching the file system.
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    /// Create a cache handle and make sure its directory exists.
    pub async fn open(dir: impl Into<PathBuf>, max_age: Duration) -> Result<Self, CacheError> {
        let cache = Self::new(dir, max_age);
        cache.ensure_dir().await?;
        Ok(cache)
    }

    /// Path an artifact with this fingerprint and format is stored at.
    pub fn path_for(&self, fingerprint: &str, format: OutputFormat) -> PathBuf {
        self.dir
            .join(format!("{}.{}", fingerprint, format.extension()))
    }

    /// Return the artifact path if a fresh entry exists.
    pub async fn lookup(&self, fingerprint: &str, format: OutputFormat) -> Option<PathBuf> {
        self.lookup_at(fingerprint, format, SystemTime::now()).await
    }

    /// [`lookup`](Self::lookup) against an explicit wall-clock time.
    pub async fn lookup_at(
        &self,
        fingerprint: &str,
        format: OutputFormat,
        now: SystemTime,
    ) -> Option<PathBuf> {
        let path = self.path_for(fingerprint, format);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to stat cache entry");
                }
                return None;
            }
        };

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache entry has no modification time");
                return None;
            }
        };

        if self.is_fresh(modified, now) {
            debug!(path = %path.display(), "Cache hit");
            return Some(path);
        }

        debug!(path = %path.display(), "Cache entry expired");
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove expired cache entry");
            }
        }
        None
    }

    /// Write an artifact and return its final path.
    ///
    /// The bytes go to a uniquely named sibling first and are renamed into
    /// place, so readers never see a partial file. Concurrent stores of the
    /// same fingerprint are safe; the last rename wins.
    pub async fn store(
        &self,
        fingerprint: &str,
        data: &[u8],
        format: OutputFormat,
    ) -> Result<PathBuf, CacheError> {
        self.ensure_dir().await?;

        let path = self.path_for(fingerprint, format);
        let temp = self
            .dir
            .join(format!(".{}.{}.tmp", fingerprint, Uuid::new_v4().simple()));

        if let Err(e) = tokio::fs::write(&temp, data).await {
            return Err(CacheError::Write {
                path: temp.display().to_string(),
                message: e.to_string(),
            });
        }

        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(CacheError::Write {
                path: path.display().to_string(),
                message: e.to_string(),
            });
        }

        debug!(path = %path.display(), bytes = data.len(), "Stored cache entry");
        Ok(path)
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Maximum age of a servable entry.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn is_fresh(&self, modified: SystemTime, now: SystemTime) -> bool {
        let age = unix_secs(now) - unix_secs(modified);
        age <= self.max_age.as_secs() as i64
    }

    async fn ensure_dir(&self) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::CreateDir {
                path: self.dir.display().to_string(),
                message: e.to_string(),
            })
    }
}

/// Whole seconds since the Unix epoch, negative before it.
pub(crate) fn unix_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    }
}
