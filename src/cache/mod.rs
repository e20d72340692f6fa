//! Content-addressed disk cache for resized images.
//!
//! ```text
//! (url, width, height, format) ──sha256──► fingerprint ──► <dir>/<fingerprint>.<ext>
//! ```
//!
//! Freshness is judged from the file's modification time, so the cache
//! survives restarts and needs no index.

mod fingerprint;
mod store;

pub use fingerprint::fingerprint;
pub use store::{ImageCache, DEFAULT_CACHE_DIR, DEFAULT_CACHE_MAX_AGE};

pub(crate) use store::unix_secs;
