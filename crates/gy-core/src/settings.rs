//! Worker settings: persisted keys, defaults, and the snapshot handed to
//! every task invocation.
//!
//! Settings live in the store's `setting` KV table and are read once per
//! worker-fleet start. Changing a value requires restarting the workers.

use serde::{Deserialize, Serialize};

/// Requests-per-minute budget of a single worker.
pub const KEY_REQUESTS_PER_MINUTE: &str = "worker.requests-per-minute";
/// Seconds a locally stored object stays fresh before a re-fetch.
pub const KEY_LOCAL_OBJECT_DURATION: &str = "worker.local-object-duration";
/// Seconds a broadcast counts as "active" for comment backup.
pub const KEY_BROADCAST_ACTIVE_DURATION: &str = "worker.broadcast-active-duration";
/// Whether broadcast backup stops at the conflict window.
pub const KEY_BROADCAST_INCREMENTAL_BACKUP: &str = "worker.broadcast-incremental-backup";
/// Whether attachment bytes are materialized under the cache directory.
pub const KEY_IMAGE_LOCAL_CACHE: &str = "worker.image-local-cache";
/// JSON list of proxy URLs; each proxy gets its own worker.
pub const KEY_PROXIES: &str = "worker.proxies";

pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;
pub const DEFAULT_LOCAL_OBJECT_DURATION: i64 = 60 * 60 * 24 * 30;
pub const DEFAULT_BROADCAST_ACTIVE_DURATION: i64 = 60 * 60 * 24 * 30;

/// Snapshot of the crawler configuration, read from the settings table
/// when workers are (re)started and injected into each task invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Per-worker request pacing budget.
    pub requests_per_minute: u32,
    /// Freshness window for locally stored objects, in seconds.
    pub local_object_duration: i64,
    /// Window within which broadcasts get their comments re-fetched,
    /// in seconds.
    pub broadcast_active_duration: i64,
    /// Stop broadcast backup once the conflict window fills.
    pub broadcast_incremental_backup: bool,
    /// Materialize attachments under the cache directory.
    pub image_local_cache: bool,
    /// Proxy URLs; one extra worker is created per entry.
    pub proxies: Vec<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            local_object_duration: DEFAULT_LOCAL_OBJECT_DURATION,
            broadcast_active_duration: DEFAULT_BROADCAST_ACTIVE_DURATION,
            broadcast_incremental_backup: false,
            image_local_cache: false,
            proxies: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.requests_per_minute, 60);
        assert_eq!(settings.local_object_duration, 2_592_000);
        assert_eq!(settings.broadcast_active_duration, 2_592_000);
        assert!(!settings.broadcast_incremental_backup);
        assert!(!settings.image_local_cache);
        assert!(settings.proxies.is_empty());
    }
}
