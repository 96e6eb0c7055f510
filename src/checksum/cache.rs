use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::checksum::algorithm::DigestAlgorithm;
use crate::checksum::artifact_checksum::ArtifactChecksum;

/// In-memory cache of artifact digests, keyed by `storage/repository/path`.
///
/// This is advisory: the sidecar files on disk are the durable form. Evicting an entry only
///  means the next lookup reads (or recomputes) the sidecar.
pub struct ChecksumCache {
    entries: Mutex<HashMap<String, Arc<ArtifactChecksum>>>,
    lifetime: Duration,
    epoch: Instant,
}

impl ChecksumCache {
    pub fn new(lifetime: Duration) -> ChecksumCache {
        ChecksumCache {
            entries: Default::default(),
            lifetime,
            epoch: Instant::now(),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    fn now_millis(&self) -> u64 {
        Instant::now().duration_since(self.epoch).as_millis() as u64
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ArtifactChecksum>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The entry is stamped while the map lock is held. A sweep that runs after this returns
    ///  sees a fresh stamp, so it cannot evict the entry the caller is about to update.
    fn entry(&self, key: &str) -> Arc<ArtifactChecksum> {
        let now = self.now_millis();
        let mut entries = self.lock();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(ArtifactChecksum::new(now)));
        entry.touch(now);
        entry.clone()
    }

    fn existing_entry(&self, key: &str) -> Option<Arc<ArtifactChecksum>> {
        let now = self.now_millis();
        let entries = self.lock();
        let entry = entries.get(key)?;
        entry.touch(now);
        Some(entry.clone())
    }

    pub fn add_checksum(&self, key: &str, algorithm: DigestAlgorithm, hex_digest: &str) {
        let now = self.now_millis();
        self.entry(key).add_checksum(algorithm, hex_digest, now);
    }

    pub fn get_checksum(&self, key: &str, algorithm: DigestAlgorithm) -> Option<String> {
        let entry = self.existing_entry(key)?;
        entry.get_checksum(algorithm, self.now_millis())
    }

    pub fn remove_checksum(&self, key: &str, algorithm: DigestAlgorithm) -> Option<String> {
        let entry = self.existing_entry(key)?;
        entry.remove_checksum(algorithm, self.now_millis())
    }

    pub fn validate_checksum(&self, key: &str, algorithm: DigestAlgorithm, hex_digest: &str) -> Option<bool> {
        let entry = self.existing_entry(key)?;
        entry.validate_checksum(algorithm, hex_digest, self.now_millis())
    }

    /// The entry for an artifact, if one is cached. Does not count as an access.
    pub fn get(&self, key: &str) -> Option<Arc<ArtifactChecksum>> {
        self.lock().get(key).cloned()
    }

    /// Drops the entry regardless of its age, e.g. because the artifact was deleted or replaced
    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry that was not accessed for longer than the lifetime. The access
    ///  stamp is re-read under the map lock, so an entry touched while the sweep runs is kept.
    pub fn sweep(&self) -> usize {
        let now = self.now_millis();
        let lifetime = self.lifetime.as_millis() as u64;

        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, entry| {
            let idle = now.saturating_sub(entry.last_accessed());
            let keep = idle <= lifetime;
            if !keep {
                trace!("evicting checksums of {} after {}ms idle", key, idle);
            }
            keep
        });
        before - entries.len()
    }

    /// Spawns the background sweep. It runs until `cancel` is triggered.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else {
                            break;
                        };
                        let evicted = cache.sweep();
                        if evicted > 0 {
                            debug!("checksum cache sweep evicted {} entries, {} remaining", evicted, cache.len());
                        }
                    }
                }
            }
            trace!("checksum cache sweeper stopped");
        })
    }
}
