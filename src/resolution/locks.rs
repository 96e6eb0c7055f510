use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;

struct LockEntry {
    mutex: Arc<tokio::sync::Mutex<()>>,
    /// holders plus waiters
    users: usize,
}

type LockMap = HashMap<String, LockEntry>;

/// One async mutex per backing store key, created on demand and dropped again once nobody
///  holds or waits for it. Serializes commits, deletes and the open step of reads of the same
///  path; different paths never contend.
#[derive(Default)]
pub struct PathLocks {
    locks: Mutex<LockMap>,
}

impl PathLocks {
    pub fn new() -> PathLocks {
        PathLocks::default()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn lock(&self, key: &str) -> PathGuard<'_> {
        let mutex = {
            let mut map = self.map();
            let entry = map.entry(key.to_string()).or_insert_with(|| LockEntry {
                mutex: Default::default(),
                users: 0,
            });
            entry.users += 1;
            entry.mutex.clone()
        };
        // registered before waiting: if this future is dropped while waiting, the
        //  registration still releases the entry
        let registration = Registration {
            locks: self,
            key: key.to_string(),
        };
        let guard = mutex.lock_owned().await;
        PathGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// number of paths currently locked or waited for
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Registration<'a> {
    locks: &'a PathLocks,
    key: String,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut map = self.locks.map();
        let unused = match map.get_mut(&self.key) {
            Some(entry) => {
                entry.users -= 1;
                entry.users == 0
            }
            None => false,
        };
        if unused {
            map.remove(&self.key);
        }
    }
}

/// Fields drop in declaration order: the mutex is released before the entry is.
pub struct PathGuard<'a> {
    _guard: OwnedMutexGuard<()>,
    _registration: Registration<'a>,
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_entries_are_dropped() {
        let locks = PathLocks::new();
        {
            let _a = locks.lock("repo/a").await;
            let _b = locks.lock("repo/b").await;
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_path_is_serialized() {
        let locks = Arc::new(PathLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("repo/a").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiter_releases_entry() {
        let locks = PathLocks::new();
        let held = locks.lock("repo/a").await;

        let waited = tokio::time::timeout(Duration::from_millis(50), locks.lock("repo/a")).await;
        assert!(waited.is_err());
        assert_eq!(locks.len(), 1);

        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_paths_do_not_contend() {
        let locks = PathLocks::new();
        let _a = locks.lock("repo/a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("repo/b")).await;
        assert!(b.is_ok());
    }
}
