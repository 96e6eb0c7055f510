use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::checksum::algorithm::DigestAlgorithm;

/// The known digests of one artifact, as held in the in-memory checksum cache.
///
/// `last_accessed` is stamped on every read or write (in milliseconds relative to the owning
///  cache's epoch) so the sweeper can decide on eviction without taking a lock on the entry.
pub struct ArtifactChecksum {
    checksums: RwLock<BTreeMap<DigestAlgorithm, String>>,
    last_accessed: AtomicU64,
    number_of_checksums: AtomicUsize,
    number_of_validated_checksums: AtomicUsize,
}

impl ArtifactChecksum {
    pub fn new(now_millis: u64) -> ArtifactChecksum {
        ArtifactChecksum {
            checksums: Default::default(),
            last_accessed: AtomicU64::new(now_millis),
            number_of_checksums: AtomicUsize::new(0),
            number_of_validated_checksums: AtomicUsize::new(0),
        }
    }

    pub fn add_checksum(&self, algorithm: DigestAlgorithm, hex_digest: &str, now_millis: u64) {
        self.touch(now_millis);
        let previous = self.checksums.write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(algorithm, hex_digest.to_ascii_lowercase());
        if previous.is_none() {
            self.number_of_checksums.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn get_checksum(&self, algorithm: DigestAlgorithm, now_millis: u64) -> Option<String> {
        self.touch(now_millis);
        self.checksums.read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&algorithm)
            .cloned()
    }

    pub fn remove_checksum(&self, algorithm: DigestAlgorithm, now_millis: u64) -> Option<String> {
        self.touch(now_millis);
        let removed = self.checksums.write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&algorithm);
        if removed.is_some() {
            self.number_of_checksums.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    /// Compares a digest supplied from outside (e.g. an uploaded sidecar file) with the known
    ///  one. Returns `None` if no digest is known for the algorithm.
    pub fn validate_checksum(&self, algorithm: DigestAlgorithm, hex_digest: &str, now_millis: u64) -> Option<bool> {
        let known = self.get_checksum(algorithm, now_millis)?;
        let matches = known.eq_ignore_ascii_case(hex_digest);
        if matches {
            self.number_of_validated_checksums.fetch_add(1, Ordering::AcqRel);
        }
        Some(matches)
    }

    pub fn checksums(&self, now_millis: u64) -> BTreeMap<DigestAlgorithm, String> {
        self.touch(now_millis);
        self.checksums.read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn number_of_checksums(&self) -> usize {
        self.number_of_checksums.load(Ordering::Acquire)
    }

    pub fn number_of_validated_checksums(&self) -> usize {
        self.number_of_validated_checksums.load(Ordering::Acquire)
    }

    pub fn last_accessed(&self) -> u64 {
        self.last_accessed.load(Ordering::Acquire)
    }

    pub(crate) fn touch(&self, now_millis: u64) {
        // never move the stamp backwards if a concurrent caller saw a later clock
        self.last_accessed.fetch_max(now_millis, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_add_get_remove() {
        let checksum = ArtifactChecksum::new(0);
        checksum.add_checksum(DigestAlgorithm::Sha1, "ABCD", 5);
        checksum.add_checksum(DigestAlgorithm::Sha1, "abcd", 6);
        checksum.add_checksum(DigestAlgorithm::Md5, "ef", 7);

        assert_eq!(checksum.number_of_checksums(), 2);
        assert_eq!(checksum.get_checksum(DigestAlgorithm::Sha1, 8), Some("abcd".to_string()));
        assert_eq!(checksum.last_accessed(), 8);

        assert_eq!(checksum.remove_checksum(DigestAlgorithm::Md5, 9), Some("ef".to_string()));
        assert_eq!(checksum.remove_checksum(DigestAlgorithm::Md5, 10), None);
        assert_eq!(checksum.number_of_checksums(), 1);
        assert_eq!(checksum.last_accessed(), 10);
    }

    #[test]
    fn test_validate() {
        let checksum = ArtifactChecksum::new(0);
        assert_eq!(checksum.validate_checksum(DigestAlgorithm::Sha1, "ab", 1), None);

        checksum.add_checksum(DigestAlgorithm::Sha1, "ab", 1);
        assert_eq!(checksum.validate_checksum(DigestAlgorithm::Sha1, "AB", 2), Some(true));
        assert_eq!(checksum.validate_checksum(DigestAlgorithm::Sha1, "cd", 3), Some(false));
        assert_eq!(checksum.number_of_validated_checksums(), 1);
    }

    #[test]
    fn test_last_accessed_is_monotonic() {
        let checksum = ArtifactChecksum::new(100);
        checksum.get_checksum(DigestAlgorithm::Sha1, 50);
        assert_eq!(checksum.last_accessed(), 100);
    }

    #[test]
    fn test_concurrent_validation_counts_every_match() {
        let checksum = Arc::new(ArtifactChecksum::new(0));
        checksum.add_checksum(DigestAlgorithm::Sha256, "ff", 0);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let checksum = checksum.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        checksum.validate_checksum(DigestAlgorithm::Sha256, "ff", i * 100 + j);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(checksum.number_of_validated_checksums(), 800);
    }
}
