//! Durable work queue for a single-site crawl (spec.md §4.5).
//!
//! Backed by RocksDB: each entry is keyed by the MD5 digest of its canonical
//! URL and stores `(canonical_url, completed)`. A `VecDeque` of pending
//! digests sits in front of it as the FIFO dispatch order; the same mutex
//! guards both so the in-memory queue and the durable store never drift
//! apart, mirroring the teacher's one-mutex-per-logical-queue pattern.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crawler_core::{url_digest, CrawlError};
use crawler_urlcanon::CanonicalUrl;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FrontierEntry {
    canonical_url: String,
    completed: bool,
}

struct Inner {
    db: rocksdb::DB,
    pending: VecDeque<String>,
}

/// The shared crawl frontier: durable completion state plus an in-memory
/// FIFO of pending URL digests.
pub struct Frontier {
    inner: Mutex<Inner>,
    /// Per-host last-fetch timestamp, read/written outside the main mutex
    /// since politeness waits must not block other hosts' dispatch.
    host_last_seen: DashMap<String, Instant>,
}

impl Frontier {
    /// Open (or create) the durable store at `path`. If `restart` is true,
    /// any existing store is wiped first and the frontier is seeded fresh;
    /// otherwise pending URLs are reloaded, re-validated against `is_valid`,
    /// and seeding only happens if the store turns out to be empty.
    pub async fn initialize(
        path: &str,
        restart: bool,
        seeds: &[String],
        is_valid: impl Fn(&str) -> bool,
    ) -> Result<Self, CrawlError> {
        if restart && Path::new(path).exists() {
            rocksdb::DB::destroy(&rocksdb::Options::default(), path)
                .map_err(|e| CrawlError::Storage(e.to_string()))?;
        }

        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        let db = rocksdb::DB::open(&opts, path).map_err(|e| CrawlError::Storage(e.to_string()))?;

        let mut pending = VecDeque::new();
        if !restart {
            let iter = db.iterator(rocksdb::IteratorMode::Start);
            for item in iter {
                let (key, value) = item.map_err(|e| CrawlError::Storage(e.to_string()))?;
                let entry: FrontierEntry = serde_json::from_slice(&value)
                    .map_err(|e| CrawlError::Storage(e.to_string()))?;
                if !entry.completed && is_valid(&entry.canonical_url) {
                    pending.push_back(String::from_utf8_lossy(&key).to_string());
                }
            }
        }

        let frontier = Self {
            inner: Mutex::new(Inner { db, pending }),
            host_last_seen: DashMap::new(),
        };

        let is_empty = frontier.inner.lock().await.pending.is_empty();
        if restart || is_empty {
            for seed in seeds {
                frontier.add_raw(seed).await?;
            }
        }

        Ok(frontier)
    }

    /// Remove and return the next pending URL in FIFO order, or `None` if empty.
    pub async fn get_next(&self) -> Result<Option<String>, CrawlError> {
        let mut guard = self.inner.lock().await;
        let Some(digest) = guard.pending.pop_front() else {
            return Ok(None);
        };
        let Some(bytes) = guard
            .db
            .get(digest.as_bytes())
            .map_err(|e| CrawlError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };
        let entry: FrontierEntry =
            serde_json::from_slice(&bytes).map_err(|e| CrawlError::Storage(e.to_string()))?;
        Ok(Some(entry.canonical_url))
    }

    /// Canonical-URL entry point: records `(url, false)` and enqueues it if
    /// its digest is not already known. Idempotent for already-known URLs.
    pub async fn add(&self, url: &CanonicalUrl) -> Result<bool, CrawlError> {
        self.add_raw(url.as_str()).await
    }

    async fn add_raw(&self, canonical_url: &str) -> Result<bool, CrawlError> {
        let digest = url_digest(canonical_url);
        let mut guard = self.inner.lock().await;
        if guard
            .db
            .get(digest.as_bytes())
            .map_err(|e| CrawlError::Storage(e.to_string()))?
            .is_some()
        {
            return Ok(false);
        }
        let entry = FrontierEntry {
            canonical_url: canonical_url.to_string(),
            completed: false,
        };
        let bytes = serde_json::to_vec(&entry).map_err(|e| CrawlError::Storage(e.to_string()))?;
        write_with_retry(&guard.db, digest.as_bytes(), &bytes).await?;
        guard.pending.push_back(digest);
        Ok(true)
    }

    /// Mark a URL complete. Logs a warning (but still writes) if the URL
    /// was never previously known.
    pub async fn mark_complete(&self, canonical_url: &str) -> Result<(), CrawlError> {
        let digest = url_digest(canonical_url);
        let mut guard = self.inner.lock().await;
        let previously_known = guard
            .db
            .get(digest.as_bytes())
            .map_err(|e| CrawlError::Storage(e.to_string()))?
            .is_some();
        if !previously_known {
            warn!(url = canonical_url, "marking unknown URL complete");
        }
        let entry = FrontierEntry {
            canonical_url: canonical_url.to_string(),
            completed: true,
        };
        let bytes = serde_json::to_vec(&entry).map_err(|e| CrawlError::Storage(e.to_string()))?;
        write_with_retry(&guard.db, digest.as_bytes(), &bytes).await
    }

    /// Politeness wait: sleeps out the remainder of `time_delay` since the
    /// last fetch to `host`, then records `now` as the new last-fetch time.
    pub async fn wait_for(&self, host: &str, time_delay: Duration) {
        let now = Instant::now();
        let remaining = match self.host_last_seen.get(host) {
            Some(last) => time_delay.checked_sub(last.elapsed()),
            None => None,
        };
        if let Some(remaining) = remaining {
            if !remaining.is_zero() {
                tokio::time::sleep(remaining).await;
            }
        }
        self.host_last_seen.insert(host.to_string(), now);
    }
}

async fn write_with_retry(db: &rocksdb::DB, key: &[u8], value: &[u8]) -> Result<(), CrawlError> {
    let mut delay = Duration::from_millis(100);
    for attempt in 0..3 {
        match db.put(key, value) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < 2 => {
                warn!(error = %e, attempt, "frontier write failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(CrawlError::Storage(e.to_string())),
        }
    }
    unreachable!()
}

/// Per-base-path visit counter bounding crawler traps (spec.md §4.7).
pub struct TrapFilter {
    counts: DashMap<String, u32>,
    max_visits: u32,
}

impl TrapFilter {
    pub fn new(max_visits: u32) -> Self {
        Self {
            counts: DashMap::new(),
            max_visits,
        }
    }

    fn base_path(url: &str) -> String {
        match url::Url::parse(url) {
            Ok(u) => format!("{}://{}{}", u.scheme(), u.host_str().unwrap_or(""), u.path()),
            Err(_) => url.to_string(),
        }
    }

    /// Read-only trap check; does not increment the visit counter.
    pub fn is_trap(&self, url: &str) -> bool {
        let key = Self::base_path(url);
        self.counts.get(&key).map(|c| *c >= self.max_visits).unwrap_or(false)
    }

    /// Record a dispatch against `url`'s base path. Call exactly once per
    /// dispatched URL.
    pub fn record_visit(&self, url: &str) {
        let key = Self::base_path(url);
        *self.counts.entry(key).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path() -> String {
        let dir = tempfile::tempdir().unwrap();
        dir.keep().to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn add_then_get_next_is_fifo() {
        let path = tmp_path();
        let frontier = Frontier::initialize(&path, true, &[], |_| true).await.unwrap();
        assert_eq!(frontier.get_next().await.unwrap(), None);

        let a = CanonicalUrl::new("https://h.ics.uci.edu/a".to_string());
        let b = CanonicalUrl::new("https://h.ics.uci.edu/b".to_string());
        frontier.add(&a).await.unwrap();
        frontier.add(&b).await.unwrap();

        assert_eq!(frontier.get_next().await.unwrap(), Some("https://h.ics.uci.edu/a".to_string()));
        assert_eq!(frontier.get_next().await.unwrap(), Some("https://h.ics.uci.edu/b".to_string()));
        assert_eq!(frontier.get_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn add_is_idempotent_for_known_digests() {
        let path = tmp_path();
        let frontier = Frontier::initialize(&path, true, &[], |_| true).await.unwrap();
        let a = CanonicalUrl::new("https://h.ics.uci.edu/a".to_string());
        assert!(frontier.add(&a).await.unwrap());
        assert!(!frontier.add(&a).await.unwrap());
    }

    #[tokio::test]
    async fn mark_complete_removes_from_pending_rotation() {
        let path = tmp_path();
        let frontier = Frontier::initialize(&path, true, &[], |_| true).await.unwrap();
        let a = CanonicalUrl::new("https://h.ics.uci.edu/a".to_string());
        frontier.add(&a).await.unwrap();
        let next = frontier.get_next().await.unwrap().unwrap();
        frontier.mark_complete(&next).await.unwrap();
        assert_eq!(frontier.get_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn restart_seeds_fresh_store() {
        let path = tmp_path();
        let seeds = vec!["https://h.ics.uci.edu/seed".to_string()];
        let frontier = Frontier::initialize(&path, true, &seeds, |_| true).await.unwrap();
        assert_eq!(
            frontier.get_next().await.unwrap(),
            Some("https://h.ics.uci.edu/seed".to_string())
        );
    }

    #[test]
    fn trap_filter_trips_after_max_visits() {
        let filter = TrapFilter::new(3);
        let url = "https://h.ics.uci.edu/x?page=1";
        for _ in 0..3 {
            assert!(!filter.is_trap(url));
            filter.record_visit(url);
        }
        assert!(filter.is_trap(url));
    }

    #[test]
    fn trap_filter_peek_does_not_increment() {
        let filter = TrapFilter::new(1);
        let url = "https://h.ics.uci.edu/x";
        assert!(!filter.is_trap(url));
        assert!(!filter.is_trap(url));
        filter.record_visit(url);
        assert!(filter.is_trap(url));
    }
}
