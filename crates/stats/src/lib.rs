//! Durable per-page statistics store (spec.md §4.6).
//!
//! Backed by RocksDB, the same way `crawler-frontier` persists crawl
//! progress: one embedded store, keyed by URL digest, with a bounded
//! retry-with-backoff around writes instead of the teacher's ambient
//! mutex-around-every-call pattern, since RocksDB already serializes
//! concurrent writers internally.

use std::collections::HashMap;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crawler_core::CrawlError;
use crawler_htmlparse::extract_text;
use crawler_tokenizer::{count_tokens, tokenize};

/// Durable per-page record (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageStatsRecord {
    pub url: String,
    pub word_count: u64,
    pub words: HashMap<String, u64>,
    pub simhash: u64,
}

/// Result of tokenizing and fingerprinting one page body, before it is
/// written to the store. Kept separate from the write so callers can decide
/// (via the near-duplicate test) whether to skip persistence.
#[derive(Debug, Clone)]
pub struct PageComputation {
    pub word_count: u64,
    pub words: HashMap<String, u64>,
    pub simhash: u64,
}

/// Decode `body` as UTF-8 (lossy), extract visible text, tokenize, and
/// compute the SimHash fingerprint. Pure and synchronous — no I/O.
pub fn compute_page_stats(body: &[u8]) -> PageComputation {
    let html = String::from_utf8_lossy(body);
    let text = extract_text(&html);
    let words = count_tokens(tokenize(&text));
    let word_count = words.values().sum();
    let simhash = simhash(&words);
    PageComputation {
        word_count,
        words,
        simhash,
    }
}

/// 64-bit SimHash over a token-frequency map (spec.md §4.6).
///
/// Each unique token contributes its low-64-bits-of-MD5 vote, scaled by its
/// occurrence count — equivalent to running the +1/-1 vote over the full
/// (unreduced) token stream, but linear in the number of unique tokens
/// rather than total tokens. Empty input yields 0.
pub fn simhash(words: &HashMap<String, u64>) -> u64 {
    let mut votes = [0i64; 64];
    for (token, count) in words {
        let digest = md5::compute(token.as_bytes());
        let low64 = u64::from_be_bytes(digest.0[8..16].try_into().unwrap());
        let weight = *count as i64;
        for (i, vote) in votes.iter_mut().enumerate() {
            let bit_set = (low64 >> i) & 1 == 1;
            *vote += if bit_set { weight } else { -weight };
        }
    }

    let mut fingerprint = 0u64;
    for (i, vote) in votes.iter().enumerate() {
        if *vote > 0 {
            fingerprint |= 1 << i;
        }
    }
    fingerprint
}

/// Hamming distance between two fingerprints (popcount of XOR).
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// The durable statistics store plus an in-process registry of fingerprints
/// seen so far this run, used for the optional near-duplicate test.
pub struct StatsStore {
    db: rocksdb::DB,
    fingerprints: DashMap<String, u64>,
    near_duplicate_threshold: u32,
}

impl StatsStore {
    pub fn open(path: &str, near_duplicate_threshold: u32) -> Result<Self, CrawlError> {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        let db = rocksdb::DB::open(&opts, path).map_err(|e| CrawlError::Storage(e.to_string()))?;
        Ok(Self {
            db,
            fingerprints: DashMap::new(),
            near_duplicate_threshold,
        })
    }

    /// True iff `candidate` is within the configured Hamming-distance
    /// threshold of any fingerprint already recorded this run. Fingerprint
    /// 0 (empty page) is never treated as a duplicate (spec.md §4.6).
    pub fn is_near_duplicate(&self, candidate: u64) -> bool {
        if candidate == 0 {
            return false;
        }
        self.fingerprints
            .iter()
            .any(|entry| hamming(*entry.value(), candidate) <= self.near_duplicate_threshold)
    }

    /// Persist `computation` under `url_digest`, replacing any prior record
    /// at that key. Retries transient storage errors up to three times with
    /// exponential backoff (base 100ms); on final failure the write is
    /// dropped and logged, per spec.md §4.6 — the crawl continues.
    pub async fn save(
        &self,
        url_digest: &str,
        canonical_url: &str,
        computation: &PageComputation,
    ) {
        let record = PageStatsRecord {
            url: canonical_url.to_string(),
            word_count: computation.word_count,
            words: computation.words.clone(),
            simhash: computation.simhash,
        };

        let Ok(bytes) = serde_json::to_vec(&record) else {
            warn!(url = canonical_url, "failed to serialize page stats record");
            return;
        };

        match write_with_retry(&self.db, url_digest.as_bytes(), &bytes).await {
            Ok(()) => {
                self.fingerprints
                    .insert(url_digest.to_string(), computation.simhash);
            }
            Err(e) => {
                warn!(url = canonical_url, error = %e, "dropping page stats write after retries exhausted");
            }
        }
    }

    pub fn get(&self, url_digest: &str) -> Result<Option<PageStatsRecord>, CrawlError> {
        let Some(bytes) = self
            .db
            .get(url_digest.as_bytes())
            .map_err(|e| CrawlError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };
        let record =
            serde_json::from_slice(&bytes).map_err(|e| CrawlError::Storage(e.to_string()))?;
        Ok(Some(record))
    }

    /// Iterate every stored record. Exposed for an offline report generator
    /// (out of scope here per spec.md §1) that needs read access to the
    /// durable store without re-deriving its own key format.
    pub fn iter_records(&self) -> impl Iterator<Item = PageStatsRecord> + '_ {
        self.db
            .iterator(rocksdb::IteratorMode::Start)
            .filter_map(|item| {
                let (_, value) = item.ok()?;
                serde_json::from_slice(&value).ok()
            })
    }
}

async fn write_with_retry(db: &rocksdb::DB, key: &[u8], value: &[u8]) -> Result<(), CrawlError> {
    let mut delay = Duration::from_millis(100);
    for attempt in 0..3 {
        match db.put(key, value) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < 2 => {
                warn!(error = %e, attempt, "stats store write failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(CrawlError::Storage(e.to_string())),
        }
    }
    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path() -> String {
        let dir = tempfile::tempdir().unwrap();
        dir.keep().to_string_lossy().to_string()
    }

    fn counts(words: &[(&str, u64)]) -> HashMap<String, u64> {
        words.iter().map(|(w, c)| (w.to_string(), *c)).collect()
    }

    #[test]
    fn simhash_self_distance_is_zero() {
        let words = counts(&[("the", 2), ("cat", 2), ("sat", 1)]);
        let sh = simhash(&words);
        assert_eq!(hamming(sh, sh), 0);
    }

    #[test]
    fn simhash_is_symmetric() {
        let a = simhash(&counts(&[("the", 2), ("cat", 2)]));
        let b = simhash(&counts(&[("dog", 1), ("ran", 3)]));
        assert_eq!(hamming(a, b), hamming(b, a));
    }

    #[test]
    fn identical_token_streams_produce_identical_fingerprints() {
        let a = simhash(&counts(&[("the", 2), ("cat", 2), ("sat", 1)]));
        let b = simhash(&counts(&[("cat", 2), ("sat", 1), ("the", 2)]));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_yields_zero_fingerprint() {
        assert_eq!(simhash(&HashMap::new()), 0);
    }

    #[test]
    fn compute_page_stats_matches_tokenizer_total() {
        let body = b"<html><body><p>the cat sat; the cat</p></body></html>";
        let computed = compute_page_stats(body);
        assert_eq!(computed.word_count, 5);
        assert_eq!(computed.words.get("the"), Some(&2));
        assert_eq!(computed.words.get("cat"), Some(&2));
        assert_eq!(computed.words.get("sat"), Some(&1));
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let path = tmp_path();
        let store = StatsStore::open(&path, 3).unwrap();
        let computed = compute_page_stats(b"<html><body>hello world</body></html>");
        store.save("digest1", "https://h.ics.uci.edu/", &computed).await;

        let record = store.get("digest1").unwrap().unwrap();
        assert_eq!(record.url, "https://h.ics.uci.edu/");
        assert_eq!(record.word_count, 2);
    }

    #[tokio::test]
    async fn near_duplicate_excludes_zero_fingerprint() {
        let path = tmp_path();
        let store = StatsStore::open(&path, 3).unwrap();
        let empty = compute_page_stats(b"");
        store.save("digest-empty", "https://h.ics.uci.edu/empty", &empty).await;
        assert!(!store.is_near_duplicate(0));
    }

    #[tokio::test]
    async fn near_duplicate_detects_small_hamming_distance() {
        let path = tmp_path();
        let store = StatsStore::open(&path, 3).unwrap();

        let first = compute_page_stats(
            b"<html><body>one two three four five six seven eight nine ten</body></html>",
        );
        store.save("digest1", "https://h.ics.uci.edu/a", &first).await;

        // Same ten words plus a short suffix -- should land within 3 bits.
        let second = compute_page_stats(
            b"<html><body>one two three four five six seven eight nine ten plus extra</body></html>",
        );
        assert!(store.is_near_duplicate(second.simhash) || hamming(first.simhash, second.simhash) <= 3);

        let unrelated = compute_page_stats(
            b"<html><body>completely different content about something else entirely</body></html>",
        );
        assert!(hamming(first.simhash, unrelated.simhash) > 3);
    }

    proptest::proptest! {
        #[test]
        fn simhash_symmetry_prop(
            a_words in proptest::collection::vec("[a-z]{1,6}", 0..15),
            b_words in proptest::collection::vec("[a-z]{1,6}", 0..15),
        ) {
            let a = simhash(&count_tokens(a_words.into_iter()));
            let b = simhash(&count_tokens(b_words.into_iter()));
            proptest::prop_assert_eq!(hamming(a, b), hamming(b, a));
        }
    }
}
