use std::time::Duration;

/// Parameters for a single fetch through the upstream cache server.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub cache_host: String,
    pub cache_port: u16,
    pub user_agent: String,
    pub timeout: Duration,
}

/// Decoded response from the cache server (spec.md §4.4 / §6).
///
/// `status` and `error` mirror the cache's CBOR dictionary directly; `600`
/// is the synthetic status used for transport failures that never reached
/// the cache.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub error: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn transport_failure(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            status: 600,
            error: Some(error.into()),
            body: Vec::new(),
        }
    }

    pub fn decode_failure(url: &str, status: u16, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            status,
            error: Some(error.into()),
            body: Vec::new(),
        }
    }

    pub fn is_ok_200(&self) -> bool {
        self.status == 200 && self.error.is_none()
    }
}

/// Stable key derived from a canonical URL (MD5 hex), used by both the
/// frontier and the statistics store so the same page always maps to the
/// same slot.
pub fn url_digest(canonical_url: &str) -> String {
    let digest = md5::compute(canonical_url.as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_32_hex_chars() {
        let a = url_digest("https://foo.ics.uci.edu/");
        let b = url_digest("https://foo.ics.uci.edu/");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_differs_for_different_urls() {
        let a = url_digest("https://foo.ics.uci.edu/a");
        let b = url_digest("https://foo.ics.uci.edu/b");
        assert_ne!(a, b);
    }
}
