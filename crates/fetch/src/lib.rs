//! Client for the upstream cache server (spec.md §6).
//!
//! Speaks the fixed CBOR-over-HTTP protocol bit-for-bit: GET
//! `http://{host}:{port}/?q={url}&u={user_agent}`, decode the CBOR body. Any
//! transport failure becomes a synthetic status-600 `FetchResponse`; any
//! decode failure keeps the upstream HTTP status but carries an empty body.
//! Neither case is retried here — spec.md §7 makes that the worker's call.

use serde::Deserialize;
use tracing::warn;

use crawler_core::{CrawlError, FetchConfig, FetchResponse};

#[derive(Debug, Deserialize)]
struct CacheEnvelope {
    #[allow(dead_code)]
    url: String,
    status: u16,
    error: Option<String>,
    response: Option<CacheInnerResponse>,
}

#[derive(Debug, Deserialize)]
struct CacheInnerResponse {
    #[allow(dead_code)]
    url: String,
    content: Vec<u8>,
}

/// Fetch `target_url` through the cache server described by `config`.
pub async fn fetch(client: &reqwest::Client, config: &FetchConfig, target_url: &str) -> FetchResponse {
    let endpoint = format!("http://{}:{}/", config.cache_host, config.cache_port);

    let request = client
        .get(&endpoint)
        .query(&[("q", target_url), ("u", config.user_agent.as_str())])
        .timeout(config.timeout);

    let (http_status, bytes) = match request.send().await {
        Ok(resp) => {
            let http_status = resp.status().as_u16();
            match resp.bytes().await {
                Ok(b) => (http_status, b),
                Err(e) => {
                    warn!(url = target_url, error = %e, "cache server body read failed");
                    return FetchResponse::transport_failure(target_url, e.to_string());
                }
            }
        }
        Err(e) => {
            warn!(url = target_url, error = %e, "cache server request failed");
            return FetchResponse::transport_failure(target_url, e.to_string());
        }
    };

    match decode(&bytes) {
        Ok(envelope) => {
            let body = envelope
                .response
                .map(|r| r.content)
                .unwrap_or_default();
            FetchResponse {
                url: target_url.to_string(),
                status: envelope.status,
                error: envelope.error,
                body,
            }
        }
        Err(e) => {
            warn!(url = target_url, error = %e, "cache server response decode failed");
            FetchResponse::decode_failure(target_url, http_status, e.to_string())
        }
    }
}

fn decode(bytes: &[u8]) -> Result<CacheEnvelope, CrawlError> {
    ciborium::de::from_reader(bytes).map_err(|e| CrawlError::Decode(e.to_string()))
}

/// Build the shared `reqwest::Client` used for all cache-server calls.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, CrawlError> {
    reqwest::Client::builder()
        .user_agent(user_agent.to_string())
        .build()
        .map_err(|e| CrawlError::Network(e.to_string()))
}
