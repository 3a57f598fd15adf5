//! Worker-pool orchestration (spec.md §4.7, §5).
//!
//! One frontier, one stats store, and one trap filter shared across
//! `config.workers` tasks. Each worker runs the dequeue -> politeness ->
//! fetch -> classify -> extract -> enqueue -> complete loop independently
//! and observes `EMPTY_THRESHOLD` consecutive empty polls on its own, per
//! spec.md §5's "every worker must independently observe the threshold"
//! option.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};
use url::Url;

use crawler_core::{url_digest, AppConfig, FetchConfig};
use crawler_frontier::{Frontier, TrapFilter};
use crawler_stats::StatsStore;

/// Consecutive empty frontier polls before a worker halts (spec.md §4.7).
pub const EMPTY_THRESHOLD: u32 = 5;
/// Bodies larger than this are treated as low-value and skipped entirely.
pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024;
/// A 200 response with a body smaller than this is treated as dead.
pub const DEAD_BODY_THRESHOLD: usize = 100;
/// Base-path visit count at which a URL is considered a trap.
pub const MAX_SIMILAR_URL_VISITS: u32 = 10;
/// Hamming-distance bound for the SimHash near-duplicate test.
pub const SIMHASH_THRESHOLD_BITS: u32 = 3;

/// Build the shared engine state and run `config.workers` worker loops to
/// completion (frontier exhaustion on every worker, or a shutdown signal).
pub async fn run_crawl(config: AppConfig, restart: bool) -> anyhow::Result<()> {
    let allowed_suffixes = config.allowed_suffixes();
    let seeds = config.seed_urls();

    let validity_suffixes = allowed_suffixes.clone();
    let frontier = Arc::new(
        Frontier::initialize(&config.save, restart, &seeds, move |url| {
            crawler_urlcanon::is_valid(url, &validity_suffixes)
        })
        .await?,
    );
    let stats = Arc::new(StatsStore::open(&config.stats_path, SIMHASH_THRESHOLD_BITS)?);
    let trap_filter = Arc::new(TrapFilter::new(MAX_SIMILAR_URL_VISITS));

    let http_client = crawler_fetch::build_client(&config.user_agent)?;
    let fetch_config = FetchConfig {
        cache_host: config.host.clone(),
        cache_port: config.port,
        user_agent: config.user_agent.clone(),
        timeout: config.fetch_timeout(),
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    tokio::spawn({
        let shutdown_tx = shutdown_tx.clone();
        async move {
            wait_for_shutdown_signal().await;
            info!("shutdown signal received, no further URLs will be dispatched");
            let _ = shutdown_tx.send(());
        }
    });

    let config = Arc::new(config);
    let worker_count = config.workers.max(1);
    let mut handles = Vec::with_capacity(worker_count);

    for worker_id in 0..worker_count {
        let worker = WorkerContext {
            worker_id,
            frontier: frontier.clone(),
            stats: stats.clone(),
            trap_filter: trap_filter.clone(),
            http_client: http_client.clone(),
            fetch_config: fetch_config.clone(),
            allowed_suffixes: allowed_suffixes.clone(),
            config: config.clone(),
        };
        let mut shutdown_rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            worker.run(&mut shutdown_rx).await;
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "worker task panicked");
        }
    }

    Ok(())
}

struct WorkerContext {
    worker_id: usize,
    frontier: Arc<Frontier>,
    stats: Arc<StatsStore>,
    trap_filter: Arc<TrapFilter>,
    http_client: reqwest::Client,
    fetch_config: FetchConfig,
    allowed_suffixes: Vec<String>,
    config: Arc<AppConfig>,
}

impl WorkerContext {
    async fn run(&self, shutdown_rx: &mut broadcast::Receiver<()>) {
        let mut consecutive_empty: u32 = 0;

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!(worker_id = self.worker_id, "stopping: shutdown requested");
                return;
            }

            let url = match self.frontier.get_next().await {
                Ok(url) => url,
                Err(e) => {
                    error!(worker_id = self.worker_id, error = %e, "frontier error, worker exiting");
                    return;
                }
            };

            let Some(url) = url else {
                consecutive_empty += 1;
                if consecutive_empty >= EMPTY_THRESHOLD {
                    info!(worker_id = self.worker_id, "frontier empty, stopping");
                    return;
                }
                self.sleep_or_shutdown(shutdown_rx).await;
                continue;
            };
            consecutive_empty = 0;

            if self.trap_filter.is_trap(&url) {
                warn!(worker_id = self.worker_id, url = %url, "skipping potential trap");
                self.complete(&url).await;
                self.sleep_or_shutdown(shutdown_rx).await;
                continue;
            }
            self.trap_filter.record_visit(&url);

            self.frontier
                .wait_for(&host_of(&url), self.config.time_delay())
                .await;

            let resp = crawler_fetch::fetch(&self.http_client, &self.fetch_config, &url).await;
            info!(
                worker_id = self.worker_id,
                url = %url,
                status = resp.status,
                "fetched"
            );

            if resp.status == 200 && resp.body.len() < DEAD_BODY_THRESHOLD {
                warn!(worker_id = self.worker_id, url = %url, "dead URL (tiny or empty body)");
                self.complete(&url).await;
                self.sleep_or_shutdown(shutdown_rx).await;
                continue;
            }

            if resp.body.len() > MAX_CONTENT_SIZE {
                warn!(
                    worker_id = self.worker_id,
                    url = %url,
                    size = resp.body.len(),
                    "large low-value body, skipping"
                );
                self.complete(&url).await;
                self.sleep_or_shutdown(shutdown_rx).await;
                continue;
            }

            // Link extraction may run even on non-200 responses: redirect
            // and error pages can still carry useful links.
            if !resp.body.is_empty() {
                if let Ok(base) = Url::parse(resp.url.as_str()).or_else(|_| Url::parse(&url)) {
                    let html = String::from_utf8_lossy(&resp.body);
                    for link in crawler_htmlparse::extract_links(&html, &base) {
                        if crawler_urlcanon::is_valid(link.as_str(), &self.allowed_suffixes)
                            && !self.trap_filter.is_trap(link.as_str())
                        {
                            if let Err(e) = self.frontier.add(&link).await {
                                error!(worker_id = self.worker_id, url = link.as_str(), error = %e, "failed to enqueue discovered link");
                            }
                        }
                    }
                }
            }

            if resp.is_ok_200() {
                let computed = crawler_stats::compute_page_stats(&resp.body);
                let skip = self.config.near_duplicate_check && self.stats.is_near_duplicate(computed.simhash);
                if !skip {
                    self.stats
                        .save(&url_digest(&url), &url, &computed)
                        .await;
                }
            }

            self.complete(&url).await;
            self.sleep_or_shutdown(shutdown_rx).await;
        }
    }

    async fn complete(&self, url: &str) {
        if let Err(e) = self.frontier.mark_complete(url).await {
            error!(worker_id = self.worker_id, url, error = %e, "failed to mark URL complete");
        }
    }

    async fn sleep_or_shutdown(&self, shutdown_rx: &mut broadcast::Receiver<()>) {
        tokio::select! {
            _ = tokio::time::sleep(self.config.time_delay()) => {}
            _ = shutdown_rx.recv() => {}
        }
    }
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
