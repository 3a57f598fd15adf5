use std::time::Duration;

use serde::Deserialize;

use crate::error::CrawlError;

/// Crawl engine configuration, sourced from an INI file (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "useragent")]
    pub user_agent: String,
    pub host: String,
    pub port: u16,
    #[serde(rename = "seedurl")]
    pub seed_url: String,
    pub politeness: u64,
    pub save: String,

    #[serde(default = "default_stats_path")]
    pub stats_path: String,
    #[serde(default)]
    pub near_duplicate_check: bool,
    #[serde(default = "default_allowed_suffixes_csv")]
    pub allowed_suffixes: String,
    /// Worker pool size (spec.md §5 permits N >= 1; the source ships N=1).
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_stats_path() -> String {
    "crawl_stats.db".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_allowed_suffixes_csv() -> String {
    // Mirrors urlcanon's DEFAULT_ALLOWED_SUFFIXES; kept as a literal here so
    // core doesn't need a dependency on urlcanon just for one default.
    ".ics.uci.edu,.cs.uci.edu,.informatics.uci.edu,.stat.uci.edu".to_string()
}

impl AppConfig {
    /// Load and parse an INI config file at `path`.
    pub fn load(path: &str) -> Result<Self, CrawlError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).format(config::FileFormat::Ini))
            .build()
            .map_err(|e| CrawlError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| CrawlError::Config(e.to_string()))
    }

    pub fn time_delay(&self) -> Duration {
        Duration::from_secs(self.politeness)
    }

    pub fn seed_urls(&self) -> Vec<String> {
        self.seed_url
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn allowed_suffixes(&self) -> Vec<String> {
        self.allowed_suffixes
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            user_agent: "ia_crawler test agent".to_string(),
            host: "localhost".to_string(),
            port: 9000,
            seed_url: "https://a.ics.uci.edu/, https://b.ics.uci.edu/".to_string(),
            politeness: 2,
            save: "frontier.db".to_string(),
            stats_path: default_stats_path(),
            near_duplicate_check: false,
            allowed_suffixes: default_allowed_suffixes_csv(),
            workers: default_workers(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }

    #[test]
    fn splits_comma_separated_seeds() {
        let cfg = sample();
        assert_eq!(
            cfg.seed_urls(),
            vec!["https://a.ics.uci.edu/".to_string(), "https://b.ics.uci.edu/".to_string()]
        );
    }

    #[test]
    fn time_delay_maps_from_politeness_seconds() {
        let cfg = sample();
        assert_eq!(cfg.time_delay(), Duration::from_secs(2));
    }

    #[test]
    fn default_allowed_suffixes_is_the_four_suffix_family() {
        let cfg = sample();
        assert_eq!(cfg.allowed_suffixes().len(), 4);
    }
}
