use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_BHUVAN_BASE_URL: &str = "https://bhuvan-app1.nrsc.gov.in";

/// Secrets appended to upstream requests. Missing ones are sent empty.
#[derive(Debug, Clone, Default)]
pub struct Tokens {
    pub route: String,
    pub thematic: String,
    pub village: String,
    pub geoid: String,
    pub flood: String,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub tokens: Tokens,
    pub timeout: Duration,
    /// Land-cover lookups are slow upstream and get their own budget.
    pub thematic_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            base_url: DEFAULT_BHUVAN_BASE_URL.to_string(),
            tokens: Tokens::default(),
            timeout: Duration::from_secs(10),
            thematic_timeout: Duration::from_secs(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub assets_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub upstream: UpstreamConfig,
    /// Base URL of the external SQL executor. Without one, map states are kept
    /// in the local database.
    pub executor_url: Option<String>,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secs = |key: &str, default: u64| -> anyhow::Result<Duration> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(v) => {
                    let n: u64 = v
                        .trim()
                        .parse()
                        .with_context(|| format!("{key} must be a number of seconds, got {v:?}"))?;
                    Ok(Duration::from_secs(n))
                }
                None => Ok(Duration::from_secs(default)),
            }
        };

        let port = var("PORT", "3000");
        let port: u16 = port
            .parse()
            .with_context(|| format!("PORT must be a valid port number, got {port:?}"))?;

        let tokens = Tokens {
            route: var("ROUTE_TOKEN", ""),
            thematic: var("THEMATIC_TOKEN", ""),
            village: var("VG_TOKEN", ""),
            geoid: var("GEOID_TOKEN", ""),
            flood: var("TOKEN", ""),
        };

        Ok(Config {
            port,
            db_path: PathBuf::from(var("DB_PATH", "data/bhuvan.redb")),
            assets_dir: PathBuf::from(var("ASSETS_DIR", "assets")),
            dist_dir: PathBuf::from(var("DIST_DIR", "dist")),
            upstream: UpstreamConfig {
                base_url: var("BHUVAN_BASE_URL", DEFAULT_BHUVAN_BASE_URL)
                    .trim_end_matches('/')
                    .to_string(),
                tokens,
                timeout: secs("UPSTREAM_TIMEOUT_SECS", 10)?,
                thematic_timeout: secs("THEMATIC_TIMEOUT_SECS", 100)?,
            },
            executor_url: lookup("EXECUTOR_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty()),
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// Names of upstream tokens that are not set.
    pub fn missing_tokens(&self) -> Vec<&'static str> {
        let t = &self.upstream.tokens;
        [
            ("ROUTE_TOKEN", &t.route),
            ("THEMATIC_TOKEN", &t.thematic),
            ("VG_TOKEN", &t.village),
            ("GEOID_TOKEN", &t.geoid),
            ("TOKEN", &t.flood),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("data/bhuvan.redb"));
        assert_eq!(config.upstream.base_url, DEFAULT_BHUVAN_BASE_URL);
        assert_eq!(config.upstream.timeout, Duration::from_secs(10));
        assert_eq!(config.upstream.thematic_timeout, Duration::from_secs(100));
        assert!(config.executor_url.is_none());
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.missing_tokens().len(), 5);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("BHUVAN_BASE_URL", "http://127.0.0.1:9000/"),
            ("ROUTE_TOKEN", "r"),
            ("EXECUTOR_URL", "https://executor.example.org/"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("UPSTREAM_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.upstream.tokens.route, "r");
        assert_eq!(
            config.executor_url.as_deref(),
            Some("https://executor.example.org")
        );
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.upstream.timeout, Duration::from_secs(3));
        assert!(!config.missing_tokens().contains(&"ROUTE_TOKEN"));
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        assert!(config_from(&[("PORT", "http")]).is_err());
        assert!(config_from(&[("THEMATIC_TIMEOUT_SECS", "soon")]).is_err());
    }

    #[test]
    fn test_blank_executor_url_means_local() {
        let config = config_from(&[("EXECUTOR_URL", "  ")]).unwrap();
        assert!(config.executor_url.is_none());
    }
}
