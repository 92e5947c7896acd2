//! Client configuration: defaults, optional TOML file, environment overrides.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Connection settings for the search engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Path under which the request handlers live, without slashes.
    pub path: String,
    /// Follow every add/delete/delete-all with a commit.
    pub auto_commit: bool,
    /// Timeout for ordinary requests.
    pub timeout: Duration,
    /// Timeout for `optimize`, which can run for minutes.
    pub optimize_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8982,
            path: "solr".to_string(),
            auto_commit: true,
            timeout: Duration::from_secs(30),
            optimize_timeout: Duration::from_secs(600),
        }
    }
}

/// On-disk shape; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
    auto_commit: Option<bool>,
    timeout_ms: Option<u64>,
    optimize_timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Load config from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    /// Load a TOML file (if given), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("parsing config {}", p.display()))?
            }
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(text)?;
        let mut cfg = Self::default();
        if let Some(host) = file.host {
            cfg.host = host;
        }
        if let Some(port) = file.port {
            cfg.port = port;
        }
        if let Some(path) = file.path {
            cfg.path = normalize_path(&path);
        }
        if let Some(auto_commit) = file.auto_commit {
            cfg.auto_commit = auto_commit;
        }
        if let Some(ms) = file.timeout_ms {
            cfg.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.optimize_timeout_ms {
            cfg.optimize_timeout = Duration::from_millis(ms);
        }
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(host) = dotenvy::var("SOLR_SYNC_HOST") {
            self.host = host;
        }

        if let Ok(val) = dotenvy::var("SOLR_SYNC_PORT")
            && let Ok(port) = val.parse::<u16>()
        {
            self.port = port;
        }

        if let Ok(path) = dotenvy::var("SOLR_SYNC_PATH") {
            self.path = normalize_path(&path);
        }

        if let Ok(val) = dotenvy::var("SOLR_SYNC_AUTO_COMMIT") {
            self.auto_commit = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Ok(val) = dotenvy::var("SOLR_SYNC_TIMEOUT_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            self.timeout = Duration::from_millis(ms);
        }

        if let Ok(val) = dotenvy::var("SOLR_SYNC_OPTIMIZE_TIMEOUT_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            self.optimize_timeout = Duration::from_millis(ms);
        }
    }

    /// `http://host:port/path`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/{}", self.host, self.port, self.path)
    }

    /// URL of a request handler under the base path, e.g. `select`.
    pub fn handler_url(&self, action: &str) -> String {
        format!("{}/{}", self.base_url(), action)
    }
}

fn normalize_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}
