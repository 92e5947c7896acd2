//! HTTP client for the engine's update and select handlers.
//!
//! Calls block for one round trip and are never retried. Every request is
//! logged with its action, elapsed time and a one-line summary, whether it
//! succeeds or not.

pub mod wire;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{Result, SolrError};
use crate::index::document::SolrDocument;
use crate::search::request::SelectRequest;

pub use wire::CommitOptions;

/// Where index writes and selects go. [`SearchClient`] is the real
/// implementation; batching and dispatch code only sees this trait.
pub trait SearchBackend {
    fn add(&self, docs: &[SolrDocument]) -> Result<()>;
    fn delete(&self, ids: &[String]) -> Result<()>;
    /// Deletes every document matching `query`, or everything when `None`.
    fn delete_all(&self, query: Option<&str>) -> Result<()>;
    /// Raw response body.
    fn select(&self, request: &SelectRequest) -> Result<String>;
}

pub struct SearchClient {
    config: ClientConfig,
    http: Client,
    auto_commit: AtomicBool,
}

impl SearchClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("solr-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SolrError::Config(format!("building http client: {e}")))?;
        Ok(Self {
            auto_commit: AtomicBool::new(config.auto_commit),
            config,
            http,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::Relaxed)
    }

    pub fn set_auto_commit(&self, on: bool) {
        self.auto_commit.store(on, Ordering::Relaxed);
    }

    /// Runs `f` with auto-commit off. The previous setting is restored on
    /// every exit path, including unwinding.
    pub fn without_auto_commit<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        struct Restore<'c> {
            flag: &'c AtomicBool,
            prior: bool,
        }
        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.flag.store(self.prior, Ordering::Relaxed);
            }
        }
        let _restore = Restore {
            flag: &self.auto_commit,
            prior: self.auto_commit.swap(false, Ordering::Relaxed),
        };
        f(self)
    }

    pub fn commit(&self, options: CommitOptions) -> Result<()> {
        self.update("commit", wire::commit_body(options), None)
            .map(drop)
    }

    /// Uses the longer optimize timeout.
    pub fn optimize(&self, options: CommitOptions) -> Result<()> {
        self.update(
            "optimize",
            wire::optimize_body(options),
            Some(self.config.optimize_timeout),
        )
        .map(drop)
    }

    /// True when the engine answers at its base URL. The body is ignored.
    pub fn responds(&self) -> bool {
        let url = self.config.base_url();
        let started = Instant::now();
        let outcome = self.http.head(&url).send();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(resp) => {
                info!(action = "ping", elapsed_ms, status = resp.status().as_u16(), summary = %url, "solr request");
                true
            }
            Err(e) => {
                warn!(action = "ping", elapsed_ms, error = %e, summary = %url, "solr request failed");
                false
            }
        }
    }

    fn commit_if_auto(&self) -> Result<()> {
        if self.auto_commit() {
            self.commit(CommitOptions::default())?;
        }
        Ok(())
    }

    fn update(&self, action: &str, body: String, timeout: Option<Duration>) -> Result<String> {
        let url = self.config.handler_url("update");
        let summary = wire::summarize(&body);
        let mut builder = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let body = self.execute(action, &url, &summary, builder)?;
        if let Some(status) = wire::body_status(&body)
            && status != 0
        {
            return Err(SolrError::Response {
                status: 200,
                excerpt: wire::excerpt(&body),
            });
        }
        Ok(body)
    }

    fn execute(&self, action: &str, url: &str, summary: &str, builder: RequestBuilder) -> Result<String> {
        let started = Instant::now();
        let sent = builder.send();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match sent {
            Ok(r) => r,
            Err(e) => {
                warn!(action, elapsed_ms, summary, error = %e, "solr request failed");
                return Err(SolrError::Connection {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let status = response.status();
        info!(action, elapsed_ms, status = status.as_u16(), summary, "solr request");

        let body = response.text().map_err(|e| SolrError::Connection {
            url: url.to_string(),
            reason: format!("reading body: {e}"),
        })?;
        if !status.is_success() {
            return Err(SolrError::Response {
                status: status.as_u16(),
                excerpt: wire::excerpt(&body),
            });
        }
        Ok(body)
    }
}

impl SearchBackend for SearchClient {
    /// One POST for the whole batch.
    fn add(&self, docs: &[SolrDocument]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        self.update("add", wire::add_body(docs), None)?;
        self.commit_if_auto()
    }

    /// One request per id, then at most one commit.
    fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        for id in ids {
            self.update("delete", wire::delete_by_id_body(id), None)?;
        }
        self.commit_if_auto()
    }

    fn delete_all(&self, query: Option<&str>) -> Result<()> {
        let query = query.unwrap_or(crate::search::lql::MATCH_ALL);
        self.update("delete_all", wire::delete_by_query_body(query), None)?;
        self.commit_if_auto()
    }

    fn select(&self, request: &SelectRequest) -> Result<String> {
        let base = self.config.handler_url("select");
        let query = request.to_query_string();
        let url = format!("{base}?{query}");
        let summary = urlencoding::decode(&query)
            .map(|s| s.into_owned())
            .unwrap_or(query);
        let builder = self.http.get(&url);
        self.execute("select", &base, &summary, builder)
    }
}
