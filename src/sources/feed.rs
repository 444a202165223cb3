// src/sources/feed.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use std::time::{Duration, Instant};

use crate::config::SourceConfig;
use crate::sources::{parse_candidates, SourceAdapter};
use crate::types::CandidateItem;

/// Adapter for an HTTP endpoint that serves candidate items as JSON
/// (typically a scraper service sitting in front of a storefront).
pub struct FeedAdapter {
    name: String,
    mode: Mode,
}

enum Mode {
    // Owned copy so tests can pass any &str.
    Fixture(String),
    Http {
        client: reqwest::Client,
        timeout: Duration,
    },
}

impl FeedAdapter {
    pub fn from_fixture(name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn http(name: &str, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Http {
                client: reqwest::Client::new(),
                timeout,
            },
        }
    }

    async fn get_once(
        client: &reqwest::Client,
        url: &str,
        timeout: Duration,
        source: &str,
        query: Option<&str>,
    ) -> Result<Vec<CandidateItem>> {
        let mut req = client.get(url).timeout(timeout);
        if let Some(q) = query {
            req = req.query(&[("q", q)]);
        }
        let body = req
            .send()
            .await
            .context("feed http get()")?
            .error_for_status()
            .context("feed non-2xx")?
            .text()
            .await
            .context("feed http .text()")?;
        parse_candidates(&body, source, query)
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, cfg: &SourceConfig) -> Result<Vec<CandidateItem>> {
        match &self.mode {
            Mode::Fixture(body) => parse_candidates(body, &cfg.name, None),
            Mode::Http { client, timeout } => {
                let url = cfg
                    .url
                    .as_deref()
                    .ok_or_else(|| anyhow!("feed source {:?} has no url", cfg.name))?;
                let t0 = Instant::now();

                let queries: Vec<Option<&str>> = if cfg.search_queries.is_empty() {
                    vec![None]
                } else {
                    cfg.search_queries.iter().map(|q| Some(q.as_str())).collect()
                };

                let mut items = Vec::new();
                let mut last_err = None;
                let mut ok_requests = 0usize;
                for q in queries {
                    match Self::get_once(client, url, *timeout, &cfg.name, q).await {
                        Ok(mut v) => {
                            tracing::debug!(source = %cfg.name, query = ?q, found = v.len(), "feed request");
                            ok_requests += 1;
                            items.append(&mut v);
                        }
                        Err(e) => {
                            tracing::warn!(source = %cfg.name, query = ?q, error = ?e, "feed request failed");
                            last_err = Some(e);
                        }
                    }
                }

                histogram!("watch_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                match (ok_requests, last_err) {
                    (0, Some(e)) => Err(e),
                    _ => Ok(items),
                }
            }
        }
    }
}
