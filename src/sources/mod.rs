// src/sources/mod.rs
//! Source adapters: the boundary between external scrapers/feeds and the
//! change-detection core. Adapters return raw candidate batches; nothing they
//! return is assumed unique or well-formed.

pub mod command;
pub mod feed;

use anyhow::{bail, Context, Result};
use metrics::counter;
use serde::Deserialize;
use serde_json::Value;

use crate::config::SourceConfig;
use crate::price::Price;
use crate::types::CandidateItem;

pub use command::CommandAdapter;
pub use feed::FeedAdapter;

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source name this adapter serves (matches `SourceConfig::name`).
    fn name(&self) -> &str;
    async fn fetch(&self, cfg: &SourceConfig) -> Result<Vec<CandidateItem>>;
}

/// Outcome of one poll. A failed poll has no items and carries the error.
#[derive(Debug)]
pub struct PollResult {
    pub source: String,
    pub items: Vec<CandidateItem>,
    pub error: Option<anyhow::Error>,
}

impl PollResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Run an adapter and fold any failure into the result; never errors.
pub async fn poll(adapter: &dyn SourceAdapter, cfg: &SourceConfig) -> PollResult {
    match adapter.fetch(cfg).await {
        Ok(items) => {
            counter!("watch_candidates_total").increment(items.len() as u64);
            PollResult {
                source: cfg.name.clone(),
                items,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(source = %cfg.name, error = ?e, "source poll failed");
            counter!("watch_source_errors_total").increment(1);
            PollResult {
                source: cfg.name.clone(),
                items: Vec::new(),
                error: Some(e),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    query: Option<String>,
}

/// Parse adapter output into candidates for `source`.
///
/// Accepts a JSON array, `{"items": [...]}`, or JSON lines. Elements without
/// `url` and `id` are skipped; titles are entity-decoded and whitespace-collapsed.
pub fn parse_candidates(body: &str, source: &str, query: Option<&str>) -> Result<Vec<CandidateItem>> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let elements: Vec<Value> = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(v)) => v,
        Ok(Value::Object(mut map)) => match map.remove("items") {
            Some(Value::Array(v)) => v,
            _ => bail!("JSON object without an `items` array"),
        },
        Ok(other) => bail!("unexpected JSON value: {other}"),
        Err(_) => body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(i, l)| {
                serde_json::from_str::<Value>(l).with_context(|| format!("line {} is not JSON", i + 1))
            })
            .collect::<Result<Vec<_>>>()?,
    };

    let mut out = Vec::with_capacity(elements.len());
    let mut skipped = 0usize;
    for el in elements {
        let raw: RawCandidate = match serde_json::from_value(el) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(source, error = %e, "malformed candidate skipped");
                skipped += 1;
                continue;
            }
        };
        match into_candidate(raw, source, query) {
            Some(it) => out.push(it),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(source, skipped, "candidates without identity or shape skipped");
    }
    Ok(out)
}

fn into_candidate(raw: RawCandidate, source: &str, query: Option<&str>) -> Option<CandidateItem> {
    let url = raw.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
    let id = raw
        .id
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .or_else(|| url.clone())?;

    let price = match raw.price {
        Some(Value::String(s)) => Price::parse(&s),
        Some(Value::Number(n)) => Price::parse(&n.to_string()),
        _ => None,
    };

    Some(CandidateItem {
        id,
        url,
        title: clean_title(raw.title.as_deref().unwrap_or_default()),
        price,
        source: source.to_string(),
        query: raw
            .query
            .filter(|q| !q.trim().is_empty())
            .or_else(|| query.map(str::to_string)),
    })
}

/// Decode HTML entities and collapse whitespace.
pub fn clean_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
