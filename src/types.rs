// src/types.rs
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::dedup::normalize_identity;
use crate::price::Price;

/// Marker stored in `added_at` for identifiers migrated from the legacy list format.
pub const ADDED_AT_UNKNOWN: &str = "unknown";

/// One listing observed during a single poll. Not deduplicated, not trusted.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
    pub id: String, // usually the listing URL
    pub url: Option<String>,
    pub title: String,
    pub price: Option<Price>,
    pub source: String,        // e.g. "korobkavinyla.ru"
    pub query: Option<String>, // search term that produced the item
}

impl CandidateItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            url: Some(id.clone()),
            id,
            title: title.into(),
            price: None,
            source: source.into(),
            query: None,
        }
    }

    pub fn with_price(mut self, raw: &str) -> Self {
        self.price = Price::parse(raw);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// `url` when present and non-empty, otherwise `id`.
    pub fn link(&self) -> &str {
        match self.url.as_deref() {
            Some(u) if !u.trim().is_empty() => u,
            _ => &self.id,
        }
    }
}

/// Persisted metadata for an identifier that has already been reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnownItemRecord {
    /// Kept verbatim: RFC 3339 for our writes, `"unknown"` for migrated ids,
    /// whatever older writers produced otherwise.
    #[serde(default = "unknown_added_at")]
    pub added_at: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source: String,
}

fn unknown_added_at() -> String {
    ADDED_AT_UNKNOWN.to_string()
}

impl Default for KnownItemRecord {
    fn default() -> Self {
        Self {
            added_at: unknown_added_at(),
            title: String::new(),
            source: String::new(),
        }
    }
}

impl KnownItemRecord {
    pub fn from_item(item: &CandidateItem, added_at: DateTime<Utc>) -> Self {
        Self {
            added_at: added_at.to_rfc3339(),
            title: item.title.clone(),
            source: item.source.clone(),
        }
    }

    /// Best-effort parse of `added_at`; naive timestamps are read as local time.
    pub fn added_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.added_at)
    }
}

/// Parse RFC 3339, falling back to a naive ISO-8601 timestamp in local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Full persisted state: normalized identifier → record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub items: BTreeMap<String, KnownItemRecord>,
}

impl StateSnapshot {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&KnownItemRecord> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Stored keys plus their normalized identities, so state written before
    /// URL normalization still matches freshly deduplicated ids.
    pub fn known_identifiers(&self) -> HashSet<String> {
        let mut out = HashSet::with_capacity(self.items.len() * 2);
        for key in self.items.keys() {
            out.insert(key.clone());
            let norm = normalize_identity(key);
            if !norm.is_empty() {
                out.insert(norm);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_falls_back_to_id() {
        let mut it = CandidateItem::new("https://x.test/a", "A", "x");
        it.url = Some("  ".into());
        assert_eq!(it.link(), "https://x.test/a");
    }

    #[test]
    fn known_identifiers_include_normalized_keys() {
        let mut snap = StateSnapshot::default();
        snap.items
            .insert("https://x.test/a/?ref=1".into(), KnownItemRecord::default());
        let ids = snap.known_identifiers();
        assert!(ids.contains("https://x.test/a/?ref=1"));
        assert!(ids.contains("https://x.test/a"));
    }

    #[test]
    fn legacy_naive_timestamp_parses() {
        assert!(parse_timestamp("2025-01-19T10:00:00").is_some());
        assert!(parse_timestamp("2025-01-19T10:00:00.123456").is_some());
        assert!(parse_timestamp("2025-01-19T10:00:00+00:00").is_some());
        assert!(parse_timestamp("unknown").is_none());
    }
}
