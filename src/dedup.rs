// src/dedup.rs
//! Two-pass reduction of a candidate batch to unique items.
//!
//! Pass 1 ([`dedupe_by_identity`]) runs per adapter call and keys items by
//! their normalized URL. Pass 2 ([`dedupe`]) runs once over the union of all
//! sources and additionally keys items by `(lowercased title, price)`.
//! Both keep the first occurrence and preserve input order.

use metrics::counter;
use std::collections::HashSet;

use crate::types::CandidateItem;

/// Counts of items dropped by [`dedupe`], by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub identity_dupes: usize,
    pub content_dupes: usize,
}

impl DedupReport {
    pub fn total(&self) -> usize {
        self.identity_dupes + self.content_dupes
    }
}

/// Cut at the first `?` or `#`, trim, strip trailing slashes.
pub fn normalize_identity(raw: &str) -> String {
    let base = raw.split(['?', '#']).next().unwrap_or_default();
    base.trim().trim_end_matches('/').to_string()
}

/// Identity key of an item: normalized `url`, or normalized `id` without one.
pub fn identity_key(item: &CandidateItem) -> String {
    normalize_identity(item.link())
}

/// Content key, or `None` when both title and price are empty (such items
/// must never collide with each other).
pub fn content_key(item: &CandidateItem) -> Option<(String, String)> {
    let title = item.title.trim().to_lowercase();
    let price = item
        .price
        .as_ref()
        .map(|p| p.dedup_key())
        .unwrap_or_default();
    if title.is_empty() && price.is_empty() {
        None
    } else {
        Some((title, price))
    }
}

/// Pass 1: drop repeated identity keys, rewrite `id` to the key.
/// Returns the survivors and the number of dropped items.
pub fn dedupe_by_identity(items: Vec<CandidateItem>) -> (Vec<CandidateItem>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    let mut dropped = 0usize;

    for mut it in items {
        let key = identity_key(&it);
        if key.is_empty() {
            tracing::debug!(source = %it.source, title = %it.title, "item without identity dropped");
            dropped += 1;
            continue;
        }
        if !seen.insert(key.clone()) {
            tracing::debug!(url = %key, "duplicate by url");
            dropped += 1;
            continue;
        }
        it.id = key;
        out.push(it);
    }

    if dropped > 0 {
        tracing::info!(dropped, kept = out.len(), "identity dedup");
    }
    (out, dropped)
}

/// Pass 2: drop an item if its identity key OR its content key was already seen.
pub fn dedupe(items: Vec<CandidateItem>) -> (Vec<CandidateItem>, DedupReport) {
    let mut seen_ids: HashSet<String> = HashSet::with_capacity(items.len());
    let mut seen_content: HashSet<(String, String)> = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    let mut report = DedupReport::default();

    for mut it in items {
        let key = identity_key(&it);
        if key.is_empty() || seen_ids.contains(&key) {
            tracing::debug!(url = %key, source = %it.source, "duplicate by url");
            report.identity_dupes += 1;
            continue;
        }
        let ckey = content_key(&it);
        if let Some(ck) = &ckey {
            if seen_content.contains(ck) {
                tracing::debug!(title = %it.title, source = %it.source, "duplicate by content");
                report.content_dupes += 1;
                continue;
            }
        }

        seen_ids.insert(key.clone());
        if let Some(ck) = ckey {
            seen_content.insert(ck);
        }
        it.id = key;
        out.push(it);
    }

    counter!("watch_dedup_identity_total").increment(report.identity_dupes as u64);
    counter!("watch_dedup_content_total").increment(report.content_dupes as u64);
    if report.total() > 0 {
        tracing::info!(
            identity = report.identity_dupes,
            content = report.content_dupes,
            kept = out.len(),
            "content dedup"
        );
    }
    (out, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, title: &str, price: &str, source: &str) -> CandidateItem {
        CandidateItem::new(id, title, source).with_price(price)
    }

    #[test]
    fn normalize_identity_strips_query_fragment_and_slashes() {
        assert_eq!(normalize_identity("a/?x=1"), "a");
        assert_eq!(normalize_identity("a/"), "a");
        assert_eq!(normalize_identity("https://s.test/p/1//#top"), "https://s.test/p/1");
        assert_eq!(normalize_identity("https://s.test/p#x?y"), "https://s.test/p");
        assert_eq!(normalize_identity(""), "");
    }

    #[test]
    fn identity_pass_keeps_first_and_rewrites_id() {
        let items = vec![
            item("a/?x=1", "First", "", "s"),
            item("a/", "Second", "", "s"),
        ];
        let (out, dropped) = dedupe_by_identity(items);
        assert_eq!(dropped, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
        assert_eq!(out[0].title, "First");
    }

    #[test]
    fn identity_uses_id_when_url_missing() {
        let mut a = item("x/1?utm=1", "A", "", "s");
        a.url = None;
        let (out, _) = dedupe_by_identity(vec![a]);
        assert_eq!(out[0].id, "x/1");
    }

    #[test]
    fn content_pass_is_case_insensitive_across_sources() {
        let items = vec![
            item("https://a.test/1", "Foo", "100", "a"),
            item("https://b.test/9", "foo", "100", "b"),
        ];
        let (out, rep) = dedupe(items);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "a");
        assert_eq!(rep.content_dupes, 1);
        assert_eq!(rep.identity_dupes, 0);
    }

    #[test]
    fn empty_title_and_price_never_collide() {
        let items = vec![
            item("https://a.test/1", "", "", "a"),
            item("https://a.test/2", "  ", "", "a"),
        ];
        let (out, rep) = dedupe(items);
        assert_eq!(out.len(), 2);
        assert_eq!(rep.total(), 0);
    }

    #[test]
    fn duplicated_price_text_matches_clean_price() {
        let items = vec![
            item("https://t.test/1", "Album", "£25.00 £25.00", "t"),
            item("https://k.test/2", "ALBUM ", "25.00 GBP", "k"),
        ];
        let (out, rep) = dedupe(items);
        assert_eq!(out.len(), 1);
        assert_eq!(rep.content_dupes, 1);
    }

    #[test]
    fn same_title_different_price_survives() {
        let items = vec![
            item("https://a.test/1", "Foo", "100", "a"),
            item("https://a.test/2", "Foo", "120", "a"),
        ];
        let (out, _) = dedupe(items);
        assert_eq!(out.len(), 2);
    }
}
