// src/state.rs
//! Durable record of identifiers that have already been reported.
//!
//! On-disk shape:
//! ```json
//! { "known_items": { "<id>": { "added_at": "<ISO-8601>", "title": "...", "source": "..." } } }
//! ```
//! The legacy shapes `{ "known_ids": ["<id>", ...] }` and a bare `["<id>", ...]`
//! load transparently; every legacy id gets `added_at = "unknown"`.
//!
//! The store is append-only by identifier: saving never removes a key and
//! never touches the record of an identifier that is not being added.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::dedup::normalize_identity;
use crate::types::{CandidateItem, KnownItemRecord, StateSnapshot};

pub const DEFAULT_STATE_PATH: &str = "./state.json";

#[derive(Serialize)]
struct StateFileOut<'a> {
    known_items: &'a BTreeMap<String, KnownItemRecord>,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the state file (and the poll markers next to it).
    pub fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Strict load: a missing file is an empty snapshot, unreadable or
    /// non-JSON content is an error.
    pub fn try_load(&self) -> Result<StateSnapshot> {
        if !self.path.exists() {
            return Ok(StateSnapshot::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading state from {}", self.path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("parsing state JSON in {}", self.path.display()))?;
        Ok(parse_snapshot(value))
    }

    /// Lenient load: any failure is logged and yields an empty snapshot.
    pub fn load(&self) -> StateSnapshot {
        match self.try_load() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.path.display(), "state unreadable; starting empty");
                StateSnapshot::default()
            }
        }
    }

    /// Point lookup for diagnostics. Tries the id verbatim, then normalized.
    pub fn get_record(&self, id: &str) -> Option<KnownItemRecord> {
        let snap = self.load();
        snap.get(id)
            .or_else(|| snap.get(&normalize_identity(id)))
            .cloned()
    }

    pub fn save(&self, known: &HashSet<String>, new_items: &[CandidateItem]) -> Result<()> {
        self.save_at(known, new_items, Utc::now())
    }

    /// Merge `new_items` (stamped with `now`) into the on-disk mapping.
    /// An id already on disk keeps its `added_at`; title and source refresh.
    /// Identifiers already on disk and not in `new_items` keep their records.
    /// Identifiers in `known` missing from disk are backfilled as "unknown".
    pub fn save_at(
        &self,
        known: &HashSet<String>,
        new_items: &[CandidateItem],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut items = match self.try_load() {
            Ok(s) => s.items,
            Err(e) => {
                tracing::warn!(error = ?e, "state corrupt before save; moving it aside");
                self.quarantine(now);
                BTreeMap::new()
            }
        };

        for it in new_items {
            if it.id.is_empty() {
                continue;
            }
            match items.entry(it.id.clone()) {
                Entry::Occupied(mut e) => {
                    // added_at is fixed once written; only the display fields refresh.
                    let rec = e.get_mut();
                    rec.title = it.title.clone();
                    rec.source = it.source.clone();
                }
                Entry::Vacant(e) => {
                    e.insert(KnownItemRecord::from_item(it, now));
                }
            }
        }

        let covered: HashSet<String> = items.keys().map(|k| normalize_identity(k)).collect();
        let mut backfilled = 0usize;
        for id in known {
            if id.is_empty() || items.contains_key(id) || covered.contains(id) {
                continue;
            }
            items.insert(id.clone(), KnownItemRecord::default());
            backfilled += 1;
        }
        if backfilled > 0 {
            tracing::debug!(backfilled, "known ids missing from disk were backfilled");
        }

        let json = serde_json::to_vec_pretty(&StateFileOut {
            known_items: &items,
        })
        .context("serializing state")?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("writing state to {}", self.path.display()))?;

        tracing::info!(total = items.len(), added = new_items.len(), "state saved");
        Ok(())
    }

    fn quarantine(&self, now: DateTime<Utc>) {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", now.timestamp()));
        if let Err(e) = fs::rename(&self.path, PathBuf::from(&name)) {
            tracing::warn!(error = ?e, "could not move corrupt state aside");
        }
    }
}

/// Accept the current mapping form and both legacy list forms; anything
/// else is an empty snapshot.
fn parse_snapshot(value: Value) -> StateSnapshot {
    let mut snap = StateSnapshot::default();
    match value {
        Value::Object(map) => {
            let mut recognized = false;
            if let Some(Value::Object(known_items)) = map.get("known_items") {
                recognized = true;
                for (k, v) in known_items {
                    let rec = if v.is_object() {
                        serde_json::from_value(v.clone()).unwrap_or_default()
                    } else {
                        KnownItemRecord::default()
                    };
                    snap.items.insert(k.clone(), rec);
                }
            }
            if let Some(Value::Array(ids)) = map.get("known_ids") {
                recognized = true;
                insert_legacy_ids(&mut snap, ids);
            }
            if !recognized {
                tracing::warn!("state has no known_items/known_ids; treating as empty");
            }
        }
        Value::Array(ids) => insert_legacy_ids(&mut snap, &ids),
        _ => tracing::warn!("state is neither an object nor a list; treating as empty"),
    }
    snap
}

fn insert_legacy_ids(snap: &mut StateSnapshot, ids: &[Value]) {
    for v in ids {
        match v.as_str() {
            Some(id) if !id.is_empty() => {
                snap.items.entry(id.to_string()).or_default();
            }
            _ => tracing::debug!(value = %v, "skipping non-string legacy id"),
        }
    }
}

/// Write to `<path>.tmp`, then rename over `path`. Creates parent dirs.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_mapping_with_partial_records() {
        let snap = parse_snapshot(json!({
            "known_items": {
                "u1": {"added_at": "2025-01-19T10:00:00", "title": "T", "source": "S"},
                "u2": {"added_at": "unknown"},
                "u3": "garbage"
            }
        }));
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.get("u1").unwrap().title, "T");
        assert_eq!(snap.get("u2").unwrap().title, "");
        assert_eq!(snap.get("u3").unwrap().added_at, "unknown");
    }

    #[test]
    fn parses_bare_list() {
        let snap = parse_snapshot(json!(["a", "b", 3]));
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn unknown_shapes_are_empty() {
        assert!(parse_snapshot(json!({"other": 1})).is_empty());
        assert!(parse_snapshot(json!(42)).is_empty());
        assert!(parse_snapshot(json!({"known_items": []})).is_empty());
    }

    #[test]
    fn dir_defaults_to_cwd() {
        assert_eq!(StateStore::new("state.json").dir(), PathBuf::from("."));
        assert_eq!(
            StateStore::new("/var/lib/w/state.json").dir(),
            PathBuf::from("/var/lib/w")
        );
    }
}
