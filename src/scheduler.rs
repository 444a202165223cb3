// src/scheduler.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

use crate::state::write_atomic;
use crate::types::parse_timestamp;

/// Per-source "is it time to poll again" gate.
///
/// Each source has one marker file holding the ISO-8601 timestamp of its last
/// poll attempt. A missing or unreadable marker means "due now".
#[derive(Debug, Clone)]
pub struct PollScheduler {
    dir: PathBuf,
}

impl PollScheduler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn marker_path(&self, source: &str) -> PathBuf {
        self.dir.join(marker_file_name(source))
    }

    pub fn should_poll(&self, source: &str, interval_hours: u32) -> bool {
        self.should_poll_at(source, interval_hours, Utc::now())
    }

    /// Due iff `now - last >= interval` (inclusive). Absent or unparsable → due.
    pub fn should_poll_at(&self, source: &str, interval_hours: u32, now: DateTime<Utc>) -> bool {
        match self.read_marker(source) {
            Ok(Some(last)) => now.signed_duration_since(last) >= Duration::hours(interval_hours.into()),
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(source, error = ?e, "poll marker unreadable; polling");
                true
            }
        }
    }

    /// Last recorded poll, if any (diagnostics).
    pub fn last_poll(&self, source: &str) -> Option<DateTime<Utc>> {
        self.read_marker(source).ok().flatten()
    }

    pub fn record_poll(&self, source: &str) -> Result<()> {
        self.record_poll_at(source, Utc::now())
    }

    pub fn record_poll_at(&self, source: &str, now: DateTime<Utc>) -> Result<()> {
        let path = self.marker_path(source);
        write_atomic(&path, now.to_rfc3339().as_bytes())
            .with_context(|| format!("writing poll marker {}", path.display()))
    }

    fn read_marker(&self, source: &str) -> Result<Option<DateTime<Utc>>> {
        let path = self.marker_path(source);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading poll marker {}", path.display()))?;
        parse_timestamp(&raw)
            .map(Some)
            .with_context(|| format!("invalid timestamp {:?} in {}", raw.trim(), path.display()))
    }
}

/// `last_check_<slug>.txt`; names that needed sanitizing get a hash suffix so
/// distinct sources never share a marker.
pub fn marker_file_name(source: &str) -> String {
    let slug: String = source
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if slug == source && !slug.is_empty() {
        format!("last_check_{slug}.txt")
    } else {
        format!("last_check_{slug}-{}.txt", short_hash(source))
    }
}

fn short_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
