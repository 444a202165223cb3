// src/orchestrator.rs
//! One end-to-end run:
//! Idle → Polling(source…) → Deduping → Diffing → Notifying → Persisting → Idle.
//!
//! Sources are polled strictly one after another. No per-source failure
//! aborts the run; the only thing a run "returns" is its [`RunReport`].

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, gauge};
use std::collections::HashMap;
use std::fmt;
use tokio::time::Instant;

use crate::config::{AppConfig, SourceConfig, SourceKind};
use crate::dedup::{dedupe, dedupe_by_identity};
use crate::notify::{build_message, chunk, lint_message, NotifierMux};
use crate::scheduler::PollScheduler;
use crate::sources::{self, CommandAdapter, FeedAdapter, SourceAdapter};
use crate::state::StateStore;
use crate::types::CandidateItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Polling,
    Deduping,
    Diffing,
    Notifying,
    Persisting,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Polling => "polling",
            RunPhase::Deduping => "deduping",
            RunPhase::Diffing => "diffing",
            RunPhase::Notifying => "notifying",
            RunPhase::Persisting => "persisting",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Polled; number of candidates left after per-source identity dedup.
    Polled(usize),
    Failed(String),
    Skipped,
    Disabled,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sources: Vec<(String, SourceOutcome)>,
    pub candidates: usize,
    pub unique: usize,
    pub new_items: Vec<CandidateItem>,
    pub chunks_sent: usize,
    pub persisted: bool,
    pub persist_error: Option<String>,
}

impl RunReport {
    pub fn outcome(&self, source: &str) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, o)| o)
    }
}

pub struct Orchestrator {
    cfg: AppConfig,
    adapters: HashMap<String, Box<dyn SourceAdapter>>,
    store: StateStore,
    scheduler: PollScheduler,
    notifier: NotifierMux,
}

impl Orchestrator {
    /// Orchestrator without adapters; add them with [`with_adapter`](Self::with_adapter).
    pub fn new(cfg: AppConfig, notifier: NotifierMux) -> Self {
        let store = StateStore::new(cfg.state_path.clone());
        let scheduler = PollScheduler::new(store.dir());
        Self {
            cfg,
            adapters: HashMap::new(),
            store,
            scheduler,
            notifier,
        }
    }

    /// One adapter per configured source, chosen by `kind`.
    pub fn from_config(cfg: AppConfig, notifier: NotifierMux) -> Self {
        let timeout = cfg.request_timeout;
        let adapters: Vec<Box<dyn SourceAdapter>> = cfg
            .sources
            .iter()
            .map(|s| -> Box<dyn SourceAdapter> {
                match s.kind {
                    SourceKind::Feed => Box::new(FeedAdapter::http(&s.name, timeout)),
                    SourceKind::Command => Box::new(CommandAdapter::new(&s.name, timeout)),
                }
            })
            .collect();
        adapters
            .into_iter()
            .fold(Self::new(cfg, notifier), |o, a| o.with_adapter(a))
    }

    pub fn with_adapter(mut self, adapter: Box<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.name().to_string(), adapter);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub async fn run_once(&self) -> RunReport {
        self.run_once_at(Utc::now()).await
    }

    /// Run with `now` as the start time. Poll markers are stamped with `now`
    /// plus the time elapsed until each source's attempt finished.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::default();
        let known = self.store.load().known_identifiers();

        phase(RunPhase::Polling);
        let mut candidates: Vec<CandidateItem> = Vec::new();
        for src in &self.cfg.sources {
            let outcome = self.poll_source(src, now, started, &mut candidates).await;
            report.sources.push((src.name.clone(), outcome));
        }
        report.candidates = candidates.len();

        phase(RunPhase::Deduping);
        let (unique, dupes) = dedupe(candidates);
        report.unique = unique.len();
        tracing::debug!(
            unique = unique.len(),
            identity_dupes = dupes.identity_dupes,
            content_dupes = dupes.content_dupes,
            "dedup done"
        );

        phase(RunPhase::Diffing);
        let new_items: Vec<CandidateItem> = unique
            .iter()
            .filter(|it| !known.contains(&it.id))
            .cloned()
            .collect();
        counter!("watch_new_items_total").increment(new_items.len() as u64);

        if new_items.is_empty() {
            tracing::info!(candidates = report.candidates, "no new items; state untouched");
        } else {
            phase(RunPhase::Notifying);
            report.chunks_sent = self.notify(&new_items).await;

            phase(RunPhase::Persisting);
            let mut all_known = known;
            all_known.extend(unique.iter().map(|it| it.id.clone()));
            match self.store.save_at(&all_known, &new_items, now) {
                Ok(()) => report.persisted = true,
                Err(e) => {
                    tracing::error!(error = ?e, "state save failed");
                    report.persist_error = Some(format!("{e:#}"));
                }
            }
        }
        report.new_items = new_items;

        phase(RunPhase::Idle);
        gauge!("watch_last_run_ts").set(now.timestamp() as f64);
        tracing::info!(
            candidates = report.candidates,
            unique = report.unique,
            new = report.new_items.len(),
            chunks = report.chunks_sent,
            persisted = report.persisted,
            "run finished"
        );
        report
    }

    async fn poll_source(
        &self,
        src: &SourceConfig,
        now: DateTime<Utc>,
        started: Instant,
        into: &mut Vec<CandidateItem>,
    ) -> SourceOutcome {
        if !src.enabled {
            tracing::debug!(source = %src.name, "source disabled");
            return SourceOutcome::Disabled;
        }
        if !self.scheduler.should_poll_at(&src.name, src.interval_hours, now) {
            counter!("watch_polls_skipped_total").increment(1);
            tracing::info!(source = %src.name, interval_hours = src.interval_hours, "not due; skipping");
            return SourceOutcome::Skipped;
        }

        let outcome = match self.adapters.get(&src.name) {
            Some(adapter) => {
                let res = sources::poll(adapter.as_ref(), src).await;
                match res.error {
                    Some(e) => SourceOutcome::Failed(format!("{e:#}")),
                    None => {
                        let (items, dropped) = dedupe_by_identity(res.items);
                        tracing::info!(source = %src.name, found = items.len(), dropped, "source polled");
                        let n = items.len();
                        into.extend(items);
                        SourceOutcome::Polled(n)
                    }
                }
            }
            None => {
                tracing::warn!(source = %src.name, "no adapter registered for source");
                counter!("watch_source_errors_total").increment(1);
                SourceOutcome::Failed("no adapter registered".to_string())
            }
        };

        let finished = now + Duration::from_std(started.elapsed()).unwrap_or_else(|_| Duration::zero());
        if let Err(e) = self.scheduler.record_poll_at(&src.name, finished) {
            tracing::warn!(source = %src.name, error = ?e, "could not record poll time");
        }
        outcome
    }

    /// Returns the number of chunks at least one channel accepted.
    async fn notify(&self, new_items: &[CandidateItem]) -> usize {
        let message = build_message(new_items, &self.cfg.sources);
        for issue in lint_message(&message) {
            tracing::warn!(%issue, "message check");
        }
        let chunks = chunk(&message, self.cfg.message_limit);
        let mut sent = 0;
        for (i, c) in chunks.iter().enumerate() {
            if self.notifier.notify(c).await > 0 {
                sent += 1;
            } else {
                tracing::warn!(chunk = i + 1, total = chunks.len(), "chunk not delivered");
            }
        }
        sent
    }
}

fn phase(p: RunPhase) {
    tracing::debug!(phase = %p, "run phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;

    #[test]
    fn from_config_registers_one_adapter_per_source() {
        let cfg = AppConfig {
            sources: vec![
                SourceConfig::feed("a", "http://127.0.0.1:9/a"),
                SourceConfig::command("b", "scrape", &[]),
            ],
            ..AppConfig::default()
        };
        let o = Orchestrator::from_config(cfg, NotifierMux::new(vec![Box::new(LogNotifier)]));
        assert!(o.adapters.contains_key("a"));
        assert!(o.adapters.contains_key("b"));
    }

    #[test]
    fn phases_render_lowercase() {
        assert_eq!(RunPhase::Persisting.to_string(), "persisting");
    }
}
