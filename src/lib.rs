// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod dedup;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod price;
pub mod scheduler;
pub mod sources;
pub mod state;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::config::{AppConfig, SourceConfig, SourceKind};
pub use crate::dedup::{dedupe, dedupe_by_identity, normalize_identity, DedupReport};
pub use crate::notify::{chunk, Notifier, NotifierMux};
pub use crate::orchestrator::{Orchestrator, RunPhase, RunReport, SourceOutcome};
pub use crate::price::{Amount, Currency, Price};
pub use crate::scheduler::PollScheduler;
pub use crate::sources::{PollResult, SourceAdapter};
pub use crate::state::StateStore;
pub use crate::types::{CandidateItem, KnownItemRecord, StateSnapshot};

/// Tracing setup shared by the binaries. `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        eprintln!("tracing already initialized");
    }
}
