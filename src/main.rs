//! vinyl-watch: polls the configured listing sources, announces records that
//! were not seen before, and remembers them in the state file.
//!
//! Runs once by default (cron/systemd timer); `RUN_EVERY_SECS` keeps the
//! process alive and repeats runs sequentially.

use vinyl_watch::{metrics, AppConfig, NotifierMux, Orchestrator};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    vinyl_watch::init_tracing("vinyl_watch=info,warn");

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = ?e, "configuration invalid");
            std::process::exit(1);
        }
    };
    tracing::info!(
        sources = cfg.sources.len(),
        state = %cfg.state_path.display(),
        "vinyl-watch starting"
    );

    let prom = match &cfg.metrics_textfile {
        Some(_) => match metrics::install_recorder() {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!(error = ?e, "metrics disabled");
                None
            }
        },
        None => None,
    };

    let textfile = cfg.metrics_textfile.clone();
    let run_every = cfg.run_every;
    let notifier = NotifierMux::from_config(&cfg);
    let orch = Orchestrator::from_config(cfg, notifier);

    let export = || {
        if let (Some(h), Some(path)) = (&prom, &textfile) {
            if let Err(e) = metrics::write_textfile(h, path) {
                tracing::warn!(error = ?e, "metrics textfile not written");
            }
        }
    };

    match run_every {
        None => {
            orch.run_once().await;
            export();
        }
        Some(every) => {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        orch.run_once().await;
                        export();
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("shutdown requested");
                        break;
                    }
                }
            }
        }
    }
}
