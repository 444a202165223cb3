// src/sources/command.rs
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::SourceConfig;
use crate::sources::{parse_candidates, SourceAdapter};
use crate::types::CandidateItem;

/// Runs an external scraper (e.g. a headless-browser script) and reads
/// candidate items from its stdout.
///
/// Invocation: `<program> <args...> --source <name> [--query <q>]...`
pub struct CommandAdapter {
    name: String,
    timeout: Duration,
}

impl CommandAdapter {
    pub fn new(name: &str, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            timeout,
        }
    }

    fn build_args(cfg: &SourceConfig) -> Vec<String> {
        let mut args = cfg.args.clone();
        args.push("--source".into());
        args.push(cfg.name.clone());
        for q in &cfg.search_queries {
            args.push("--query".into());
            args.push(q.clone());
        }
        args
    }
}

#[async_trait]
impl SourceAdapter for CommandAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, cfg: &SourceConfig) -> Result<Vec<CandidateItem>> {
        let program = cfg
            .program
            .as_deref()
            .ok_or_else(|| anyhow!("command source {:?} has no program", cfg.name))?;

        let child = Command::new(program)
            .args(Self::build_args(cfg))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning scraper {program}"))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("scraper {program} timed out after {:?}", self.timeout))?
            .with_context(|| format!("waiting for scraper {program}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let tail = match stderr.char_indices().rev().nth(299) {
                Some((i, _)) => &stderr[i..],
                None => stderr,
            };
            bail!("scraper {program} exited with {}: {tail}", output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_candidates(&stdout, &cfg.name, None)
            .with_context(|| format!("parsing output of scraper {program}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_carry_source_and_queries() {
        let mut cfg = SourceConfig::command("avito.ru", "scrape", &["--headless"]);
        cfg.search_queries = vec!["harry potter".into(), "kino".into()];
        assert_eq!(
            CommandAdapter::build_args(&cfg),
            vec!["--headless", "--source", "avito.ru", "--query", "harry potter", "--query", "kino"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_stdout_of_external_program() {
        // "sh" becomes $0; the appended --source flags land in $@
        let script = r#"echo '[{"url":"https://s.test/1","title":"T"}]'"#;
        let cfg = SourceConfig::command("shell", "sh", &["-c", script, "sh"]);
        let a = CommandAdapter::new("shell", Duration::from_secs(10));
        let v = a.fetch(&cfg).await.unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].source, "shell");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let cfg = SourceConfig::command("shell", "sh", &["-c", "echo boom >&2; exit 3", "sh"]);
        let a = CommandAdapter::new("shell", Duration::from_secs(10));
        let err = a.fetch(&cfg).await.unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
    }
}
