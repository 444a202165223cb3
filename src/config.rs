// src/config.rs
//! Immutable runtime configuration, built once at startup.
//!
//! Sources come from a TOML or JSON file:
//! 1) `$SOURCES_CONFIG_PATH`
//! 2) `config/sources.toml`
//! 3) `config/sources.json`
//!
//! Everything else comes from the environment (see [`AppConfig::from_env`]).

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::state::DEFAULT_STATE_PATH;

pub const ENV_SOURCES_CONFIG_PATH: &str = "SOURCES_CONFIG_PATH";
pub const DEFAULT_MESSAGE_LIMIT: usize = 4096;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

fn default_true() -> bool {
    true
}
fn default_interval_hours() -> u32 {
    6
}
fn default_icon() -> String {
    "🎵".to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// HTTP endpoint returning candidate items as JSON.
    #[default]
    Feed,
    /// External scraper process printing candidate items as JSON.
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Stable identifier; also the `source` tag on items and the poll marker key.
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u32,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl SourceConfig {
    pub fn feed(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            icon: default_icon(),
            enabled: true,
            interval_hours: default_interval_hours(),
            search_queries: Vec::new(),
            kind: SourceKind::Feed,
            url: Some(url.to_string()),
            program: None,
            args: Vec::new(),
        }
    }

    pub fn command(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            kind: SourceKind::Command,
            url: None,
            program: Some(program.to_string()),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Self::feed(name, "")
        }
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// `<NAME>_MONITOR_INTERVAL_HOURS`, e.g. `VINYLTAP_CO_UK_MONITOR_INTERVAL_HOURS`.
    pub fn interval_env_var(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{stem}_MONITOR_INTERVAL_HOURS")
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("source with empty name");
        }
        match self.kind {
            SourceKind::Feed if self.url.as_deref().is_none_or_blank() => {
                bail!("feed source {:?} has no url", self.name)
            }
            SourceKind::Command if self.program.as_deref().is_none_or_blank() => {
                bail!("command source {:?} has no program", self.name)
            }
            _ => Ok(()),
        }
    }
}

trait BlankExt {
    fn is_none_or_blank(&self) -> bool;
}

impl BlankExt for Option<&str> {
    fn is_none_or_blank(&self) -> bool {
        self.map(|s| s.trim().is_empty()).unwrap_or(true)
    }
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token_len", &self.token.len())
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Clone)]
pub struct EmailConfig {
    pub host: String,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub to: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub state_path: PathBuf,
    pub sources: Vec<SourceConfig>,
    pub message_limit: usize,
    pub request_timeout: Duration,
    pub telegram: Option<TelegramConfig>,
    pub email: Option<EmailConfig>,
    pub metrics_textfile: Option<PathBuf>,
    pub run_every: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            sources: Vec::new(),
            message_limit: DEFAULT_MESSAGE_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            telegram: None,
            email: None,
            metrics_textfile: None,
            run_every: None,
        }
    }
}

impl AppConfig {
    /// Build from the process environment and the sources file.
    pub fn from_env() -> Result<Self> {
        let sources = load_sources_default()?;
        Self::from_lookup(sources, |k| std::env::var(k).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable lookup.
    pub fn from_lookup<F>(mut sources: Vec<SourceConfig>, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| var(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        apply_interval_overrides(&mut sources, &var);

        let telegram = match (var("TELEGRAM_BOT_TOKEN"), var("TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig {
                token,
                chat_id,
                api_base: var("TELEGRAM_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            }),
            _ => None,
        };

        let email = match (
            var("SMTP_HOST"),
            var("SMTP_USER"),
            var("SMTP_PASS"),
            var("NOTIFY_EMAIL_FROM"),
            var("NOTIFY_EMAIL_TO"),
        ) {
            (Some(host), Some(user), Some(pass), Some(from), Some(to)) => Some(EmailConfig {
                host,
                user,
                pass,
                from,
                to,
            }),
            _ => None,
        };

        Ok(Self {
            state_path: var("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
            sources,
            message_limit: parse_or(var("MESSAGE_LIMIT"), DEFAULT_MESSAGE_LIMIT).max(1),
            request_timeout: Duration::from_secs(parse_or(
                var("REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            telegram,
            email,
            metrics_textfile: var("METRICS_TEXTFILE").map(PathBuf::from),
            run_every: var("RUN_EVERY_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
        })
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    match raw {
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(value = %v, "invalid numeric setting; using default");
            default
        }),
        None => default,
    }
}

fn apply_interval_overrides<F>(sources: &mut [SourceConfig], var: &F)
where
    F: Fn(&str) -> Option<String>,
{
    for s in sources.iter_mut() {
        let key = s.interval_env_var();
        if let Some(raw) = var(&key) {
            match raw.parse::<u32>() {
                Ok(h) => s.interval_hours = h,
                Err(_) => tracing::warn!(%key, value = %raw, "invalid interval override ignored"),
            }
        }
    }
}

/// Load sources from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing sources in {}", path.display()))
}

/// Load sources using env var + fallbacks; no file at all means no sources.
pub fn load_sources_default() -> Result<Vec<SourceConfig>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("SOURCES_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    tracing::warn!("no sources file found; nothing will be polled");
    Ok(Vec::new())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceConfig>> {
    let looks_json = hint_ext != "toml" && s.trim_start().starts_with(['[', '{']);
    let raw = if hint_ext == "json" || looks_json {
        parse_json(s).or_else(|json_err| parse_toml(s).map_err(|_| json_err))?
    } else {
        parse_toml(s)?
    };
    clean_sources(raw)
}

fn parse_toml(s: &str) -> Result<Vec<SourceConfig>> {
    #[derive(Deserialize)]
    struct TomlSources {
        #[serde(default)]
        sources: Vec<SourceConfig>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<SourceConfig>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum JsonSources {
        Wrapped { sources: Vec<SourceConfig> },
        Bare(Vec<SourceConfig>),
    }
    Ok(match serde_json::from_str(s)? {
        JsonSources::Wrapped { sources } => sources,
        JsonSources::Bare(v) => v,
    })
}

fn clean_sources(items: Vec<SourceConfig>) -> Result<Vec<SourceConfig>> {
    let mut out: Vec<SourceConfig> = Vec::with_capacity(items.len());
    for mut s in items {
        s.name = s.name.trim().to_string();
        let mut queries: Vec<String> = Vec::with_capacity(s.search_queries.len());
        for q in &s.search_queries {
            let q = q.trim();
            if !q.is_empty() && !queries.iter().any(|x| x == q) {
                queries.push(q.to_string());
            }
        }
        s.search_queries = queries;
        s.validate()?;
        if out.iter().any(|o| o.name == s.name) {
            bail!("duplicate source name {:?}", s.name);
        }
        out.push(s);
    }
    Ok(out)
}
