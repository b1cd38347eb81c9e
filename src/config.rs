// src/config.rs
//! Process configuration, built once at startup and handed to each component.
//!
//! Precedence (lowest → highest): built-in defaults, TOML file, environment.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SOURCE_URL: &str =
    "https://www.icbc.com.cn/ICBCDynamicSite/Optimize/Quotation/QuotationListIframe.aspx";
pub const DEFAULT_CONFIG_PATH: &str = "config/fx.toml";
pub const DEFAULT_RETENTION_DAYS: i64 = 60;
pub const DEFAULT_PUSHDEER_ENDPOINT: &str = "https://api2.pushdeer.com/message/push";

pub const ENV_CONFIG_PATH: &str = "FX_CONFIG_PATH";
const ENV_SOURCE_URL: &str = "FX_SOURCE_URL";
const ENV_STORAGE_DIR: &str = "FX_STORAGE_DIR";
const ENV_RETENTION_DAYS: &str = "FX_RETENTION_DAYS";
const ENV_FETCH_TIMEOUT: &str = "FX_FETCH_TIMEOUT_SECS";
const ENV_FETCH_RETRIES: &str = "FX_FETCH_RETRIES";
const ENV_SCHEDULE_SECS: &str = "FX_SCHEDULE_SECS";
const ENV_API_TOKEN: &str = "API_AUTH_TOKEN";
const ENV_WATCH_CURRENCY: &str = "WATCH_CURRENCY";
const ENV_WATCH_BELOW: &str = "WATCH_BELOW";
const ENV_WATCH_COOLDOWN: &str = "WATCH_COOLDOWN_SECS";
const ENV_PUSHDEER_KEY: &str = "PUSHDEER_KEY";
const ENV_PUSHDEER_ENDPOINT: &str = "PUSHDEER_ENDPOINT";
const ENV_SLACK: &str = "SLACK_WEBHOOK_URL";
const ENV_DISCORD: &str = "DISCORD_WEBHOOK_URL";
const ENV_SMTP: [&str; 5] = [
    "SMTP_HOST",
    "SMTP_USER",
    "SMTP_PASS",
    "NOTIFY_EMAIL_FROM",
    "NOTIFY_EMAIL_TO",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source_url: String,
    pub storage_dir: Option<PathBuf>,
    pub retention_days: i64,
    /// Server-side periodic pipeline interval; `None` disables it.
    pub schedule_secs: Option<u64>,
    /// Bearer secret of the HTTP API. Without it every API request is answered 404.
    pub api_token: Option<String>,
    pub fetch: FetchConfig,
    pub watch: WatchConfig,
    pub notify: NotifyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            storage_dir: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            schedule_secs: None,
            api_token: None,
            fetch: FetchConfig::default(),
            watch: WatchConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-attempt timeout; 0 disables it.
    pub timeout_secs: u64,
    pub max_retries: u8,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 0,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub currency: String,
    /// Alert when the exchange sell price drops below this value.
    pub below: f64,
    pub cooldown_secs: i64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            currency: "EUR".to_string(),
            below: 750.0,
            cooldown_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub pushdeer_key: Option<String>,
    pub pushdeer_endpoint: String,
    pub slack_webhook: Option<String>,
    pub discord_webhook: Option<String>,
    pub email: Option<EmailConfig>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            pushdeer_key: None,
            pushdeer_endpoint: DEFAULT_PUSHDEER_ENDPOINT.to_string(),
            slack_webhook: None,
            discord_webhook: None,
            email: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub from: String,
    pub to: String,
}

impl AppConfig {
    /// Load from `explicit` (or `$FX_CONFIG_PATH`, or `config/fx.toml` when present),
    /// then overlay the process environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |k| std::env::var(k).ok())
    }

    /// Same as [`AppConfig::load`] with an injectable variable lookup.
    pub fn load_with<F>(explicit: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| lookup(ENV_CONFIG_PATH).map(PathBuf::from));

        let base = match path {
            Some(p) => Self::load_from_file(&p)?,
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::load_from_file(&p)?
                } else {
                    Self::default()
                }
            }
        };
        base.apply_env(lookup)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.validated()
    }

    /// Overlay environment variables. Empty values count as unset.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_SOURCE_URL) {
            self.source_url = v;
        }
        if let Some(v) = get(ENV_STORAGE_DIR) {
            self.storage_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = parse_var(&get, ENV_RETENTION_DAYS)? {
            self.retention_days = v;
        }
        if let Some(v) = parse_var(&get, ENV_FETCH_TIMEOUT)? {
            self.fetch.timeout_secs = v;
        }
        if let Some(v) = parse_var(&get, ENV_FETCH_RETRIES)? {
            self.fetch.max_retries = v;
        }
        if let Some(v) = parse_var(&get, ENV_SCHEDULE_SECS)? {
            self.schedule_secs = Some(v);
        }
        if let Some(v) = get(ENV_API_TOKEN) {
            self.api_token = Some(v);
        }
        if let Some(v) = get(ENV_WATCH_CURRENCY) {
            self.watch.currency = v;
        }
        if let Some(v) = parse_var(&get, ENV_WATCH_BELOW)? {
            self.watch.below = v;
        }
        if let Some(v) = parse_var(&get, ENV_WATCH_COOLDOWN)? {
            self.watch.cooldown_secs = v;
        }
        if let Some(v) = get(ENV_PUSHDEER_KEY) {
            self.notify.pushdeer_key = Some(v);
        }
        if let Some(v) = get(ENV_PUSHDEER_ENDPOINT) {
            self.notify.pushdeer_endpoint = v;
        }
        if let Some(v) = get(ENV_SLACK) {
            self.notify.slack_webhook = Some(v);
        }
        if let Some(v) = get(ENV_DISCORD) {
            self.notify.discord_webhook = Some(v);
        }

        let smtp: Vec<Option<String>> = ENV_SMTP.iter().map(|k| get(k)).collect();
        if smtp.iter().any(Option::is_some) {
            let missing: Vec<&str> = ENV_SMTP
                .iter()
                .zip(&smtp)
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| *k)
                .collect();
            if !missing.is_empty() {
                bail!("incomplete SMTP settings, missing: {}", missing.join(", "));
            }
            let mut it = smtp.into_iter().flatten();
            let mut next = || it.next().unwrap_or_default();
            self.notify.email = Some(EmailConfig {
                smtp_host: next(),
                smtp_user: next(),
                smtp_pass: next(),
                from: next(),
                to: next(),
            });
        }

        self.validated()
    }

    fn validated(mut self) -> Result<Self> {
        if self.source_url.trim().is_empty() {
            bail!("source_url must not be empty");
        }
        if self.retention_days < 0 {
            bail!("retention_days must be >= 0, got {}", self.retention_days);
        }
        if self.schedule_secs == Some(0) {
            bail!("schedule_secs must be > 0");
        }
        self.watch.currency = self.watch.currency.trim().to_ascii_uppercase();
        if !self.watch.below.is_finite() {
            bail!("watch threshold must be a finite number");
        }
        Ok(self)
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("{key}={raw:?} is invalid: {e}")),
    }
}
