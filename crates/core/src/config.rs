use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::{HistoryAggregator, HistoryOrder, DEFAULT_HISTORY_LIMIT};
use crate::time::{DisplayZone, DEFAULT_DISPLAY_TIMEZONE};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16_opt(profile: &str, key: &str) -> Option<u16> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub scanner: ScannerConfig,
    pub source: SourceConfig,
    pub alerts: AlertConfig,
    pub history: HistoryConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FIXWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FIXWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            scanner: ScannerConfig::from_env_profiled(p),
            source: SourceConfig::from_env_profiled(p),
            alerts: AlertConfig::from_env_profiled(p),
            history: HistoryConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  scanner:  tick={}s, lookahead={}m, dispatch_timeout={}s, evict_expired={}",
            self.scanner.tick_interval_secs,
            self.scanner.lookahead_minutes,
            self.scanner.dispatch_timeout_secs,
            self.scanner.evict_expired
        );
        tracing::info!(
            "  source:   url={}, refresh={}s",
            self.source.base_url.as_deref().unwrap_or("(in-memory)"),
            self.source.refresh_interval_secs
        );
        tracing::info!(
            "  alerts:   tz={}, console={}, webhook={}, telegram={}, email={}",
            self.alerts.display_timezone,
            self.alerts.console,
            self.alerts.webhook_url.is_some(),
            self.alerts.telegram_configured(),
            self.alerts.email_configured()
        );
        tracing::info!(
            "  history:  limit={}, order={:?}",
            self.history.limit,
            self.history.order
        );
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "scanner": {
                "tick_interval_secs": self.scanner.tick_interval_secs,
                "lookahead_minutes": self.scanner.lookahead_minutes,
                "dispatch_timeout_secs": self.scanner.dispatch_timeout_secs,
                "evict_expired": self.scanner.evict_expired,
            },
            "source": {
                "base_url": self.source.base_url,
                "refresh_interval_secs": self.source.refresh_interval_secs,
            },
            "alerts": {
                "display_timezone": self.alerts.display_timezone,
                "console": self.alerts.console,
                "webhook": self.alerts.webhook_url.is_some(),
                "webhook_method": self.alerts.webhook_method,
                "webhook_headers": self.alerts.webhook_headers.keys().collect::<Vec<_>>(),
                "webhook_body_template": self.alerts.webhook_body_template.is_some(),
                "telegram": self.alerts.telegram_configured(),
                "telegram_parse_mode": self.alerts.telegram_parse_mode,
                "email": self.alerts.email_configured(),
                "smtp_auth": self.alerts.smtp_credentials().is_some(),
            },
            "history": { "limit": self.history.limit, "order": self.history.order },
        })
    }
}

// ── Scanner ───────────────────────────────────────────────────

/// Lower and upper bounds for the scan tick, in seconds.
pub const MIN_TICK_SECS: u64 = 1;
pub const MAX_TICK_SECS: u64 = 30;

/// Lower and upper bounds for the alert lookahead, in minutes (one year).
pub const MIN_LOOKAHEAD_MINUTES: u64 = 1;
pub const MAX_LOOKAHEAD_MINUTES: u64 = 525_600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub tick_interval_secs: u64,
    pub lookahead_minutes: u64,
    pub dispatch_timeout_secs: u64,
    /// Drop dedup entries once the event has ended.
    pub evict_expired: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5,
            lookahead_minutes: 60,
            dispatch_timeout_secs: 10,
            evict_expired: true,
        }
    }
}

impl ScannerConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            tick_interval_secs: profiled_env_u64(p, "SCAN_TICK_SECS", d.tick_interval_secs)
                .clamp(MIN_TICK_SECS, MAX_TICK_SECS),
            lookahead_minutes: profiled_env_u64(p, "LOOKAHEAD_MINUTES", d.lookahead_minutes)
                .clamp(MIN_LOOKAHEAD_MINUTES, MAX_LOOKAHEAD_MINUTES),
            dispatch_timeout_secs: profiled_env_u64(
                p,
                "DISPATCH_TIMEOUT_SECS",
                d.dispatch_timeout_secs,
            ),
            evict_expired: profiled_env_bool(p, "DEDUP_EVICT_EXPIRED", d.evict_expired),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.clamp(MIN_TICK_SECS, MAX_TICK_SECS))
    }

    pub fn lookahead(&self) -> chrono::Duration {
        let minutes = self
            .lookahead_minutes
            .clamp(MIN_LOOKAHEAD_MINUTES, MAX_LOOKAHEAD_MINUTES);
        chrono::Duration::minutes(minutes as i64)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}

// ── Event source ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// REST base URL (e.g. `https://host/api`); `None` = in-memory source.
    pub base_url: Option<String>,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl SourceConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_opt(p, "EVENT_SOURCE_URL"),
            refresh_interval_secs: profiled_env_u64(p, "SOURCE_REFRESH_SECS", 60),
            request_timeout_secs: profiled_env_u64(p, "SOURCE_TIMEOUT_SECS", 15),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── Alerts ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// IANA timezone used to render start/end in alerts.
    pub display_timezone: String,
    /// Log alerts through tracing.
    pub console: bool,
    pub webhook_url: Option<String>,
    /// HTTP method for the webhook; `POST` when unset.
    pub webhook_method: Option<String>,
    /// Extra webhook headers. Values may reference `${VAR}`.
    #[serde(default)]
    pub webhook_headers: HashMap<String, String>,
    /// minijinja template for the webhook body; JSON payload when unset.
    pub webhook_body_template: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    /// Telegram `parse_mode`, e.g. `MarkdownV2`.
    pub telegram_parse_mode: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
}

impl AlertConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            display_timezone: profiled_env_or(p, "DISPLAY_TIMEZONE", DEFAULT_DISPLAY_TIMEZONE),
            console: profiled_env_bool(p, "ALERT_CONSOLE", true),
            webhook_url: profiled_env_opt(p, "ALERT_WEBHOOK_URL"),
            webhook_method: profiled_env_opt(p, "ALERT_WEBHOOK_METHOD"),
            webhook_headers: profiled_env_opt(p, "ALERT_WEBHOOK_HEADERS")
                .map(|raw| parse_headers(&raw))
                .unwrap_or_default(),
            webhook_body_template: profiled_env_opt(p, "ALERT_WEBHOOK_BODY_TEMPLATE"),
            telegram_bot_token: profiled_env_opt(p, "TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: profiled_env_opt(p, "TELEGRAM_CHAT_ID"),
            telegram_parse_mode: profiled_env_opt(p, "TELEGRAM_PARSE_MODE"),
            smtp_host: profiled_env_opt(p, "SMTP_HOST"),
            smtp_port: profiled_env_u16_opt(p, "SMTP_PORT"),
            smtp_from: profiled_env_opt(p, "SMTP_FROM"),
            smtp_to: profiled_env_opt(p, "SMTP_TO")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            smtp_username: profiled_env_opt(p, "SMTP_USERNAME"),
            smtp_password: profiled_env_opt(p, "SMTP_PASSWORD"),
        }
    }

    /// SMTP login, only when both halves are set.
    pub fn smtp_credentials(&self) -> Option<(&str, &str)> {
        match (&self.smtp_username, &self.smtp_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Parsed display zone; an unparseable name falls back to the default
    /// with a warning.
    pub fn display_zone(&self) -> DisplayZone {
        match self.display_timezone.parse() {
            Ok(zone) => zone,
            Err(e) => {
                tracing::warn!(error = %e, "falling back to {}", DEFAULT_DISPLAY_TIMEZONE);
                DisplayZone::default()
            }
        }
    }

    pub fn telegram_configured(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }

    pub fn email_configured(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_from.is_some() && !self.smtp_to.is_empty()
    }
}

/// Parse `ALERT_WEBHOOK_HEADERS`, a JSON object of header name to value.
/// Anything else is ignored with a warning.
fn parse_headers(raw: &str) -> HashMap<String, String> {
    match serde_json::from_str(raw) {
        Ok(headers) => headers,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring ALERT_WEBHOOK_HEADERS, expected a JSON object of strings");
            HashMap::new()
        }
    }
}

// ── History ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub limit: usize,
    pub order: HistoryOrder,
}

impl HistoryConfig {
    fn from_env_profiled(p: &str) -> Self {
        let order = profiled_env_opt(p, "HISTORY_ORDER")
            .and_then(|v| match v.parse() {
                Ok(order) => Some(order),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring HISTORY_ORDER");
                    None
                }
            })
            .unwrap_or_default();
        Self {
            limit: profiled_env_u64(p, "HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT as u64) as usize,
            order,
        }
    }

    pub fn aggregator(&self) -> HistoryAggregator {
        HistoryAggregator::new(self.limit, self.order)
    }
}
