//! Configuration structures
//!
//! Every section deserializes with defaults so a config file only needs the
//! values it overrides.

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::*;

/// Top-level Cadence configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub conflicts: ConflictConfig,
    pub providers: ProvidersConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "cadence.db".to_string(), pool_size: 8 }
    }
}

/// Which calendars receive task-bound events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskBindingScope {
    #[default]
    PrimaryOnly,
    AllCalendars,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub lookback_days: i64,
    pub lookahead_days: i64,
    pub task_default_duration_minutes: i64,
    pub task_default_start_hour: u32,
    pub task_binding: TaskBindingScope,
    /// A calendar left `in_progress` longer than this may be claimed again.
    pub stale_run_after_minutes: i64,
    /// Public base URL webhook callbacks are registered under.
    pub webhook_base_url: Option<String>,
    pub webhook_renew_before_hours: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_SYNC_LOOKBACK_DAYS,
            lookahead_days: DEFAULT_SYNC_LOOKAHEAD_DAYS,
            task_default_duration_minutes: DEFAULT_TASK_DURATION_MINUTES,
            task_default_start_hour: DEFAULT_TASK_START_HOUR,
            task_binding: TaskBindingScope::default(),
            stale_run_after_minutes: DEFAULT_STALE_RUN_AFTER_MINUTES,
            webhook_base_url: None,
            webhook_renew_before_hours: DEFAULT_WEBHOOK_RENEW_BEFORE_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    pub horizon_days: i64,
    pub buffer_minutes: i64,
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub reschedule_horizon_days: i64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_CONFLICT_HORIZON_DAYS,
            buffer_minutes: DEFAULT_SCHEDULING_BUFFER_MINUTES,
            high_threshold: HIGH_SEVERITY_THRESHOLD,
            medium_threshold: MEDIUM_SEVERITY_THRESHOLD,
            reschedule_horizon_days: RESCHEDULE_HORIZON_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub api_base_url: String,
    pub token_url: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
}

impl ProviderConfig {
    pub fn google() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            request_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            max_attempts: DEFAULT_PROVIDER_MAX_ATTEMPTS,
        }
    }

    pub fn microsoft() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            api_base_url: "https://graph.microsoft.com/v1.0".to_string(),
            token_url: "https://login.microsoftonline.com/common/oauth2/v2.0/token".to_string(),
            request_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            max_attempts: DEFAULT_PROVIDER_MAX_ATTEMPTS,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::google()
    }
}

/// Each provider section is merged onto that provider's own defaults, so
/// `[providers.microsoft]` with only a `client_id` keeps the Graph URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    #[serde(deserialize_with = "google_section")]
    pub google: ProviderConfig,
    #[serde(deserialize_with = "microsoft_section")]
    pub microsoft: ProviderConfig,
}

/// Fields present in a provider section; absent ones keep the defaults.
#[derive(Debug, Default, Deserialize)]
struct ProviderOverrides {
    client_id: Option<String>,
    client_secret: Option<String>,
    api_base_url: Option<String>,
    token_url: Option<String>,
    request_timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
}

impl ProviderOverrides {
    fn apply(self, mut base: ProviderConfig) -> ProviderConfig {
        if let Some(v) = self.client_id {
            base.client_id = v;
        }
        if self.client_secret.is_some() {
            base.client_secret = self.client_secret;
        }
        if let Some(v) = self.api_base_url {
            base.api_base_url = v;
        }
        if let Some(v) = self.token_url {
            base.token_url = v;
        }
        if let Some(v) = self.request_timeout_secs {
            base.request_timeout_secs = v;
        }
        if let Some(v) = self.max_attempts {
            base.max_attempts = v;
        }
        base
    }
}

fn google_section<'de, D>(deserializer: D) -> std::result::Result<ProviderConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(ProviderOverrides::deserialize(deserializer)?.apply(ProviderConfig::google()))
}

fn microsoft_section<'de, D>(deserializer: D) -> std::result::Result<ProviderConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(ProviderOverrides::deserialize(deserializer)?.apply(ProviderConfig::microsoft()))
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self { google: ProviderConfig::google(), microsoft: ProviderConfig::microsoft() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first) for periodic sync.
    pub sync_cron: String,
    pub webhook_renewal_cron: String,
    pub job_timeout_secs: u64,
    /// Users whose calendars the periodic job syncs.
    pub user_ids: Vec<uuid::Uuid>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_cron: "0 */15 * * * *".to_string(),
            webhook_renewal_cron: "0 0 * * * *".to_string(),
            job_timeout_secs: 300,
            user_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"conflicts": {"buffer_minutes": 10}}"#).unwrap();
        assert_eq!(config.conflicts.buffer_minutes, 10);
        assert_eq!(config.conflicts.horizon_days, 30);
        assert_eq!(config.sync.task_default_start_hour, 9);
        assert_eq!(config.providers.microsoft.api_base_url, "https://graph.microsoft.com/v1.0");
        assert_eq!(config.sync.task_binding, TaskBindingScope::PrimaryOnly);
    }

    #[test]
    fn partial_provider_section_keeps_its_own_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"providers": {"microsoft": {"client_id": "ms-client"}}}"#)
                .unwrap();
        assert_eq!(config.providers.microsoft.client_id, "ms-client");
        assert_eq!(config.providers.microsoft.api_base_url, "https://graph.microsoft.com/v1.0");
        assert_eq!(config.providers.google, ProviderConfig::google());
    }
}
