//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. `.env` is read into the process environment when present
//! 2. Environment variables are tried first (`CADENCE_DB_PATH` is required)
//! 3. If incomplete, falls back to loading from file
//! 4. Probes multiple paths for config files, JSON or TOML
//!
//! ## Environment Variables
//! - `CADENCE_DB_PATH`: Database file path (required)
//! - `CADENCE_DB_POOL_SIZE`: Connection pool size
//! - `CADENCE_WEBHOOK_BASE_URL`: Public base URL for provider callbacks
//! - `CADENCE_TASK_BINDING`: `primary_only` or `all_calendars`
//! - `CADENCE_GOOGLE_CLIENT_ID` / `CADENCE_GOOGLE_CLIENT_SECRET`
//! - `CADENCE_MICROSOFT_CLIENT_ID` / `CADENCE_MICROSOFT_CLIENT_SECRET`
//! - `CADENCE_SCHEDULER_ENABLED`: Whether cron jobs run (true/false)
//! - `CADENCE_SYNC_CRON`: Six-field cron expression for periodic sync
//! - `CADENCE_SCHEDULER_USERS`: Comma-separated user ids to sync
//! - `CADENCE_LOG_LEVEL`: Default tracing filter directive
//! - `CADENCE_LOG_JSON`: Emit JSON logs (true/false)
//!
//! Every other value keeps its default from [`Config`].
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./cadence.{json,toml}` and `./config.{json,toml}`
//! 2. The same names in the parent and grandparent directory
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use cadence_domain::{CadenceError, Config, Result, TaskBindingScope};
use uuid::Uuid;

const CONFIG_FILE_NAMES: [&str; 4] = ["cadence.toml", "cadence.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variable is missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `CadenceError::Config` if neither source yields a configuration
/// or the file format is invalid.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `CADENCE_DB_PATH` must be present; the other variables override defaults.
///
/// # Errors
/// Returns `CadenceError::Config` if the required variable is missing or a
/// value fails to parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("CADENCE_DB_PATH")?;
    if let Some(pool_size) = env_parse::<u32>("CADENCE_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }

    if let Ok(base_url) = env_var("CADENCE_WEBHOOK_BASE_URL") {
        url::Url::parse(&base_url)
            .map_err(|e| CadenceError::Config(format!("Invalid webhook base URL: {e}")))?;
        config.sync.webhook_base_url = Some(base_url);
    }
    if let Ok(scope) = env_var("CADENCE_TASK_BINDING") {
        config.sync.task_binding = parse_task_binding(&scope)?;
    }

    if let Ok(client_id) = env_var("CADENCE_GOOGLE_CLIENT_ID") {
        config.providers.google.client_id = client_id;
    }
    config.providers.google.client_secret = env_var("CADENCE_GOOGLE_CLIENT_SECRET").ok();
    if let Ok(client_id) = env_var("CADENCE_MICROSOFT_CLIENT_ID") {
        config.providers.microsoft.client_id = client_id;
    }
    config.providers.microsoft.client_secret = env_var("CADENCE_MICROSOFT_CLIENT_SECRET").ok();

    config.scheduler.enabled = env_bool("CADENCE_SCHEDULER_ENABLED", config.scheduler.enabled);
    if let Ok(cron) = env_var("CADENCE_SYNC_CRON") {
        config.scheduler.sync_cron = cron;
    }
    if let Ok(users) = env_var("CADENCE_SCHEDULER_USERS") {
        config.scheduler.user_ids = parse_user_ids(&users)?;
    }

    if let Ok(level) = env_var("CADENCE_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("CADENCE_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CadenceError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CadenceError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CadenceError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CadenceError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, format chosen by extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CadenceError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CadenceError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CadenceError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Returns the first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `CadenceError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CadenceError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CadenceError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_task_binding(raw: &str) -> Result<TaskBindingScope> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "primary_only" | "primary" => Ok(TaskBindingScope::PrimaryOnly),
        "all_calendars" | "all" => Ok(TaskBindingScope::AllCalendars),
        other => Err(CadenceError::Config(format!("Invalid task binding scope: {other}"))),
    }
}

fn parse_user_ids(raw: &str) -> Result<Vec<Uuid>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s).map_err(|e| CadenceError::Config(format!("Invalid user id {s}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::{Builder, NamedTempFile};

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ENV_KEYS: [&str; 8] = [
        "CADENCE_DB_PATH",
        "CADENCE_DB_POOL_SIZE",
        "CADENCE_WEBHOOK_BASE_URL",
        "CADENCE_TASK_BINDING",
        "CADENCE_GOOGLE_CLIENT_ID",
        "CADENCE_SCHEDULER_USERS",
        "CADENCE_LOG_JSON",
        "CADENCE_SCHEDULER_ENABLED",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for (key, value) in [
            ("TEST_CADENCE_BOOL_1", "1"),
            ("TEST_CADENCE_BOOL_YES", "yes"),
            ("TEST_CADENCE_BOOL_UPPER", "TRUE"),
        ] {
            std::env::set_var(key, value);
            assert!(env_bool(key, false), "{value} should parse as true");
            std::env::remove_var(key);
        }

        for (key, value) in [("TEST_CADENCE_BOOL_0", "0"), ("TEST_CADENCE_BOOL_OFF", "off")] {
            std::env::set_var(key, value);
            assert!(!env_bool(key, true), "{value} should parse as false");
            std::env::remove_var(key);
        }

        std::env::remove_var("TEST_CADENCE_BOOL_MISSING");
        assert!(env_bool("TEST_CADENCE_BOOL_MISSING", true));
        assert!(!env_bool("TEST_CADENCE_BOOL_MISSING", false));
    }

    #[test]
    fn test_load_from_env_overrides_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let user = Uuid::now_v7();
        std::env::set_var("CADENCE_DB_PATH", "/tmp/cadence-test.db");
        std::env::set_var("CADENCE_DB_POOL_SIZE", "4");
        std::env::set_var("CADENCE_WEBHOOK_BASE_URL", "https://hooks.example.com");
        std::env::set_var("CADENCE_TASK_BINDING", "all_calendars");
        std::env::set_var("CADENCE_GOOGLE_CLIENT_ID", "google-client");
        std::env::set_var("CADENCE_SCHEDULER_USERS", format!("{user}, "));
        std::env::set_var("CADENCE_LOG_JSON", "on");

        let config = load_from_env().expect("config from env");
        assert_eq!(config.database.path, "/tmp/cadence-test.db");
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(config.sync.webhook_base_url.as_deref(), Some("https://hooks.example.com"));
        assert_eq!(config.sync.task_binding, TaskBindingScope::AllCalendars);
        assert_eq!(config.providers.google.client_id, "google-client");
        assert_eq!(config.scheduler.user_ids, vec![user]);
        assert!(config.logging.json);
        assert_eq!(config.conflicts.buffer_minutes, 15);

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        let saved = std::env::var("CADENCE_DB_PATH").ok();
        std::env::remove_var("CADENCE_DB_PATH");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, CadenceError::Config(msg) if msg.contains("CADENCE_DB_PATH")));

        if let Some(value) = saved {
            std::env::set_var("CADENCE_DB_PATH", value);
        }
    }

    #[test]
    fn test_load_from_env_invalid_values() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CADENCE_DB_PATH", "/tmp/cadence-test.db");
        std::env::set_var("CADENCE_DB_POOL_SIZE", "not-a-number");
        assert!(matches!(load_from_env(), Err(CadenceError::Config(_))));

        std::env::remove_var("CADENCE_DB_POOL_SIZE");
        std::env::set_var("CADENCE_SCHEDULER_USERS", "not-a-uuid");
        assert!(matches!(load_from_env(), Err(CadenceError::Config(_))));

        std::env::remove_var("CADENCE_SCHEDULER_USERS");
        std::env::set_var("CADENCE_WEBHOOK_BASE_URL", "not a url");
        assert!(matches!(load_from_env(), Err(CadenceError::Config(_))));

        clear_env();
    }

    #[test]
    fn test_load_from_file_toml() {
        let mut file = Builder::new().suffix(".toml").tempfile().expect("temp file");
        writeln!(
            file,
            r#"
[database]
path = "cadence.db"

[conflicts]
buffer_minutes = 10

[providers.microsoft]
client_id = "ms-client"
"#
        )
        .expect("write config");

        let config = load_from_file(Some(file.path().to_path_buf())).expect("toml config");
        assert_eq!(config.conflicts.buffer_minutes, 10);
        assert_eq!(config.conflicts.horizon_days, 30);
        assert_eq!(config.providers.microsoft.client_id, "ms-client");
        assert_eq!(config.providers.microsoft.api_base_url, "https://graph.microsoft.com/v1.0");
    }

    #[test]
    fn test_load_from_file_json() {
        let mut file = Builder::new().suffix(".json").tempfile().expect("temp file");
        write!(file, r#"{{"sync": {{"lookahead_days": 90}}, "logging": {{"json": true}}}}"#)
            .expect("write config");

        let config = load_from_file(Some(file.path().to_path_buf())).expect("json config");
        assert_eq!(config.sync.lookahead_days, 90);
        assert!(config.logging.json);
        assert_eq!(config.database.pool_size, 8);
    }

    #[test]
    fn test_load_from_file_invalid_content() {
        let mut file = Builder::new().suffix(".json").tempfile().expect("temp file");
        write!(file, "{{ not json").expect("write config");
        let err = load_from_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, CadenceError::Config(msg) if msg.contains("JSON")));
    }

    #[test]
    fn test_load_from_file_unsupported_extension() {
        let file = NamedTempFile::new().expect("temp file");
        let path = file.path().with_extension("yaml");
        std::fs::write(&path, "database: {}").expect("write config");

        let err = load_from_file(Some(path.clone())).unwrap_err();
        assert!(matches!(err, CadenceError::Config(msg) if msg.contains("yaml")));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_missing_path() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/cadence.toml"))).unwrap_err();
        assert!(matches!(err, CadenceError::Config(msg) if msg.contains("not found")));
    }
}
