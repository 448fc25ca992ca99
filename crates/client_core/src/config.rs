use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::{error::ClientError, orders::DEFAULT_ORDER_WINDOW_TOLERANCE};

pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base_url: String,
    pub session_database_url: String,
    /// Slack, in timestamp units, applied on both ends of an order window.
    pub order_window_tolerance: f64,
    pub notification_life_ms: u64,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".into(),
            session_database_url: "sqlite://./data/session.db".into(),
            order_window_tolerance: DEFAULT_ORDER_WINDOW_TOLERANCE,
            notification_life_ms: 2000,
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    session_database_url: Option<String>,
    order_window_tolerance: Option<f64>,
    notification_life_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn notification_life(&self) -> Duration {
        Duration::from_millis(self.notification_life_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Base URL without the trailing slash, ready for `format!("{base}{route}")`.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let url = Url::parse(&self.api_base_url).map_err(|e| {
            ClientError::Config(format!("api_base_url '{}': {e}", self.api_base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "api_base_url '{}' must use http or https",
                self.api_base_url
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ClientError::Config(format!(
                "api_base_url '{}' must not carry a query or fragment",
                self.api_base_url
            )));
        }
        if !self.order_window_tolerance.is_finite() || self.order_window_tolerance < 0.0 {
            return Err(ClientError::Config(format!(
                "order_window_tolerance must be a non-negative number, got {}",
                self.order_window_tolerance
            )));
        }
        Ok(())
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the optional TOML file, then environment overrides.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(err) => warn!(path = %path.display(), error = %err, "ignoring unreadable settings file"),
        }
    }

    apply_env(&mut settings, env);
    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.session_database_url {
        settings.session_database_url = v;
    }
    if let Some(v) = file_cfg.order_window_tolerance {
        settings.order_window_tolerance = v;
    }
    if let Some(v) = file_cfg.notification_life_ms {
        settings.notification_life_ms = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = Some(v);
    }
}

fn apply_env(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("ORDERING_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("SESSION_DATABASE_URL") {
        settings.session_database_url = v;
    }
    if let Some(v) = env("APP__SESSION_DATABASE_URL") {
        settings.session_database_url = v;
    }

    if let Some(v) = env("APP__ORDER_WINDOW_TOLERANCE") {
        if let Ok(parsed) = v.parse::<f64>() {
            settings.order_window_tolerance = parsed;
        }
    }

    if let Some(v) = env("APP__NOTIFICATION_LIFE_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.notification_life_ms = parsed;
        }
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = Some(parsed);
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
