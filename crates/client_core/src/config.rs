use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::import::{FailurePolicy, ImportPolicy, NavigationPolicy};

pub const SETTINGS_FILE: &str = "ledger.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub request_timeout_secs: u64,
    pub import: ImportPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3333".into(),
            auth_token: None,
            request_timeout_secs: 30,
            import: ImportPolicy::default(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Builds the explicit session handed to the service client.
    pub fn session(&self) -> anyhow::Result<Session> {
        Session::new(&self.api_url, self.auth_token.clone())
    }
}

/// Authenticated endpoint the service client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    api_url: String,
    auth_token: Option<String>,
}

impl Session {
    pub fn new(api_url: &str, auth_token: Option<String>) -> anyhow::Result<Self> {
        let parsed = Url::parse(api_url.trim())
            .with_context(|| format!("invalid api url '{api_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported api url scheme '{}' in '{api_url}'",
                parsed.scheme()
            ));
        }

        Ok(Self {
            api_url: parsed.as_str().trim_end_matches('/').to_string(),
            auth_token: auth_token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    auth_token: Option<String>,
    request_timeout_secs: Option<u64>,
    on_failure: Option<String>,
    navigation: Option<String>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    apply_file(&mut settings, Path::new(SETTINGS_FILE));
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub(crate) fn apply_file(settings: &mut Settings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };

    match toml::from_str::<FileSettings>(&raw) {
        Ok(file_cfg) => apply_file_settings(settings, file_cfg),
        Err(err) => warn!("ignoring malformed settings file {}: {err}", path.display()),
    }
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.auth_token {
        settings.auth_token = Some(v);
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(policy) = file_cfg.on_failure.as_deref().and_then(parse_failure_policy) {
        settings.import.on_failure = policy;
    }
    if let Some(policy) = file_cfg.navigation.as_deref().and_then(parse_navigation_policy) {
        settings.import.navigation = policy;
    }
}

pub(crate) fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("LEDGER_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = lookup("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = lookup("LEDGER_AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }
    if let Some(v) = lookup("APP__AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(policy) = lookup("APP__IMPORT_ON_FAILURE")
        .as_deref()
        .and_then(parse_failure_policy)
    {
        settings.import.on_failure = policy;
    }
    if let Some(policy) = lookup("APP__IMPORT_NAVIGATION")
        .as_deref()
        .and_then(parse_navigation_policy)
    {
        settings.import.navigation = policy;
    }
}

fn parse_failure_policy(raw: &str) -> Option<FailurePolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "abort" => Some(FailurePolicy::AbortBatch),
        "continue" | "skip" => Some(FailurePolicy::SkipAndContinue),
        other => {
            warn!("unknown import failure policy '{other}'");
            None
        }
    }
}

fn parse_navigation_policy(raw: &str) -> Option<NavigationPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "each" => Some(NavigationPolicy::AfterEachFile),
        "batch" => Some(NavigationPolicy::AfterBatch),
        other => {
            warn!("unknown import navigation policy '{other}'");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
