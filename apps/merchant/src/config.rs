use std::{
    collections::HashMap,
    fs,
    path::Path,
};

use anyhow::Context;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub access_token: Option<String>,
    pub database_url: String,
    pub revalidate_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".into(),
            access_token: None,
            database_url: "sqlite://./data/drafts.db".into(),
            revalidate_url: None,
        }
    }
}

impl Settings {
    pub fn api_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.api_url).with_context(|| format!("invalid api url '{}'", self.api_url))
    }
}

/// Defaults, then `path` if it exists, then environment variables.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        tracing::warn!("config: ignoring unreadable settings file");
        return;
    };
    if let Some(v) = file_cfg.get("api_url") {
        settings.api_url = v.clone();
    }
    if let Some(v) = file_cfg.get("access_token") {
        settings.access_token = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("revalidate_url") {
        settings.revalidate_url = Some(v.clone());
    }
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("MERCHANT_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = lookup("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = lookup("MERCHANT_ACCESS_TOKEN") {
        settings.access_token = Some(v);
    }

    if let Some(v) = lookup("MERCHANT_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = lookup("MERCHANT_REVALIDATE_URL") {
        settings.revalidate_url = Some(v);
    }
}

/// Turns bare paths into `sqlite://` urls; anything with a scheme passes through.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
