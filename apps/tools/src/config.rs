use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use client_core::EditorConfig;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "tierlist.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub commit_debounce_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/tierlist.db".into(),
            commit_debounce_ms: 300,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn editor_config(&self) -> EditorConfig {
        EditorConfig {
            commit_debounce: Duration::from_millis(self.commit_debounce_ms),
        }
    }
}

/// Defaults, then the flat TOML file at `path`, then environment overrides.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, String>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!("config: ignoring unreadable settings file: {err}");
            return;
        }
    };
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("commit_debounce_ms") {
        set_debounce(settings, v);
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("APP__COMMIT_DEBOUNCE_MS") {
        set_debounce(settings, &v);
    }
    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

fn set_debounce(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<u64>() {
        Ok(parsed) => settings.commit_debounce_ms = parsed,
        Err(_) => warn!("config: ignoring invalid commit_debounce_ms={raw}"),
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
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
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn temp_root(label: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        env::temp_dir().join(format!("tierlist_{label}_{suffix}"))
    }

    #[test]
    fn normalizes_plain_file_path_to_sqlite_url() {
        assert_eq!(
            normalize_database_url("./data/test.db"),
            "sqlite://./data/test.db"
        );
        assert_eq!(
            normalize_database_url("sqlite:lists.db"),
            "sqlite://lists.db"
        );
        assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_database_url("  "),
            Settings::default().database_url
        );
    }

    #[test]
    fn file_then_env_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "database_url = \"sqlite://./file.db\"\ncommit_debounce_ms = \"150\"\n",
        );
        assert_eq!(settings.database_url, "sqlite://./file.db");
        assert_eq!(settings.commit_debounce_ms, 150);

        apply_env(&mut settings, |key| match key {
            "DATABASE_URL" => Some("sqlite://./plain.db".into()),
            "APP__DATABASE_URL" => Some("sqlite://./app.db".into()),
            "APP__LOG_FILTER" => Some("debug".into()),
            _ => None,
        });
        assert_eq!(settings.database_url, "sqlite://./app.db");
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(
            settings.editor_config().commit_debounce,
            Duration::from_millis(150)
        );
    }

    #[test]
    fn invalid_values_keep_previous_setting() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "this is not toml = [");
        apply_env(&mut settings, |key| {
            (key == "APP__COMMIT_DEBOUNCE_MS").then(|| "soon".to_string())
        });
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn load_settings_reads_the_given_file() {
        let root = temp_root("config");
        fs::create_dir_all(&root).expect("temp root");
        let path = root.join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "log_filter = \"warn\"\n").expect("write config");

        let settings = load_settings(&path);
        let expected = env::var("APP__LOG_FILTER").unwrap_or_else(|_| "warn".into());
        assert_eq!(settings.log_filter, expected);

        fs::remove_dir_all(root).expect("cleanup");
    }

    #[test]
    fn creates_parent_dir_for_sqlite_url() {
        let root = temp_root("db");
        let db_path = root.join("nested").join("lists.db");
        let url = prepare_database_url(&db_path.to_string_lossy()).expect("prepare db url");

        assert!(url.starts_with("sqlite://"));
        assert!(root.join("nested").exists());

        fs::remove_dir_all(root).expect("cleanup");
    }
}
