use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use client_core::{ControllerSettings, LogRetention};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "console.toml";

/// Shape of `console.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub backend_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub log_display_limit: Option<usize>,
    pub log_retention: Option<RetentionSetting>,
    pub stopped_run_status: Option<String>,
}

/// `log_retention = 500` or `log_retention = "unbounded"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RetentionSetting {
    Entries(usize),
    Keyword(String),
}

impl RetentionSetting {
    fn resolve(&self) -> Option<LogRetention> {
        match self {
            Self::Entries(capacity) => Some(LogRetention::Bounded(*capacity)),
            Self::Keyword(raw) => parse_retention(raw),
        }
    }
}

/// Resolves controller settings from defaults, the config file and the environment.
///
/// An explicit `path` must exist. Without one, a missing `console.toml` in the
/// working directory is not an error.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ControllerSettings> {
    let mut settings = ControllerSettings::default();

    let (file, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    if let Some(file_cfg) = read_file_config(&file, required)? {
        apply_file_config(&mut settings, file_cfg);
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn read_file_config(path: &Path, required: bool) -> anyhow::Result<Option<FileConfig>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound && !required => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read config '{}'", path.display()))
        }
    };
    let file_cfg = toml::from_str::<FileConfig>(&raw)
        .with_context(|| format!("failed to parse config '{}'", path.display()))?;
    Ok(Some(file_cfg))
}

pub fn apply_file_config(settings: &mut ControllerSettings, file_cfg: FileConfig) {
    if let Some(v) = file_cfg.backend_url {
        settings.backend_url = v;
    }
    if let Some(v) = file_cfg.poll_interval_ms {
        set_poll_interval(settings, v, "poll_interval_ms");
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        set_request_timeout(settings, v, "request_timeout_secs");
    }
    if let Some(v) = file_cfg.log_display_limit {
        set_display_limit(settings, v, "log_display_limit");
    }
    if let Some(v) = file_cfg.log_retention {
        match v.resolve() {
            Some(retention) => settings.log_retention = retention,
            None => warn!(value = ?v, "config: ignoring invalid log_retention"),
        }
    }
    if let Some(v) = file_cfg.stopped_run_status {
        settings.stopped_run_status = v;
    }
}

/// Environment beats the file. `lookup` is `std::env::var` outside tests.
pub fn apply_env_overrides(
    settings: &mut ControllerSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("ROBOT_CONSOLE_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = lookup("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = lookup("APP__POLL_INTERVAL_MS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => set_poll_interval(settings, parsed, "APP__POLL_INTERVAL_MS"),
            Err(_) => warn!(value = %v, "config: ignoring invalid APP__POLL_INTERVAL_MS"),
        }
    }
    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => set_request_timeout(settings, parsed, "APP__REQUEST_TIMEOUT_SECS"),
            Err(_) => warn!(value = %v, "config: ignoring invalid APP__REQUEST_TIMEOUT_SECS"),
        }
    }
    if let Some(v) = lookup("APP__LOG_DISPLAY_LIMIT") {
        match v.trim().parse::<usize>() {
            Ok(parsed) => set_display_limit(settings, parsed, "APP__LOG_DISPLAY_LIMIT"),
            Err(_) => warn!(value = %v, "config: ignoring invalid APP__LOG_DISPLAY_LIMIT"),
        }
    }
    if let Some(v) = lookup("APP__LOG_RETENTION") {
        match parse_retention(&v) {
            Some(retention) => settings.log_retention = retention,
            None => warn!(value = %v, "config: ignoring invalid APP__LOG_RETENTION"),
        }
    }
}

pub fn parse_retention(raw: &str) -> Option<LogRetention> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("unbounded") {
        return Some(LogRetention::Unbounded);
    }
    raw.parse::<usize>().ok().map(LogRetention::Bounded)
}

fn set_poll_interval(settings: &mut ControllerSettings, millis: u64, source: &str) {
    if millis == 0 {
        warn!(source, "config: ignoring zero poll interval");
        return;
    }
    settings.poll_interval = Duration::from_millis(millis);
}

fn set_request_timeout(settings: &mut ControllerSettings, secs: u64, source: &str) {
    if secs == 0 {
        warn!(source, "config: ignoring zero request timeout");
        return;
    }
    settings.request_timeout = Duration::from_secs(secs);
}

fn set_display_limit(settings: &mut ControllerSettings, limit: usize, source: &str) {
    if limit == 0 {
        warn!(source, "config: ignoring zero log display limit");
        return;
    }
    settings.log_display_limit = limit;
}
