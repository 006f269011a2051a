use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use client_core::{ControllerSettings, RetryPolicy};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "contacts.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_latency_ms: u64,
    pub filter_quiescence_ms: u64,
    pub filter_settle_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_delay_ms: u64,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_latency_ms: 1000,
            filter_quiescence_ms: 200,
            filter_settle_ms: 500,
            retry_max_attempts: 3,
            retry_delay_ms: 250,
            log_level: "info".into(),
        }
    }
}

impl Settings {
    pub fn store_latency(&self) -> Duration {
        Duration::from_millis(self.store_latency_ms)
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            filter_quiescence: Duration::from_millis(self.filter_quiescence_ms),
            filter_settle: Duration::from_millis(self.filter_settle_ms),
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                delay: Duration::from_millis(self.retry_delay_ms),
            },
        }
    }
}

/// Settings plus the overrides that were ignored while loading them.
///
/// Logging is configured from the loaded settings, so problems are reported
/// once the subscriber is up.
#[derive(Debug)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub source: Option<PathBuf>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    store_latency_ms: Option<u64>,
    filter_quiescence_ms: Option<u64>,
    filter_settle_ms: Option<u64>,
    retry_max_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
    log_level: Option<String>,
}

/// Defaults, then the TOML file, then `APP__*` environment variables.
///
/// An explicitly requested file must exist; the default `contacts.toml` is
/// optional.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<LoadedSettings> {
    let mut settings = Settings::default();
    let mut source = None;

    let (path, required) = match explicit_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => {
            apply_file(&mut settings, &raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
            source = Some(path);
        }
        Err(err) if required => {
            return Err(err).with_context(|| format!("failed to read config file '{}'", path.display()));
        }
        Err(_) => {}
    }

    let warnings = apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(LoadedSettings {
        settings,
        source,
        warnings,
    })
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.store_latency_ms {
        settings.store_latency_ms = v;
    }
    if let Some(v) = file_cfg.filter_quiescence_ms {
        settings.filter_quiescence_ms = v;
    }
    if let Some(v) = file_cfg.filter_settle_ms {
        settings.filter_settle_ms = v;
    }
    if let Some(v) = file_cfg.retry_max_attempts {
        settings.retry_max_attempts = v;
    }
    if let Some(v) = file_cfg.retry_delay_ms {
        settings.retry_delay_ms = v;
    }
    if let Some(v) = file_cfg.log_level {
        settings.log_level = v;
    }
    Ok(())
}

fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    override_number(&lookup, "APP__STORE_LATENCY_MS", &mut settings.store_latency_ms, &mut warnings);
    override_number(
        &lookup,
        "APP__FILTER_QUIESCENCE_MS",
        &mut settings.filter_quiescence_ms,
        &mut warnings,
    );
    override_number(
        &lookup,
        "APP__FILTER_SETTLE_MS",
        &mut settings.filter_settle_ms,
        &mut warnings,
    );
    override_number(
        &lookup,
        "APP__RETRY_MAX_ATTEMPTS",
        &mut settings.retry_max_attempts,
        &mut warnings,
    );
    override_number(&lookup, "APP__RETRY_DELAY_MS", &mut settings.retry_delay_ms, &mut warnings);

    if let Some(v) = lookup("APP__LOG_LEVEL") {
        settings.log_level = v;
    }

    warnings
}

fn override_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
    warnings: &mut Vec<String>,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => warnings.push(format!("ignoring {key}={raw:?}: not a valid number")),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
