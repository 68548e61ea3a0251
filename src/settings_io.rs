use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::config;
use crate::settings::ServiceSettings;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub fn framepump_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(config::logging::APP_DIR_NAME))
}

pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_obj), Value::Object(overlay_obj)) => {
            for (k, v) in overlay_obj {
                match base_obj.get_mut(&k) {
                    Some(existing) => merge_json(existing, v),
                    None => {
                        base_obj.insert(k, v);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}

/// Load settings from `dir/settings.json`.
///
/// A missing file yields defaults. Keys present in the file are merged onto the
/// defaults, so a partial file only overrides what it names. Unparseable JSON or
/// values of the wrong type are an error.
pub fn load_settings_from_dir(dir: &Path) -> Result<ServiceSettings> {
    let settings_path = dir.join(SETTINGS_FILE_NAME);
    if !settings_path.exists() {
        log::debug!("No settings file at {:?}, using defaults", settings_path);
        return Ok(ServiceSettings::default());
    }

    let raw = std::fs::read_to_string(&settings_path)
        .with_context(|| format!("Failed to read settings file: {:?}", settings_path))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in settings file: {:?}", settings_path))?;

    let mut merged = serde_json::to_value(ServiceSettings::default())
        .context("Failed to serialize default settings")?;
    merge_json(&mut merged, value);

    serde_json::from_value(merged)
        .with_context(|| format!("Invalid settings in {:?}", settings_path))
}

/// Write `settings` to `dir/settings.json` as pretty JSON, creating `dir` if needed
pub fn persist_settings(dir: &Path, settings: &ServiceSettings) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create settings directory: {:?}", dir))?;
    let settings_path = dir.join(SETTINGS_FILE_NAME);
    let pretty = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    std::fs::write(&settings_path, pretty)
        .with_context(|| format!("Failed to write settings file: {:?}", settings_path))?;
    Ok(())
}

/// Apply `FRAMEPUMP_*` environment overrides on top of loaded settings
pub fn apply_env_overrides(settings: &mut ServiceSettings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from<F>(settings: &mut ServiceSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(config::env::INTERVAL_ENV) {
        match raw.trim().parse::<u64>() {
            Ok(ms) => settings.interval_ms = ms,
            Err(_) => log::warn!(
                "Ignoring {}={:?}: not a number of milliseconds",
                config::env::INTERVAL_ENV,
                raw
            ),
        }
    }

    if let Some(level) = lookup(config::env::LOG_LEVEL_ENV) {
        settings.log_level = level.trim().to_string();
    }
}

/// Settings from the platform config dir with environment overrides applied
pub fn load_settings() -> Result<ServiceSettings> {
    let mut settings = match framepump_config_dir() {
        Some(dir) => load_settings_from_dir(&dir)?,
        None => {
            log::warn!("Could not find config directory, using default settings");
            ServiceSettings::default()
        }
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overrides_nested_values() {
        let mut base = json!({"interval_ms": 100, "log_level": "info"});
        merge_json(&mut base, json!({"interval_ms": 25}));
        assert_eq!(base, json!({"interval_ms": 25, "log_level": "info"}));
    }

    #[test]
    fn env_overrides_interval_and_level() {
        let mut settings = ServiceSettings::default();
        apply_overrides_from(&mut settings, |key| match key {
            "FRAMEPUMP_INTERVAL_MS" => Some(" 40 ".to_string()),
            "FRAMEPUMP_LOG" => Some("debug".to_string()),
            _ => None,
        });
        assert_eq!(settings.interval_ms, 40);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn invalid_env_interval_is_ignored() {
        let mut settings = ServiceSettings::default();
        apply_overrides_from(&mut settings, |key| {
            (key == "FRAMEPUMP_INTERVAL_MS").then(|| "fast".to_string())
        });
        assert_eq!(settings.interval_ms, 100);
    }
}
