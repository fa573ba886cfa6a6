//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PanelSettings::default()`]
//! 2. If the config file exists, lift its flat legacy keys and deep-merge its
//!    values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::PanelSettings;

/// Env var that points at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "WEBPANEL_CONFIG";

/// Resolve the config file path (`$WEBPANEL_CONFIG` or `./config.json`).
pub fn settings_path() -> PathBuf {
    read_env_string(CONFIG_PATH_ENV).map_or_else(|| PathBuf::from("config.json"), PathBuf::from)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PanelSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<PanelSettings> {
    let defaults = serde_json::to_value(PanelSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, lift_legacy_keys(user)?)
    } else {
        debug!(?path, "config file not found, using defaults");
        defaults
    };

    let mut settings: PanelSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Move the flat top-level keys of older config files into their sections.
///
/// `port` (a string or number, empty meaning unset), `debug` and `camera_ip`
/// become `server.port`, `server.debug` and `camera.ip`. A key already present
/// in its section wins over the flat one.
pub fn lift_legacy_keys(value: Value) -> Result<Value> {
    let Value::Object(mut root) = value else {
        return Ok(value);
    };

    let port = match root.remove("port") {
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(Value::from(s.trim().parse::<u16>().map_err(|_| {
            SettingsError::InvalidValue(format!("port: {s:?} is not a valid port"))
        })?)),
        Some(Value::Null) | None => None,
        Some(other) => Some(other),
    };
    let moves = [
        ("server", "port", port),
        ("server", "debug", root.remove("debug")),
        ("camera", "ip", root.remove("camera_ip")),
    ];

    for (section, key, val) in moves {
        let Some(val) = val.filter(|v| !v.is_null()) else {
            continue;
        };
        debug!(section, key, "lifting flat config key");
        let entry = root
            .entry(section)
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(map) = entry {
            let _ = map.entry(key).or_insert(val);
        }
    }
    Ok(Value::Object(root))
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut PanelSettings) {
    if let Some(v) = read_env_string("WEBPANEL_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("WEBPANEL_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_bool("WEBPANEL_DEBUG") {
        settings.server.debug = v;
    }
    if let Some(v) = read_env_string("WEBPANEL_CAMERA_IP") {
        settings.camera.ip = v;
    }
    if let Some(v) = read_env_string("WEBPANEL_RECORDINGS_DIR") {
        settings.camera.recordings_dir = v;
    }
    if let Some(v) = read_env_string("WEBPANEL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("WEBPANEL_LOG_JSON") {
        settings.logging.json = v;
    }
    if let Some(v) = read_env_u64("WEBPANEL_BROADCAST_INTERVAL", 1, 3600) {
        settings.websocket.broadcast_interval_secs = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}
