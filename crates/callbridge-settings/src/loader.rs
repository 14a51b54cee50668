//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CallbridgeSettings::default()`]
//! 2. If a settings file is given and exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::CallbridgeSettings;

/// Load defaults plus environment overrides, no file.
pub fn load_settings() -> Result<CallbridgeSettings> {
    load_settings_with(None, |name| std::env::var(name).ok())
}

/// Load from `path` (if it exists) plus environment overrides.
pub fn load_settings_from_path(path: &Path) -> Result<CallbridgeSettings> {
    load_settings_with(Some(path), |name| std::env::var(name).ok())
}

/// Same as [`load_settings_from_path`] with an injectable env lookup.
pub fn load_settings_with(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<CallbridgeSettings> {
    let defaults = serde_json::to_value(CallbridgeSettings::default())?;

    let merged = match path {
        Some(path) if path.exists() => {
            debug!(?path, "loading settings from file");
            let content = std::fs::read_to_string(path)?;
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        }
        Some(path) => {
            debug!(?path, "settings file not found, using defaults");
            defaults
        }
        None => defaults,
    };

    let mut settings: CallbridgeSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides. Unparseable or out-of-range values are
/// logged and ignored.
pub fn apply_env_overrides(settings: &mut CallbridgeSettings, env: impl Fn(&str) -> Option<String>) {
    let env = EnvReader(env);

    if let Some(v) = env.u64_in("PORT", 1, 65_535) {
        settings.server.port = v as u16;
    }
    if let Some(v) = env.string("CALLBRIDGE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.string("CALLBRIDGE_STATIC_DIR") {
        settings.server.static_dir = PathBuf::from(v);
    }
    if let Some(v) = env.u64_in("CALLBRIDGE_SEND_QUEUE", 1, 65_536) {
        settings.server.max_send_queue = v as usize;
    }
    if let Some(v) = env.u64_in("CALLBRIDGE_SESSION_TTL_SECS", 1, 7 * 24 * 3600) {
        settings.session.ttl_secs = v;
    }
    if let Some(v) = env.u64_in("CALLBRIDGE_SWEEP_INTERVAL_SECS", 1, 3600) {
        settings.session.sweep_interval_secs = v;
    }
    if let Some(v) = env.string("CALLBRIDGE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("CALLBRIDGE_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F>(F);

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, min, max, "invalid integer env var, ignoring");
        }
        result
    }
}
