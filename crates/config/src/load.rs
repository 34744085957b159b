//! Config loading with strict precedence: env > overrides-json > file > defaults.
//!
//! This module never merges partial values silently past validation: the
//! merged config always runs through `SegmentDbConfig::validate_and_normalize`
//! before being handed back.

use crate::env::{SegmentDbEnv, apply_env_overrides};
use crate::schema::{SegmentDbConfig, ValidatedSegmentDbConfig};
use segmentdb_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use serde::Deserialize;
use std::path::Path;

/// On-disk config file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON config file.
    Json,
    /// TOML config file.
    Toml,
}

/// Loads and validates a config from an optional file, optional overrides
/// JSON document, and the process environment. Precedence (highest first):
/// env > overrides-json > file > defaults.
pub fn load_segmentdb_config_std_env(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedSegmentDbConfig, ErrorEnvelope> {
    let env = SegmentDbEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_segmentdb_config_from_path(config_path, overrides_json, &env)
}

/// Same as [`load_segmentdb_config_std_env`] but takes an already-parsed env
/// snapshot and a config file path.
pub fn load_segmentdb_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &SegmentDbEnv,
) -> Result<ValidatedSegmentDbConfig, ErrorEnvelope> {
    let file_contents = config_path.map(read_config_file).transpose()?;
    let config_json = file_contents
        .map(|(contents, format)| match format {
            ConfigFormat::Json => Ok(contents),
            ConfigFormat::Toml => toml_to_json(&contents),
        })
        .transpose()?;

    load_segmentdb_config_from_sources(config_json.as_deref(), overrides_json, env)
}

/// Merges a JSON config document, a JSON overrides document, and an env
/// snapshot, in that ascending order of precedence, then validates.
pub fn load_segmentdb_config_from_sources(
    config_json: Option<&str>,
    overrides_json: Option<&str>,
    env: &SegmentDbEnv,
) -> Result<ValidatedSegmentDbConfig, ErrorEnvelope> {
    let base = parse_config_unvalidated(config_json)?;
    let with_overrides = apply_overrides(base, overrides_json)?;
    apply_env_overrides(with_overrides, env)
}

fn parse_config_unvalidated(config_json: Option<&str>) -> Result<SegmentDbConfig, ErrorEnvelope> {
    match config_json {
        None => Ok(SegmentDbConfig::default()),
        Some(contents) => serde_json::from_str(contents).map_err(|error| {
            ErrorEnvelope::expected(ErrorCode::new("config", "invalid_json"), error.to_string())
                .with_metadata("source", "file")
        }),
    }
}

/// All-optional mirror of `SegmentDbConfig`, used for the overrides-JSON layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct SegmentDbConfigOverrides {
    cache: CacheOverrides,
    gpu: GpuOverrides,
    storage: StorageOverrides,
    wal: WalOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct CacheOverrides {
    cache_size: Option<u64>,
    insert_buffer_size: Option<u64>,
    preload_collection: Option<Vec<Box<str>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct GpuOverrides {
    enable: Option<bool>,
    cache_size: Option<u64>,
    gpu_search_threshold: Option<u32>,
    search_devices: Option<Vec<u32>>,
    build_index_devices: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct StorageOverrides {
    path: Option<Box<str>>,
    auto_flush_interval: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct WalOverrides {
    enable: Option<bool>,
    buffer_size: Option<u64>,
    path: Option<Box<str>>,
}

fn apply_overrides(
    mut config: SegmentDbConfig,
    overrides_json: Option<&str>,
) -> Result<SegmentDbConfig, ErrorEnvelope> {
    let Some(contents) = overrides_json else {
        return Ok(config);
    };

    let overrides: SegmentDbConfigOverrides = serde_json::from_str(contents).map_err(|error| {
        ErrorEnvelope::expected(ErrorCode::new("config", "invalid_json"), error.to_string())
            .with_metadata("source", "overrides")
    })?;

    if let Some(value) = overrides.cache.cache_size {
        config.cache.cache_size = value;
    }
    if let Some(value) = overrides.cache.insert_buffer_size {
        config.cache.insert_buffer_size = value;
    }
    if let Some(value) = overrides.cache.preload_collection {
        config.cache.preload_collection = value;
    }

    if let Some(value) = overrides.gpu.enable {
        config.gpu.enable = value;
    }
    if let Some(value) = overrides.gpu.cache_size {
        config.gpu.cache_size = value;
    }
    if let Some(value) = overrides.gpu.gpu_search_threshold {
        config.gpu.gpu_search_threshold = value;
    }
    if let Some(value) = overrides.gpu.search_devices {
        config.gpu.search_devices = value;
    }
    if let Some(value) = overrides.gpu.build_index_devices {
        config.gpu.build_index_devices = value;
    }

    if let Some(value) = overrides.storage.path {
        config.storage.path = value;
    }
    if let Some(value) = overrides.storage.auto_flush_interval {
        config.storage.auto_flush_interval = value;
    }

    if let Some(value) = overrides.wal.enable {
        config.wal.enable = value;
    }
    if let Some(value) = overrides.wal.buffer_size {
        config.wal.buffer_size = value;
    }
    if let Some(value) = overrides.wal.path {
        config.wal.path = value;
    }

    Ok(config)
}

fn toml_to_json(contents: &str) -> Result<String, ErrorEnvelope> {
    let value: toml::Value = toml::from_str(contents).map_err(|error| {
        ErrorEnvelope::expected(ErrorCode::new("config", "invalid_toml"), error.to_string())
            .with_metadata("source", "file")
    })?;
    serde_json::to_string(&value).map_err(|error| {
        ErrorEnvelope::unexpected(ErrorCode::new("core", "internal"), error.to_string(), ErrorClass::NonRetriable)
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        other => Err(
            ErrorEnvelope::expected(ErrorCode::new("config", "unknown_format"), "cannot detect config file format")
                .with_metadata("path", path.display().to_string())
                .with_metadata("extension", other.unwrap_or("").to_owned()),
        ),
    }
}

fn read_config_file(path: &Path) -> Result<(String, ConfigFormat), ErrorEnvelope> {
    let format = detect_config_format(path)?;
    let contents = std::fs::read_to_string(path).map_err(|error| {
        ErrorEnvelope::expected(ErrorCode::new("config", "read_failed"), error.to_string())
            .with_metadata("path", path.display().to_string())
    })?;
    Ok((contents, format))
}

/// Serializes a validated config back to pretty-printed JSON.
pub fn to_pretty_json(config: &ValidatedSegmentDbConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config.as_ref()).map_err(|error| {
        ErrorEnvelope::unexpected(ErrorCode::new("core", "internal"), error.to_string(), ErrorClass::NonRetriable)
    })?;
    output.push('\n');
    Ok(output)
}

/// Serializes a validated config back to pretty-printed TOML.
pub fn to_pretty_toml(config: &ValidatedSegmentDbConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config.as_ref()).map_err(|error| {
        ErrorEnvelope::unexpected(ErrorCode::new("config", "serialize_toml"), error.to_string(), ErrorClass::NonRetriable)
    })?;
    output.push('\n');
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn env_with(pairs: &[(&str, &str)]) -> SegmentDbEnv {
        let map = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        SegmentDbEnv::from_map(&map).expect("valid test env")
    }

    #[test]
    fn override_precedence_is_deterministic() -> Result<(), Box<dyn Error>> {
        let file = serde_json::json!({ "cache": { "cacheSize": 100_000_000 } }).to_string();
        let overrides = serde_json::json!({ "cache": { "cacheSize": 200_000_000 } }).to_string();
        let env = env_with(&[("SEGMENTDB_CACHE_CACHE_SIZE", "300000000")]);

        let config = load_segmentdb_config_from_sources(Some(&file), Some(&overrides), &env)?;
        assert_eq!(config.cache.cache_size, 300_000_000);

        let config = load_segmentdb_config_from_sources(Some(&file), Some(&overrides), &SegmentDbEnv::default())?;
        assert_eq!(config.cache.cache_size, 200_000_000);

        let config = load_segmentdb_config_from_sources(Some(&file), None, &SegmentDbEnv::default())?;
        assert_eq!(config.cache.cache_size, 100_000_000);

        Ok(())
    }

    #[test]
    fn missing_sources_use_defaults() -> Result<(), Box<dyn Error>> {
        let config = load_segmentdb_config_from_sources(None, None, &SegmentDbEnv::default())?;
        assert_eq!(config.as_ref(), &SegmentDbConfig::default());
        Ok(())
    }

    #[test]
    fn invalid_file_value_overridden_by_valid_env_succeeds() -> Result<(), Box<dyn Error>> {
        let file = serde_json::json!({ "cache": { "cacheSize": 1 } }).to_string();
        let env = env_with(&[("SEGMENTDB_CACHE_CACHE_SIZE", "134217728")]);

        let config = load_segmentdb_config_from_sources(Some(&file), None, &env)?;
        assert_eq!(config.cache.cache_size, 134_217_728);

        Ok(())
    }

    #[test]
    fn malformed_overrides_json_reports_source() {
        let result = load_segmentdb_config_from_sources(None, Some("not json"), &SegmentDbEnv::default());
        let error = result.err().expect("expected malformed overrides error");
        assert_eq!(error.code, ErrorCode::new("config", "invalid_json"));
        assert_eq!(error.metadata.get("source").map(String::as_str), Some("overrides"));
    }

    #[test]
    fn serialization_round_trips() -> Result<(), Box<dyn Error>> {
        let config = load_segmentdb_config_from_sources(None, None, &SegmentDbEnv::default())?;
        let json = to_pretty_json(&config)?;
        let reparsed = crate::schema::parse_segmentdb_config_json(&json)?;
        assert_eq!(reparsed.as_ref(), config.as_ref());
        Ok(())
    }
}
