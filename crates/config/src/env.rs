//! Environment-variable overrides for `SegmentDbConfig`.
//!
//! Every key is read from a `SEGMENTDB_<SECTION>_<FIELD>` environment
//! variable. Parsing is strict: a present-but-malformed value is an error,
//! never a silent fallback to the default.

use crate::schema::{SegmentDbConfig, ValidatedSegmentDbConfig};
use segmentdb_shared::{ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::fmt;

/// Env var for `cache.cache_size`.
pub const ENV_CACHE_CACHE_SIZE: &str = "SEGMENTDB_CACHE_CACHE_SIZE";
/// Env var for `cache.insert_buffer_size`.
pub const ENV_CACHE_INSERT_BUFFER_SIZE: &str = "SEGMENTDB_CACHE_INSERT_BUFFER_SIZE";
/// Env var for `cache.preload_collection`.
pub const ENV_CACHE_PRELOAD_COLLECTION: &str = "SEGMENTDB_CACHE_PRELOAD_COLLECTION";

/// Env var for `gpu.enable`.
pub const ENV_GPU_ENABLE: &str = "SEGMENTDB_GPU_ENABLE";
/// Env var for `gpu.cache_size`.
pub const ENV_GPU_CACHE_SIZE: &str = "SEGMENTDB_GPU_CACHE_SIZE";
/// Env var for `gpu.gpu_search_threshold`.
pub const ENV_GPU_SEARCH_THRESHOLD: &str = "SEGMENTDB_GPU_GPU_SEARCH_THRESHOLD";
/// Env var for `gpu.search_devices`.
pub const ENV_GPU_SEARCH_DEVICES: &str = "SEGMENTDB_GPU_SEARCH_DEVICES";
/// Env var for `gpu.build_index_devices`.
pub const ENV_GPU_BUILD_INDEX_DEVICES: &str = "SEGMENTDB_GPU_BUILD_INDEX_DEVICES";

/// Env var for `storage.path`.
pub const ENV_STORAGE_PATH: &str = "SEGMENTDB_STORAGE_PATH";
/// Env var for `storage.auto_flush_interval`.
pub const ENV_STORAGE_AUTO_FLUSH_INTERVAL: &str = "SEGMENTDB_STORAGE_AUTO_FLUSH_INTERVAL";

/// Env var for `wal.enable`.
pub const ENV_WAL_ENABLE: &str = "SEGMENTDB_WAL_ENABLE";
/// Env var for `wal.buffer_size`.
pub const ENV_WAL_BUFFER_SIZE: &str = "SEGMENTDB_WAL_BUFFER_SIZE";
/// Env var for `wal.path`.
pub const ENV_WAL_PATH: &str = "SEGMENTDB_WAL_PATH";

const ALL_ENV_KEYS: &[&str] = &[
    ENV_CACHE_CACHE_SIZE,
    ENV_CACHE_INSERT_BUFFER_SIZE,
    ENV_CACHE_PRELOAD_COLLECTION,
    ENV_GPU_ENABLE,
    ENV_GPU_CACHE_SIZE,
    ENV_GPU_SEARCH_THRESHOLD,
    ENV_GPU_SEARCH_DEVICES,
    ENV_GPU_BUILD_INDEX_DEVICES,
    ENV_STORAGE_PATH,
    ENV_STORAGE_AUTO_FLUSH_INTERVAL,
    ENV_WAL_ENABLE,
    ENV_WAL_BUFFER_SIZE,
    ENV_WAL_PATH,
];

/// Every config field as it may be supplied via the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentDbEnv {
    /// Override for `cache.cache_size`.
    pub cache_cache_size: Option<u64>,
    /// Override for `cache.insert_buffer_size`.
    pub cache_insert_buffer_size: Option<u64>,
    /// Override for `cache.preload_collection`.
    pub cache_preload_collection: Option<Vec<Box<str>>>,
    /// Override for `gpu.enable`.
    pub gpu_enable: Option<bool>,
    /// Override for `gpu.cache_size`.
    pub gpu_cache_size: Option<u64>,
    /// Override for `gpu.gpu_search_threshold`.
    pub gpu_search_threshold: Option<u32>,
    /// Override for `gpu.search_devices`.
    pub gpu_search_devices: Option<Vec<u32>>,
    /// Override for `gpu.build_index_devices`.
    pub gpu_build_index_devices: Option<Vec<u32>>,
    /// Override for `storage.path`.
    pub storage_path: Option<Box<str>>,
    /// Override for `storage.auto_flush_interval`.
    pub storage_auto_flush_interval: Option<u64>,
    /// Override for `wal.enable`.
    pub wal_enable: Option<bool>,
    /// Override for `wal.buffer_size`.
    pub wal_buffer_size: Option<u64>,
    /// Override for `wal.path`.
    pub wal_path: Option<Box<str>>,
}

/// Failure parsing a single environment variable's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// Value could not be parsed as the expected scalar type.
    InvalidValue {
        /// Environment variable name.
        key: &'static str,
        /// Raw value that failed to parse.
        value: String,
    },
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(formatter, "environment variable {key} has invalid value {value:?}")
            },
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let EnvParseError::InvalidValue { key, value } = &error;
        ErrorEnvelope::expected(ErrorCode::new("config", "invalid_env_value"), error.to_string())
            .with_metadata("key", *key)
            .with_metadata("value", value.clone())
    }
}

fn parse_u64(map: &BTreeMap<String, String>, key: &'static str) -> Result<Option<u64>, EnvParseError> {
    let Some(raw) = map.get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidValue {
            key,
            value: raw.clone(),
        })
}

fn parse_u32(map: &BTreeMap<String, String>, key: &'static str) -> Result<Option<u32>, EnvParseError> {
    let Some(raw) = map.get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidValue {
            key,
            value: raw.clone(),
        })
}

fn parse_bool(map: &BTreeMap<String, String>, key: &'static str) -> Result<Option<bool>, EnvParseError> {
    let Some(raw) = map.get(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(EnvParseError::InvalidValue {
            key,
            value: raw.clone(),
        }),
    }
}

fn parse_string(map: &BTreeMap<String, String>, key: &'static str) -> Option<Box<str>> {
    map.get(key)
        .map(|raw| raw.trim().to_owned().into_boxed_str())
}

fn parse_csv_u32(map: &BTreeMap<String, String>, key: &'static str) -> Result<Option<Vec<u32>>, EnvParseError> {
    let Some(raw) = map.get(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Some(Vec::new()));
    }
    let mut values = Vec::new();
    for part in trimmed.split(',') {
        let part = part.trim();
        let parsed = part.parse::<u32>().map_err(|_| EnvParseError::InvalidValue {
            key,
            value: raw.clone(),
        })?;
        values.push(parsed);
    }
    Ok(Some(values))
}

fn parse_csv_boxed_str(map: &BTreeMap<String, String>, key: &'static str) -> Option<Vec<Box<str>>> {
    let raw = map.get(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    Some(
        trimmed
            .split(',')
            .map(|part| part.trim().to_owned().into_boxed_str())
            .collect(),
    )
}

impl SegmentDbEnv {
    /// Parse an environment snapshot from an arbitrary string map (used in tests).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            cache_cache_size: parse_u64(map, ENV_CACHE_CACHE_SIZE)?,
            cache_insert_buffer_size: parse_u64(map, ENV_CACHE_INSERT_BUFFER_SIZE)?,
            cache_preload_collection: parse_csv_boxed_str(map, ENV_CACHE_PRELOAD_COLLECTION),
            gpu_enable: parse_bool(map, ENV_GPU_ENABLE)?,
            gpu_cache_size: parse_u64(map, ENV_GPU_CACHE_SIZE)?,
            gpu_search_threshold: parse_u32(map, ENV_GPU_SEARCH_THRESHOLD)?,
            gpu_search_devices: parse_csv_u32(map, ENV_GPU_SEARCH_DEVICES)?,
            gpu_build_index_devices: parse_csv_u32(map, ENV_GPU_BUILD_INDEX_DEVICES)?,
            storage_path: parse_string(map, ENV_STORAGE_PATH),
            storage_auto_flush_interval: parse_u64(map, ENV_STORAGE_AUTO_FLUSH_INTERVAL)?,
            wal_enable: parse_bool(map, ENV_WAL_ENABLE)?,
            wal_buffer_size: parse_u64(map, ENV_WAL_BUFFER_SIZE)?,
            wal_path: parse_string(map, ENV_WAL_PATH),
        })
    }

    /// Parse an environment snapshot from the process's actual environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for &key in ALL_ENV_KEYS {
            if let Ok(value) = std::env::var(key) {
                map.insert(key.to_owned(), value);
            }
        }
        Self::from_map(&map)
    }
}

/// Applies environment overrides onto a base config, then validates.
pub fn apply_env_overrides(
    mut config: SegmentDbConfig,
    env: &SegmentDbEnv,
) -> Result<ValidatedSegmentDbConfig, ErrorEnvelope> {
    if let Some(value) = env.cache_cache_size {
        config.cache.cache_size = value;
    }
    if let Some(value) = env.cache_insert_buffer_size {
        config.cache.insert_buffer_size = value;
    }
    if let Some(value) = &env.cache_preload_collection {
        config.cache.preload_collection = value.clone();
    }

    if let Some(value) = env.gpu_enable {
        config.gpu.enable = value;
    }
    if let Some(value) = env.gpu_cache_size {
        config.gpu.cache_size = value;
    }
    if let Some(value) = env.gpu_search_threshold {
        config.gpu.gpu_search_threshold = value;
    }
    if let Some(value) = &env.gpu_search_devices {
        config.gpu.search_devices = value.clone();
    }
    if let Some(value) = &env.gpu_build_index_devices {
        config.gpu.build_index_devices = value.clone();
    }

    if let Some(value) = &env.storage_path {
        config.storage.path = value.clone();
    }
    if let Some(value) = env.storage_auto_flush_interval {
        config.storage.auto_flush_interval = value;
    }

    if let Some(value) = env.wal_enable {
        config.wal.enable = value;
    }
    if let Some(value) = env.wal_buffer_size {
        config.wal.buffer_size = value;
    }
    if let Some(value) = &env.wal_path {
        config.wal.path = value.clone();
    }

    config.validate_and_normalize().map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn env_overrides_merge_into_effective_config() -> Result<(), Box<dyn Error>> {
        let mut map = BTreeMap::new();
        map.insert(ENV_CACHE_CACHE_SIZE.to_owned(), "134217728".to_owned());
        map.insert(ENV_GPU_ENABLE.to_owned(), "true".to_owned());
        map.insert(ENV_GPU_SEARCH_DEVICES.to_owned(), "1,0,1".to_owned());
        map.insert(ENV_WAL_ENABLE.to_owned(), "false".to_owned());

        let env = SegmentDbEnv::from_map(&map)?;
        let config = apply_env_overrides(SegmentDbConfig::default(), &env)?;

        assert_eq!(config.cache.cache_size, 134_217_728);
        assert!(config.gpu.enable);
        assert_eq!(config.gpu.search_devices, vec![0, 1]);
        assert!(!config.wal.enable);

        Ok(())
    }

    #[test]
    fn invalid_bool_env_is_rejected() {
        let mut map = BTreeMap::new();
        map.insert(ENV_GPU_ENABLE.to_owned(), "maybe".to_owned());

        let error = SegmentDbEnv::from_map(&map).err();
        assert!(matches!(error, Some(EnvParseError::InvalidValue { key, .. }) if key == ENV_GPU_ENABLE));
    }

    #[test]
    fn env_override_out_of_range_fails_validation() {
        let mut map = BTreeMap::new();
        map.insert(ENV_CACHE_CACHE_SIZE.to_owned(), "1".to_owned());

        let env = SegmentDbEnv::from_map(&map).expect("valid u64");
        let result = apply_env_overrides(SegmentDbConfig::default(), &env);
        let error = result.err().expect("expected validation failure");
        assert_eq!(error.code, ErrorCode::new("config", "limit_out_of_range"));
    }
}
