//! `segmentdb` configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (JSON and TOML).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Normalization enforces stable ordering for list fields and trims paths.

use segmentdb_domain::CollectionId;
use segmentdb_shared::{BoundedU32, BoundedU64, ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

const CACHE_SIZE_MIN_BYTES: u64 = 64 * 1024 * 1024;
const CACHE_SIZE_MAX_BYTES: u64 = 1024 * 1024 * 1024 * 1024;
const CACHE_INSERT_BUFFER_MIN_BYTES: u64 = 1024 * 1024;
const CACHE_INSERT_BUFFER_MAX_BYTES: u64 = 16 * 1024 * 1024 * 1024;
const CACHE_PRELOAD_COLLECTION_MAX: usize = 256;

const GPU_CACHE_SIZE_MIN_BYTES: u64 = 64 * 1024 * 1024;
const GPU_CACHE_SIZE_MAX_BYTES: u64 = 64 * 1024 * 1024 * 1024;
const GPU_SEARCH_THRESHOLD_MIN: u32 = 1;
const GPU_SEARCH_THRESHOLD_MAX: u32 = 1_000_000;
const GPU_DEVICE_ID_MAX: u32 = 31;
const GPU_DEVICES_MAX: usize = 64;

const STORAGE_AUTO_FLUSH_INTERVAL_MIN_SECS: u64 = 1;
const STORAGE_AUTO_FLUSH_INTERVAL_MAX_SECS: u64 = 86_400;

const WAL_BUFFER_SIZE_MIN_BYTES: u64 = 1024 * 1024;
const WAL_BUFFER_SIZE_MAX_BYTES: u64 = 16 * 1024 * 1024 * 1024;

/// Top-level `segmentdb` configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SegmentDbConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// CPU-side segment cache settings.
    pub cache: CacheConfig,
    /// GPU resource pool settings.
    pub gpu: GpuConfig,
    /// Physical segment storage settings.
    pub storage: StorageConfig,
    /// Write-ahead log settings.
    pub wal: WalConfig,
}

impl Default for SegmentDbConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            cache: CacheConfig::default(),
            gpu: GpuConfig::default(),
            storage: StorageConfig::default(),
            wal: WalConfig::default(),
        }
    }
}

impl SegmentDbConfig {
    /// Validate and normalize the config.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedSegmentDbConfig, ConfigSchemaError> {
        self.validate_version()?;

        self.cache.normalize_and_validate()?;
        self.gpu.validate()?;
        self.storage.validate()?;
        self.wal.validate()?;

        let limits = ConfigLimits::new(&self)?;
        Ok(ValidatedSegmentDbConfig { raw: self, limits })
    }

    const fn validate_version(&self) -> Result<(), ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        Ok(())
    }
}

/// CPU-side segment cache settings (spec section `cache.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CacheConfig {
    /// Total CPU cache budget, in bytes.
    pub cache_size: u64,
    /// Size of the per-collection insert buffer, in bytes.
    pub insert_buffer_size: u64,
    /// Collections to eagerly load into the cache on startup.
    pub preload_collection: Vec<Box<str>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_size: 4 * 1024 * 1024 * 1024,
            insert_buffer_size: 256 * 1024 * 1024,
            preload_collection: Vec::new(),
        }
    }
}

impl CacheConfig {
    fn normalize_and_validate(&mut self) -> Result<(), ConfigSchemaError> {
        validate_limit_u64(
            "cache",
            "cacheSize",
            self.cache_size,
            CACHE_SIZE_MIN_BYTES,
            CACHE_SIZE_MAX_BYTES,
        )?;
        validate_limit_u64(
            "cache",
            "insertBufferSize",
            self.insert_buffer_size,
            CACHE_INSERT_BUFFER_MIN_BYTES,
            CACHE_INSERT_BUFFER_MAX_BYTES,
        )?;

        if self.preload_collection.len() > CACHE_PRELOAD_COLLECTION_MAX {
            return Err(ConfigSchemaError::ListTooLarge {
                section: "cache",
                field: "preloadCollection",
                len: self.preload_collection.len(),
                max: CACHE_PRELOAD_COLLECTION_MAX,
            });
        }

        for raw in &self.preload_collection {
            CollectionId::parse(raw.as_ref()).map_err(|_| {
                ConfigSchemaError::InvalidCollectionId {
                    section: "cache",
                    field: "preloadCollection",
                    value: raw.as_ref().to_owned(),
                }
            })?;
        }

        self.preload_collection.sort_unstable();
        self.preload_collection.dedup();

        Ok(())
    }
}

/// GPU resource pool settings (spec section `gpu.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct GpuConfig {
    /// Whether any GPU resources are used at all.
    pub enable: bool,
    /// Per-GPU cache budget, in bytes.
    pub cache_size: u64,
    /// Query batch size (`nq`) at or above which search is routed to the GPU
    /// resource pool instead of CPU.
    pub gpu_search_threshold: u32,
    /// Device ids eligible to run search passes.
    pub search_devices: Vec<u32>,
    /// Device ids eligible to run index-build passes.
    pub build_index_devices: Vec<u32>,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enable: false,
            cache_size: 1024 * 1024 * 1024,
            gpu_search_threshold: 1_000,
            search_devices: Vec::new(),
            build_index_devices: Vec::new(),
        }
    }
}

impl GpuConfig {
    fn validate(&mut self) -> Result<(), ConfigSchemaError> {
        validate_limit_u64(
            "gpu",
            "cacheSize",
            self.cache_size,
            GPU_CACHE_SIZE_MIN_BYTES,
            GPU_CACHE_SIZE_MAX_BYTES,
        )?;
        validate_limit_u32(
            "gpu",
            "gpuSearchThreshold",
            self.gpu_search_threshold,
            GPU_SEARCH_THRESHOLD_MIN,
            GPU_SEARCH_THRESHOLD_MAX,
        )?;

        validate_device_list("gpu", "searchDevices", &mut self.search_devices)?;
        validate_device_list("gpu", "buildIndexDevices", &mut self.build_index_devices)?;

        Ok(())
    }
}

fn validate_device_list(
    section: &'static str,
    field: &'static str,
    devices: &mut Vec<u32>,
) -> Result<(), ConfigSchemaError> {
    if devices.len() > GPU_DEVICES_MAX {
        return Err(ConfigSchemaError::ListTooLarge {
            section,
            field,
            len: devices.len(),
            max: GPU_DEVICES_MAX,
        });
    }

    for &device in devices.iter() {
        if device > GPU_DEVICE_ID_MAX {
            return Err(ConfigSchemaError::InvalidDeviceId {
                section,
                field,
                device,
                max: GPU_DEVICE_ID_MAX,
            });
        }
    }

    devices.sort_unstable();
    devices.dedup();
    Ok(())
}

/// Physical segment storage settings (spec section `storage.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct StorageConfig {
    /// Root directory under which segment artifacts are written.
    pub path: Box<str>,
    /// Interval, in seconds, between automatic flushes of buffered inserts.
    pub auto_flush_interval: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: Box::from("./data"),
            auto_flush_interval: 60,
        }
    }
}

impl StorageConfig {
    fn validate(&mut self) -> Result<(), ConfigSchemaError> {
        normalize_boxed_str(&mut self.path);

        if self.path.is_empty() {
            return Err(ConfigSchemaError::InvalidPath {
                section: "storage",
                field: "path",
                path: self.path.to_string(),
            });
        }

        validate_limit_u64(
            "storage",
            "autoFlushInterval",
            self.auto_flush_interval,
            STORAGE_AUTO_FLUSH_INTERVAL_MIN_SECS,
            STORAGE_AUTO_FLUSH_INTERVAL_MAX_SECS,
        )?;

        Ok(())
    }
}

/// Write-ahead log settings (spec section `wal.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct WalConfig {
    /// Whether the write-ahead log is enabled.
    pub enable: bool,
    /// WAL in-memory buffer size, in bytes.
    pub buffer_size: u64,
    /// Directory the WAL is persisted under.
    pub path: Box<str>,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            enable: true,
            buffer_size: 64 * 1024 * 1024,
            path: Box::from("./data/wal"),
        }
    }
}

impl WalConfig {
    fn validate(&mut self) -> Result<(), ConfigSchemaError> {
        normalize_boxed_str(&mut self.path);

        if self.enable && self.path.is_empty() {
            return Err(ConfigSchemaError::InvalidPath {
                section: "wal",
                field: "path",
                path: self.path.to_string(),
            });
        }

        validate_limit_u64(
            "wal",
            "bufferSize",
            self.buffer_size,
            WAL_BUFFER_SIZE_MIN_BYTES,
            WAL_BUFFER_SIZE_MAX_BYTES,
        )?;

        Ok(())
    }
}

fn normalize_boxed_str(value: &mut Box<str>) {
    let trimmed = value.trim();
    if trimmed == value.as_ref() {
        return;
    }
    *value = trimmed.to_owned().into_boxed_str();
}

/// Validated config wrapper carrying bounded numeric values.
#[derive(Debug, Clone)]
pub struct ValidatedSegmentDbConfig {
    raw: SegmentDbConfig,
    limits: ConfigLimits,
}

impl ValidatedSegmentDbConfig {
    /// Access validated numeric bounds.
    #[must_use]
    pub const fn limits(&self) -> &ConfigLimits {
        &self.limits
    }

    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &SegmentDbConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> SegmentDbConfig {
        self.raw
    }
}

impl AsRef<SegmentDbConfig> for ValidatedSegmentDbConfig {
    fn as_ref(&self) -> &SegmentDbConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedSegmentDbConfig {
    type Target = SegmentDbConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Validated numeric limits derived from the config.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLimits {
    /// Cache size (bytes).
    pub cache_size: BoundedU64<CACHE_SIZE_MIN_BYTES, CACHE_SIZE_MAX_BYTES>,
    /// Insert buffer size (bytes).
    pub insert_buffer_size: BoundedU64<CACHE_INSERT_BUFFER_MIN_BYTES, CACHE_INSERT_BUFFER_MAX_BYTES>,
    /// GPU per-device cache size (bytes).
    pub gpu_cache_size: BoundedU64<GPU_CACHE_SIZE_MIN_BYTES, GPU_CACHE_SIZE_MAX_BYTES>,
    /// GPU search threshold (nq).
    pub gpu_search_threshold: BoundedU32<GPU_SEARCH_THRESHOLD_MIN, GPU_SEARCH_THRESHOLD_MAX>,
    /// Storage auto-flush interval (seconds).
    pub storage_auto_flush_interval_secs:
        BoundedU64<STORAGE_AUTO_FLUSH_INTERVAL_MIN_SECS, STORAGE_AUTO_FLUSH_INTERVAL_MAX_SECS>,
    /// WAL buffer size (bytes).
    pub wal_buffer_size: BoundedU64<WAL_BUFFER_SIZE_MIN_BYTES, WAL_BUFFER_SIZE_MAX_BYTES>,
}

impl ConfigLimits {
    fn new(config: &SegmentDbConfig) -> Result<Self, ConfigSchemaError> {
        Ok(Self {
            cache_size: bounded_u64(
                "cache",
                "cacheSize",
                config.cache.cache_size,
                CACHE_SIZE_MIN_BYTES,
                CACHE_SIZE_MAX_BYTES,
            )?,
            insert_buffer_size: bounded_u64(
                "cache",
                "insertBufferSize",
                config.cache.insert_buffer_size,
                CACHE_INSERT_BUFFER_MIN_BYTES,
                CACHE_INSERT_BUFFER_MAX_BYTES,
            )?,
            gpu_cache_size: bounded_u64(
                "gpu",
                "cacheSize",
                config.gpu.cache_size,
                GPU_CACHE_SIZE_MIN_BYTES,
                GPU_CACHE_SIZE_MAX_BYTES,
            )?,
            gpu_search_threshold: bounded_u32(
                "gpu",
                "gpuSearchThreshold",
                config.gpu.gpu_search_threshold,
                GPU_SEARCH_THRESHOLD_MIN,
                GPU_SEARCH_THRESHOLD_MAX,
            )?,
            storage_auto_flush_interval_secs: bounded_u64(
                "storage",
                "autoFlushInterval",
                config.storage.auto_flush_interval,
                STORAGE_AUTO_FLUSH_INTERVAL_MIN_SECS,
                STORAGE_AUTO_FLUSH_INTERVAL_MAX_SECS,
            )?,
            wal_buffer_size: bounded_u64(
                "wal",
                "bufferSize",
                config.wal.buffer_size,
                WAL_BUFFER_SIZE_MIN_BYTES,
                WAL_BUFFER_SIZE_MAX_BYTES,
            )?,
        })
    }
}

fn bounded_u64<const MIN: u64, const MAX: u64>(
    section: &'static str,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<BoundedU64<MIN, MAX>, ConfigSchemaError> {
    BoundedU64::try_new(value).map_err(|_| ConfigSchemaError::LimitOutOfRange {
        section,
        field,
        value,
        min,
        max,
    })
}

fn bounded_u32<const MIN: u32, const MAX: u32>(
    section: &'static str,
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> Result<BoundedU32<MIN, MAX>, ConfigSchemaError> {
    BoundedU32::try_new(value).map_err(|_| ConfigSchemaError::LimitOutOfRange {
        section,
        field,
        value: u64::from(value),
        min: u64::from(min),
        max: u64::from(max),
    })
}

fn validate_limit_u64(
    section: &'static str,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::LimitOutOfRange {
            section,
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn validate_limit_u32(
    section: &'static str,
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::LimitOutOfRange {
            section,
            field,
            value: u64::from(value),
            min: u64::from(min),
            max: u64::from(max),
        });
    }
    Ok(())
}

/// Structured configuration validation failures.
///
/// Every variant maps to a namespaced `ErrorCode` and carries the metadata a
/// caller needs to fix the offending key without re-parsing the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// The config's `version` field is not one this build understands.
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Highest version this build supports.
        supported: u32,
    },
    /// A numeric field fell outside its validated bounds.
    LimitOutOfRange {
        /// Config section containing the field.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Value supplied.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// A list field exceeded its maximum length.
    ListTooLarge {
        /// Config section containing the field.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Actual list length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// A GPU device id was outside the range the resource pool recognizes.
    InvalidDeviceId {
        /// Config section containing the field.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Device id supplied.
        device: u32,
        /// Highest valid device id.
        max: u32,
    },
    /// A filesystem path field was empty or otherwise unusable.
    InvalidPath {
        /// Config section containing the field.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Path value supplied.
        path: String,
    },
    /// A `preloadCollection` entry was not a valid collection id.
    InvalidCollectionId {
        /// Config section containing the field.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Collection id value supplied.
        value: String,
    },
}

impl ConfigSchemaError {
    /// Maps this error to a namespaced `ErrorCode`.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::new("config", "unsupported_version"),
            Self::LimitOutOfRange { .. } => ErrorCode::new("config", "limit_out_of_range"),
            Self::ListTooLarge { .. } => ErrorCode::new("config", "list_too_large"),
            Self::InvalidDeviceId { .. } => ErrorCode::new("config", "invalid_device_id"),
            Self::InvalidPath { .. } => ErrorCode::new("config", "invalid_path"),
            Self::InvalidCollectionId { .. } => ErrorCode::new("config", "invalid_collection_id"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => write!(
                formatter,
                "unsupported config version {found} (supported: {supported})"
            ),
            Self::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{section}.{field} = {value} is out of range [{min}, {max}]"
            ),
            Self::ListTooLarge {
                section,
                field,
                len,
                max,
            } => write!(
                formatter,
                "{section}.{field} has {len} entries, exceeding the max of {max}"
            ),
            Self::InvalidDeviceId {
                section,
                field,
                device,
                max,
            } => write!(
                formatter,
                "{section}.{field} contains device id {device}, exceeding the max of {max}"
            ),
            Self::InvalidPath {
                section,
                field,
                path,
            } => write!(formatter, "{section}.{field} is not a usable path: {path:?}"),
            Self::InvalidCollectionId {
                section,
                field,
                value,
            } => write!(
                formatter,
                "{section}.{field} entry {value:?} is not a valid collection id"
            ),
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => {
                envelope = envelope
                    .with_metadata("found", found.to_string())
                    .with_metadata("supported", supported.to_string());
            },
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value.to_string())
                    .with_metadata("min", min.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::ListTooLarge {
                section,
                field,
                len,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("len", len.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::InvalidDeviceId {
                section,
                field,
                device,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("device", device.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::InvalidPath {
                section,
                field,
                path,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("path", path);
            },
            ConfigSchemaError::InvalidCollectionId {
                section,
                field,
                value,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value);
            },
        }

        envelope
    }
}

/// Parses and validates a `SegmentDbConfig` from a JSON document.
pub fn parse_segmentdb_config_json(contents: &str) -> Result<ValidatedSegmentDbConfig, ErrorEnvelope> {
    let config: SegmentDbConfig = serde_json::from_str(contents).map_err(|error| {
        ErrorEnvelope::expected(ErrorCode::new("config", "invalid_json"), error.to_string())
            .with_metadata("source", "file")
    })?;
    config.validate_and_normalize().map_err(Into::into)
}

/// Parses and validates a `SegmentDbConfig` from a TOML document.
pub fn parse_segmentdb_config_toml(contents: &str) -> Result<ValidatedSegmentDbConfig, ErrorEnvelope> {
    let config: SegmentDbConfig = toml::from_str(contents).map_err(|error| {
        ErrorEnvelope::expected(ErrorCode::new("config", "invalid_toml"), error.to_string())
            .with_metadata("source", "file")
    })?;
    config.validate_and_normalize().map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn defaults_are_applied() -> Result<(), Box<dyn Error>> {
        let config = parse_segmentdb_config_json("{}")?;

        assert_eq!(config.version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.gpu, GpuConfig::default());
        assert_eq!(config.storage, StorageConfig::default());
        assert_eq!(config.wal, WalConfig::default());

        Ok(())
    }

    #[test]
    fn cache_size_out_of_range_returns_error_code() -> Result<(), Box<dyn Error>> {
        let payload = serde_json::json!({
            "version": 1,
            "cache": { "cacheSize": 1 }
        });

        let result = parse_segmentdb_config_json(&payload.to_string());
        let error = result.err().ok_or("expected validation error")?;

        assert_eq!(error.code, ErrorCode::new("config", "limit_out_of_range"));
        assert_eq!(error.metadata.get("section").map(String::as_str), Some("cache"));
        assert_eq!(error.metadata.get("field").map(String::as_str), Some("cacheSize"));

        Ok(())
    }

    #[test]
    fn gpu_device_ids_are_normalized_and_deduplicated() -> Result<(), Box<dyn Error>> {
        let payload = serde_json::json!({
            "version": 1,
            "gpu": { "searchDevices": [2, 0, 2, 1] }
        });

        let config = parse_segmentdb_config_json(&payload.to_string())?;
        assert_eq!(config.gpu.search_devices, vec![0, 1, 2]);

        Ok(())
    }

    #[test]
    fn gpu_device_id_over_max_is_rejected() -> Result<(), Box<dyn Error>> {
        let payload = serde_json::json!({
            "version": 1,
            "gpu": { "searchDevices": [GPU_DEVICE_ID_MAX + 1] }
        });

        let result = parse_segmentdb_config_json(&payload.to_string());
        let error = result.err().ok_or("expected device id error")?;
        assert_eq!(error.code, ErrorCode::new("config", "invalid_device_id"));

        Ok(())
    }

    #[test]
    fn invalid_preload_collection_entry_is_rejected() -> Result<(), Box<dyn Error>> {
        let payload = serde_json::json!({
            "version": 1,
            "cache": { "preloadCollection": [""] }
        });

        let result = parse_segmentdb_config_json(&payload.to_string());
        let error = result.err().ok_or("expected invalid collection id error")?;
        assert_eq!(error.code, ErrorCode::new("config", "invalid_collection_id"));

        Ok(())
    }

    #[test]
    fn unsupported_version_is_rejected() -> Result<(), Box<dyn Error>> {
        let payload = serde_json::json!({ "version": 99 });
        let result = parse_segmentdb_config_json(&payload.to_string());
        let error = result.err().ok_or("expected unsupported version error")?;
        assert_eq!(error.code, ErrorCode::new("config", "unsupported_version"));

        Ok(())
    }

    #[test]
    fn toml_round_trip_matches_defaults() -> Result<(), Box<dyn Error>> {
        let config = parse_segmentdb_config_toml("version = 1\n")?;
        assert_eq!(config.as_ref(), &SegmentDbConfig::default());
        Ok(())
    }
}
