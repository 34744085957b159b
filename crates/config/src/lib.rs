//! # segmentdb-config
//!
//! Configuration schema, validation, and normalization for `segmentdb`'s
//! `cache`/`gpu`/`storage`/`wal` sections. This crate depends on `domain` and
//! `shared` only; all values are validated on load and invalid values fail
//! loudly rather than silently falling back to a default.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;

pub use env::{
    ENV_CACHE_CACHE_SIZE, ENV_CACHE_INSERT_BUFFER_SIZE, ENV_CACHE_PRELOAD_COLLECTION,
    ENV_GPU_BUILD_INDEX_DEVICES, ENV_GPU_CACHE_SIZE, ENV_GPU_ENABLE, ENV_GPU_SEARCH_DEVICES,
    ENV_GPU_SEARCH_THRESHOLD, ENV_STORAGE_AUTO_FLUSH_INTERVAL, ENV_STORAGE_PATH, ENV_WAL_BUFFER_SIZE,
    ENV_WAL_ENABLE, ENV_WAL_PATH, EnvParseError, SegmentDbEnv, apply_env_overrides,
};
pub use load::{
    ConfigFormat, load_segmentdb_config_from_path, load_segmentdb_config_from_sources,
    load_segmentdb_config_std_env, to_pretty_json, to_pretty_toml,
};
pub use schema::{
    CURRENT_CONFIG_VERSION, CacheConfig, ConfigLimits, ConfigSchemaError, GpuConfig,
    SegmentDbConfig, StorageConfig, ValidatedSegmentDbConfig, WalConfig, parse_segmentdb_config_json,
    parse_segmentdb_config_toml,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmentdb_domain::domain_crate_version;
    use segmentdb_shared::shared_crate_version;

    #[test]
    fn config_crate_compiles() {
        let version = config_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn config_can_use_domain_and_shared() {
        let domain_version = domain_crate_version();
        let shared_version = shared_crate_version();

        assert!(!domain_version.is_empty());
        assert!(!shared_version.is_empty());
    }
}
