//! # segmentdb-adapters
//!
//! In-process implementations of the components that have no external
//! system boundary: the block ID allocator, the per-device residency cache,
//! and the merge planner. Adapters that do cross a boundary (segment
//! storage, the metadata catalog) live behind [`segmentdb_ports`] traits and
//! are provided by callers; this crate only covers pure in-memory
//! machinery shared by every deployment.

pub mod device_cache;
pub mod id_generator;
pub mod merge_planner;

pub use device_cache::{DeviceCacheDefaults, DeviceCacheRegistry, FreeMemPercent};
pub use id_generator::{IdGenerator, IdGeneratorOptions};
pub use merge_planner::{plan_merges, plan_merges_with_threshold, MergeGroup, FORCE_MERGE_THRESHOLD_MICROS};

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapters_crate_compiles() {
        let version = adapters_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn adapters_can_use_scheduler() {
        let scheduler_version = segmentdb_scheduler::scheduler_crate_version();
        assert!(!scheduler_version.is_empty());
    }
}
