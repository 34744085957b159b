//! # segmentdb-testkit
//!
//! In-memory fakes for the [`segmentdb_ports`] traits, for use in tests that
//! need a working `SegmentStore`/`MetadataCatalog` without standing up real
//! storage or a real catalog service.

pub mod metadata_catalog;
pub mod segment_store;

pub use metadata_catalog::InMemoryMetadataCatalog;
pub use segment_store::InMemorySegmentStore;

/// Returns the testkit crate version.
#[must_use]
pub const fn testkit_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testkit_crate_compiles() {
        let version = testkit_crate_version();
        assert!(!version.is_empty());
    }
}
