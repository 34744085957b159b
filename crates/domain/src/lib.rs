//! # segmentdb-domain
//!
//! Domain entities, primitives, and value objects for the segment lifecycle
//! and query engine.
//!
//! This crate contains the core domain model with no infrastructure
//! dependencies:
//!
//! - **Primitives** - `CollectionId`, `PartitionTag`, `SegmentFileId`, `JobId`, `Dimension`
//! - **Segment** - `SegmentSchema`, `FilesHolder`, `MetricType`, `EngineType`, `FileType`
//! - **Vectors** - `VectorsData` (dense / binary insert batches)
//! - **Resource** - `Resource`, `ResourceGraph` (the scheduler's typed endpoints)
//! - **Task** - `Task`, `ScheduledTask`, `TaskState` (the scheduler's lifecycle)
//!
//! ## Dependency Rules
//!
//! - Depends only on the `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

// Re-export shared types for convenience
pub use segmentdb_shared::shared_crate_version;

// =============================================================================
// DOMAIN MODULES
// =============================================================================

pub mod primitives;
pub mod resource;
pub mod segment;
pub mod task;
pub mod vectors;

pub use primitives::{
    CollectionId, Dimension, JobId, PartitionTag, PrimitiveError, SegmentFileId,
};
pub use resource::{Resource, ResourceEdge, ResourceGraph};
pub use segment::{EngineType, FileType, FilesHolder, MetricType, SegmentSchema};
pub use task::{QueryParams, ScheduledTask, SpecResLabel, Task, TaskState, TaskTransitionError};
pub use vectors::{VectorsData, VectorsDataError};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_crate_compiles() {
        let version = domain_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn domain_depends_on_shared() {
        let shared_version = shared_crate_version();
        assert!(!shared_version.is_empty());
    }
}
