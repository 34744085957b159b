//! # segmentdb-scheduler
//!
//! Placement and dispatch for segment tasks (`Search`, `Build`, `Load`).
//!
//! A chain of synchronous [`PlacementPass`]es decides which [`Resource`]
//! runs a task; one worker per resource then loads the task's inputs,
//! executes it, and reports the result back to the caller through a
//! [`ScheduledTaskHandle`]. A worker panic marks its resource permanently
//! unhealthy and hands any still-queued work to a supervisor, which
//! re-places it onto a surviving resource.

pub mod cache;
pub mod config;
pub mod pass;
pub mod passes;
pub mod pool;
#[allow(clippy::module_inception, reason = "scheduler.rs holds the crate's namesake type")]
mod scheduler;

pub use cache::DeviceCache;
pub use config::{RoutingConfig, RoutingConfigHandle, RoutingConfigSender};
pub use pass::{PassContext, PlacementPass};
pub use passes::{FaissFlatPass, FaissIvfPass, FallbackPass};
pub use pool::TaskOutcome;
pub use scheduler::{Scheduler, ScheduledTaskHandle, SchedulerOptions};
pub use segmentdb_domain::Resource;

/// Returns the scheduler crate version.
#[must_use]
pub const fn scheduler_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmentdb_shared::shared_crate_version;

    #[test]
    fn scheduler_crate_compiles() {
        let version = scheduler_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn scheduler_can_use_shared() {
        let shared_version = shared_crate_version();
        assert!(!shared_version.is_empty());
    }
}
