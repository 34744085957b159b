//! Placement pass chain: pure, synchronous functions that pick a [`Resource`]
//! for a task, or defer to the next pass in the chain.

use crate::config::RoutingConfig;
use segmentdb_domain::{Resource, SegmentSchema, Task};

/// Everything a pass needs to make a placement decision, borrowed for the
/// lifetime of one [`run_chain`] call.
pub struct PassContext<'a> {
    /// The task being placed.
    pub task: &'a Task,
    /// Catalog metadata for the segment the task targets.
    pub segment: &'a SegmentSchema,
    /// The routing configuration in effect at submission time.
    pub routing: &'a RoutingConfig,
    /// Resources not currently marked unhealthy by a worker panic.
    pub healthy_resources: &'a [Resource],
}

/// A single placement rule. Implementations must be synchronous and must
/// never panic: a pass that cannot decide defers by returning `None` rather
/// than failing the task outright.
pub trait PlacementPass: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Returns a resource to run the task on, or `None` to defer to the
    /// next pass in the chain.
    fn evaluate(&self, ctx: &PassContext<'_>) -> Option<Resource>;
}

/// Runs `passes` in order, returning the first non-`None` decision.
#[must_use]
pub fn run_chain(passes: &[Box<dyn PlacementPass>], ctx: &PassContext<'_>) -> Option<Resource> {
    for pass in passes {
        if let Some(resource) = pass.evaluate(ctx) {
            tracing::debug!(pass = pass.name(), ?resource, "placement pass decided");
            return Some(resource);
        }
        tracing::trace!(pass = pass.name(), "placement pass deferred");
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    struct AlwaysCpu;

    impl PlacementPass for AlwaysCpu {
        fn name(&self) -> &'static str {
            "AlwaysCpu"
        }

        fn evaluate(&self, _ctx: &PassContext<'_>) -> Option<Resource> {
            Some(Resource::Cpu)
        }
    }

    struct AlwaysDefer;

    impl PlacementPass for AlwaysDefer {
        fn name(&self) -> &'static str {
            "AlwaysDefer"
        }

        fn evaluate(&self, _ctx: &PassContext<'_>) -> Option<Resource> {
            None
        }
    }

    fn sample_context<'a>(task: &'a Task, segment: &'a SegmentSchema, routing: &'a RoutingConfig) -> PassContext<'a> {
        PassContext {
            task,
            segment,
            routing,
            healthy_resources: &[],
        }
    }

    #[test]
    fn chain_stops_at_first_decision() {
        let task = sample_search_task();
        let segment = sample_segment();
        let routing = RoutingConfig::default();
        let ctx = sample_context(&task, &segment, &routing);
        let passes: Vec<Box<dyn PlacementPass>> = vec![Box::new(AlwaysDefer), Box::new(AlwaysCpu)];
        assert_eq!(run_chain(&passes, &ctx), Some(Resource::Cpu));
    }

    #[test]
    fn empty_chain_defers() {
        let task = sample_search_task();
        let segment = sample_segment();
        let routing = RoutingConfig::default();
        let ctx = sample_context(&task, &segment, &routing);
        let passes: Vec<Box<dyn PlacementPass>> = vec![Box::new(AlwaysDefer)];
        assert_eq!(run_chain(&passes, &ctx), None);
    }

    pub(crate) fn sample_search_task() -> Task {
        use segmentdb_domain::VectorsData;
        Task::Search {
            segment_ref: sample_segment().file_id,
            query: VectorsData::dense(vec![0.0; 4], 4, None).expect("valid vectors"),
            k: 10,
            params: serde_json::Value::Null,
        }
    }

    pub(crate) fn sample_segment() -> SegmentSchema {
        use segmentdb_domain::{CollectionId, EngineType, FileType, MetricType, PartitionTag, SegmentFileId};
        SegmentSchema {
            file_id: SegmentFileId::parse("seg0").expect("valid id"),
            collection_id: CollectionId::parse("coll").expect("valid id"),
            partition_tag: PartitionTag::default_tag(),
            dimension: 4,
            metric_type: MetricType::L2,
            engine_type: EngineType::Flat,
            file_size: 0,
            index_file_size_target: 0,
            row_count: 0,
            created_on: 0,
            file_type: FileType::Raw,
        }
    }
}
