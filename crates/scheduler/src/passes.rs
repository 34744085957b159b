//! Placement pass implementations, grounded on the GPU-eligibility chain
//! Milvus runs ahead of a Faiss search/build: CPU if GPU routing is
//! disabled, CPU below the configured batch-size threshold, CPU above the
//! engine's max probe count, otherwise round-robin over the configured GPU
//! pool, falling back to CPU if the chosen device is currently unhealthy.

use crate::cache::DeviceCache;
use crate::config::{RoutingConfig, RoutingConfigHandle};
use crate::pass::{PassContext, PlacementPass};
use segmentdb_domain::{EngineType, Resource, Task};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Largest `topk` a GPU Faiss kernel accepts before falling back to CPU.
/// Milvus's `FaissFlatPass`/`FaissIvfPass` hardcode this as a compile-time
/// constant rather than a tunable, so it is not part of [`RoutingConfig`].
const GPU_QUERY_MAX_NPROBE: u32 = 2048;

fn pick_device(routing: &RoutingConfig, next_gpu: &AtomicUsize, healthy: &[Resource]) -> Resource {
    let index = next_gpu.fetch_add(1, Ordering::Relaxed) % routing.search_devices.len();
    let device = Resource::Gpu(routing.search_devices[index]);
    if healthy.contains(&device) {
        device
    } else {
        Resource::Cpu
    }
}

fn gpu_eligible(ctx: &PassContext<'_>, routing: &RoutingConfig, query_rows: u64, k: u32) -> bool {
    routing.gpu_enable
        && !routing.search_devices.is_empty()
        && query_rows >= u64::from(routing.gpu_search_threshold)
        && k <= GPU_QUERY_MAX_NPROBE
        && !ctx.healthy_resources.is_empty()
}

/// Places brute-force (`Flat`) searches, preferring a round-robined GPU when
/// the batch is large enough to amortize the transfer.
pub struct FaissFlatPass {
    routing: RoutingConfigHandle,
    next_gpu: AtomicUsize,
}

impl FaissFlatPass {
    /// Builds a pass reading live configuration through `routing`.
    #[must_use]
    pub fn new(routing: RoutingConfigHandle) -> Self {
        Self { routing, next_gpu: AtomicUsize::new(0) }
    }
}

impl PlacementPass for FaissFlatPass {
    fn name(&self) -> &'static str {
        "FaissFlatPass"
    }

    fn evaluate(&self, ctx: &PassContext<'_>) -> Option<Resource> {
        if ctx.segment.engine_type != EngineType::Flat {
            return None;
        }
        let Task::Search { query, k, .. } = ctx.task else {
            return None;
        };
        let routing = self.routing.current();
        if gpu_eligible(ctx, &routing, query.row_count() as u64, *k) {
            Some(pick_device(&routing, &self.next_gpu, ctx.healthy_resources))
        } else {
            Some(Resource::Cpu)
        }
    }
}

/// Places IVF-family (`IvfFlat`/`IvfSq8`/`IvfPq`) searches. Prefers a GPU
/// that already has the segment's index resident before falling back to
/// round-robin, since an IVF index is comparatively expensive to page in.
pub struct FaissIvfPass {
    routing: RoutingConfigHandle,
    cache: Arc<dyn DeviceCache>,
    next_gpu: AtomicUsize,
}

impl FaissIvfPass {
    /// Builds a pass reading live configuration through `routing` and device
    /// residency through `cache`.
    #[must_use]
    pub fn new(routing: RoutingConfigHandle, cache: Arc<dyn DeviceCache>) -> Self {
        Self { routing, cache, next_gpu: AtomicUsize::new(0) }
    }
}

impl PlacementPass for FaissIvfPass {
    fn name(&self) -> &'static str {
        "FaissIvfPass"
    }

    fn evaluate(&self, ctx: &PassContext<'_>) -> Option<Resource> {
        if !matches!(
            ctx.segment.engine_type,
            EngineType::IvfFlat | EngineType::IvfSq8 | EngineType::IvfPq
        ) {
            return None;
        }
        let Task::Search { query, k, .. } = ctx.task else {
            return None;
        };
        let routing = self.routing.current();
        if !gpu_eligible(ctx, &routing, query.row_count() as u64, *k) {
            return Some(Resource::Cpu);
        }

        let resident = routing
            .search_devices
            .iter()
            .copied()
            .map(Resource::Gpu)
            .find(|device| ctx.healthy_resources.contains(device) && self.cache.contains(*device, &ctx.segment.file_id));
        if let Some(device) = resident {
            return Some(device);
        }

        Some(pick_device(&routing, &self.next_gpu, ctx.healthy_resources))
    }
}

/// Last-resort pass: always places on CPU, unless CPU itself is unhealthy,
/// in which case the whole chain has nowhere left to put the task.
pub struct FallbackPass;

impl PlacementPass for FallbackPass {
    fn name(&self) -> &'static str {
        "FallbackPass"
    }

    fn evaluate(&self, ctx: &PassContext<'_>) -> Option<Resource> {
        ctx.healthy_resources.contains(&Resource::Cpu).then_some(Resource::Cpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingConfig;
    use crate::pass::tests::{sample_search_task, sample_segment};
    use segmentdb_domain::{SegmentFileId, VectorsData};

    fn gpu_routing() -> RoutingConfig {
        RoutingConfig { gpu_enable: true, gpu_search_threshold: 1_000, search_devices: vec![0, 1] }
    }

    #[test]
    fn small_batch_stays_on_cpu() {
        let (_sender, handle) = crate::config::RoutingConfigSender::new(gpu_routing());
        let pass = FaissFlatPass::new(handle);
        let task = Task::Search {
            segment_ref: sample_segment().file_id,
            query: VectorsData::dense(vec![0.0; 4 * 500], 4, None).expect("valid vectors"),
            k: 10,
            params: serde_json::Value::Null,
        };
        let segment = sample_segment();
        let routing = gpu_routing();
        let ctx = PassContext {
            task: &task,
            segment: &segment,
            routing: &routing,
            healthy_resources: &[Resource::Cpu, Resource::Gpu(0), Resource::Gpu(1)],
        };
        assert_eq!(pass.evaluate(&ctx), Some(Resource::Cpu));
    }

    #[test]
    fn large_batch_round_robins_gpus() {
        let (_sender, handle) = crate::config::RoutingConfigSender::new(gpu_routing());
        let pass = FaissFlatPass::new(handle);
        let task = Task::Search {
            segment_ref: sample_segment().file_id,
            query: VectorsData::dense(vec![0.0; 4 * 5_000], 4, None).expect("valid vectors"),
            k: 10,
            params: serde_json::Value::Null,
        };
        let segment = sample_segment();
        let routing = gpu_routing();
        let ctx = PassContext {
            task: &task,
            segment: &segment,
            routing: &routing,
            healthy_resources: &[Resource::Cpu, Resource::Gpu(0), Resource::Gpu(1)],
        };
        assert_eq!(pass.evaluate(&ctx), Some(Resource::Gpu(0)));
        assert_eq!(pass.evaluate(&ctx), Some(Resource::Gpu(1)));
        assert_eq!(pass.evaluate(&ctx), Some(Resource::Gpu(0)));
    }

    #[test]
    fn non_flat_engine_defers() {
        let (_sender, handle) = crate::config::RoutingConfigSender::new(gpu_routing());
        let pass = FaissFlatPass::new(handle);
        let task = sample_search_task();
        let mut segment = sample_segment();
        segment.engine_type = EngineType::IvfFlat;
        let routing = gpu_routing();
        let ctx = PassContext { task: &task, segment: &segment, routing: &routing, healthy_resources: &[] };
        assert_eq!(pass.evaluate(&ctx), None);
    }

    #[test]
    fn ivf_pass_prefers_resident_gpu() {
        struct AlwaysResidentOnOne;
        impl DeviceCache for AlwaysResidentOnOne {
            fn contains(&self, device: Resource, _key: &SegmentFileId) -> bool {
                device == Resource::Gpu(1)
            }

            fn get<'a>(
                &'a self,
                _ctx: &'a segmentdb_shared::RequestContext,
                _device: Resource,
                _key: &'a SegmentFileId,
            ) -> segmentdb_ports::BoxFuture<'a, segmentdb_shared::Result<Option<Vec<u8>>>> {
                Box::pin(async { Ok(None) })
            }

            fn insert<'a>(
                &'a self,
                _ctx: &'a segmentdb_shared::RequestContext,
                _device: Resource,
                _key: SegmentFileId,
                _bytes: Vec<u8>,
            ) -> segmentdb_ports::BoxFuture<'a, segmentdb_shared::Result<()>> {
                Box::pin(async { Ok(()) })
            }
        }

        let (_sender, handle) = crate::config::RoutingConfigSender::new(gpu_routing());
        let pass = FaissIvfPass::new(handle, Arc::new(AlwaysResidentOnOne));
        let task = Task::Search {
            segment_ref: sample_segment().file_id,
            query: VectorsData::dense(vec![0.0; 4 * 5_000], 4, None).expect("valid vectors"),
            k: 10,
            params: serde_json::Value::Null,
        };
        let mut segment = sample_segment();
        segment.engine_type = EngineType::IvfFlat;
        let routing = gpu_routing();
        let ctx = PassContext {
            task: &task,
            segment: &segment,
            routing: &routing,
            healthy_resources: &[Resource::Cpu, Resource::Gpu(0), Resource::Gpu(1)],
        };
        assert_eq!(pass.evaluate(&ctx), Some(Resource::Gpu(1)));
    }

    #[test]
    fn fallback_pass_requires_healthy_cpu() {
        let pass = FallbackPass;
        let task = sample_search_task();
        let segment = sample_segment();
        let routing = RoutingConfig::default();
        let ctx = PassContext { task: &task, segment: &segment, routing: &routing, healthy_resources: &[Resource::Gpu(0)] };
        assert_eq!(pass.evaluate(&ctx), None);

        let ctx_healthy = PassContext { task: &task, segment: &segment, routing: &routing, healthy_resources: &[Resource::Cpu] };
        assert_eq!(pass.evaluate(&ctx_healthy), Some(Resource::Cpu));
    }
}
