//! Per-resource worker queues.
//!
//! One [`BoundedQueue`] and one spawned worker loop exist per [`Resource`].
//! Workers are built directly on `BoundedQueue` rather than on
//! `shared::concurrency::WorkerPool`, because a panicking task must mark its
//! resource unhealthy and hand any still-queued work back to the scheduler
//! rather than taking the whole pool down with it — `WorkerPool`'s loop has
//! no panic boundary around task execution.

use crate::cache::DeviceCache;
use futures_util::FutureExt;
use segmentdb_domain::{EngineType, Resource, SegmentSchema, Task, TaskState, VectorsData};
use segmentdb_ports::{SegmentArtifact, SegmentStore};
use segmentdb_shared::concurrency::BoundedQueue;
use segmentdb_shared::retry::{retry_async, RetryPolicy};
use segmentdb_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use segmentdb_vector::{load_index, HnswIndex, HnswParams, IvfIndex, FlatIndex, NsgIndex, VectorIndex, VectorMatch, VectorRecord};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const LOAD_RETRY_POLICY: RetryPolicy =
    RetryPolicy { max_attempts: 2, base_delay_ms: 10, max_delay_ms: 100, jitter_ratio_pct: 0 };

/// The useful result of a completed task, beyond its terminal state.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// Matches produced by a `Search` task, in row-major query order.
    SearchMatches(Vec<VectorMatch>),
    /// A `Build` or `Load` task finished with nothing else to report.
    Acknowledged,
}

/// One task in flight, carrying everything a worker needs to run it and
/// report back to the original submitter.
pub struct QueuedJob {
    /// The task, with its domain-level state machine threaded through.
    pub scheduled: segmentdb_domain::ScheduledTask,
    /// Catalog metadata for the segment the task targets.
    pub segment: SegmentSchema,
    /// The submitting caller's context (correlation id, cancellation).
    pub ctx: RequestContext,
    /// Where to send the result once the job reaches a terminal state.
    pub respond: oneshot::Sender<TaskCompletion>,
}

/// Sent back to the original caller once a job reaches a terminal state.
pub struct TaskCompletion {
    /// The task's final domain state (`Completed`, `Failed`, or `Cancelled`).
    pub scheduled: segmentdb_domain::ScheduledTask,
    /// The task's result, if it completed.
    pub outcome: Result<TaskOutcome>,
}

fn finish(job: QueuedJob, outcome: Result<TaskOutcome>) {
    let _ = job.respond.send(TaskCompletion { scheduled: job.scheduled, outcome });
}

/// One worker's queue plus its health flag. Workers communicate health by
/// flipping `healthy` to `false` exactly once, permanently, after a panic.
struct ResourceWorker {
    queue: BoundedQueue<QueuedJob>,
    healthy: Arc<AtomicBool>,
}

/// One queue and worker loop per known resource.
pub struct ResourcePool {
    workers: HashMap<Resource, ResourceWorker>,
}

impl ResourcePool {
    /// Spawns one worker per resource in `resources`.
    pub fn new(
        resources: &[Resource],
        store: Arc<dyn SegmentStore>,
        cache: Arc<dyn DeviceCache>,
        replacement_tx: mpsc::UnboundedSender<QueuedJob>,
        queue_capacity: usize,
    ) -> Result<Self> {
        let mut workers = HashMap::with_capacity(resources.len());
        for &resource in resources {
            let queue = BoundedQueue::new(queue_capacity)?;
            let healthy = Arc::new(AtomicBool::new(true));
            spawn_worker(resource, queue.clone(), Arc::clone(&store), Arc::clone(&cache), Arc::clone(&healthy), replacement_tx.clone());
            workers.insert(resource, ResourceWorker { queue, healthy });
        }
        Ok(Self { workers })
    }

    /// Resources whose worker has not panicked.
    #[must_use]
    pub fn healthy_resources(&self) -> Vec<Resource> {
        self.workers
            .iter()
            .filter(|(_, worker)| worker.healthy.load(Ordering::Acquire))
            .map(|(&resource, _)| resource)
            .collect()
    }

    /// Enqueues `job` onto `resource`'s worker.
    pub async fn enqueue(&self, resource: Resource, ctx: &RequestContext, job: QueuedJob) -> Result<()> {
        let worker = self.workers.get(&resource).ok_or_else(|| {
            ErrorEnvelope::expected(ErrorCode::resource_unavailable(), format!("no worker for resource {resource}"))
        })?;
        worker.queue.enqueue(ctx, job).await
    }
}

fn spawn_worker(
    resource: Resource,
    queue: BoundedQueue<QueuedJob>,
    store: Arc<dyn SegmentStore>,
    cache: Arc<dyn DeviceCache>,
    healthy: Arc<AtomicBool>,
    replacement_tx: mpsc::UnboundedSender<QueuedJob>,
) {
    tokio::spawn(async move {
        let worker_ctx = RequestContext::new_request();
        loop {
            let job = match queue.dequeue(&worker_ctx).await {
                Ok(job) => job,
                Err(_closed) => return,
            };
            let panicked = run_job(resource, job, &store, &cache).await;
            if panicked {
                healthy.store(false, Ordering::Release);
                tracing::warn!(%resource, "worker panicked, resource marked unhealthy");
                drain_and_replace(&queue, &replacement_tx).await;
                return;
            }
        }
    });
}

async fn drain_and_replace(queue: &BoundedQueue<QueuedJob>, replacement_tx: &mpsc::UnboundedSender<QueuedJob>) {
    queue.close().await;
    let drain_ctx = RequestContext::new_request();
    while let Ok(job) = queue.dequeue(&drain_ctx).await {
        let _ = replacement_tx.send(job);
    }
}

/// Runs one job to completion, returning whether a panic occurred.
async fn run_job(resource: Resource, mut job: QueuedJob, store: &Arc<dyn SegmentStore>, cache: &Arc<dyn DeviceCache>) -> bool {
    if let Err(transition_error) = job.scheduled.state.transition(TaskState::Loading) {
        finish(job, Err(transition_error_envelope(&transition_error)));
        return false;
    }

    let loaded = AssertUnwindSafe(load_phase(&job, resource, store, cache)).catch_unwind().await;
    let loaded = match loaded {
        Ok(Ok(loaded)) => loaded,
        Ok(Err(error)) => {
            fail(&mut job, error.clone());
            finish(job, Err(error));
            return false;
        },
        Err(_panic) => {
            let error = worker_panicked_error(resource);
            fail(&mut job, error.clone());
            finish(job, Err(error));
            return true;
        },
    };

    if let Err(transition_error) = job.scheduled.state.transition(TaskState::Executing) {
        finish(job, Err(transition_error_envelope(&transition_error)));
        return false;
    }

    let executed = AssertUnwindSafe(execute_phase(&job, loaded, store)).catch_unwind().await;
    match executed {
        Ok(Ok(outcome)) => {
            let _ = job.scheduled.state.transition(TaskState::Completed);
            finish(job, Ok(outcome));
            false
        },
        Ok(Err(error)) => {
            fail(&mut job, error.clone());
            finish(job, Err(error));
            false
        },
        Err(_panic) => {
            let error = worker_panicked_error(resource);
            fail(&mut job, error.clone());
            finish(job, Err(error));
            true
        },
    }
}

fn fail(job: &mut QueuedJob, error: ErrorEnvelope) {
    let _ = job.scheduled.state.transition(TaskState::Failed { error });
}

fn worker_panicked_error(resource: Resource) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::internal(),
        format!("worker for resource {resource} panicked"),
        ErrorClass::NonRetriable,
    )
}

fn transition_error_envelope(error: &segmentdb_domain::TaskTransitionError) -> ErrorEnvelope {
    ErrorEnvelope::invariant(ErrorCode::internal(), error.to_string())
}

/// What a load phase produced, ready for the matching execute phase.
enum LoadedInput {
    Index(Box<dyn VectorIndex>),
    RawBatch(Vec<VectorRecord>),
    Bytes,
}

fn retriable(error: ErrorEnvelope) -> ErrorEnvelope {
    ErrorEnvelope { class: ErrorClass::Retriable, ..error }
}

fn non_retriable(error: ErrorEnvelope) -> ErrorEnvelope {
    ErrorEnvelope { class: ErrorClass::NonRetriable, ..error }
}

async fn load_phase(
    job: &QueuedJob,
    resource: Resource,
    store: &Arc<dyn SegmentStore>,
    cache: &Arc<dyn DeviceCache>,
) -> Result<LoadedInput> {
    match &job.scheduled.task {
        Task::Search { segment_ref, .. } => {
            let bytes = load_index_bytes(&job.ctx, segment_ref, &job.segment, resource, store, cache).await?;
            let index = load_index(&bytes)?;
            Ok(LoadedInput::Index(index))
        },
        Task::Load { segment_ref, device } => {
            load_index_bytes(&job.ctx, segment_ref, &job.segment, *device, store, cache).await?;
            Ok(LoadedInput::Bytes)
        },
        Task::Build { segment_ref, .. } => {
            let records = load_raw_batch(&job.ctx, segment_ref, job.segment.dimension, store).await?;
            Ok(LoadedInput::RawBatch(records))
        },
    }
}

async fn load_index_bytes(
    ctx: &RequestContext,
    segment_ref: &segmentdb_domain::SegmentFileId,
    segment: &SegmentSchema,
    device: Resource,
    store: &Arc<dyn SegmentStore>,
    cache: &Arc<dyn DeviceCache>,
) -> Result<Vec<u8>> {
    if let Some(bytes) = cache.get(ctx, device, segment_ref).await? {
        return Ok(bytes);
    }
    let artifact = SegmentArtifact::Index { engine_tag: engine_tag(segment.engine_type) };
    let bytes = retry_async(ctx, LOAD_RETRY_POLICY, "load_index", || async {
        store.read_artifact(ctx, segment_ref, artifact).await.map_err(retriable)
    })
    .await
    .map_err(non_retriable)?;
    cache.insert(ctx, device, segment_ref.clone(), bytes.clone()).await?;
    Ok(bytes)
}

async fn load_raw_batch(
    ctx: &RequestContext,
    segment_ref: &segmentdb_domain::SegmentFileId,
    dimension: u32,
    store: &Arc<dyn SegmentStore>,
) -> Result<Vec<VectorRecord>> {
    let raw = retry_async(ctx, LOAD_RETRY_POLICY, "load_raw_vectors", || async {
        store.read_artifact(ctx, segment_ref, SegmentArtifact::RawVectors).await.map_err(retriable)
    })
    .await
    .map_err(non_retriable)?;
    let row_ids = retry_async(ctx, LOAD_RETRY_POLICY, "load_row_ids", || async {
        store.read_artifact(ctx, segment_ref, SegmentArtifact::RowIds).await.map_err(retriable)
    })
    .await
    .map_err(non_retriable)?;
    decode_raw_batch(&raw, &row_ids, dimension)
}

/// Decodes `rv.bin` (`f32` components, row-major by `dimension`) and
/// `uid.bin` (one little-endian `i64` per row) into records, mirroring the
/// raw-vector wire format the `Flat`/`Ivf`/`Hnsw`/`Nsg` encoders share.
fn decode_raw_batch(raw: &[u8], row_ids: &[u8], dimension: u32) -> Result<Vec<VectorRecord>> {
    let dim = dimension as usize;
    let row_bytes = dim * 4;
    if row_bytes == 0 || raw.len() % row_bytes != 0 {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_argument(),
            format!("raw vector batch of {} bytes is not a multiple of {row_bytes}", raw.len()),
        ));
    }
    let row_count = raw.len() / row_bytes;
    if row_ids.len() != row_count * 8 {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_argument(),
            format!("row id batch has {} bytes, expected {}", row_ids.len(), row_count * 8),
        ));
    }

    let read_i64 = |offset: usize| -> Result<i64> {
        row_ids
            .get(offset..offset + 8)
            .and_then(|slice| slice.try_into().ok())
            .map(i64::from_le_bytes)
            .ok_or_else(|| ErrorEnvelope::expected(ErrorCode::invalid_argument(), "truncated row id"))
    };
    let read_f32 = |offset: usize| -> Result<f32> {
        raw.get(offset..offset + 4)
            .and_then(|slice| slice.try_into().ok())
            .map(f32::from_le_bytes)
            .ok_or_else(|| ErrorEnvelope::expected(ErrorCode::invalid_argument(), "truncated vector component"))
    };

    let mut records = Vec::with_capacity(row_count);
    for row in 0..row_count {
        let id = read_i64(row * 8)?;
        let mut vector = Vec::with_capacity(dim);
        for component in 0..dim {
            vector.push(read_f32(row * row_bytes + component * 4)?);
        }
        records.push(VectorRecord { id, vector });
    }
    Ok(records)
}

async fn execute_phase(job: &QueuedJob, loaded: LoadedInput, store: &Arc<dyn SegmentStore>) -> Result<TaskOutcome> {
    match (&job.scheduled.task, loaded) {
        (Task::Search { query, k, .. }, LoadedInput::Index(index)) => {
            let rows = query_rows(query)?;
            let mut matches = Vec::new();
            for row in rows {
                matches.extend(index.search(&row, *k as usize)?);
            }
            Ok(TaskOutcome::SearchMatches(matches))
        },
        (Task::Build { segment_ref, .. }, LoadedInput::RawBatch(records)) => {
            let mut index = new_index(job.segment.engine_type, job.segment.dimension)?;
            if index.engine_type().is_trainable() {
                let sample: Vec<Vec<f32>> = records.iter().map(|record| record.vector.clone()).collect();
                index.train(&sample)?;
            }
            index.add(records)?;
            let blob = index.to_blob()?;
            let artifact = SegmentArtifact::Index { engine_tag: engine_tag(job.segment.engine_type) };
            store.write_artifact(&job.ctx, segment_ref, artifact, blob).await?;
            Ok(TaskOutcome::Acknowledged)
        },
        (Task::Load { .. }, LoadedInput::Bytes) => Ok(TaskOutcome::Acknowledged),
        _ => Err(ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            "task and loaded input did not match",
            ErrorClass::NonRetriable,
        )),
    }
}

fn query_rows(query: &VectorsData) -> Result<Vec<Vec<f32>>> {
    match query {
        VectorsData::Dense { values, dimension, .. } => {
            let dim = *dimension as usize;
            Ok(values.chunks(dim).map(<[f32]>::to_vec).collect())
        },
        VectorsData::Binary { .. } => {
            Err(ErrorEnvelope::expected(ErrorCode::index_not_supported(), "binary metric search is not supported"))
        },
    }
}

fn new_index(engine_type: EngineType, dimension: u32) -> Result<Box<dyn VectorIndex>> {
    match engine_type {
        EngineType::Flat => Ok(Box::new(FlatIndex::new(dimension))),
        EngineType::IvfFlat | EngineType::IvfSq8 | EngineType::IvfPq => Ok(Box::new(IvfIndex::new(dimension))),
        EngineType::Hnsw => Ok(Box::new(HnswIndex::new(dimension, HnswParams::default())?)),
        EngineType::Nsg => Ok(Box::new(NsgIndex::new(dimension))),
    }
}

const fn engine_tag(engine_type: EngineType) -> &'static str {
    match engine_type {
        EngineType::Flat => "flat",
        EngineType::IvfFlat => "ivf_flat",
        EngineType::IvfSq8 => "ivf_sq8",
        EngineType::IvfPq => "ivf_pq",
        EngineType::Hnsw => "hnsw",
        EngineType::Nsg => "nsg",
    }
}
