//! The scheduler: accepts tasks, places them via the pass chain, and hands
//! callers a handle they can await now or later.

use crate::cache::DeviceCache;
use crate::config::{RoutingConfig, RoutingConfigHandle, RoutingConfigSender};
use crate::pass::{PassContext, PlacementPass};
use crate::pool::{QueuedJob, ResourcePool, TaskCompletion, TaskOutcome};
use segmentdb_domain::{JobId, Resource, ScheduledTask, SpecResLabel, Task, TaskState};
use segmentdb_ports::{MetadataCatalog, SegmentStore};
use segmentdb_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Construction parameters for a [`Scheduler`].
pub struct SchedulerOptions {
    /// CPU, disk, and GPU resources the scheduler has workers for.
    pub resources: Vec<Resource>,
    /// Per-resource queue depth before `submit` blocks.
    pub queue_capacity: usize,
    /// Routing configuration in effect at startup.
    pub initial_routing: RoutingConfig,
}

/// A handle to a task's eventual result. Callers may `.await` it
/// immediately or hold onto it and poll later.
pub struct ScheduledTaskHandle {
    /// The job id assigned at submission time.
    pub job_id: JobId,
    rx: oneshot::Receiver<TaskCompletion>,
}

impl ScheduledTaskHandle {
    /// Waits for the task to reach a terminal state and returns its result.
    pub async fn await_result(self) -> Result<TaskOutcome> {
        match self.rx.await {
            Ok(completion) => completion.outcome,
            Err(_dropped) => Err(ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                "task result channel dropped before completion",
                ErrorClass::NonRetriable,
            )),
        }
    }
}

struct SchedulerInner {
    pool: ResourcePool,
    passes: Vec<Box<dyn PlacementPass>>,
    catalog: Arc<dyn MetadataCatalog>,
    routing: RoutingConfigHandle,
}

impl SchedulerInner {
    fn place(&self, job: &QueuedJob) -> Option<Resource> {
        let routing = self.routing.current();
        let healthy = self.pool.healthy_resources();
        let pass_ctx = PassContext {
            task: &job.scheduled.task,
            segment: &job.segment,
            routing: &routing,
            healthy_resources: &healthy,
        };
        crate::pass::run_chain(&self.passes, &pass_ctx)
    }
}

/// Places and dispatches tasks across CPU/GPU/disk resources.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Builds a scheduler with the given passes, spawning one worker per
    /// resource in `options.resources` plus a supervisor that re-places any
    /// job orphaned by a worker panic.
    pub fn new(
        options: SchedulerOptions,
        passes: Vec<Box<dyn PlacementPass>>,
        catalog: Arc<dyn MetadataCatalog>,
        store: Arc<dyn SegmentStore>,
        cache: Arc<dyn DeviceCache>,
    ) -> Result<(Self, RoutingConfigSender)> {
        let (routing_sender, routing) = RoutingConfigSender::new(options.initial_routing);
        let (replacement_tx, replacement_rx) = mpsc::unbounded_channel();
        let pool = ResourcePool::new(&options.resources, store, cache, replacement_tx, options.queue_capacity)?;

        let inner = Arc::new(SchedulerInner { pool, passes, catalog, routing });
        spawn_supervisor(Arc::clone(&inner), replacement_rx);
        Ok((Self { inner }, routing_sender))
    }

    /// Submits a task for placement and dispatch.
    pub async fn submit(&self, ctx: RequestContext, task: Task) -> Result<ScheduledTaskHandle> {
        let mut scheduled = ScheduledTask::submit(task);
        let job_id = scheduled.job_id.clone();
        let segment_ref = scheduled.task.segment_ref().clone();

        let segment = self
            .inner
            .catalog
            .get_segment(&ctx, &segment_ref)
            .await?
            .ok_or_else(|| ErrorEnvelope::expected(ErrorCode::not_found(), format!("segment {segment_ref} not found")))?;

        let decision = match &scheduled.task {
            Task::Load { device, .. } => Some(*device),
            _ => {
                let routing = self.inner.routing.current();
                let healthy = self.inner.pool.healthy_resources();
                let pass_ctx = PassContext {
                    task: &scheduled.task,
                    segment: &segment,
                    routing: &routing,
                    healthy_resources: &healthy,
                };
                crate::pass::run_chain(&self.inner.passes, &pass_ctx)
            },
        };

        let Some(resource) = decision else {
            let error = ErrorEnvelope::expected(ErrorCode::resource_unavailable(), "no healthy resource accepted this task");
            let _ = scheduled.state.transition(TaskState::Failed { error: error.clone() });
            return Err(error);
        };

        scheduled
            .state
            .transition(TaskState::Scheduled)
            .map_err(|transition_error| ErrorEnvelope::invariant(ErrorCode::internal(), transition_error.to_string()))?;
        scheduled.label = Some(SpecResLabel::new(resource));

        if ctx.is_cancelled() {
            let _ = scheduled.state.transition(TaskState::Cancelled);
            return Err(ErrorEnvelope::cancelled("task cancelled before dispatch"));
        }

        let (respond, rx) = oneshot::channel();
        let job = QueuedJob { scheduled, segment, ctx: ctx.clone(), respond };
        self.inner.pool.enqueue(resource, &ctx, job).await?;

        Ok(ScheduledTaskHandle { job_id, rx })
    }
}

/// Drains jobs orphaned by a worker panic, re-running the pass chain against
/// the surviving resources and either re-enqueuing or failing each one.
fn spawn_supervisor(inner: Arc<SchedulerInner>, mut replacement_rx: mpsc::UnboundedReceiver<QueuedJob>) {
    tokio::spawn(async move {
        while let Some(job) = replacement_rx.recv().await {
            let decision = inner.place(&job);
            let QueuedJob { mut scheduled, segment, ctx, respond } = job;

            let Some(resource) = decision else {
                let error = ErrorEnvelope::expected(
                    ErrorCode::resource_unavailable(),
                    "no healthy resource accepted this task after a worker panic",
                );
                let _ = scheduled.state.transition(TaskState::Failed { error: error.clone() });
                let _ = respond.send(TaskCompletion { scheduled, outcome: Err(error) });
                continue;
            };

            scheduled.label = Some(SpecResLabel::new(resource));
            let retry_job = QueuedJob { scheduled, segment, ctx: ctx.clone(), respond };
            if let Err(enqueue_error) = inner.pool.enqueue(resource, &ctx, retry_job).await {
                tracing::warn!(error = %enqueue_error, "failed to re-enqueue orphaned job");
            }
        }
    });
}
