//! Scheduler task payloads, labels, and the task lifecycle state machine.

use crate::primitives::{JobId, SegmentFileId};
use crate::resource::Resource;
use crate::vectors::VectorsData;
use segmentdb_shared::ErrorEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resource label attached to a task once a placement pass accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecResLabel {
    /// The resource this task has been routed to.
    pub resource: Resource,
}

impl SpecResLabel {
    /// Label a task for the given resource.
    #[must_use]
    pub const fn new(resource: Resource) -> Self {
        Self { resource }
    }
}

/// Runtime parameters carried alongside a query (`nprobe`, `ef`, `search_k`,
/// and any engine-specific knobs); passed through to the vector index
/// verbatim.
pub type QueryParams = Value;

/// A unit of scheduler work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// Find the top-K nearest neighbors of a query batch within one segment.
    Search {
        /// Target segment.
        segment_ref: SegmentFileId,
        /// Query vectors (one or more rows).
        query: VectorsData,
        /// Number of neighbors requested per query row.
        k: u32,
        /// Engine-specific runtime parameters.
        params: QueryParams,
    },
    /// Build (train + add, or an atomic variant-specific build) an index for
    /// a segment.
    Build {
        /// Target segment.
        segment_ref: SegmentFileId,
        /// Index construction parameters.
        index_spec: QueryParams,
    },
    /// Load a segment's index artifact onto a device's cache.
    Load {
        /// Target segment.
        segment_ref: SegmentFileId,
        /// Destination device.
        device: Resource,
    },
}

impl Task {
    /// The segment this task operates on.
    #[must_use]
    pub const fn segment_ref(&self) -> &SegmentFileId {
        match self {
            Self::Search { segment_ref, .. }
            | Self::Build { segment_ref, .. }
            | Self::Load { segment_ref, .. } => segment_ref,
        }
    }
}

/// A submitted task paired with its scheduling metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Stable identifier for this submission.
    pub job_id: JobId,
    /// The work to perform.
    pub task: Task,
    /// The resource this task has been routed to, once a pass accepts it.
    pub label: Option<SpecResLabel>,
    /// Current lifecycle state.
    pub state: TaskState,
}

impl ScheduledTask {
    /// Submit a new task; starts in `TaskState::New`, unlabeled.
    #[must_use]
    pub fn submit(task: Task) -> Self {
        Self {
            job_id: JobId::generate(),
            task,
            label: None,
            state: TaskState::New,
        }
    }
}

/// The task lifecycle: `New -> Scheduled -> Loading -> Executing ->
/// Completed | Failed | Cancelled`. Terminal states are sticky: once a task
/// reaches `Completed`, `Failed`, or `Cancelled` it never transitions again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskState {
    /// Submitted, not yet evaluated by the placement pass chain.
    New,
    /// A placement pass has attached a label; queued on its resource.
    Scheduled,
    /// The resource worker is loading the task's inputs (e.g. via the cache).
    Loading,
    /// The resource worker is running the task.
    Executing,
    /// Finished successfully.
    Completed,
    /// Finished with an error; resource remains healthy.
    Failed {
        /// The terminal error.
        error: ErrorEnvelope,
    },
    /// Dropped before or during dispatch, never produced a result.
    Cancelled,
}

impl TaskState {
    /// Returns true for the three terminal states.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. } | Self::Cancelled)
    }

    /// Validate and apply a transition, rejecting any move out of a
    /// terminal state or any move that skips the expected sequence.
    pub fn transition(&mut self, next: Self) -> Result<(), TaskTransitionError> {
        if self.is_terminal() {
            return Err(TaskTransitionError {
                from: self.clone(),
                to: next,
            });
        }

        let allowed = matches!(
            (&*self, &next),
            (Self::New, Self::Scheduled)
                | (Self::New, Self::Cancelled)
                | (Self::Scheduled, Self::Loading)
                | (Self::Scheduled, Self::Cancelled)
                | (Self::Loading, Self::Executing)
                | (Self::Loading, Self::Failed { .. })
                | (Self::Loading, Self::Cancelled)
                | (Self::Executing, Self::Completed)
                | (Self::Executing, Self::Failed { .. })
                | (Self::Executing, Self::Cancelled)
        );

        if !allowed {
            return Err(TaskTransitionError {
                from: self.clone(),
                to: next,
            });
        }

        *self = next;
        Ok(())
    }
}

/// An illegal task-state transition was attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTransitionError {
    /// The state the task was in.
    pub from: TaskState,
    /// The state transition that was rejected.
    pub to: TaskState,
}

impl std::fmt::Display for TaskTransitionError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "illegal task transition from {:?} to {:?}",
            self.from, self.to
        )
    }
}

impl std::error::Error for TaskTransitionError {}

#[cfg(test)]
mod tests {
    use super::*;
    use segmentdb_shared::{ErrorCode, ErrorEnvelope};

    #[test]
    fn happy_path_transitions_succeed() {
        let mut state = TaskState::New;
        state.transition(TaskState::Scheduled).expect("new->scheduled");
        state.transition(TaskState::Loading).expect("scheduled->loading");
        state.transition(TaskState::Executing).expect("loading->executing");
        state.transition(TaskState::Completed).expect("executing->completed");
        assert!(state.is_terminal());
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut state = TaskState::Completed;
        let result = state.transition(TaskState::Executing);
        assert!(result.is_err());
    }

    #[test]
    fn cannot_skip_scheduling() {
        let mut state = TaskState::New;
        let result = state.transition(TaskState::Executing);
        assert!(result.is_err());
    }

    #[test]
    fn failure_carries_error_envelope() {
        let mut state = TaskState::Loading;
        let error = ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            "kernel panic",
            segmentdb_shared::ErrorClass::NonRetriable,
        );
        state
            .transition(TaskState::Failed { error: error.clone() })
            .expect("loading->failed");
        assert!(state.is_terminal());
    }
}
