//! In-memory [`SegmentStore`] fake backed by a `Mutex<HashMap>`.

use segmentdb_domain::SegmentFileId;
use segmentdb_ports::{BoxFuture, SegmentArtifact, SegmentStore};
use segmentdb_shared::concurrency::RequestContext;
use segmentdb_shared::errors::{ErrorCode, ErrorEnvelope};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory stand-in for a real segment store, for use in tests.
///
/// Every artifact is held as a plain `Vec<u8>` behind a single mutex; there is
/// no attempt at concurrency beyond what the mutex provides, which is fine
/// for the single-threaded or lightly-concurrent test scenarios this is
/// built for.
#[derive(Debug, Default)]
pub struct InMemorySegmentStore {
    artifacts: Mutex<HashMap<(SegmentFileId, SegmentArtifact), Vec<u8>>>,
}

impl InMemorySegmentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of artifacts currently held, across all segments.
    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.artifacts.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

impl SegmentStore for InMemorySegmentStore {
    fn write_artifact<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
        artifact: SegmentArtifact,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("segment_store.write_artifact")?;
            let mut artifacts = self.artifacts.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            artifacts.insert((segment_ref.clone(), artifact), bytes);
            Ok(())
        })
    }

    fn read_artifact<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
        artifact: SegmentArtifact,
    ) -> BoxFuture<'a, Result<Vec<u8>, ErrorEnvelope>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("segment_store.read_artifact")?;
            let artifacts = self.artifacts.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            artifacts.get(&(segment_ref.clone(), artifact)).cloned().ok_or_else(|| {
                ErrorEnvelope::expected(ErrorCode::not_found(), format!("no artifact for segment {segment_ref}"))
            })
        })
    }

    fn has_artifact<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
        artifact: SegmentArtifact,
    ) -> BoxFuture<'a, Result<bool, ErrorEnvelope>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("segment_store.has_artifact")?;
            let artifacts = self.artifacts.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Ok(artifacts.contains_key(&(segment_ref.clone(), artifact)))
        })
    }

    fn delete_segment<'a>(&'a self, ctx: &'a RequestContext, segment_ref: &'a SegmentFileId) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("segment_store.delete_segment")?;
            let mut artifacts = self.artifacts.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            artifacts.retain(|(file_id, _), _| file_id != segment_ref);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> SegmentFileId {
        SegmentFileId::parse(name).expect("valid id")
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = InMemorySegmentStore::new();
        let ctx = RequestContext::new_request();
        let seg = id("seg-1");

        store.write_artifact(&ctx, &seg, SegmentArtifact::RawVectors, vec![1, 2, 3]).await.expect("write");
        let bytes = store.read_artifact(&ctx, &seg, SegmentArtifact::RawVectors).await.expect("read");
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(store.has_artifact(&ctx, &seg, SegmentArtifact::RawVectors).await.expect("has"));
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found() {
        let store = InMemorySegmentStore::new();
        let ctx = RequestContext::new_request();
        let seg = id("seg-1");

        let result = store.read_artifact(&ctx, &seg, SegmentArtifact::DeletionBitmap).await;
        assert!(matches!(result, Err(e) if e.code == ErrorCode::not_found()));
    }

    #[tokio::test]
    async fn delete_segment_removes_every_artifact() {
        let store = InMemorySegmentStore::new();
        let ctx = RequestContext::new_request();
        let seg = id("seg-1");

        store.write_artifact(&ctx, &seg, SegmentArtifact::RawVectors, vec![1]).await.expect("write");
        store.write_artifact(&ctx, &seg, SegmentArtifact::RowIds, vec![2]).await.expect("write");
        store.delete_segment(&ctx, &seg).await.expect("delete");

        assert_eq!(store.artifact_count(), 0);
    }

    #[tokio::test]
    async fn distinct_segments_do_not_collide() {
        let store = InMemorySegmentStore::new();
        let ctx = RequestContext::new_request();

        store.write_artifact(&ctx, &id("seg-1"), SegmentArtifact::RawVectors, vec![1]).await.expect("write");
        store.write_artifact(&ctx, &id("seg-2"), SegmentArtifact::RawVectors, vec![2]).await.expect("write");
        store.delete_segment(&ctx, &id("seg-1")).await.expect("delete");

        assert!(store.has_artifact(&ctx, &id("seg-2"), SegmentArtifact::RawVectors).await.expect("has"));
        assert!(!store.has_artifact(&ctx, &id("seg-1"), SegmentArtifact::RawVectors).await.expect("has"));
    }
}
