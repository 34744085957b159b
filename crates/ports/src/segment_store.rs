//! `SegmentStore`: the boundary to a segment's physical on-disk files.
//!
//! A segment directory holds a handful of flat artifacts (raw vectors, the
//! row-id array, a deletion bitmap, and zero or more built index blobs). This
//! port covers reading and writing those artifacts without committing to any
//! particular filesystem, object store, or mmap strategy on the other side.

use crate::BoxFuture;
use segmentdb_domain::SegmentFileId;
use segmentdb_shared::concurrency::RequestContext;
use segmentdb_shared::errors::ErrorEnvelope;

/// The four artifact kinds that make up a segment's on-disk footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentArtifact {
    /// `rv.bin` - raw row-major vector payload.
    RawVectors,
    /// `uid.bin` - row-id array, one `i64` per row.
    RowIds,
    /// `del.bin` - deletion bitmap, one bit per row.
    DeletionBitmap,
    /// `<engine>.idx` - a built index blob for the named engine variant.
    Index {
        /// Engine tag embedded in the file name (e.g. `"hnsw"`, `"ivf_flat"`).
        engine_tag: &'static str,
    },
}

/// Boundary to the physical storage backing a segment's files.
///
/// Implementations own durability (fsync, replication, checksums) and are
/// free to colocate artifacts however suits the backing store; this trait
/// only fixes the logical read/write/delete surface the rest of the system
/// depends on.
pub trait SegmentStore: Send + Sync {
    /// Write an artifact's full contents, replacing any prior version.
    fn write_artifact<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
        artifact: SegmentArtifact,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>>;

    /// Read an artifact's full contents.
    fn read_artifact<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
        artifact: SegmentArtifact,
    ) -> BoxFuture<'a, Result<Vec<u8>, ErrorEnvelope>>;

    /// Returns true if the artifact exists for this segment.
    fn has_artifact<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
        artifact: SegmentArtifact,
    ) -> BoxFuture<'a, Result<bool, ErrorEnvelope>>;

    /// Remove every artifact belonging to a segment.
    fn delete_segment<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>>;
}

/// Blanket impl so callers can hold `Arc<dyn SegmentStore>` directly.
impl SegmentStore for std::sync::Arc<dyn SegmentStore> {
    fn write_artifact<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
        artifact: SegmentArtifact,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
        (**self).write_artifact(ctx, segment_ref, artifact, bytes)
    }

    fn read_artifact<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
        artifact: SegmentArtifact,
    ) -> BoxFuture<'a, Result<Vec<u8>, ErrorEnvelope>> {
        (**self).read_artifact(ctx, segment_ref, artifact)
    }

    fn has_artifact<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
        artifact: SegmentArtifact,
    ) -> BoxFuture<'a, Result<bool, ErrorEnvelope>> {
        (**self).has_artifact(ctx, segment_ref, artifact)
    }

    fn delete_segment<'a>(
        &'a self,
        ctx: &'a RequestContext,
        segment_ref: &'a SegmentFileId,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
        (**self).delete_segment(ctx, segment_ref)
    }
}
