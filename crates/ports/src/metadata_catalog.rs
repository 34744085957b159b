//! `MetadataCatalog`: the boundary to the external segment-metadata store.
//!
//! Segment schemas (file size, row count, engine type, file type) are
//! registered and queried through this port. The catalog itself - whatever
//! backs it - owns durability and consistency; this crate only fixes the
//! shape of the conversation.

use crate::BoxFuture;
use segmentdb_domain::{CollectionId, PartitionTag, SegmentFileId, SegmentSchema};
use segmentdb_shared::concurrency::RequestContext;
use segmentdb_shared::errors::ErrorEnvelope;

/// Boundary to the catalog of segment metadata rows.
pub trait MetadataCatalog: Send + Sync {
    /// Register a newly created segment.
    fn register_segment<'a>(
        &'a self,
        ctx: &'a RequestContext,
        schema: SegmentSchema,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>>;

    /// Overwrite an existing segment's row, e.g. after a merge or an index
    /// build flips `file_type`.
    fn update_segment<'a>(
        &'a self,
        ctx: &'a RequestContext,
        schema: SegmentSchema,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>>;

    /// List every segment belonging to a collection/partition pair.
    fn list_segments<'a>(
        &'a self,
        ctx: &'a RequestContext,
        collection_id: &'a CollectionId,
        partition_tag: &'a PartitionTag,
    ) -> BoxFuture<'a, Result<Vec<SegmentSchema>, ErrorEnvelope>>;

    /// Fetch a single segment's row, if it exists.
    fn get_segment<'a>(
        &'a self,
        ctx: &'a RequestContext,
        file_id: &'a SegmentFileId,
    ) -> BoxFuture<'a, Result<Option<SegmentSchema>, ErrorEnvelope>>;

    /// Remove a segment's row (its files have already been reclaimed).
    fn delete_segment<'a>(
        &'a self,
        ctx: &'a RequestContext,
        file_id: &'a SegmentFileId,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>>;
}

/// Blanket impl so callers can hold `Arc<dyn MetadataCatalog>` directly.
impl MetadataCatalog for std::sync::Arc<dyn MetadataCatalog> {
    fn register_segment<'a>(
        &'a self,
        ctx: &'a RequestContext,
        schema: SegmentSchema,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
        (**self).register_segment(ctx, schema)
    }

    fn update_segment<'a>(
        &'a self,
        ctx: &'a RequestContext,
        schema: SegmentSchema,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
        (**self).update_segment(ctx, schema)
    }

    fn list_segments<'a>(
        &'a self,
        ctx: &'a RequestContext,
        collection_id: &'a CollectionId,
        partition_tag: &'a PartitionTag,
    ) -> BoxFuture<'a, Result<Vec<SegmentSchema>, ErrorEnvelope>> {
        (**self).list_segments(ctx, collection_id, partition_tag)
    }

    fn get_segment<'a>(
        &'a self,
        ctx: &'a RequestContext,
        file_id: &'a SegmentFileId,
    ) -> BoxFuture<'a, Result<Option<SegmentSchema>, ErrorEnvelope>> {
        (**self).get_segment(ctx, file_id)
    }

    fn delete_segment<'a>(
        &'a self,
        ctx: &'a RequestContext,
        file_id: &'a SegmentFileId,
    ) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
        (**self).delete_segment(ctx, file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_object_safe(_: &dyn MetadataCatalog) {}

    struct UnimplementedCatalog;

    impl MetadataCatalog for UnimplementedCatalog {
        fn register_segment<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            _schema: SegmentSchema,
        ) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
            Box::pin(async { Ok(()) })
        }

        fn update_segment<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            _schema: SegmentSchema,
        ) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
            Box::pin(async { Ok(()) })
        }

        fn list_segments<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            _collection_id: &'a CollectionId,
            _partition_tag: &'a PartitionTag,
        ) -> BoxFuture<'a, Result<Vec<SegmentSchema>, ErrorEnvelope>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn get_segment<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            _file_id: &'a SegmentFileId,
        ) -> BoxFuture<'a, Result<Option<SegmentSchema>, ErrorEnvelope>> {
            Box::pin(async { Ok(None) })
        }

        fn delete_segment<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            _file_id: &'a SegmentFileId,
        ) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn metadata_catalog_is_object_safe() {
        let catalog = UnimplementedCatalog;
        assert_object_safe(&catalog);
    }
}
