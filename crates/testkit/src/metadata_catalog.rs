//! In-memory [`MetadataCatalog`] fake backed by a `Mutex<HashMap>`.

use segmentdb_domain::{CollectionId, PartitionTag, SegmentFileId, SegmentSchema};
use segmentdb_ports::{BoxFuture, MetadataCatalog};
use segmentdb_shared::concurrency::RequestContext;
use segmentdb_shared::errors::ErrorEnvelope;
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory stand-in for a real metadata catalog, for use in tests.
#[derive(Debug, Default)]
pub struct InMemoryMetadataCatalog {
    rows: Mutex<HashMap<SegmentFileId, SegmentSchema>>,
}

impl InMemoryMetadataCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog with a row, bypassing the async API. Handy for test
    /// setup where spelling out a `register_segment` call adds no signal.
    pub fn seed(&self, schema: SegmentSchema) {
        let mut rows = self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        rows.insert(schema.file_id.clone(), schema);
    }
}

impl MetadataCatalog for InMemoryMetadataCatalog {
    fn register_segment<'a>(&'a self, ctx: &'a RequestContext, schema: SegmentSchema) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("metadata_catalog.register_segment")?;
            let mut rows = self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            rows.insert(schema.file_id.clone(), schema);
            Ok(())
        })
    }

    fn update_segment<'a>(&'a self, ctx: &'a RequestContext, schema: SegmentSchema) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("metadata_catalog.update_segment")?;
            let mut rows = self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            rows.insert(schema.file_id.clone(), schema);
            Ok(())
        })
    }

    fn list_segments<'a>(
        &'a self,
        ctx: &'a RequestContext,
        collection_id: &'a CollectionId,
        partition_tag: &'a PartitionTag,
    ) -> BoxFuture<'a, Result<Vec<SegmentSchema>, ErrorEnvelope>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("metadata_catalog.list_segments")?;
            let rows = self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut matches: Vec<SegmentSchema> = rows
                .values()
                .filter(|row| &row.collection_id == collection_id && &row.partition_tag == partition_tag)
                .cloned()
                .collect();
            matches.sort_by(|a, b| a.file_id.cmp(&b.file_id));
            Ok(matches)
        })
    }

    fn get_segment<'a>(&'a self, ctx: &'a RequestContext, file_id: &'a SegmentFileId) -> BoxFuture<'a, Result<Option<SegmentSchema>, ErrorEnvelope>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("metadata_catalog.get_segment")?;
            let rows = self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Ok(rows.get(file_id).cloned())
        })
    }

    fn delete_segment<'a>(&'a self, ctx: &'a RequestContext, file_id: &'a SegmentFileId) -> BoxFuture<'a, Result<(), ErrorEnvelope>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("metadata_catalog.delete_segment")?;
            let mut rows = self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            rows.remove(file_id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmentdb_domain::{EngineType, FileType, MetricType};

    fn schema(id: &str, collection: &str, partition: &str) -> SegmentSchema {
        SegmentSchema {
            file_id: SegmentFileId::parse(id).expect("valid id"),
            collection_id: CollectionId::parse(collection).expect("valid id"),
            partition_tag: PartitionTag::parse(partition).expect("valid id"),
            dimension: 8,
            metric_type: MetricType::L2,
            engine_type: EngineType::Flat,
            file_size: 10,
            index_file_size_target: 1 << 30,
            row_count: 1,
            created_on: 0,
            file_type: FileType::Raw,
        }
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let catalog = InMemoryMetadataCatalog::new();
        let ctx = RequestContext::new_request();
        let row = schema("seg-1", "coll", "part_a");

        catalog.register_segment(&ctx, row.clone()).await.expect("register");
        let fetched = catalog.get_segment(&ctx, &row.file_id).await.expect("get");
        assert_eq!(fetched, Some(row));
    }

    #[tokio::test]
    async fn update_segment_overwrites_existing_row() {
        let catalog = InMemoryMetadataCatalog::new();
        let ctx = RequestContext::new_request();
        let mut row = schema("seg-1", "coll", "part_a");

        catalog.register_segment(&ctx, row.clone()).await.expect("register");
        row.file_type = FileType::Index;
        catalog.update_segment(&ctx, row.clone()).await.expect("update");

        let fetched = catalog.get_segment(&ctx, &row.file_id).await.expect("get");
        assert_eq!(fetched.map(|r| r.file_type), Some(FileType::Index));
    }

    #[tokio::test]
    async fn list_segments_filters_by_collection_and_partition() {
        let catalog = InMemoryMetadataCatalog::new();
        let ctx = RequestContext::new_request();

        catalog.seed(schema("a", "coll", "part_a"));
        catalog.seed(schema("b", "coll", "part_a"));
        catalog.seed(schema("c", "coll", "part_b"));
        catalog.seed(schema("d", "other", "part_a"));

        let collection = CollectionId::parse("coll").expect("valid id");
        let partition = PartitionTag::parse("part_a").expect("valid id");
        let rows = catalog.list_segments(&ctx, &collection, &partition).await.expect("list");

        let ids: Vec<&str> = rows.iter().map(|row| row.file_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn delete_segment_removes_the_row() {
        let catalog = InMemoryMetadataCatalog::new();
        let ctx = RequestContext::new_request();
        let row = schema("seg-1", "coll", "part_a");

        catalog.register_segment(&ctx, row.clone()).await.expect("register");
        catalog.delete_segment(&ctx, &row.file_id).await.expect("delete");

        assert_eq!(catalog.get_segment(&ctx, &row.file_id).await.expect("get"), None);
    }
}
