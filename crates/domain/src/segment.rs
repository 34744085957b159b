//! Segment file schema and the mutable holder used during merge planning.

use crate::primitives::{CollectionId, PartitionTag, SegmentFileId};
use serde::{Deserialize, Serialize};

/// Distance metric a segment's vectors are compared under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricType {
    /// Euclidean distance.
    L2,
    /// Inner product.
    Ip,
    /// Hamming distance (binary vectors).
    Hamming,
    /// Jaccard distance (binary vectors).
    Jaccard,
    /// Tanimoto distance (binary vectors).
    Tanimoto,
    /// Substructure chemical-fingerprint matching.
    Substructure,
    /// Superstructure chemical-fingerprint matching.
    Superstructure,
}

impl MetricType {
    /// Returns true when a smaller score is a better match under this metric.
    #[must_use]
    pub const fn smaller_is_better(self) -> bool {
        matches!(self, Self::L2 | Self::Hamming)
    }
}

/// ANN index engine family a segment is built (or will be built) with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngineType {
    /// Exact brute-force search, no training.
    Flat,
    /// Inverted-file index, no compression.
    IvfFlat,
    /// Inverted-file index with scalar quantization.
    IvfSq8,
    /// Inverted-file index with product quantization.
    IvfPq,
    /// Hierarchical navigable small world graph.
    Hnsw,
    /// Navigating spreading-out graph (build-only, non-incremental).
    Nsg,
}

impl EngineType {
    /// Returns true if the engine family requires a training step before
    /// vectors can be added.
    #[must_use]
    pub const fn is_trainable(self) -> bool {
        matches!(self, Self::IvfFlat | Self::IvfSq8 | Self::IvfPq)
    }

    /// Returns true if the engine family supports incremental `add` calls
    /// after the index has been built once.
    #[must_use]
    pub const fn is_incremental(self) -> bool {
        !matches!(self, Self::Nsg)
    }
}

/// Lifecycle state of a segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Freshly flushed from an ingest buffer; not yet indexed.
    Raw,
    /// Output of a merge, awaiting promotion to an index build.
    NewMerge,
    /// Selected for index construction.
    ToIndex,
    /// Built index artifact, eligible for search.
    Index,
    /// Superseded by a merge; retained until garbage collection.
    Backup,
}

/// The atomic unit of storage and merge: a single on-disk segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSchema {
    /// Opaque, collection-unique identifier.
    pub file_id: SegmentFileId,
    /// Owning collection.
    pub collection_id: CollectionId,
    /// Owning partition within the collection.
    pub partition_tag: PartitionTag,
    /// Vector dimensionality.
    pub dimension: u32,
    /// Distance metric vectors in this segment are compared under.
    pub metric_type: MetricType,
    /// ANN engine family this segment is (or will be) indexed with.
    pub engine_type: EngineType,
    /// Current on-disk size in bytes.
    pub file_size: u64,
    /// Configured merge ceiling for files produced from this segment's lineage.
    pub index_file_size_target: u64,
    /// Number of rows (vectors) contained in the segment.
    pub row_count: u64,
    /// Creation timestamp, microseconds since the Unix epoch.
    pub created_on: u64,
    /// Current lifecycle state.
    pub file_type: FileType,
}

impl SegmentSchema {
    /// A segment is eligible for merge planning only once it declares a
    /// positive merge ceiling.
    #[must_use]
    pub const fn is_merge_eligible(&self) -> bool {
        self.index_file_size_target > 0
    }

    /// Age of the segment relative to `now`, saturating at zero for clock
    /// skew (a segment that appears to have been created in the future).
    #[must_use]
    pub const fn age_micros(&self, now_micros: u64) -> u64 {
        now_micros.saturating_sub(self.created_on)
    }
}

/// A mutable working set of segment files under active merge planning.
///
/// Membership in a single holder is expected to be disjoint across
/// concurrent planners operating on the same collection+partition; this type
/// itself performs no locking, it is a plain in-memory collection consumed
/// by a single planning pass at a time.
#[derive(Debug, Clone, Default)]
pub struct FilesHolder {
    files: Vec<SegmentSchema>,
}

impl FilesHolder {
    /// Build a holder from an owned set of candidate segment files.
    #[must_use]
    pub const fn new(files: Vec<SegmentSchema>) -> Self {
        Self { files }
    }

    /// Number of files currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true when the holder is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Borrow the held files.
    #[must_use]
    pub fn as_slice(&self) -> &[SegmentSchema] {
        &self.files
    }

    /// Remove a file from the holder without deleting it; signals "leave
    /// this file alone" to the caller rather than discarding its data.
    pub fn unmark_file(&mut self, file_id: &SegmentFileId) -> Option<SegmentSchema> {
        let position = self.files.iter().position(|file| &file.file_id == file_id)?;
        Some(self.files.remove(position))
    }

    /// Consume the holder, returning the remaining files.
    #[must_use]
    pub fn into_files(self) -> Vec<SegmentSchema> {
        self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(file_id: &str, size: u64) -> SegmentSchema {
        SegmentSchema {
            file_id: SegmentFileId::parse(file_id).expect("valid id"),
            collection_id: CollectionId::parse("coll").expect("valid id"),
            partition_tag: PartitionTag::default_tag(),
            dimension: 8,
            metric_type: MetricType::L2,
            engine_type: EngineType::Flat,
            file_size: size,
            index_file_size_target: 1 << 30,
            row_count: 100,
            created_on: 0,
            file_type: FileType::Raw,
        }
    }

    #[test]
    fn unmark_file_removes_without_panicking_on_miss() {
        let mut holder = FilesHolder::new(vec![sample("a", 10), sample("b", 20)]);
        let removed = holder.unmark_file(&SegmentFileId::parse("a").expect("valid id"));
        assert!(removed.is_some());
        assert_eq!(holder.len(), 1);

        let missing = holder.unmark_file(&SegmentFileId::parse("z").expect("valid id"));
        assert!(missing.is_none());
        assert_eq!(holder.len(), 1);
    }

    #[test]
    fn metric_ordering_direction() {
        assert!(MetricType::L2.smaller_is_better());
        assert!(!MetricType::Ip.smaller_is_better());
    }

    #[test]
    fn engine_capability_flags() {
        assert!(!EngineType::Flat.is_trainable());
        assert!(EngineType::IvfFlat.is_trainable());
        assert!(!EngineType::Nsg.is_incremental());
        assert!(EngineType::Hnsw.is_incremental());
    }
}
