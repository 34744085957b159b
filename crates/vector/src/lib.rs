//! # segmentdb-vector
//!
//! The vector indexing kernel: a single object-safe `VectorIndex` trait with
//! one implementation per ANN engine family (`Flat`, `Ivf`, `Hnsw`, `Nsg`),
//! plus a tagged binary blob format used to persist a built index to a
//! `<engine>.idx` segment artifact. This crate depends only on `shared`.
//!
//! Raw ANN kernel performance (SIMD distance kernels, production-grade IVF
//! clustering, graph construction heuristics) is out of scope here — the
//! kernel math is intentionally simple. What this crate owns is the engine
//! lifecycle: trained/untrained state, incremental-vs-build-only semantics,
//! and the serialized artifact format every engine shares.

mod blob;
mod flat;
mod hnsw;
mod ivf;
mod math;
mod nsg;

use segmentdb_shared::Result;
use serde::{Deserialize, Serialize};

pub use blob::{BlobError, read_blob, write_blob};
pub use flat::FlatIndex;
pub use hnsw::{HnswIndex, HnswParams};
pub use ivf::IvfIndex;
pub use nsg::NsgIndex;
pub use segmentdb_domain::EngineType;

/// Record stored inside any vector index variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    /// Stable external identifier for this vector (the segment row id).
    pub id: i64,
    /// Dense vector payload.
    pub vector: Vec<f32>,
}

/// Search match with similarity score. Higher is always better: callers
/// never need to know whether the underlying engine is smaller-is-better.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    /// External identifier for this vector.
    pub id: i64,
    /// Similarity score, normalized into `[0, 1]` where larger is closer.
    pub score: f32,
}

/// The behavior every ANN engine family exposes, independent of its
/// internal representation. Object-safe so a scheduler pass can hold
/// `Box<dyn VectorIndex>` without knowing which engine built it.
pub trait VectorIndex: Send + Sync {
    /// The engine family this index implements.
    fn engine_type(&self) -> EngineType;

    /// Vector dimensionality this index was created for.
    fn dimension(&self) -> u32;

    /// Whether the index has completed training (trivially `true` for
    /// engines that don't require one, per [`EngineType::is_trainable`]).
    fn is_trained(&self) -> bool;

    /// Train the index on a representative sample of vectors. A no-op,
    /// returning `Ok(())`, on engines that don't require training.
    fn train(&mut self, sample: &[Vec<f32>]) -> Result<()>;

    /// Add vectors to the index. Fails with `index.not_trained` if the
    /// engine requires training and hasn't received it yet, and with
    /// `index.not_incremental` if the engine is build-only and has already
    /// been built once.
    fn add(&mut self, records: Vec<VectorRecord>) -> Result<()>;

    /// Remove vectors by id (tombstone; storage is reclaimed on rebuild).
    fn remove(&mut self, ids: &[i64]) -> Result<()>;

    /// Search for the `topk` nearest neighbours of `query`.
    fn search(&self, query: &[f32], topk: usize) -> Result<Vec<VectorMatch>>;

    /// Number of live (non-tombstoned) vectors in the index.
    fn len(&self) -> usize;

    /// True when the index holds no live vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize the index to a `<engine>.idx` blob (magic header + payload).
    fn to_blob(&self) -> Result<Vec<u8>>;
}

/// Reconstructs a `Box<dyn VectorIndex>` from a previously-serialized blob,
/// dispatching on the engine tag recorded in the blob header.
pub fn load_index(bytes: &[u8]) -> Result<Box<dyn VectorIndex>> {
    let engine = blob::peek_engine_type(bytes)?;
    match engine {
        EngineType::Flat => Ok(Box::new(FlatIndex::from_blob(bytes)?)),
        EngineType::IvfFlat | EngineType::IvfSq8 | EngineType::IvfPq => {
            Ok(Box::new(IvfIndex::from_blob(bytes)?))
        },
        EngineType::Hnsw => Ok(Box::new(HnswIndex::from_blob(bytes)?)),
        EngineType::Nsg => Ok(Box::new(NsgIndex::from_blob(bytes)?)),
    }
}

/// Returns the vector crate version.
#[must_use]
pub const fn vector_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
