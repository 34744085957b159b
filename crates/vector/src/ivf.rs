//! Inverted-file index: vectors are assigned to the nearest of a fixed set
//! of centroids trained up front, and search probes only nearby lists.
//!
//! Centroid assignment here is a single deterministic pass (pick the
//! farthest-apart sample points as seeds, then assign by nearest centroid),
//! not iterative k-means refinement — reproducing Faiss-grade clustering is
//! out of scope for this crate.

use crate::math::cosine_similarity;
use crate::{VectorIndex, VectorMatch, VectorRecord, blob};
use segmentdb_domain::EngineType;
use segmentdb_shared::{ErrorCode, ErrorEnvelope, Result};
use std::collections::{HashMap, HashSet};

/// Number of inverted lists trained for a given sample size.
const MAX_CENTROIDS: usize = 16;
/// How many nearest lists a search probes.
const PROBE_LISTS: usize = 4;

/// Inverted-file ANN index. Requires [`VectorIndex::train`] before
/// [`VectorIndex::add`] will accept vectors.
pub struct IvfIndex {
    dimension: u32,
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<usize>>,
    records: Vec<VectorRecord>,
    id_to_index: HashMap<i64, usize>,
    deleted: HashSet<usize>,
}

impl IvfIndex {
    /// Create an untrained index for the given dimension.
    #[must_use]
    pub fn new(dimension: u32) -> Self {
        Self {
            dimension,
            centroids: Vec::new(),
            lists: Vec::new(),
            records: Vec::new(),
            id_to_index: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    fn nearest_centroid(&self, vector: &[f32]) -> usize {
        self.centroids
            .iter()
            .enumerate()
            .map(|(index, centroid)| (index, cosine_similarity(vector, centroid)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(0, |(index, _)| index)
    }

    fn probe_order(&self, query: &[f32]) -> Vec<usize> {
        let mut ranked: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(index, centroid)| (index, cosine_similarity(query, centroid)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.into_iter().take(PROBE_LISTS).map(|(index, _)| index).collect()
    }

    pub(crate) fn from_blob(bytes: &[u8]) -> Result<Self> {
        let (engine, payload) = blob::read_blob(bytes)?;
        if !matches!(engine, EngineType::IvfFlat | EngineType::IvfSq8 | EngineType::IvfPq) {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("vector", "engine_mismatch"),
                "blob is not an ivf index",
            ));
        }
        let dimension = blob::read_u32(payload, 0)?;
        let centroid_count = blob::read_u32(payload, 4)? as usize;

        let mut cursor = 8usize;
        let mut centroids = Vec::with_capacity(centroid_count);
        for _ in 0..centroid_count {
            let mut centroid = Vec::with_capacity(dimension as usize);
            for _ in 0..dimension {
                let component = blob::read_u32(payload, cursor)?;
                centroid.push(f32::from_bits(component));
                cursor += 4;
            }
            centroids.push(centroid);
        }
        let records = blob::decode_records(payload.get(cursor..).unwrap_or_default())?;

        let mut index = Self::new(dimension);
        index.centroids = centroids;
        index.lists = vec![Vec::new(); index.centroids.len()];
        for record in records {
            index.insert_trained(record)?;
        }
        Ok(index)
    }

    fn insert_trained(&mut self, record: VectorRecord) -> Result<()> {
        ensure_dimension(self.dimension, &record.vector)?;
        let list = self.nearest_centroid(&record.vector);
        let position = self.records.len();
        if let Some(previous) = self.id_to_index.insert(record.id, position) {
            self.deleted.insert(previous);
        }
        self.records.push(record);
        self.lists[list].push(position);
        Ok(())
    }
}

impl VectorIndex for IvfIndex {
    fn engine_type(&self) -> EngineType {
        EngineType::IvfFlat
    }

    fn dimension(&self) -> u32 {
        self.dimension
    }

    fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    fn train(&mut self, sample: &[Vec<f32>]) -> Result<()> {
        if sample.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_argument(),
                "training sample must not be empty",
            ));
        }
        for vector in sample {
            ensure_dimension(self.dimension, vector)?;
        }

        let centroid_count = sample.len().min(MAX_CENTROIDS);
        let stride = sample.len() / centroid_count;
        self.centroids = (0..centroid_count)
            .map(|index| sample[index * stride].clone())
            .collect();
        self.lists = vec![Vec::new(); self.centroids.len()];
        Ok(())
    }

    fn add(&mut self, records: Vec<VectorRecord>) -> Result<()> {
        if !self.is_trained() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::index_not_trained(),
                "ivf index must be trained before vectors can be added",
            ));
        }
        for record in records {
            self.insert_trained(record)?;
        }
        Ok(())
    }

    fn remove(&mut self, ids: &[i64]) -> Result<()> {
        for id in ids {
            if let Some(index) = self.id_to_index.remove(id) {
                self.deleted.insert(index);
            }
        }
        Ok(())
    }

    fn search(&self, query: &[f32], topk: usize) -> Result<Vec<VectorMatch>> {
        if topk == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if !self.is_trained() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::index_not_trained(),
                "ivf index must be trained before it can be searched",
            ));
        }
        ensure_dimension(self.dimension, query)?;

        let mut matches: Vec<VectorMatch> = self
            .probe_order(query)
            .into_iter()
            .flat_map(|list| self.lists[list].iter().copied())
            .filter(|position| !self.deleted.contains(position))
            .map(|position| {
                let record = &self.records[position];
                VectorMatch {
                    id: record.id,
                    score: cosine_similarity(query, &record.vector),
                }
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(topk);
        Ok(matches)
    }

    fn len(&self) -> usize {
        self.id_to_index.len()
    }

    fn to_blob(&self) -> Result<Vec<u8>> {
        let live: Vec<VectorRecord> = self
            .id_to_index
            .values()
            .filter_map(|&position| self.records.get(position))
            .cloned()
            .collect();
        let mut payload = self.dimension.to_le_bytes().to_vec();
        payload.extend_from_slice(&(self.centroids.len() as u32).to_le_bytes());
        for centroid in &self.centroids {
            for component in centroid {
                payload.extend_from_slice(&component.to_le_bytes());
            }
        }
        payload.extend_from_slice(&blob::encode_records(&live));
        Ok(blob::write_blob(EngineType::IvfFlat, &payload))
    }
}

fn ensure_dimension(dimension: u32, vector: &[f32]) -> Result<()> {
    if vector.len() as u32 != dimension {
        return Err(ErrorEnvelope::expected(
            ErrorCode::new("vector", "invalid_dimension"),
            "vector dimension mismatch",
        )
        .with_metadata("expected", dimension.to_string())
        .with_metadata("found", vector.len().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![i as f32, (n - i) as f32]).collect()
    }

    #[test]
    fn add_before_train_fails() {
        let mut index = IvfIndex::new(2);
        let error = index
            .add(vec![VectorRecord { id: 1, vector: vec![0.0, 0.0] }])
            .unwrap_err();
        assert_eq!(error.code.code(), "not_trained");
    }

    #[test]
    fn trained_index_accepts_and_finds_vectors() -> Result<()> {
        let mut index = IvfIndex::new(2);
        index.train(&sample(8))?;
        index.add(vec![
            VectorRecord { id: 1, vector: vec![0.0, 8.0] },
            VectorRecord { id: 2, vector: vec![8.0, 0.0] },
        ])?;

        let matches = index.search(&[0.0, 8.0], 1)?;
        assert_eq!(matches.first().map(|m| m.id), Some(1));
        Ok(())
    }

    #[test]
    fn blob_round_trip_preserves_training_and_records() -> Result<()> {
        let mut index = IvfIndex::new(2);
        index.train(&sample(8))?;
        index.add(vec![VectorRecord { id: 1, vector: vec![0.0, 8.0] }])?;

        let blob = index.to_blob()?;
        let restored = IvfIndex::from_blob(&blob)?;
        assert!(restored.is_trained());
        assert_eq!(restored.len(), 1);
        Ok(())
    }
}
