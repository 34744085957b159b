//! Exact brute-force search. No training step, fully incremental.

use crate::math::cosine_similarity;
use crate::{VectorIndex, VectorMatch, VectorRecord, blob};
use segmentdb_domain::EngineType;
use segmentdb_shared::{ErrorCode, ErrorEnvelope, Result};
use std::collections::{HashMap, HashSet};

/// Brute-force exact-search index: scans every live vector per query.
pub struct FlatIndex {
    dimension: u32,
    records: Vec<VectorRecord>,
    id_to_index: HashMap<i64, usize>,
    deleted: HashSet<usize>,
}

impl FlatIndex {
    /// Create an empty index for the given dimension.
    #[must_use]
    pub fn new(dimension: u32) -> Self {
        Self {
            dimension,
            records: Vec::new(),
            id_to_index: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    pub(crate) fn from_blob(bytes: &[u8]) -> Result<Self> {
        let (engine, payload) = blob::read_blob(bytes)?;
        if engine != EngineType::Flat {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("vector", "engine_mismatch"),
                "blob is not a flat index",
            ));
        }
        let dimension = blob::read_u32(payload, 0)?;
        let records = blob::decode_records(payload.get(4..).unwrap_or_default())?;

        let mut index = Self::new(dimension);
        index.add(records)?;
        Ok(index)
    }
}

impl VectorIndex for FlatIndex {
    fn engine_type(&self) -> EngineType {
        EngineType::Flat
    }

    fn dimension(&self) -> u32 {
        self.dimension
    }

    fn is_trained(&self) -> bool {
        true
    }

    fn train(&mut self, _sample: &[Vec<f32>]) -> Result<()> {
        Ok(())
    }

    fn add(&mut self, records: Vec<VectorRecord>) -> Result<()> {
        for record in records {
            ensure_dimension(self.dimension, &record.vector)?;
            let index = self.records.len();
            if let Some(previous) = self.id_to_index.insert(record.id, index) {
                self.deleted.insert(previous);
            }
            self.records.push(record);
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
        ensure_dimension(self.dimension, query)?;

        let mut matches: Vec<VectorMatch> = self
            .records
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.deleted.contains(index))
            .map(|(_, record)| VectorMatch {
                id: record.id,
                score: cosine_similarity(query, &record.vector),
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
            .filter_map(|&index| self.records.get(index))
            .cloned()
            .collect();
        let mut payload = self.dimension.to_le_bytes().to_vec();
        payload.extend_from_slice(&blob::encode_records(&live));
        Ok(blob::write_blob(EngineType::Flat, &payload))
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

    #[test]
    fn search_prefers_closer_vectors() -> Result<()> {
        let mut index = FlatIndex::new(2);
        index.add(vec![
            VectorRecord { id: 1, vector: vec![0.1, 0.1] },
            VectorRecord { id: 2, vector: vec![0.9, 0.9] },
        ])?;

        let matches = index.search(&[0.1, 0.1], 2)?;
        assert_eq!(matches.first().map(|m| m.id), Some(1));
        Ok(())
    }

    #[test]
    fn removed_vectors_are_excluded() -> Result<()> {
        let mut index = FlatIndex::new(2);
        index.add(vec![VectorRecord { id: 1, vector: vec![0.5, 0.5] }])?;
        index.remove(&[1])?;
        let matches = index.search(&[0.5, 0.5], 1)?;
        assert!(matches.is_empty());
        Ok(())
    }

    #[test]
    fn blob_round_trip_preserves_live_records() -> Result<()> {
        let mut index = FlatIndex::new(2);
        index.add(vec![
            VectorRecord { id: 1, vector: vec![0.5, 0.5] },
            VectorRecord { id: 2, vector: vec![0.1, 0.2] },
        ])?;
        index.remove(&[2])?;

        let blob = index.to_blob()?;
        let restored = FlatIndex::from_blob(&blob)?;
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.search(&[0.5, 0.5], 1)?.first().map(|m| m.id), Some(1));
        Ok(())
    }
}
