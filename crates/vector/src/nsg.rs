//! Navigating spreading-out graph: build-only, non-incremental. The graph is
//! constructed once from a full batch of vectors; any later `add` fails.

use crate::math::cosine_similarity;
use crate::{VectorIndex, VectorMatch, VectorRecord, blob};
use segmentdb_domain::EngineType;
use segmentdb_shared::{ErrorCode, ErrorEnvelope, Result};

/// Out-degree of each node in the constructed graph.
const NEIGHBOURS_PER_NODE: usize = 8;

fn encode_edges(edges: &[Vec<usize>]) -> Vec<u8> {
    let mut out = (edges.len() as u64).to_le_bytes().to_vec();
    for neighbours in edges {
        out.extend_from_slice(&(neighbours.len() as u32).to_le_bytes());
        for &neighbour in neighbours {
            out.extend_from_slice(&(neighbour as u32).to_le_bytes());
        }
    }
    out
}

fn decode_edges(bytes: &[u8]) -> Result<Vec<Vec<usize>>, blob::BlobError> {
    let mut cursor = 0usize;
    let read_u64 = |cursor: &mut usize| -> Result<u64, blob::BlobError> {
        let end = *cursor + 8;
        let slice = bytes.get(*cursor..end).ok_or(blob::BlobError::Truncated {
            found: bytes.len(),
            needed: end,
        })?;
        *cursor = end;
        Ok(u64::from_le_bytes(slice.try_into().expect("8-byte slice")))
    };
    let node_count = read_u64(&mut cursor)?;

    let mut edges = Vec::with_capacity(node_count as usize);
    for _ in 0..node_count {
        let neighbour_count = {
            let end = cursor + 4;
            let slice = bytes.get(cursor..end).ok_or(blob::BlobError::Truncated {
                found: bytes.len(),
                needed: end,
            })?;
            cursor = end;
            u32::from_le_bytes(slice.try_into().expect("4-byte slice"))
        };
        let mut neighbours = Vec::with_capacity(neighbour_count as usize);
        for _ in 0..neighbour_count {
            let end = cursor + 4;
            let slice = bytes.get(cursor..end).ok_or(blob::BlobError::Truncated {
                found: bytes.len(),
                needed: end,
            })?;
            cursor = end;
            neighbours.push(u32::from_le_bytes(slice.try_into().expect("4-byte slice")) as usize);
        }
        edges.push(neighbours);
    }
    Ok(edges)
}

/// Build-only ANN graph index. `add` succeeds exactly once; the graph is
/// immutable after that, matching [`EngineType::is_incremental`] for
/// [`EngineType::Nsg`].
pub struct NsgIndex {
    dimension: u32,
    records: Vec<VectorRecord>,
    edges: Vec<Vec<usize>>,
    built: bool,
}

impl NsgIndex {
    /// Create an empty, not-yet-built index for the given dimension.
    #[must_use]
    pub fn new(dimension: u32) -> Self {
        Self {
            dimension,
            records: Vec::new(),
            edges: Vec::new(),
            built: false,
        }
    }

    fn build_edges(records: &[VectorRecord]) -> Vec<Vec<usize>> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let mut ranked: Vec<(usize, f32)> = records
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != index)
                    .map(|(other, candidate)| {
                        (other, cosine_similarity(&record.vector, &candidate.vector))
                    })
                    .collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
                ranked.into_iter().take(NEIGHBOURS_PER_NODE).map(|(other, _)| other).collect()
            })
            .collect()
    }

    pub(crate) fn from_blob(bytes: &[u8]) -> Result<Self> {
        let (engine, payload) = blob::read_blob(bytes)?;
        if engine != EngineType::Nsg {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("vector", "engine_mismatch"),
                "blob is not an nsg index",
            ));
        }
        let dimension = blob::read_u32(payload, 0)?;
        let (records, records_len) =
            blob::decode_records_with_len(payload.get(4..).unwrap_or_default())?;
        let edges = decode_edges(payload.get(4 + records_len..).unwrap_or_default())?;

        Ok(Self {
            dimension,
            records,
            edges,
            built: true,
        })
    }
}

impl VectorIndex for NsgIndex {
    fn engine_type(&self) -> EngineType {
        EngineType::Nsg
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
        if self.built {
            return Err(ErrorEnvelope::expected(
                ErrorCode::not_incremental(),
                "nsg index is build-only and has already been built",
            ));
        }
        for record in &records {
            ensure_dimension(self.dimension, &record.vector)?;
        }

        self.edges = Self::build_edges(&records);
        self.records = records;
        self.built = true;
        Ok(())
    }

    fn remove(&mut self, ids: &[i64]) -> Result<()> {
        if !self.built {
            return Ok(());
        }
        let keep: std::collections::HashSet<i64> = self
            .records
            .iter()
            .map(|record| record.id)
            .filter(|id| !ids.contains(id))
            .collect();
        self.records.retain(|record| keep.contains(&record.id));
        self.edges = Self::build_edges(&self.records);
        Ok(())
    }

    fn search(&self, query: &[f32], topk: usize) -> Result<Vec<VectorMatch>> {
        if !self.built || topk == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }
        ensure_dimension(self.dimension, query)?;

        // Edges are persisted for the artifact format but search here scans
        // every live record; a real greedy graph walk is out of scope.
        let mut matches: Vec<VectorMatch> = self
            .records
            .iter()
            .map(|record| VectorMatch {
                id: record.id,
                score: cosine_similarity(query, &record.vector),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(topk);
        Ok(matches)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn to_blob(&self) -> Result<Vec<u8>> {
        let mut payload = self.dimension.to_le_bytes().to_vec();
        payload.extend_from_slice(&blob::encode_records(&self.records));
        payload.extend_from_slice(&encode_edges(&self.edges));
        Ok(blob::write_blob(EngineType::Nsg, &payload))
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
    fn second_add_fails_not_incremental() -> Result<()> {
        let mut index = NsgIndex::new(2);
        index.add(vec![VectorRecord { id: 1, vector: vec![0.1, 0.1] }])?;
        let error = index
            .add(vec![VectorRecord { id: 2, vector: vec![0.2, 0.2] }])
            .unwrap_err();
        assert_eq!(error.code.code(), "not_incremental");
        Ok(())
    }

    #[test]
    fn search_after_build_returns_matches() -> Result<()> {
        let mut index = NsgIndex::new(2);
        index.add(vec![
            VectorRecord { id: 1, vector: vec![0.1, 0.1] },
            VectorRecord { id: 2, vector: vec![0.9, 0.9] },
        ])?;

        let matches = index.search(&[0.1, 0.1], 1)?;
        assert_eq!(matches.first().map(|m| m.id), Some(1));
        Ok(())
    }

    #[test]
    fn blob_round_trip_preserves_built_graph() -> Result<()> {
        let mut index = NsgIndex::new(2);
        index.add(vec![VectorRecord { id: 1, vector: vec![0.5, 0.5] }])?;

        let blob = index.to_blob()?;
        let restored = NsgIndex::from_blob(&blob)?;
        assert_eq!(restored.len(), 1);
        let error = {
            let mut restored = restored;
            restored
                .add(vec![VectorRecord { id: 2, vector: vec![0.1, 0.1] }])
                .unwrap_err()
        };
        assert_eq!(error.code.code(), "not_incremental");
        Ok(())
    }
}
