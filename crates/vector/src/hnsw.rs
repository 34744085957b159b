//! HNSW graph index, backed by `hnsw_rs`. Always trained, fully incremental.

use crate::{VectorIndex, VectorMatch, VectorRecord, blob};
use hnsw_rs::prelude::{DistCosine, Hnsw, Neighbour};
use segmentdb_domain::EngineType;
use segmentdb_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

const HNSW_SNAPSHOT_VERSION: u32 = 1;
/// Byte width of each `u64` param field in the blob payload header.
const PARAM_FIELD_LEN: usize = 8;

/// Configuration for the HNSW graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HnswParams {
    /// Maximum number of connections per node.
    pub max_nb_connection: usize,
    /// Maximum graph layer count.
    pub max_layer: usize,
    /// Construction search width.
    pub ef_construction: usize,
    /// Search width.
    pub ef_search: usize,
    /// Expected number of elements (allocation hint).
    pub max_elements: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_nb_connection: 16,
            max_layer: 16,
            ef_construction: 200,
            ef_search: 50,
            max_elements: 100_000,
        }
    }
}

fn read_u64(payload: &[u8], offset: usize) -> Result<u64, blob::BlobError> {
    payload
        .get(offset..offset + PARAM_FIELD_LEN)
        .and_then(|slice| slice.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(blob::BlobError::Truncated {
            found: payload.len(),
            needed: offset + PARAM_FIELD_LEN,
        })
}

/// Graph-based ANN index. Always considered trained; vectors may be added
/// and removed incrementally.
pub struct HnswIndex {
    dimension: u32,
    params: HnswParams,
    graph: Hnsw<'static, f32, DistCosine>,
    records: Vec<VectorRecord>,
    id_to_index: HashMap<i64, usize>,
    deleted: HashSet<usize>,
}

impl HnswIndex {
    /// Create a new HNSW index for the given dimension.
    pub fn new(dimension: u32, params: HnswParams) -> Result<Self> {
        if dimension == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("vector", "invalid_dimension"),
                "dimension must be greater than zero",
            ));
        }
        let max_elements = params.max_elements.max(1);
        let graph = Hnsw::new(
            params.max_nb_connection,
            max_elements,
            params.max_layer,
            params.ef_construction,
            DistCosine,
        );
        Ok(Self {
            dimension,
            params,
            graph,
            records: Vec::new(),
            id_to_index: HashMap::new(),
            deleted: HashSet::new(),
        })
    }

    pub(crate) fn from_blob(bytes: &[u8]) -> Result<Self> {
        let (engine, payload) = blob::read_blob(bytes)?;
        if engine != EngineType::Hnsw {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("vector", "engine_mismatch"),
                "blob is not an hnsw index",
            ));
        }
        let version = blob::read_u32(payload, 0)?;
        if version != HNSW_SNAPSHOT_VERSION {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("vector", "snapshot_version_mismatch"),
                "hnsw snapshot version mismatch",
            )
            .with_metadata("found", version.to_string())
            .with_metadata("expected", HNSW_SNAPSHOT_VERSION.to_string()));
        }
        let dimension = blob::read_u32(payload, 4)?;
        let mut params = HnswParams {
            max_nb_connection: read_u64(payload, 8)? as usize,
            max_layer: read_u64(payload, 16)? as usize,
            ef_construction: read_u64(payload, 24)? as usize,
            ef_search: read_u64(payload, 32)? as usize,
            max_elements: read_u64(payload, 40)? as usize,
        };
        let records = blob::decode_records(payload.get(48..).unwrap_or_default())?;

        params.max_elements = params.max_elements.max(records.len().max(1));

        let mut index = Self::new(dimension, params)?;
        index.add(records)?;
        Ok(index)
    }
}

impl VectorIndex for HnswIndex {
    fn engine_type(&self) -> EngineType {
        EngineType::Hnsw
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

            self.graph.insert((record.vector.as_slice(), index));
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
        if self.is_empty() || topk == 0 {
            return Ok(Vec::new());
        }
        ensure_dimension(self.dimension, query)?;

        let total = self.records.len();
        let requested = topk.min(total);
        let knbn = (requested.saturating_mul(5)).max(requested).min(total);
        let ef_search = self.params.ef_search.max(knbn);

        let neighbours = self.graph.search(query, knbn, ef_search);
        let mut matches = to_matches(&self.records, &self.deleted, neighbours);

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(requested);
        Ok(matches)
    }

    fn len(&self) -> usize {
        self.id_to_index.len()
    }

    fn to_blob(&self) -> Result<Vec<u8>> {
        let mut ordered: BTreeMap<i64, &VectorRecord> = BTreeMap::new();
        for (&id, &index) in &self.id_to_index {
            if let Some(record) = self.records.get(index) {
                ordered.insert(id, record);
            }
        }
        let records: Vec<VectorRecord> = ordered.into_values().cloned().collect();

        let mut payload = HNSW_SNAPSHOT_VERSION.to_le_bytes().to_vec();
        payload.extend_from_slice(&self.dimension.to_le_bytes());
        payload.extend_from_slice(&(self.params.max_nb_connection as u64).to_le_bytes());
        payload.extend_from_slice(&(self.params.max_layer as u64).to_le_bytes());
        payload.extend_from_slice(&(self.params.ef_construction as u64).to_le_bytes());
        payload.extend_from_slice(&(self.params.ef_search as u64).to_le_bytes());
        payload.extend_from_slice(&(self.params.max_elements as u64).to_le_bytes());
        payload.extend_from_slice(&blob::encode_records(&records));
        Ok(blob::write_blob(EngineType::Hnsw, &payload))
    }
}

fn ensure_dimension(dimension: u32, vector: &[f32]) -> Result<()> {
    let dimension = usize::try_from(dimension).map_err(|_| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("vector", "invalid_dimension"),
            "dimension conversion overflow",
            ErrorClass::NonRetriable,
        )
    })?;
    if vector.len() != dimension {
        return Err(ErrorEnvelope::expected(
            ErrorCode::new("vector", "invalid_dimension"),
            "vector dimension mismatch",
        )
        .with_metadata("expected", dimension.to_string())
        .with_metadata("found", vector.len().to_string()));
    }
    Ok(())
}

fn to_matches(
    records: &[VectorRecord],
    deleted: &HashSet<usize>,
    neighbours: Vec<Neighbour>,
) -> Vec<VectorMatch> {
    neighbours
        .into_iter()
        .filter_map(|neighbour| {
            let index = neighbour.d_id;
            if deleted.contains(&index) {
                return None;
            }
            let record = records.get(index)?;
            let score = (1.0 - neighbour.distance).max(0.0);
            Some(VectorMatch { id: record.id, score })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trip_restores_index() -> Result<()> {
        let mut index = HnswIndex::new(2, HnswParams::default())?;
        index.add(vec![VectorRecord { id: 1, vector: vec![0.5, 0.5] }])?;

        let blob = VectorIndex::to_blob(&index)?;
        let restored = HnswIndex::from_blob(&blob)?;
        let matches = restored.search(&[0.5, 0.5], 1)?;

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, 1);
        Ok(())
    }

    #[test]
    fn search_prefers_closer_vectors() -> Result<()> {
        let mut index = HnswIndex::new(2, HnswParams::default())?;
        index.add(vec![
            VectorRecord { id: 1, vector: vec![0.1, 0.1] },
            VectorRecord { id: 2, vector: vec![0.9, 0.9] },
        ])?;

        let matches = index.search(&[0.1, 0.1], 2)?;
        assert_eq!(matches.first().map(|m| m.id), Some(1));
        Ok(())
    }

    #[test]
    fn invalid_dimension_rejected() {
        let result = HnswIndex::new(0, HnswParams::default());
        assert!(result.is_err());
    }
}
