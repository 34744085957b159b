//! Vector batch payloads submitted on ingest.

use segmentdb_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error constructing a `VectorsData` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorsDataError {
    /// The batch contained zero rows.
    EmptyBatch,
    /// A dense payload's length was not a multiple of the declared dimension.
    DenseLengthMismatch {
        /// Total number of `f32` values supplied.
        total_len: usize,
        /// Declared dimension.
        dimension: u32,
    },
    /// A binary payload's length was not a multiple of the packed row width.
    BinaryLengthMismatch {
        /// Total number of bytes supplied.
        total_len: usize,
        /// Declared dimension (bits per row).
        dimension: u32,
    },
    /// A caller-supplied id array did not match the row count.
    IdArrayLengthMismatch {
        /// Number of rows implied by the vector payload.
        row_count: usize,
        /// Number of ids supplied.
        id_count: usize,
    },
}

impl fmt::Display for VectorsDataError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBatch => formatter.write_str("vector batch must contain at least one row"),
            Self::DenseLengthMismatch {
                total_len,
                dimension,
            } => write!(
                formatter,
                "dense payload length {total_len} is not a multiple of dimension {dimension}"
            ),
            Self::BinaryLengthMismatch {
                total_len,
                dimension,
            } => write!(
                formatter,
                "binary payload length {total_len} is not a multiple of packed row width for dimension {dimension}"
            ),
            Self::IdArrayLengthMismatch {
                row_count,
                id_count,
            } => write!(
                formatter,
                "id array length {id_count} does not match row count {row_count}"
            ),
        }
    }
}

impl std::error::Error for VectorsDataError {}

impl From<VectorsDataError> for ErrorEnvelope {
    fn from(error: VectorsDataError) -> Self {
        Self::expected(ErrorCode::invalid_argument(), error.to_string())
    }
}

/// Raw vector payload for an insert: either dense `f32` rows or packed
/// binary rows, plus an optional caller-supplied id array.
///
/// When `id_array` is absent, ids must be allocated from the id generator
/// before the batch can be written to a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VectorsData {
    /// Dense float vectors, row-major, `n * dimension` total values.
    Dense {
        /// Row-major packed values.
        values: Vec<f32>,
        /// Per-row dimensionality.
        dimension: u32,
        /// Caller-supplied external ids, one per row, if provided.
        id_array: Option<Vec<i64>>,
    },
    /// Packed binary vectors, row-major, `n * dimension / 8` total bytes.
    Binary {
        /// Row-major packed bytes.
        values: Vec<u8>,
        /// Per-row dimensionality, in bits.
        dimension: u32,
        /// Caller-supplied external ids, one per row, if provided.
        id_array: Option<Vec<i64>>,
    },
}

impl VectorsData {
    /// Build a dense batch, validating row alignment and id-array length.
    pub fn dense(
        values: Vec<f32>,
        dimension: u32,
        id_array: Option<Vec<i64>>,
    ) -> Result<Self, VectorsDataError> {
        let dim = dimension as usize;
        if dim == 0 || values.is_empty() {
            return Err(VectorsDataError::EmptyBatch);
        }
        if values.len() % dim != 0 {
            return Err(VectorsDataError::DenseLengthMismatch {
                total_len: values.len(),
                dimension,
            });
        }
        let row_count = values.len() / dim;
        if let Some(ids) = &id_array {
            if ids.len() != row_count {
                return Err(VectorsDataError::IdArrayLengthMismatch {
                    row_count,
                    id_count: ids.len(),
                });
            }
        }

        Ok(Self::Dense {
            values,
            dimension,
            id_array,
        })
    }

    /// Build a binary batch, validating row alignment and id-array length.
    pub fn binary(
        values: Vec<u8>,
        dimension: u32,
        id_array: Option<Vec<i64>>,
    ) -> Result<Self, VectorsDataError> {
        let row_bytes = (dimension as usize).div_ceil(8);
        if row_bytes == 0 || values.is_empty() {
            return Err(VectorsDataError::EmptyBatch);
        }
        if values.len() % row_bytes != 0 {
            return Err(VectorsDataError::BinaryLengthMismatch {
                total_len: values.len(),
                dimension,
            });
        }
        let row_count = values.len() / row_bytes;
        if let Some(ids) = &id_array {
            if ids.len() != row_count {
                return Err(VectorsDataError::IdArrayLengthMismatch {
                    row_count,
                    id_count: ids.len(),
                });
            }
        }

        Ok(Self::Binary {
            values,
            dimension,
            id_array,
        })
    }

    /// Number of rows (vectors) in this batch.
    #[must_use]
    pub fn row_count(&self) -> usize {
        match self {
            Self::Dense {
                values, dimension, ..
            } => values.len() / (*dimension as usize).max(1),
            Self::Binary {
                values, dimension, ..
            } => values.len() / (*dimension as usize).div_ceil(8).max(1),
        }
    }

    /// Declared dimensionality of each row.
    #[must_use]
    pub const fn dimension(&self) -> u32 {
        match self {
            Self::Dense { dimension, .. } | Self::Binary { dimension, .. } => *dimension,
        }
    }

    /// Caller-supplied ids, if any were provided on insert.
    ///
    /// Per the ingest precedence rule: ids are allocated from the id
    /// generator only when this returns `None`.
    #[must_use]
    pub fn id_array(&self) -> Option<&[i64]> {
        match self {
            Self::Dense { id_array, .. } | Self::Binary { id_array, .. } => {
                id_array.as_deref()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_batch_computes_row_count() {
        let batch = VectorsData::dense(vec![0.0; 16], 8, None).expect("valid batch");
        assert_eq!(batch.row_count(), 2);
        assert!(batch.id_array().is_none());
    }

    #[test]
    fn dense_batch_rejects_misaligned_length() {
        let error = VectorsData::dense(vec![0.0; 15], 8, None).unwrap_err();
        assert!(matches!(error, VectorsDataError::DenseLengthMismatch { .. }));
    }

    #[test]
    fn dense_batch_rejects_mismatched_id_array() {
        let error = VectorsData::dense(vec![0.0; 16], 8, Some(vec![1])).unwrap_err();
        assert!(matches!(
            error,
            VectorsDataError::IdArrayLengthMismatch { .. }
        ));
    }

    #[test]
    fn binary_batch_computes_row_count() {
        let batch = VectorsData::binary(vec![0u8; 2], 8, None).expect("valid batch");
        assert_eq!(batch.row_count(), 2);
    }

    #[test]
    fn caller_supplied_ids_take_precedence() {
        let batch = VectorsData::dense(vec![0.0; 8], 8, Some(vec![42])).expect("valid batch");
        assert_eq!(batch.id_array(), Some([42i64].as_slice()));
    }
}
