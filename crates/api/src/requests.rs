//! Search request DTO, validation, and its normalized internal form.
//!
//! Validation here is shape-level only (required fields, topk bounds,
//! exactly one of `vectors`/`binaryVectors`, uniform row width). Whether the
//! collection exists, and whether the row width matches its declared
//! dimension, are domain-level checks made once the request reaches a
//! collection/partition that actually exists.

use schemars::JsonSchema;
use segmentdb_domain::{CollectionId, PartitionTag};
use segmentdb_shared::errors::{ErrorCode, ErrorEnvelope};
use segmentdb_shared::validation::{Validate, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A search request as received on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, segmentdb_validate_derive::Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[validate(error = "SearchRequestError")]
pub struct SearchRequestDto {
    /// Target collection name.
    #[validate(non_empty)]
    pub collection: String,
    /// Partitions to search; empty means every partition.
    #[serde(default)]
    pub partition_tags: Vec<String>,
    /// Dense query rows, row-major. Mutually exclusive with `binary_vectors`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<Vec<Vec<f32>>>,
    /// Packed binary query rows, row-major. Mutually exclusive with `vectors`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_vectors: Option<Vec<Vec<u8>>>,
    /// Neighbors requested per query row.
    #[validate(field = "topk", range(min = 1, max = 16384))]
    pub topk: i64,
    /// Engine-specific runtime parameters (`nprobe`, `ef`, `search_k`, ...).
    #[serde(default)]
    pub params: JsonValue,
}

/// Query rows after shape validation, normalized to exactly one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryVectors {
    /// Dense float rows, each of the same width.
    Dense(Vec<Vec<f32>>),
    /// Packed binary rows, each of the same width.
    Binary(Vec<Vec<u8>>),
}

impl QueryVectors {
    /// Number of query rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        match self {
            Self::Dense(rows) => rows.len(),
            Self::Binary(rows) => rows.len(),
        }
    }
}

/// A validated, normalized search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Validated target collection.
    pub collection: CollectionId,
    /// Validated target partitions; empty means every partition.
    pub partition_tags: Vec<PartitionTag>,
    /// Normalized query rows.
    pub vectors: QueryVectors,
    /// Neighbors requested per query row.
    pub topk: u32,
    /// Engine-specific runtime parameters, passed through unvalidated.
    pub params: JsonValue,
}

/// Validation failures specific to the search request shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRequestError {
    /// A required string field is empty after trimming.
    EmptyField {
        /// Field name that failed validation.
        field: &'static str,
    },
    /// A field value is invalid for a specific reason.
    InvalidField {
        /// Field name that failed validation.
        field: &'static str,
        /// Short reason describing why validation failed.
        reason: &'static str,
    },
    /// A numeric field is out of bounds.
    OutOfRange {
        /// Field name that failed validation.
        field: &'static str,
        /// Value provided (stringified).
        value: String,
        /// Inclusive minimum bound (stringified).
        min: String,
        /// Inclusive maximum bound (stringified).
        max: String,
    },
    /// Neither or both of `vectors`/`binaryVectors` were supplied.
    AmbiguousQueryVectors,
    /// The query batch had rows of differing widths.
    RaggedQueryRows,
}

impl fmt::Display for SearchRequestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyField { field } => write!(formatter, "{field} must be non-empty"),
            Self::InvalidField { field, reason } => write!(formatter, "{field} is invalid: {reason}"),
            Self::OutOfRange { field, min, max, .. } => write!(formatter, "{field} must be between {min} and {max}"),
            Self::AmbiguousQueryVectors => formatter.write_str("exactly one of vectors or binaryVectors must be supplied"),
            Self::RaggedQueryRows => formatter.write_str("query rows must all have the same width"),
        }
    }
}

impl std::error::Error for SearchRequestError {}

impl ValidationError for SearchRequestError {
    fn empty(field: &'static str) -> Self {
        Self::EmptyField { field }
    }

    fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidField { field, reason }
    }

    fn out_of_range(field: &'static str, value: String, min: String, max: String) -> Self {
        Self::OutOfRange { field, value, min, max }
    }
}

impl From<SearchRequestError> for ErrorEnvelope {
    fn from(error: SearchRequestError) -> Self {
        let code = match error {
            SearchRequestError::EmptyField { .. } | SearchRequestError::InvalidField { .. } | SearchRequestError::AmbiguousQueryVectors | SearchRequestError::RaggedQueryRows => {
                ErrorCode::invalid_argument()
            },
            SearchRequestError::OutOfRange { .. } => ErrorCode::invalid_argument(),
        };
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            SearchRequestError::EmptyField { field } | SearchRequestError::InvalidField { field, .. } => {
                envelope = envelope.with_metadata("field", field);
            },
            SearchRequestError::OutOfRange { field, value, min, max } => {
                envelope = envelope
                    .with_metadata("field", field)
                    .with_metadata("value", value)
                    .with_metadata("min", min)
                    .with_metadata("max", max);
            },
            SearchRequestError::AmbiguousQueryVectors | SearchRequestError::RaggedQueryRows => {},
        }

        envelope
    }
}

/// Validate and normalize a search request DTO.
pub fn validate_search_request(dto: &SearchRequestDto) -> Result<SearchRequest, ErrorEnvelope> {
    dto.validate().map_err(ErrorEnvelope::from)?;

    let collection = CollectionId::parse(&dto.collection)?;
    let partition_tags = dto
        .partition_tags
        .iter()
        .map(PartitionTag::parse)
        .collect::<Result<Vec<_>, _>>()?;

    let vectors = match (&dto.vectors, &dto.binary_vectors) {
        (Some(dense), None) => {
            require_uniform_rows(dense.iter().map(Vec::len))?;
            QueryVectors::Dense(dense.clone())
        },
        (None, Some(binary)) => {
            require_uniform_rows(binary.iter().map(Vec::len))?;
            QueryVectors::Binary(binary.clone())
        },
        (None, None) | (Some(_), Some(_)) => return Err(SearchRequestError::AmbiguousQueryVectors.into()),
    };

    let topk = u32::try_from(dto.topk).map_err(|_| {
        ErrorEnvelope::from(SearchRequestError::OutOfRange {
            field: "topk",
            value: dto.topk.to_string(),
            min: "1".to_string(),
            max: "16384".to_string(),
        })
    })?;

    Ok(SearchRequest {
        collection,
        partition_tags,
        vectors,
        topk,
        params: dto.params.clone(),
    })
}

fn require_uniform_rows(mut widths: impl Iterator<Item = usize>) -> Result<(), ErrorEnvelope> {
    let Some(first) = widths.next() else {
        return Ok(());
    };
    if widths.all(|width| width == first) {
        Ok(())
    } else {
        Err(SearchRequestError::RaggedQueryRows.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_dto() -> SearchRequestDto {
        SearchRequestDto {
            collection: "coll".to_string(),
            partition_tags: vec![],
            vectors: Some(vec![vec![1.0, 0.0]]),
            binary_vectors: None,
            topk: 1,
            params: JsonValue::Null,
        }
    }

    #[test]
    fn accepts_a_well_formed_dense_request() {
        let request = validate_search_request(&base_dto()).expect("valid request");
        assert_eq!(request.topk, 1);
        assert_eq!(request.vectors.row_count(), 1);
    }

    #[test]
    fn rejects_empty_collection() {
        let mut dto = base_dto();
        dto.collection = "   ".to_string();
        let error = validate_search_request(&dto).err();
        assert!(matches!(error, Some(envelope) if envelope.code == ErrorCode::invalid_argument()));
    }

    #[test]
    fn rejects_topk_out_of_range() {
        let mut dto = base_dto();
        dto.topk = 0;
        let error = validate_search_request(&dto).err();
        assert!(matches!(error, Some(envelope) if envelope.code == ErrorCode::invalid_argument()));
    }

    #[test]
    fn rejects_neither_vector_kind_supplied() {
        let mut dto = base_dto();
        dto.vectors = None;
        let error = validate_search_request(&dto).err();
        assert!(matches!(error, Some(envelope) if envelope.message.contains("exactly one")));
    }

    #[test]
    fn rejects_both_vector_kinds_supplied() {
        let mut dto = base_dto();
        dto.binary_vectors = Some(vec![vec![0u8]]);
        let error = validate_search_request(&dto).err();
        assert!(matches!(error, Some(envelope) if envelope.message.contains("exactly one")));
    }

    #[test]
    fn rejects_ragged_query_rows() {
        let mut dto = base_dto();
        dto.vectors = Some(vec![vec![1.0, 0.0], vec![1.0]]);
        let error = validate_search_request(&dto).err();
        assert!(matches!(error, Some(envelope) if envelope.message.contains("same width")));
    }

    #[test]
    fn rejects_invalid_partition_tag() {
        let mut dto = base_dto();
        dto.partition_tags = vec!["bad-tag".to_string()];
        let error = validate_search_request(&dto).err();
        assert!(matches!(error, Some(envelope) if envelope.code == ErrorCode::new("domain", "invalid_partition_tag")));
    }
}
