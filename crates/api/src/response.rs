//! Search response wire shape: one row of `(id, distance)` pairs per query.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sentinel id used to pad a row short of `topk` results.
pub const TRUNCATED_ID: i64 = -1;

/// A single neighbor match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchHitDto {
    /// External row id, or [`TRUNCATED_ID`] when this slot has no match.
    pub id: i64,
    /// Distance under the collection's configured metric.
    pub distance: f32,
}

/// Response to a search request: one row per query vector, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponseDto {
    /// One entry per query row, each holding up to `topk` hits.
    pub rows: Vec<Vec<SearchHitDto>>,
}

impl SearchResponseDto {
    /// Build a response row from fewer than `topk` hits, padding the
    /// remainder with [`TRUNCATED_ID`] sentinels per the wire contract.
    #[must_use]
    pub fn padded_row(mut hits: Vec<SearchHitDto>, topk: usize) -> Vec<SearchHitDto> {
        hits.truncate(topk);
        hits.resize(topk, SearchHitDto { id: TRUNCATED_ID, distance: 0.0 });
        hits
    }

    /// Drop the trailing truncation sentinels from a single row, per the
    /// wire contract's "the query layer truncates trailing -1s" rule.
    #[must_use]
    pub fn trim_row(row: &[SearchHitDto]) -> &[SearchHitDto] {
        let real_len = row.iter().rposition(|hit| hit.id != TRUNCATED_ID).map_or(0, |idx| idx + 1);
        &row[..real_len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: i64, distance: f32) -> SearchHitDto {
        SearchHitDto { id, distance }
    }

    #[test]
    fn padded_row_fills_remaining_slots_with_sentinel() {
        let row = SearchResponseDto::padded_row(vec![hit(10, 0.0)], 3);
        assert_eq!(row, vec![hit(10, 0.0), hit(TRUNCATED_ID, 0.0), hit(TRUNCATED_ID, 0.0)]);
    }

    #[test]
    fn padded_row_truncates_excess_hits() {
        let row = SearchResponseDto::padded_row(vec![hit(1, 0.0), hit(2, 0.0), hit(3, 0.0)], 2);
        assert_eq!(row, vec![hit(1, 0.0), hit(2, 0.0)]);
    }

    #[test]
    fn trim_row_drops_trailing_sentinels_only() {
        let row = vec![hit(10, 0.0), hit(TRUNCATED_ID, 0.0), hit(TRUNCATED_ID, 0.0)];
        assert_eq!(SearchResponseDto::trim_row(&row), &row[..1]);
    }

    #[test]
    fn trim_row_keeps_interior_results_even_if_none_found() {
        let row = vec![hit(TRUNCATED_ID, 0.0), hit(TRUNCATED_ID, 0.0)];
        let expected: &[SearchHitDto] = &[];
        assert_eq!(SearchResponseDto::trim_row(&row), expected);
    }
}
