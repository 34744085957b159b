//! Maps internal `ErrorEnvelope`s onto a stable numeric wire error code.
//!
//! The eleven kinds a caller can observe are fixed; everything this crate's
//! own dependencies can produce that falls outside them collapses to
//! `Internal` rather than leaking an open-ended error surface to clients.

use schemars::JsonSchema;
use segmentdb_shared::errors::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The stable, closed set of error kinds exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorKind {
    /// A request field was missing, malformed, or out of range.
    InvalidArgument,
    /// The referenced resource does not exist.
    NotFound,
    /// The resource being created already exists.
    AlreadyExists,
    /// An index operation was attempted before training completed.
    IndexNotTrained,
    /// The requested operation is not supported by this index variant.
    IndexNotSupported,
    /// The index variant does not support incremental mutation.
    NotIncremental,
    /// A bounded resource could not accommodate the request.
    CapacityExceeded,
    /// The target resource is disabled, busy, or otherwise unavailable.
    ResourceUnavailable,
    /// The request was cancelled before completion.
    Cancelled,
    /// The request's deadline passed before completion.
    DeadlineExceeded,
    /// An unexpected internal failure.
    Internal,
}

impl ApiErrorKind {
    /// Stable numeric code, fixed across releases so clients can match on it
    /// without parsing the kind name.
    #[must_use]
    pub const fn numeric_code(self) -> u32 {
        match self {
            Self::InvalidArgument => 1,
            Self::NotFound => 2,
            Self::AlreadyExists => 3,
            Self::IndexNotTrained => 4,
            Self::IndexNotSupported => 5,
            Self::NotIncremental => 6,
            Self::CapacityExceeded => 7,
            Self::ResourceUnavailable => 8,
            Self::Cancelled => 9,
            Self::DeadlineExceeded => 10,
            Self::Internal => 11,
        }
    }

    fn classify(code: &ErrorCode) -> Self {
        match (code.namespace(), code.code()) {
            ("core", "invalid_input" | "invalid_argument") => Self::InvalidArgument,
            ("core", "not_found") => Self::NotFound,
            ("core", "already_exists") => Self::AlreadyExists,
            ("index", "not_trained") => Self::IndexNotTrained,
            ("index", "not_supported") => Self::IndexNotSupported,
            ("index", "not_incremental") => Self::NotIncremental,
            ("resource", "capacity_exceeded") => Self::CapacityExceeded,
            ("resource", "unavailable") => Self::ResourceUnavailable,
            ("core", "cancelled") => Self::Cancelled,
            ("core", "deadline_exceeded") => Self::DeadlineExceeded,
            _ => Self::Internal,
        }
    }
}

/// Wire representation of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDto {
    /// Numeric code matching [`ApiErrorKind::numeric_code`].
    pub code: u32,
    /// Kind name, for readability in logs and client error branches.
    pub kind: ApiErrorKind,
    /// Human-readable message. Not guaranteed stable across releases.
    pub message: String,
    /// Structured diagnostic metadata, as attached to the source error.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Map an internal error envelope onto its wire representation.
#[must_use]
pub fn to_api_error(error: &ErrorEnvelope) -> ApiErrorDto {
    let kind = ApiErrorKind::classify(&error.code);
    ApiErrorDto {
        code: kind.numeric_code(),
        kind,
        message: error.message.clone(),
        metadata: error.metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmentdb_shared::errors::ErrorClass;

    #[test]
    fn known_codes_map_to_their_declared_kind() {
        let cases = [
            (ErrorCode::invalid_input(), ApiErrorKind::InvalidArgument),
            (ErrorCode::invalid_argument(), ApiErrorKind::InvalidArgument),
            (ErrorCode::not_found(), ApiErrorKind::NotFound),
            (ErrorCode::already_exists(), ApiErrorKind::AlreadyExists),
            (ErrorCode::index_not_trained(), ApiErrorKind::IndexNotTrained),
            (ErrorCode::index_not_supported(), ApiErrorKind::IndexNotSupported),
            (ErrorCode::not_incremental(), ApiErrorKind::NotIncremental),
            (ErrorCode::capacity_exceeded(), ApiErrorKind::CapacityExceeded),
            (ErrorCode::resource_unavailable(), ApiErrorKind::ResourceUnavailable),
            (ErrorCode::cancelled(), ApiErrorKind::Cancelled),
            (ErrorCode::deadline_exceeded(), ApiErrorKind::DeadlineExceeded),
        ];

        for (code, expected_kind) in cases {
            let envelope = ErrorEnvelope::expected(code, "boom");
            let dto = to_api_error(&envelope);
            assert_eq!(dto.kind, expected_kind);
            assert_eq!(dto.code, expected_kind.numeric_code());
        }
    }

    #[test]
    fn unmapped_codes_fall_back_to_internal() {
        let envelope = ErrorEnvelope::unexpected(ErrorCode::io(), "disk gone", ErrorClass::Retriable);
        let dto = to_api_error(&envelope);
        assert_eq!(dto.kind, ApiErrorKind::Internal);
        assert_eq!(dto.code, 11);
    }

    #[test]
    fn metadata_is_carried_through() {
        let envelope = ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad field").with_metadata("field", "topk");
        let dto = to_api_error(&envelope);
        assert_eq!(dto.metadata.get("field").map(String::as_str), Some("topk"));
    }
}
