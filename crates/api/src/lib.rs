//! # segmentdb-api
//!
//! Wire DTOs for the query surface (search request/response), `schemars`
//! JSON Schema exports, and the `ErrorEnvelope` -> stable numeric error code
//! mapping. This crate defines the contract only: it does not bind a socket
//! or run an HTTP server, both of which remain external adapter concerns.

pub mod error;
pub mod requests;
pub mod response;

pub use error::{ApiErrorDto, ApiErrorKind, to_api_error};
pub use requests::{QueryVectors, SearchRequest, SearchRequestDto, SearchRequestError, validate_search_request};
pub use response::{SearchHitDto, SearchResponseDto, TRUNCATED_ID};

use schemars::schema::RootSchema;
use schemars::schema_for;

/// JSON Schema for [`SearchRequestDto`], for publishing alongside the API.
#[must_use]
pub fn search_request_schema() -> RootSchema {
    schema_for!(SearchRequestDto)
}

/// JSON Schema for [`SearchResponseDto`], for publishing alongside the API.
#[must_use]
pub fn search_response_schema() -> RootSchema {
    schema_for!(SearchResponseDto)
}

/// JSON Schema for [`ApiErrorDto`], for publishing alongside the API.
#[must_use]
pub fn api_error_schema() -> RootSchema {
    schema_for!(ApiErrorDto)
}

/// Returns the api crate version.
#[must_use]
pub const fn api_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_crate_compiles() {
        let version = api_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn schemas_are_non_empty() {
        assert!(search_request_schema().schema.object.is_some());
        assert!(search_response_schema().schema.object.is_some());
        assert!(api_error_schema().schema.object.is_some());
    }
}
