//! Domain primitives with validated constructors.

use segmentdb_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation failures for domain primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// `CollectionId` is empty after trimming.
    EmptyCollectionId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `CollectionId` violates the allowed identifier pattern.
    InvalidCollectionId {
        /// Trimmed value that failed validation.
        input: String,
    },
    /// `PartitionTag` is empty after trimming.
    EmptyPartitionTag {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `PartitionTag` violates the allowed identifier pattern.
    InvalidPartitionTag {
        /// Trimmed value that failed validation.
        input: String,
    },
    /// `SegmentFileId` is empty after trimming.
    EmptySegmentFileId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `JobId` is empty after trimming.
    EmptyJobId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// A dimension value was zero or otherwise out of range.
    InvalidDimension {
        /// The rejected dimension value.
        value: u32,
    },
}

impl PrimitiveError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyCollectionId { .. } | Self::InvalidCollectionId { .. } => {
                ErrorCode::new("domain", "invalid_collection_id")
            },
            Self::EmptyPartitionTag { .. } | Self::InvalidPartitionTag { .. } => {
                ErrorCode::new("domain", "invalid_partition_tag")
            },
            Self::EmptySegmentFileId { .. } => ErrorCode::new("domain", "invalid_segment_file_id"),
            Self::EmptyJobId { .. } => ErrorCode::new("domain", "invalid_job_id"),
            Self::InvalidDimension { .. } => ErrorCode::new("domain", "invalid_dimension"),
        }
    }
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCollectionId { .. } => formatter.write_str("CollectionId must be non-empty"),
            Self::InvalidCollectionId { .. } => {
                formatter.write_str("CollectionId must match /^[a-zA-Z][a-zA-Z0-9_]*$/")
            },
            Self::EmptyPartitionTag { .. } => {
                formatter.write_str("PartitionTag must be non-empty")
            },
            Self::InvalidPartitionTag { .. } => {
                formatter.write_str("PartitionTag must match /^[a-zA-Z][a-zA-Z0-9_]*$/")
            },
            Self::EmptySegmentFileId { .. } => {
                formatter.write_str("SegmentFileId must be non-empty")
            },
            Self::EmptyJobId { .. } => formatter.write_str("JobId must be non-empty"),
            Self::InvalidDimension { value } => {
                write!(formatter, "dimension must be >= 1, got {value}")
            },
        }
    }
}

impl std::error::Error for PrimitiveError {}

impl From<PrimitiveError> for ErrorEnvelope {
    fn from(error: PrimitiveError) -> Self {
        let mut envelope = Self::expected(error.error_code(), error.to_string());

        match error {
            PrimitiveError::EmptyCollectionId { input_length }
            | PrimitiveError::EmptyPartitionTag { input_length }
            | PrimitiveError::EmptySegmentFileId { input_length }
            | PrimitiveError::EmptyJobId { input_length } => {
                envelope = envelope.with_metadata("input_length", input_length.to_string());
            },
            PrimitiveError::InvalidCollectionId { input }
            | PrimitiveError::InvalidPartitionTag { input } => {
                envelope = envelope.with_metadata("input", input);
            },
            PrimitiveError::InvalidDimension { value } => {
                envelope = envelope.with_metadata("value", value.to_string());
            },
        }

        envelope
    }
}

/// Identifier for a vector collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(Box<str>);

impl CollectionId {
    /// Parse a `CollectionId` that satisfies the allowed identifier pattern.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::EmptyCollectionId {
                input_length: raw.len(),
            });
        };

        if !is_valid_identifier(trimmed) {
            return Err(PrimitiveError::InvalidCollectionId {
                input: trimmed.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the underlying string.
    #[must_use]
    pub fn into_inner(self) -> Box<str> {
        self.0
    }
}

impl AsRef<str> for CollectionId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifier for a partition within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionTag(Box<str>);

impl PartitionTag {
    /// The tag used for collections that were never explicitly partitioned.
    pub const DEFAULT: &'static str = "_default";

    /// Parse a `PartitionTag` that satisfies the allowed identifier pattern.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::EmptyPartitionTag {
                input_length: raw.len(),
            });
        };

        if !is_valid_identifier(trimmed) {
            return Err(PrimitiveError::InvalidPartitionTag {
                input: trimmed.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// The default partition tag.
    #[must_use]
    pub fn default_tag() -> Self {
        Self(Self::DEFAULT.to_owned().into_boxed_str())
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PartitionTag {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for PartitionTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Opaque identifier for a segment file, unique within a collection+partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentFileId(Box<str>);

impl SegmentFileId {
    /// Parse a `SegmentFileId` from an opaque, non-empty string.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::EmptySegmentFileId {
                input_length: raw.len(),
            });
        };

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SegmentFileId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for SegmentFileId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifier for a scheduled unit of work (merge job or task).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Box<str>);

impl JobId {
    /// Parse a `JobId` from an opaque, non-empty string.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::EmptyJobId {
                input_length: raw.len(),
            });
        };

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Generate a fresh random `JobId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string().into_boxed_str())
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Vector dimensionality, validated to be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimension(u32);

impl Dimension {
    /// Parse a dimension, rejecting zero.
    pub const fn parse(value: u32) -> Result<Self, PrimitiveError> {
        if value == 0 {
            return Err(PrimitiveError::InvalidDimension { value });
        }
        Ok(Self(value))
    }

    /// Access the raw dimension value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

fn trimmed_non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn is_valid_identifier(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() {
        return false;
    }

    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
