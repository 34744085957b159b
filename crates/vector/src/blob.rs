//! `<engine>.idx` blob format: a small tagged header in front of a manually
//! binary-encoded payload, so a reader can dispatch to the right engine
//! before decoding the (potentially large) payload. No `serde_json` here —
//! index artifacts stay byte-exact across builds.
//!
//! Layout (all integers little-endian):
//! `[magic: u16][version: u16][variant: u32][payload_len: u64][payload]`

use crate::VectorRecord;
use segmentdb_domain::EngineType;
use segmentdb_shared::{ErrorCode, ErrorEnvelope, Result};
use std::fmt;

/// `"MI"` - magic bytes identifying a segmentdb index blob.
const MAGIC: u16 = 0x4D49;
const BLOB_FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 2 + 2 + 4 + 8;

/// Failure decoding a blob header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// Blob shorter than a single header.
    Truncated {
        /// Actual number of bytes in the blob.
        found: usize,
        /// Number of bytes a header requires.
        needed: usize,
    },
    /// Magic bytes did not match.
    BadMagic {
        /// Magic bytes actually found.
        found: u16,
    },
    /// Blob format version is newer than this build understands.
    UnsupportedVersion {
        /// Version found in the blob header.
        found: u16,
        /// Highest version this build supports.
        supported: u16,
    },
    /// Variant tag did not map to a known engine.
    UnknownVariant {
        /// Variant tag found in the blob header.
        found: u32,
    },
    /// Declared payload length did not match the remaining bytes.
    LengthMismatch {
        /// Payload length declared in the header.
        declared: u64,
        /// Bytes actually remaining after the header.
        remaining: u64,
    },
}

impl fmt::Display for BlobError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { found, needed } => {
                write!(formatter, "blob is {found} bytes, header needs {needed}")
            },
            Self::BadMagic { found } => write!(formatter, "bad magic bytes: {found:#06x}"),
            Self::UnsupportedVersion { found, supported } => write!(
                formatter,
                "unsupported blob version {found} (supported: {supported})"
            ),
            Self::UnknownVariant { found } => write!(formatter, "unknown engine variant tag {found}"),
            Self::LengthMismatch { declared, remaining } => write!(
                formatter,
                "declared payload length {declared} does not match remaining {remaining} bytes"
            ),
        }
    }
}

impl std::error::Error for BlobError {}

impl From<BlobError> for ErrorEnvelope {
    fn from(error: BlobError) -> Self {
        ErrorEnvelope::expected(ErrorCode::new("vector", "invalid_blob"), error.to_string())
    }
}

const fn variant_id(engine: EngineType) -> u32 {
    match engine {
        EngineType::Flat => 0,
        EngineType::IvfFlat => 1,
        EngineType::IvfSq8 => 2,
        EngineType::IvfPq => 3,
        EngineType::Hnsw => 4,
        EngineType::Nsg => 5,
    }
}

fn variant_from_id(id: u32) -> Result<EngineType, BlobError> {
    match id {
        0 => Ok(EngineType::Flat),
        1 => Ok(EngineType::IvfFlat),
        2 => Ok(EngineType::IvfSq8),
        3 => Ok(EngineType::IvfPq),
        4 => Ok(EngineType::Hnsw),
        5 => Ok(EngineType::Nsg),
        found => Err(BlobError::UnknownVariant { found }),
    }
}

/// Writes a header + payload blob for the given engine.
#[must_use]
pub fn write_blob(engine: EngineType, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&BLOB_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&variant_id(engine).to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Parses the header off a blob and returns `(engine, payload)`.
pub fn read_blob(bytes: &[u8]) -> Result<(EngineType, &[u8]), BlobError> {
    if bytes.len() < HEADER_LEN {
        return Err(BlobError::Truncated {
            found: bytes.len(),
            needed: HEADER_LEN,
        });
    }

    let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
    if magic != MAGIC {
        return Err(BlobError::BadMagic { found: magic });
    }

    let version = u16::from_le_bytes([bytes[2], bytes[3]]);
    if version != BLOB_FORMAT_VERSION {
        return Err(BlobError::UnsupportedVersion {
            found: version,
            supported: BLOB_FORMAT_VERSION,
        });
    }

    let variant = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let engine = variant_from_id(variant)?;

    let payload_len = u64::from_le_bytes([
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    ]);
    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != payload_len {
        return Err(BlobError::LengthMismatch {
            declared: payload_len,
            remaining: payload.len() as u64,
        });
    }

    Ok((engine, payload))
}

/// Reads only the engine tag from a blob header, without validating the
/// payload length — used to pick which engine's deserializer to invoke.
pub fn peek_engine_type(bytes: &[u8]) -> Result<EngineType> {
    if bytes.len() < HEADER_LEN {
        return Err(BlobError::Truncated {
            found: bytes.len(),
            needed: HEADER_LEN,
        }
        .into());
    }
    let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
    if magic != MAGIC {
        return Err(BlobError::BadMagic { found: magic }.into());
    }
    let variant = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    variant_from_id(variant).map_err(Into::into)
}

/// Encodes a record batch as `[count: u64][id: i64][dim: u32][f32 * dim]...`,
/// the manual binary layout every engine's artifact payload shares. Index
/// artifacts stay binary-stable across builds; `serde_json` is used only for
/// wire DTOs elsewhere in this workspace, never for `<engine>.idx` payloads.
#[must_use]
pub fn encode_records(records: &[VectorRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(records.len() as u64).to_le_bytes());
    for record in records {
        out.extend_from_slice(&record.id.to_le_bytes());
        out.extend_from_slice(&(record.vector.len() as u32).to_le_bytes());
        for component in &record.vector {
            out.extend_from_slice(&component.to_le_bytes());
        }
    }
    out
}

/// Reads a little-endian `u32` out of a payload at a fixed offset, the way
/// every engine's header prefix (dimension, centroid/neighbour counts) is
/// encoded.
pub fn read_u32(payload: &[u8], offset: usize) -> Result<u32, BlobError> {
    payload
        .get(offset..offset + 4)
        .and_then(|slice| slice.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(BlobError::Truncated {
            found: payload.len(),
            needed: offset + 4,
        })
}

/// Decodes a record batch written by [`encode_records`].
pub fn decode_records(bytes: &[u8]) -> Result<Vec<VectorRecord>, BlobError> {
    decode_records_with_len(bytes).map(|(records, _consumed)| records)
}

/// Like [`decode_records`], but also returns how many bytes were consumed —
/// callers that pack more sections after the record batch (e.g. `NsgIndex`'s
/// edge list) need this to find where the next section starts.
pub fn decode_records_with_len(bytes: &[u8]) -> Result<(Vec<VectorRecord>, usize), BlobError> {
    let mut cursor = 0usize;
    let take = |cursor: &mut usize, len: usize| -> Result<&[u8], BlobError> {
        let end = *cursor + len;
        let slice = bytes.get(*cursor..end).ok_or(BlobError::Truncated {
            found: bytes.len(),
            needed: end,
        })?;
        *cursor = end;
        Ok(slice)
    };

    let count = u64::from_le_bytes(take(&mut cursor, 8)?.try_into().expect("8-byte slice"));
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = i64::from_le_bytes(take(&mut cursor, 8)?.try_into().expect("8-byte slice"));
        let dim = u32::from_le_bytes(take(&mut cursor, 4)?.try_into().expect("4-byte slice"));
        let mut vector = Vec::with_capacity(dim as usize);
        for _ in 0..dim {
            vector.push(f32::from_le_bytes(take(&mut cursor, 4)?.try_into().expect("4-byte slice")));
        }
        records.push(VectorRecord { id, vector });
    }
    Ok((records, cursor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header_and_payload() -> Result<()> {
        let blob = write_blob(EngineType::Hnsw, b"payload");
        let (engine, payload) = read_blob(&blob)?;
        assert_eq!(engine, EngineType::Hnsw);
        assert_eq!(payload, b"payload");
        Ok(())
    }

    #[test]
    fn rejects_bad_magic() {
        let mut blob = write_blob(EngineType::Flat, b"x");
        blob[0] = 0;
        assert!(matches!(read_blob(&blob), Err(BlobError::BadMagic { .. })));
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(read_blob(&[0, 1]), Err(BlobError::Truncated { .. })));
    }

    #[test]
    fn record_codec_round_trips() -> Result<(), BlobError> {
        let records = vec![
            VectorRecord { id: 1, vector: vec![0.5, -0.25] },
            VectorRecord { id: -7, vector: vec![1.0, 2.0, 3.0] },
        ];
        let encoded = encode_records(&records);
        let decoded = decode_records(&encoded)?;
        assert_eq!(decoded, records);
        Ok(())
    }

    #[test]
    fn record_codec_rejects_truncated_payload() {
        let encoded = encode_records(&[VectorRecord { id: 1, vector: vec![0.5] }]);
        let truncated = &encoded[..encoded.len() - 2];
        assert!(matches!(decode_records(truncated), Err(BlobError::Truncated { .. })));
    }
}
