//! Byte layout for stored embeddings: a packed array of little-endian `f32`.

use thiserror::Error;

pub const BYTES_PER_VALUE: usize = std::mem::size_of::<f32>();

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{len} bytes is not a whole number of f32 values")]
    Misaligned { len: usize },

    #[error("decoded {found} values, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * BYTES_PER_VALUE);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes `bytes` into exactly `expected_dim` values.
pub fn decode(bytes: &[u8], expected_dim: usize) -> Result<Vec<f32>, CodecError> {
    let values = decode_any(bytes)?;
    if values.len() != expected_dim {
        return Err(CodecError::DimensionMismatch {
            expected: expected_dim,
            found: values.len(),
        });
    }
    Ok(values)
}

pub(crate) fn decode_any(bytes: &[u8]) -> Result<Vec<f32>, CodecError> {
    if bytes.len() % BYTES_PER_VALUE != 0 {
        return Err(CodecError::Misaligned { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_VALUE)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
