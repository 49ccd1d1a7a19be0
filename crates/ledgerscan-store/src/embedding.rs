//! Embedding blob encoding: float32 little-endian, 4 bytes per component.

use ndarray::Array1;

use ledgerscan_core::{Error, Result};

pub fn encode_f32_le(embedding: &Array1<f32>) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_f32_le(bytes: &[u8]) -> Result<Array1<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Storage(format!(
            "embedding blob of {} bytes is not a float32 array",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
