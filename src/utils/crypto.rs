// src/utils/crypto.rs
//! Document fingerprinting.
//!
//! The authority never hashes documents itself; this is the collaborator the
//! HTTP layer uses when a caller uploads document content instead of a
//! precomputed hash. Keccak-256 keeps fingerprints comparable with hashes
//! produced by contract tooling.

use ethers::utils::keccak256;
use ethers_core::utils::hex;

/// Computes a Keccak-256 hash of the input data.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Keccak-256 fingerprint of a document as `0x`-prefixed lowercase hex.
pub fn document_fingerprint(document: &[u8]) -> String {
    format!("0x{}", hex::encode(hash_data(document)))
}

/// Decodes base64 document content and fingerprints it.
pub fn fingerprint_base64(encoded: &str) -> Result<String, base64::DecodeError> {
    let bytes = base64::decode(encoded.trim())?;
    Ok(document_fingerprint(&bytes))
}
