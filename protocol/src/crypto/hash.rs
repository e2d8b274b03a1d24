//! # Hashing Utilities
//!
//! - **SHA-256**: The cell representation hash. Contract addresses are the
//!   SHA-256 of a state-init cell, so this function is the root of the whole
//!   addressing scheme.
//!
//! - **CRC32-C**: Castagnoli CRC, used only as the optional trailer of a
//!   serialized bag of cells. Not a security primitive.

use sha2::{Digest, Sha256};

/// Reflected Castagnoli polynomial.
const CRC32C_POLY: u32 = 0x82f6_3b78;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use custody_protocol::crypto::sha256;
///
/// let hash = sha256(b"custody");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    sha256_array(data).to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
///
/// Cell hashing calls this in a loop, so it avoids the heap allocation.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the CRC32-C (Castagnoli) checksum of the input.
///
/// Bitwise implementation; BoC trailers are computed once per
/// serialization, so a lookup table buys nothing here.
pub fn crc32c(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (CRC32C_POLY & mask);
        }
    }
    !crc
}
