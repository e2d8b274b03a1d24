//! # Hashing Primitives
//!
//! The ledger uses exactly two checksums: SHA-256 for cell representation
//! hashes (and therefore for every contract address), and CRC32-C as the
//! optional integrity trailer of a serialized bag of cells.

pub mod hash;

pub use hash::{crc32c, sha256, sha256_array};
