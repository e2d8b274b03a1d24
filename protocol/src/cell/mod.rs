//! # Cells
//!
//! A cell is the ledger's only data structure: up to 1023 bits of data and
//! up to four references to other cells, forming a DAG. Every cell has a
//! *representation hash* computed from its descriptors, its data (padded
//! with a completion tag), and the depths and hashes of its children:
//!
//! ```text
//! repr = d1 || d2 || data_padded || depth(ref_i)... || hash(ref_i)...
//! d1   = refs_count + 8 * exotic
//! d2   = floor(bits / 8) + ceil(bits / 8)
//! hash = SHA-256(repr)
//! ```
//!
//! Contract addresses are representation hashes, so this module has to be
//! bit-exact. [`CellBuilder`] writes cells, [`CellSlice`] reads them, and
//! [`boc`] moves them in and out of byte form.
//!
//! Cells are immutable and cheap to clone (an `Arc` around the contents).
//! The only exotic cell kind supported is the library reference, which is
//! how deployed code templates are commonly shared.

pub mod boc;
pub mod builder;
pub mod slice;

pub use builder::CellBuilder;
pub use slice::CellSlice;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{MAX_CELL_BITS, MAX_CELL_DEPTH, MAX_CELL_REFS};
use crate::crypto::sha256_array;

/// First data byte of a library reference cell.
const LIBRARY_CELL_TAG: u8 = 2;

/// Bit length of a library reference cell: tag byte plus a 256-bit hash.
const LIBRARY_CELL_BITS: usize = 8 + 256;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while building, reading, or validating cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    /// Writing would exceed the 1023-bit data limit.
    #[error("cell overflow: cannot store {requested} bits, {available} available")]
    BitOverflow { requested: usize, available: usize },

    /// Writing would exceed the four-reference limit.
    #[error("cell overflow: a cell holds at most 4 references")]
    RefOverflow,

    /// Reading past the end of the data bits.
    #[error("cell underflow: cannot load {requested} bits, {available} remaining")]
    Underflow { requested: usize, available: usize },

    /// Reading a reference that is not there.
    #[error("cell underflow: no references remaining")]
    RefUnderflow,

    /// A value does not fit in the requested bit width.
    #[error("value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: String, bits: usize },

    /// The address tag is not a plain `addr_std`.
    #[error("unsupported address encoding: {0}")]
    InvalidAddress(String),

    /// Exotic cell of a kind other than a library reference.
    #[error("unsupported exotic cell")]
    UnsupportedExotic,

    /// The tree is deeper than the ledger allows.
    #[error("cell depth {0} exceeds the limit")]
    DepthOverflow(u16),

    /// Data left over after a payload was fully parsed.
    #[error("unexpected trailing data: {bits} bits, {refs} refs")]
    TrailingData { bits: usize, refs: usize },
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

struct CellInner {
    /// `ceil(bit_len / 8)` bytes; bits past `bit_len` are always zero.
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Cell>,
    exotic: bool,
    hash: [u8; 32],
    depth: u16,
}

/// An immutable, hashed cell.
#[derive(Clone)]
pub struct Cell(Arc<CellInner>);

impl Cell {
    /// Creates an ordinary cell from raw parts.
    ///
    /// `data` must hold at least `ceil(bit_len / 8)` bytes; anything past
    /// `bit_len` is discarded.
    pub fn new(data: Vec<u8>, bit_len: usize, refs: Vec<Cell>) -> Result<Self, CellError> {
        Self::from_parts(data, bit_len, refs, false)
    }

    /// The empty cell: no bits, no references.
    pub fn empty() -> Self {
        Self::from_parts(Vec::new(), 0, Vec::new(), false).expect("empty cell is always valid")
    }

    /// Creates a library reference cell pointing at code with the given hash.
    pub fn library(code_hash: [u8; 32]) -> Self {
        let mut data = Vec::with_capacity(33);
        data.push(LIBRARY_CELL_TAG);
        data.extend_from_slice(&code_hash);
        Self::from_parts(data, LIBRARY_CELL_BITS, Vec::new(), true)
            .expect("library cell layout is fixed")
    }

    pub(crate) fn from_parts(
        mut data: Vec<u8>,
        bit_len: usize,
        refs: Vec<Cell>,
        exotic: bool,
    ) -> Result<Self, CellError> {
        if bit_len > MAX_CELL_BITS {
            return Err(CellError::BitOverflow {
                requested: bit_len,
                available: MAX_CELL_BITS,
            });
        }
        if refs.len() > MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }

        let byte_len = (bit_len + 7) / 8;
        if data.len() < byte_len {
            return Err(CellError::Underflow {
                requested: bit_len,
                available: data.len() * 8,
            });
        }
        data.truncate(byte_len);
        if bit_len % 8 != 0 {
            let keep = 0xffu8 << (8 - bit_len % 8);
            if let Some(last) = data.last_mut() {
                *last &= keep;
            }
        }

        if exotic
            && (bit_len != LIBRARY_CELL_BITS || data[0] != LIBRARY_CELL_TAG || !refs.is_empty())
        {
            return Err(CellError::UnsupportedExotic);
        }

        let depth = match refs.iter().map(Cell::depth).max() {
            Some(max) => max + 1,
            None => 0,
        };
        if depth > MAX_CELL_DEPTH {
            return Err(CellError::DepthOverflow(depth));
        }

        let hash = representation_hash(&data, bit_len, &refs, exotic);
        Ok(Self(Arc::new(CellInner {
            data,
            bit_len,
            refs,
            exotic,
            hash,
            depth,
        })))
    }

    /// Raw data bytes. Trailing bits past [`bit_len`](Self::bit_len) are zero.
    pub fn data(&self) -> &[u8] {
        &self.0.data
    }

    /// Number of data bits.
    pub fn bit_len(&self) -> usize {
        self.0.bit_len
    }

    /// Child references, in order.
    pub fn refs(&self) -> &[Cell] {
        &self.0.refs
    }

    /// Whether this is an exotic (library reference) cell.
    pub fn is_exotic(&self) -> bool {
        self.0.exotic
    }

    /// The representation hash.
    pub fn hash(&self) -> &[u8; 32] {
        &self.0.hash
    }

    /// Hex-encoded representation hash.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.0.hash)
    }

    /// Depth of the tree rooted here (0 for a leaf).
    pub fn depth(&self) -> u16 {
        self.0.depth
    }

    /// True when the cell carries neither bits nor references.
    pub fn is_empty(&self) -> bool {
        self.0.bit_len == 0 && self.0.refs.is_empty()
    }

    /// Start reading the cell from its first bit and first reference.
    pub fn parse(&self) -> CellSlice<'_> {
        CellSlice::new(self)
    }
}

/// Data bytes with the completion tag appended when the bit length is not
/// byte-aligned.
pub(crate) fn padded_data(data: &[u8], bit_len: usize) -> Vec<u8> {
    let mut out = data[..(bit_len + 7) / 8].to_vec();
    if bit_len % 8 != 0 {
        if let Some(last) = out.last_mut() {
            *last |= 0x80 >> (bit_len % 8);
        }
    }
    out
}

/// The `(d1, d2)` descriptor bytes shared by hashing and BoC serialization.
pub(crate) fn descriptors(bit_len: usize, refs: usize, exotic: bool) -> [u8; 2] {
    let d1 = refs as u8 + if exotic { 8 } else { 0 };
    let d2 = (bit_len / 8 + (bit_len + 7) / 8) as u8;
    [d1, d2]
}

fn representation_hash(data: &[u8], bit_len: usize, refs: &[Cell], exotic: bool) -> [u8; 32] {
    let mut repr = Vec::with_capacity(2 + data.len() + refs.len() * 34);
    repr.extend_from_slice(&descriptors(bit_len, refs.len(), exotic));
    repr.extend_from_slice(&padded_data(data, bit_len));
    for r in refs {
        repr.extend_from_slice(&r.depth().to_be_bytes());
    }
    for r in refs {
        repr.extend_from_slice(r.hash());
    }
    sha256_array(&repr)
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.0.hash == other.0.hash
    }
}

impl Eq for Cell {}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Cell");
        s.field("bits", &self.0.bit_len)
            .field("data", &hex::encode(&self.0.data));
        if self.0.exotic {
            s.field("exotic", &true);
        }
        s.field("refs", &self.0.refs).finish()
    }
}

/// Cells serialize as hex-encoded single-root BoCs.
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&boc::to_hex(self))
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        boc::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_hash_matches_ledger() {
        let cell = Cell::empty();
        assert_eq!(
            cell.hash_hex(),
            "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
        );
        assert_eq!(cell.depth(), 0);
        assert!(cell.is_empty());
    }

    #[test]
    fn trailing_bits_are_masked() {
        let a = Cell::new(vec![0b1011_1111], 3, vec![]).unwrap();
        let b = Cell::new(vec![0b1010_0000], 3, vec![]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.data(), &[0b1010_0000]);
    }

    #[test]
    fn depth_grows_with_references() {
        let leaf = Cell::empty();
        let mid = Cell::new(vec![], 0, vec![leaf.clone()]).unwrap();
        let root = Cell::new(vec![], 0, vec![mid, leaf]).unwrap();
        assert_eq!(root.depth(), 2);
    }

    #[test]
    fn rejects_oversized_cells() {
        assert!(matches!(
            Cell::new(vec![0; 128], 1024, vec![]),
            Err(CellError::BitOverflow { .. })
        ));
        let refs = vec![Cell::empty(); 5];
        assert_eq!(Cell::new(vec![], 0, refs), Err(CellError::RefOverflow));
    }

    #[test]
    fn library_cell_is_exotic() {
        let lib = Cell::library([0xab; 32]);
        assert!(lib.is_exotic());
        assert_eq!(lib.bit_len(), 264);
        assert_eq!(lib.data()[0], 2);
        assert_ne!(lib.hash(), Cell::empty().hash());
    }

    #[test]
    fn malformed_exotic_is_rejected() {
        assert_eq!(
            Cell::from_parts(vec![1; 33], 264, vec![], true),
            Err(CellError::UnsupportedExotic)
        );
    }

    #[test]
    fn padded_data_sets_completion_tag() {
        assert_eq!(padded_data(&[0b1010_0000], 3), vec![0b1011_0000]);
        assert_eq!(padded_data(&[0xff], 8), vec![0xff]);
        assert!(padded_data(&[], 0).is_empty());
    }
}
