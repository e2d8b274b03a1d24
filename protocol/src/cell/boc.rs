//! # Bag of Cells
//!
//! The standard byte serialization of a cell DAG (`serialized_boc#b5ee9c72`):
//!
//! ```text
//! magic:u32 = 0xb5ee9c72
//! has_idx:1 has_crc32c:1 has_cache_bits:1 flags:2 size:3
//! off_bytes:u8
//! cells:size roots:size absent:size tot_cells_size:off_bytes
//! root_list:(roots * size)
//! index:(has_idx ? cells * off_bytes)
//! cell_data:tot_cells_size
//! crc32c:(has_crc32c ? u32 LE)
//! ```
//!
//! Each cell is written as `d1 d2 padded_data ref_index*`, parents before
//! children. Identical subtrees are written once.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::{descriptors, padded_data, Cell, CellError};
use crate::config::{BOC_MAGIC, MAX_BOC_CELLS};
use crate::crypto::crc32c;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while decoding a bag of cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BocError {
    /// Input ended before the structure was complete.
    #[error("unexpected end of BoC data")]
    UnexpectedEof,

    /// The magic prefix is not `b5ee9c72`.
    #[error("invalid BoC magic: {0:#010x}")]
    InvalidMagic(u32),

    /// A header field is out of range or inconsistent.
    #[error("invalid BoC header: {0}")]
    InvalidHeader(String),

    /// A cell references itself or an earlier cell.
    #[error("invalid reference from cell {from} to cell {to}")]
    InvalidReference { from: usize, to: usize },

    /// The CRC32-C trailer does not match.
    #[error("BoC checksum mismatch")]
    ChecksumMismatch,

    /// Bytes remain after the declared structure.
    #[error("trailing bytes after BoC")]
    TrailingBytes,

    /// The BoC holds a different number of roots than expected.
    #[error("expected a single root, found {0}")]
    RootCount(usize),

    /// Hex input could not be decoded.
    #[error("invalid hex: {0}")]
    Hex(String),

    /// A decoded cell is itself invalid.
    #[error(transparent)]
    Cell(#[from] CellError),
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialization switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct BocOptions {
    /// Write the offset index.
    pub with_index: bool,
    /// Append a CRC32-C trailer.
    pub with_crc: bool,
}

/// Serializes `roots` into a bag of cells.
pub fn serialize(roots: &[Cell], options: BocOptions) -> Vec<u8> {
    // Reverse post-order over a DAG puts every parent before its children.
    let mut order: Vec<Cell> = Vec::new();
    let mut seen: HashSet<[u8; 32]> = HashSet::new();
    for root in roots.iter().rev() {
        visit(root, &mut seen, &mut order);
    }
    order.reverse();

    let index: HashMap<[u8; 32], usize> = order
        .iter()
        .enumerate()
        .map(|(i, c)| (*c.hash(), i))
        .collect();

    let size = bytes_needed(order.len() as u64);

    let mut cell_bytes: Vec<Vec<u8>> = Vec::with_capacity(order.len());
    for cell in &order {
        let mut out = Vec::new();
        out.extend_from_slice(&descriptors(cell.bit_len(), cell.refs().len(), cell.is_exotic()));
        out.extend_from_slice(&padded_data(cell.data(), cell.bit_len()));
        for r in cell.refs() {
            write_uint(&mut out, index[r.hash()] as u64, size);
        }
        cell_bytes.push(out);
    }

    let total: usize = cell_bytes.iter().map(Vec::len).sum();
    let off_bytes = bytes_needed(total as u64);

    let mut flags = size as u8;
    if options.with_index {
        flags |= 0x80;
    }
    if options.with_crc {
        flags |= 0x40;
    }

    let mut out = Vec::with_capacity(16 + total);
    out.extend_from_slice(&BOC_MAGIC.to_be_bytes());
    out.push(flags);
    out.push(off_bytes as u8);
    write_uint(&mut out, order.len() as u64, size);
    write_uint(&mut out, roots.len() as u64, size);
    write_uint(&mut out, 0, size);
    write_uint(&mut out, total as u64, off_bytes);
    for root in roots {
        write_uint(&mut out, index[root.hash()] as u64, size);
    }
    if options.with_index {
        let mut offset = 0usize;
        for bytes in &cell_bytes {
            offset += bytes.len();
            write_uint(&mut out, offset as u64, off_bytes);
        }
    }
    for bytes in &cell_bytes {
        out.extend_from_slice(bytes);
    }
    if options.with_crc {
        let crc = crc32c(&out);
        out.extend_from_slice(&crc.to_le_bytes());
    }
    out
}

fn visit(cell: &Cell, seen: &mut HashSet<[u8; 32]>, order: &mut Vec<Cell>) {
    if !seen.insert(*cell.hash()) {
        return;
    }
    for r in cell.refs().iter().rev() {
        visit(r, seen, order);
    }
    order.push(cell.clone());
}

fn bytes_needed(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    ((bits + 7) / 8).max(1)
}

fn write_uint(out: &mut Vec<u8>, value: u64, bytes: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - bytes..]);
}

/// Serializes a single cell without index or checksum.
pub fn to_boc(cell: &Cell) -> Vec<u8> {
    serialize(std::slice::from_ref(cell), BocOptions::default())
}

/// Serializes a single cell as lowercase hex.
pub fn to_hex(cell: &Cell) -> String {
    hex::encode(to_boc(cell))
}

// ---------------------------------------------------------------------------
// Deserialization
// ---------------------------------------------------------------------------

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], BocError> {
        let end = self.pos.checked_add(n).ok_or(BocError::UnexpectedEof)?;
        let bytes = self.data.get(self.pos..end).ok_or(BocError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn uint(&mut self, n: usize) -> Result<u64, BocError> {
        Ok(self
            .take(n)?
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }
}

struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<usize>,
    exotic: bool,
}

/// Decodes every root of a bag of cells.
pub fn deserialize(bytes: &[u8]) -> Result<Vec<Cell>, BocError> {
    let mut r = Reader {
        data: bytes,
        pos: 0,
    };

    let magic = r.uint(4)? as u32;
    if magic != BOC_MAGIC {
        return Err(BocError::InvalidMagic(magic));
    }

    let flags = r.uint(1)? as u8;
    let has_index = flags & 0x80 != 0;
    let has_crc = flags & 0x40 != 0;
    let size = (flags & 0x07) as usize;
    if size == 0 || size > 4 {
        return Err(BocError::InvalidHeader(format!("ref size {}", size)));
    }

    let off_bytes = r.uint(1)? as usize;
    if off_bytes == 0 || off_bytes > 8 {
        return Err(BocError::InvalidHeader(format!("offset size {}", off_bytes)));
    }

    let cell_count = r.uint(size)? as usize;
    let root_count = r.uint(size)? as usize;
    let absent = r.uint(size)? as usize;
    let total = r.uint(off_bytes)? as usize;

    if cell_count == 0 || cell_count > MAX_BOC_CELLS {
        return Err(BocError::InvalidHeader(format!("cell count {}", cell_count)));
    }
    if root_count == 0 || root_count > cell_count {
        return Err(BocError::InvalidHeader(format!("root count {}", root_count)));
    }
    if absent != 0 {
        return Err(BocError::InvalidHeader("absent cells are not supported".into()));
    }

    let mut roots = Vec::with_capacity(root_count);
    for _ in 0..root_count {
        let idx = r.uint(size)? as usize;
        if idx >= cell_count {
            return Err(BocError::InvalidHeader(format!("root index {}", idx)));
        }
        roots.push(idx);
    }

    if has_index {
        r.take(cell_count * off_bytes)?;
    }

    let cells_start = r.pos;
    let mut raw = Vec::with_capacity(cell_count);
    for i in 0..cell_count {
        raw.push(read_raw_cell(&mut r, i, cell_count, size)?);
    }
    if r.pos - cells_start != total {
        return Err(BocError::InvalidHeader(format!(
            "cell data is {} bytes, header says {}",
            r.pos - cells_start,
            total
        )));
    }

    if has_crc {
        let body_end = r.pos;
        let stored = u32::from_le_bytes(
            r.take(4)?
                .try_into()
                .map_err(|_| BocError::UnexpectedEof)?,
        );
        if crc32c(&bytes[..body_end]) != stored {
            return Err(BocError::ChecksumMismatch);
        }
    }
    if r.pos != bytes.len() {
        return Err(BocError::TrailingBytes);
    }

    // Children always follow parents, so build from the back.
    let mut built: Vec<Option<Cell>> = vec![None; cell_count];
    for i in (0..cell_count).rev() {
        let rc = &raw[i];
        let mut refs = Vec::with_capacity(rc.refs.len());
        for &child in &rc.refs {
            let cell = built[child]
                .clone()
                .ok_or(BocError::InvalidReference { from: i, to: child })?;
            refs.push(cell);
        }
        built[i] = Some(Cell::from_parts(
            rc.data.clone(),
            rc.bit_len,
            refs,
            rc.exotic,
        )?);
    }

    roots
        .into_iter()
        .map(|idx| built[idx].clone().ok_or(BocError::UnexpectedEof))
        .collect()
}

fn read_raw_cell(
    r: &mut Reader<'_>,
    index: usize,
    cell_count: usize,
    size: usize,
) -> Result<RawCell, BocError> {
    let d1 = r.uint(1)? as u8;
    let d2 = r.uint(1)? as usize;

    let ref_count = (d1 & 0x07) as usize;
    let exotic = d1 & 0x08 != 0;
    let with_hashes = d1 & 0x10 != 0;
    let level = d1 >> 5;
    if ref_count > 4 {
        return Err(BocError::InvalidHeader(format!("cell {} has {} refs", index, ref_count)));
    }
    if with_hashes || level != 0 {
        return Err(BocError::InvalidHeader(format!(
            "cell {} uses stored hashes or a non-zero level",
            index
        )));
    }

    let byte_len = (d2 + 1) / 2;
    let mut data = r.take(byte_len)?.to_vec();
    let bit_len = if d2 % 2 == 0 {
        byte_len * 8
    } else {
        // Strip the completion tag: the lowest set bit of the last byte.
        let last = *data.last().ok_or(BocError::UnexpectedEof)?;
        if last == 0 {
            return Err(BocError::InvalidHeader(format!(
                "cell {} is missing its completion tag",
                index
            )));
        }
        let tag_pos = last.trailing_zeros() as usize;
        if let Some(l) = data.last_mut() {
            *l &= !(1u8 << tag_pos);
        }
        byte_len * 8 - tag_pos - 1
    };

    let mut refs = Vec::with_capacity(ref_count);
    for _ in 0..ref_count {
        let child = r.uint(size)? as usize;
        if child <= index || child >= cell_count {
            return Err(BocError::InvalidReference { from: index, to: child });
        }
        refs.push(child);
    }

    Ok(RawCell {
        data,
        bit_len,
        refs,
        exotic,
    })
}

/// Decodes a bag of cells that must hold exactly one root.
pub fn from_boc(bytes: &[u8]) -> Result<Cell, BocError> {
    let mut roots = deserialize(bytes)?;
    if roots.len() != 1 {
        return Err(BocError::RootCount(roots.len()));
    }
    Ok(roots.remove(0))
}

/// Decodes a hex-encoded single-root bag of cells.
pub fn from_hex(s: &str) -> Result<Cell, BocError> {
    let bytes = hex::decode(s.trim()).map_err(|e| BocError::Hex(e.to_string()))?;
    from_boc(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellBuilder;

    #[test]
    fn empty_cell_bytes() {
        let bytes = to_boc(&Cell::empty());
        assert_eq!(hex::encode(&bytes), "b5ee9c72010101010002000000");
        assert_eq!(from_boc(&bytes).unwrap(), Cell::empty());
    }

    #[test]
    fn decodes_library_reference_cell() {
        // A code template published as a library, as wallets commonly ship.
        let hex_boc = "b5ee9c72010101010023000842028f452d7a4dfd74066b682365177259ed05734435be76b5fd4bd5d8af2b7c3d68";
        let cell = from_hex(hex_boc).unwrap();
        assert!(cell.is_exotic());
        assert_eq!(cell.bit_len(), 264);
        assert_eq!(cell.data()[0], 2);
        assert_eq!(to_hex(&cell), hex_boc);
    }

    #[test]
    fn shared_subtrees_are_written_once() {
        let leaf = {
            let mut b = CellBuilder::new();
            b.store_uint(0xdead, 16).unwrap();
            b.build().unwrap()
        };
        let root = {
            let mut b = CellBuilder::new();
            b.store_bit(true)
                .unwrap()
                .store_ref(leaf.clone())
                .unwrap()
                .store_ref(leaf)
                .unwrap();
            b.build().unwrap()
        };

        let bytes = to_boc(&root);
        // magic(4) flags(1) off(1) cells=2
        assert_eq!(bytes[6], 2);
        let back = from_boc(&bytes).unwrap();
        assert_eq!(back, root);
        assert_eq!(back.refs()[0], back.refs()[1]);
    }

    #[test]
    fn index_and_crc_are_honoured() {
        let mut b = CellBuilder::new();
        b.store_uint(5, 7).unwrap().store_ref(Cell::empty()).unwrap();
        let cell = b.build().unwrap();

        let bytes = serialize(
            &[cell.clone()],
            BocOptions {
                with_index: true,
                with_crc: true,
            },
        );
        assert_eq!(bytes[4] & 0xc0, 0xc0);
        assert_eq!(from_boc(&bytes).unwrap(), cell);

        let mut corrupted = bytes.clone();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;
        assert_eq!(from_boc(&corrupted), Err(BocError::ChecksumMismatch));
    }

    #[test]
    fn multiple_roots() {
        let a = Cell::empty();
        let mut b = CellBuilder::new();
        b.store_uint(1, 1).unwrap();
        let b = b.build().unwrap();

        let bytes = serialize(&[a.clone(), b.clone()], BocOptions::default());
        let roots = deserialize(&bytes).unwrap();
        assert_eq!(roots, vec![a, b]);
        assert_eq!(from_boc(&bytes), Err(BocError::RootCount(2)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            from_boc(&[0xde, 0xad, 0xbe, 0xef]),
            Err(BocError::InvalidMagic(0xdeadbeef))
        ));
        assert_eq!(from_boc(&[0xb5, 0xee]), Err(BocError::UnexpectedEof));
        assert!(matches!(from_hex("zz"), Err(BocError::Hex(_))));

        let mut bytes = to_boc(&Cell::empty());
        bytes.push(0);
        assert_eq!(from_boc(&bytes), Err(BocError::TrailingBytes));
    }
}
