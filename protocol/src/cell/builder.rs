//! Big-endian bit writer for cells.
//!
//! Every `store_*` method returns `Result<&mut Self, CellError>` so layouts
//! read top to bottom with `?`:
//!
//! ```
//! use custody_protocol::cell::CellBuilder;
//!
//! let mut b = CellBuilder::new();
//! b.store_uint(0x8ac8cfd1, 32)?.store_uint(7, 64)?;
//! let cell = b.build()?;
//! assert_eq!(cell.bit_len(), 96);
//! # Ok::<(), custody_protocol::cell::CellError>(())
//! ```

use super::{Cell, CellError, CellSlice};
use crate::address::Address;
use crate::config::{MAX_CELL_BITS, MAX_CELL_REFS, MAX_COINS_BYTES};

/// Accumulates bits and references for a single cell.
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Cell>,
}

impl CellBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Number of references written so far.
    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    /// Bits still available in this cell.
    pub fn remaining_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    fn ensure_bits(&self, n: usize) -> Result<(), CellError> {
        if n > self.remaining_bits() {
            return Err(CellError::BitOverflow {
                requested: n,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let idx = self.bit_len / 8;
            self.data[idx] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    /// Stores a single bit.
    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, CellError> {
        self.ensure_bits(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Stores an unsigned integer of up to 128 bits.
    pub fn store_u128(&mut self, value: u128, bits: usize) -> Result<&mut Self, CellError> {
        if bits > 128 || (bits < 128 && value >> bits != 0) {
            return Err(CellError::ValueOutOfRange {
                value: value.to_string(),
                bits,
            });
        }
        self.ensure_bits(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Stores an unsigned integer of up to 64 bits (`uintN`).
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self, CellError> {
        if bits > 64 {
            return Err(CellError::ValueOutOfRange {
                value: value.to_string(),
                bits,
            });
        }
        self.store_u128(value as u128, bits)
    }

    /// Stores a two's complement signed integer of up to 64 bits (`intN`).
    pub fn store_int(&mut self, value: i64, bits: usize) -> Result<&mut Self, CellError> {
        let out_of_range = || CellError::ValueOutOfRange {
            value: value.to_string(),
            bits,
        };
        if bits == 0 || bits > 64 {
            return Err(out_of_range());
        }
        if bits < 64 {
            let bound = 1i64 << (bits - 1);
            if value < -bound || value >= bound {
                return Err(out_of_range());
            }
        }
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.store_uint(value as u64 & mask, bits)
    }

    /// Stores whole bytes.
    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, CellError> {
        self.ensure_bits(bytes.len() * 8)?;
        for &byte in bytes {
            for i in (0..8).rev() {
                self.push_bit((byte >> i) & 1 == 1);
            }
        }
        Ok(self)
    }

    /// Stores a `Coins` amount: a 4-bit byte length, then the value.
    pub fn store_coins(&mut self, amount: u128) -> Result<&mut Self, CellError> {
        let len = ((128 - amount.leading_zeros() as usize) + 7) / 8;
        if len > MAX_COINS_BYTES {
            return Err(CellError::ValueOutOfRange {
                value: amount.to_string(),
                bits: MAX_COINS_BYTES * 8,
            });
        }
        self.ensure_bits(4 + len * 8)?;
        self.store_uint(len as u64, 4)?;
        self.store_u128(amount, len * 8)
    }

    /// Stores an `addr_std` without anycast: `10 0 workchain:int8 hash:bits256`.
    pub fn store_address(&mut self, address: &Address) -> Result<&mut Self, CellError> {
        self.ensure_bits(crate::config::STD_ADDRESS_BITS)?;
        self.store_uint(0b10, 2)?
            .store_bit(false)?
            .store_int(address.workchain() as i64, 8)?
            .store_bytes(address.hash())
    }

    /// Stores `addr_none` (`00`).
    pub fn store_address_none(&mut self) -> Result<&mut Self, CellError> {
        self.store_uint(0, 2)
    }

    /// Stores an address or `addr_none`.
    pub fn store_maybe_address(
        &mut self,
        address: Option<&Address>,
    ) -> Result<&mut Self, CellError> {
        match address {
            Some(addr) => self.store_address(addr),
            None => self.store_address_none(),
        }
    }

    /// Appends a reference.
    pub fn store_ref(&mut self, cell: Cell) -> Result<&mut Self, CellError> {
        if self.refs.len() >= MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }
        self.refs.push(cell);
        Ok(self)
    }

    /// Stores `Maybe ^Cell`: a presence bit and, when present, a reference.
    pub fn store_maybe_ref(&mut self, cell: Option<Cell>) -> Result<&mut Self, CellError> {
        match cell {
            Some(c) => {
                if self.refs.len() >= MAX_CELL_REFS {
                    return Err(CellError::RefOverflow);
                }
                self.store_bit(true)?.store_ref(c)
            }
            None => self.store_bit(false),
        }
    }

    /// Copies the unread remainder of a slice (bits and references).
    pub fn store_slice(&mut self, slice: &CellSlice<'_>) -> Result<&mut Self, CellError> {
        let mut copy = slice.clone();
        let bits = copy.remaining_bits();
        self.ensure_bits(bits)?;
        if self.refs.len() + copy.remaining_refs() > MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }
        for _ in 0..bits {
            let bit = copy.load_bit()?;
            self.push_bit(bit);
        }
        while copy.remaining_refs() > 0 {
            let r = copy.load_ref()?;
            self.refs.push(r);
        }
        Ok(self)
    }

    /// Finalizes the cell.
    pub fn build(&self) -> Result<Cell, CellError> {
        Cell::new(self.data.clone(), self.bit_len, self.refs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_big_endian_bits() {
        let mut b = CellBuilder::new();
        b.store_uint(0b101, 3).unwrap().store_uint(0xff, 8).unwrap();
        let cell = b.build().unwrap();
        assert_eq!(cell.bit_len(), 11);
        assert_eq!(cell.data(), &[0b1011_1111, 0b1110_0000]);
    }

    #[test]
    fn rejects_values_wider_than_field() {
        let mut b = CellBuilder::new();
        assert!(matches!(
            b.store_uint(8, 3),
            Err(CellError::ValueOutOfRange { .. })
        ));
        assert!(b.store_int(128, 8).is_err());
        assert!(b.store_int(-129, 8).is_err());
        assert_eq!(b.bit_len(), 0);
    }

    #[test]
    fn stores_negative_workchain_as_twos_complement() {
        let mut b = CellBuilder::new();
        b.store_int(-1, 8).unwrap();
        assert_eq!(b.build().unwrap().data(), &[0xff]);
    }

    #[test]
    fn coins_use_length_prefix() {
        let mut b = CellBuilder::new();
        b.store_coins(0).unwrap();
        assert_eq!(b.bit_len(), 4);

        let mut b = CellBuilder::new();
        b.store_coins(100_000_000).unwrap(); // 0x05f5e100, four bytes
        let cell = b.build().unwrap();
        assert_eq!(cell.bit_len(), 4 + 32);
        assert_eq!(cell.data(), &[0x40, 0x5f, 0x5e, 0x10, 0x00]);
    }

    #[test]
    fn coins_reject_more_than_fifteen_bytes() {
        let mut b = CellBuilder::new();
        assert!(b.store_coins(1u128 << 120).is_err());
        assert!(b.store_coins((1u128 << 120) - 1).is_ok());
    }

    #[test]
    fn address_is_267_bits() {
        let mut b = CellBuilder::new();
        b.store_address(&Address::new(0, [0x11; 32])).unwrap();
        let cell = b.build().unwrap();
        assert_eq!(cell.bit_len(), 267);
        // 10 0 00000000 -> first byte 1000_0000, then the hash shifted by 3 bits.
        assert_eq!(cell.data()[0], 0b1000_0000);
        assert_eq!(cell.data()[1], 0b0000_0010);
    }

    #[test]
    fn bit_overflow_is_reported() {
        let mut b = CellBuilder::new();
        b.store_bytes(&[0u8; 127]).unwrap(); // 1016 bits
        assert!(b.store_uint(0, 7).is_ok());
        assert!(matches!(
            b.store_bit(true),
            Err(CellError::BitOverflow { .. })
        ));
    }

    #[test]
    fn ref_overflow_is_reported() {
        let mut b = CellBuilder::new();
        for _ in 0..4 {
            b.store_ref(Cell::empty()).unwrap();
        }
        assert_eq!(b.store_ref(Cell::empty()).unwrap_err(), CellError::RefOverflow);
        assert_eq!(
            b.store_maybe_ref(Some(Cell::empty())).unwrap_err(),
            CellError::RefOverflow
        );
    }

    #[test]
    fn store_slice_copies_remainder() {
        let mut src = CellBuilder::new();
        src.store_uint(0xabcd, 16)
            .unwrap()
            .store_ref(Cell::empty())
            .unwrap();
        let src = src.build().unwrap();

        let mut slice = src.parse();
        slice.load_uint(8).unwrap();

        let mut dst = CellBuilder::new();
        dst.store_slice(&slice).unwrap();
        let dst = dst.build().unwrap();
        assert_eq!(dst.bit_len(), 8);
        assert_eq!(dst.data(), &[0xcd]);
        assert_eq!(dst.refs().len(), 1);
    }
}
