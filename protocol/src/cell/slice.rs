//! Big-endian bit reader over a cell.
//!
//! The mirror of [`CellBuilder`](super::CellBuilder). A slice tracks a bit
//! cursor and a reference cursor; every `load_*` advances them or fails with
//! an underflow without moving.

use super::{Cell, CellError};
use crate::address::Address;

/// A read cursor over a [`Cell`].
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    /// Starts reading at the first bit and first reference.
    pub fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    /// Unread data bits.
    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len() - self.bit_pos
    }

    /// Unread references.
    pub fn remaining_refs(&self) -> usize {
        self.cell.refs().len() - self.ref_pos
    }

    /// True when no bits and no references remain.
    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    fn ensure_bits(&self, n: usize) -> Result<(), CellError> {
        if n > self.remaining_bits() {
            return Err(CellError::Underflow {
                requested: n,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    fn bit_at(&self, pos: usize) -> bool {
        (self.cell.data()[pos / 8] >> (7 - pos % 8)) & 1 == 1
    }

    /// Loads a single bit.
    pub fn load_bit(&mut self) -> Result<bool, CellError> {
        self.ensure_bits(1)?;
        let bit = self.bit_at(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Skips `n` bits.
    pub fn skip_bits(&mut self, n: usize) -> Result<(), CellError> {
        self.ensure_bits(n)?;
        self.bit_pos += n;
        Ok(())
    }

    /// Loads an unsigned integer of up to 128 bits.
    pub fn load_u128(&mut self, bits: usize) -> Result<u128, CellError> {
        if bits > 128 {
            return Err(CellError::ValueOutOfRange {
                value: "u128".to_string(),
                bits,
            });
        }
        self.ensure_bits(bits)?;
        let mut value = 0u128;
        for i in 0..bits {
            value = (value << 1) | self.bit_at(self.bit_pos + i) as u128;
        }
        self.bit_pos += bits;
        Ok(value)
    }

    /// Loads an unsigned integer of up to 64 bits.
    pub fn load_uint(&mut self, bits: usize) -> Result<u64, CellError> {
        if bits > 64 {
            return Err(CellError::ValueOutOfRange {
                value: "u64".to_string(),
                bits,
            });
        }
        Ok(self.load_u128(bits)? as u64)
    }

    /// Loads a two's complement signed integer of up to 64 bits.
    pub fn load_int(&mut self, bits: usize) -> Result<i64, CellError> {
        if bits == 0 || bits > 64 {
            return Err(CellError::ValueOutOfRange {
                value: "i64".to_string(),
                bits,
            });
        }
        let raw = self.load_uint(bits)?;
        if bits == 64 {
            return Ok(raw as i64);
        }
        let sign = 1u64 << (bits - 1);
        Ok(if raw & sign != 0 {
            (raw as i64) - (1i64 << bits)
        } else {
            raw as i64
        })
    }

    /// Loads `n` whole bytes.
    pub fn load_bytes(&mut self, n: usize) -> Result<Vec<u8>, CellError> {
        self.ensure_bits(n * 8)?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.load_uint(8)? as u8);
        }
        Ok(out)
    }

    /// Loads a `Coins` amount.
    pub fn load_coins(&mut self) -> Result<u128, CellError> {
        let start = self.bit_pos;
        let len = self.load_uint(4)? as usize;
        match self.load_u128(len * 8) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.bit_pos = start;
                Err(e)
            }
        }
    }

    /// Loads an address, accepting `addr_none` as `None`.
    ///
    /// External and anycast addresses are rejected.
    pub fn load_maybe_address(&mut self) -> Result<Option<Address>, CellError> {
        let start = self.bit_pos;
        let result = self.load_address_inner();
        if result.is_err() {
            self.bit_pos = start;
        }
        result
    }

    fn load_address_inner(&mut self) -> Result<Option<Address>, CellError> {
        match self.load_uint(2)? {
            0b00 => Ok(None),
            0b10 => {
                if self.load_bit()? {
                    return Err(CellError::InvalidAddress("anycast is not supported".into()));
                }
                let workchain = self.load_int(8)? as i8;
                let bytes = self.load_bytes(32)?;
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&bytes);
                Ok(Some(Address::new(workchain, hash)))
            }
            0b01 => Err(CellError::InvalidAddress("external address".into())),
            _ => Err(CellError::InvalidAddress("addr_var is not supported".into())),
        }
    }

    /// Loads a standard address; `addr_none` is an error.
    pub fn load_address(&mut self) -> Result<Address, CellError> {
        let start = self.bit_pos;
        match self.load_maybe_address()? {
            Some(addr) => Ok(addr),
            None => {
                self.bit_pos = start;
                Err(CellError::InvalidAddress("addr_none where an address is required".into()))
            }
        }
    }

    /// Loads the next reference.
    pub fn load_ref(&mut self) -> Result<Cell, CellError> {
        let cell = self
            .cell
            .refs()
            .get(self.ref_pos)
            .cloned()
            .ok_or(CellError::RefUnderflow)?;
        self.ref_pos += 1;
        Ok(cell)
    }

    /// Loads `Maybe ^Cell`.
    pub fn load_maybe_ref(&mut self) -> Result<Option<Cell>, CellError> {
        if self.remaining_refs() == 0 {
            // Peek the flag without consuming it on failure.
            self.ensure_bits(1)?;
            if self.bit_at(self.bit_pos) {
                return Err(CellError::RefUnderflow);
            }
        }
        if self.load_bit()? {
            Ok(Some(self.load_ref()?))
        } else {
            Ok(None)
        }
    }

    /// Asserts the slice has been fully consumed.
    pub fn end_parse(&self) -> Result<(), CellError> {
        if !self.is_empty() {
            return Err(CellError::TrailingData {
                bits: self.remaining_bits(),
                refs: self.remaining_refs(),
            });
        }
        Ok(())
    }
}
