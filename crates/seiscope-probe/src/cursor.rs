//! Bounded byte reader with emulation-prevention removal
//!
//! NAL unit payloads are stored as EBSP: the encoder inserts `0x03` after
//! any two consecutive zero bytes so the payload never contains a start code.
//! The `read_ebsp*` family drops those bytes on the fly, so callers see the
//! RBSP without an intermediate copy of the whole NAL unit.

use crate::error::{ProbeError, Result};

/// Emulation prevention byte inserted after `0x00 0x00`.
pub const EMULATION_PREVENTION_BYTE: u8 = 0x03;

/// Saved cursor position, including any pending escape state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pos: usize,
    zeros: u8,
}

/// Cursor over an immutable byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    /// Absolute offset of `data[0]` in the container, used for error reporting.
    base: usize,
    /// Consecutive zero bytes seen by EBSP reads.
    zeros: u8,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    /// Create a cursor whose errors report offsets relative to `base`.
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            pos: 0,
            base,
            zeros: 0,
        }
    }

    /// Current position relative to the start of the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Current position as an absolute container offset.
    pub fn absolute_position(&self) -> usize {
        self.base + self.pos
    }

    /// Number of unread (escaped) bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread bytes, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Move to an absolute position within the slice.
    pub fn seek_absolute(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(self.out_of_bounds(pos.saturating_sub(self.pos)));
        }
        self.pos = pos;
        self.zeros = 0;
        Ok(())
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            zeros: self.zeros,
        }
    }

    /// Return to a checkpoint taken on a cursor over the same slice.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> Result<()> {
        self.seek_absolute(checkpoint.pos)?;
        self.zeros = checkpoint.zeros;
        Ok(())
    }

    /// Look at the next `n` bytes without advancing.
    pub fn peek(&self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.out_of_bounds(n));
        }
        Ok(&self.data[self.pos..self.pos + n])
    }

    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self.peek(n)?;
        self.pos += n;
        self.zeros = 0;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    pub fn read_be_u16(&mut self) -> Result<u16> {
        let b = self.read(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_be_u24(&mut self) -> Result<u32> {
        let b = self.read(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_be_u32(&mut self) -> Result<u32> {
        let b = self.read(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian unsigned integer of 1 to 4 bytes.
    pub fn read_be_uint(&mut self, size: usize) -> Result<u32> {
        match size {
            1 => self.read_u8().map(u32::from),
            2 => self.read_be_u16().map(u32::from),
            3 => self.read_be_u24(),
            4 => self.read_be_u32(),
            _ => Err(self.out_of_bounds(size)),
        }
    }

    /// Read one RBSP byte, dropping an emulation prevention byte if present.
    pub fn read_ebsp_u8(&mut self) -> Result<u8> {
        if self.zeros >= 2 && self.data.get(self.pos) == Some(&EMULATION_PREVENTION_BYTE) {
            self.pos += 1;
            self.zeros = 0;
        }

        let byte = *self.data.get(self.pos).ok_or_else(|| self.out_of_bounds(1))?;
        self.pos += 1;
        if byte == 0 {
            self.zeros = self.zeros.saturating_add(1);
        } else {
            self.zeros = 0;
        }
        Ok(byte)
    }

    /// Read `n` RBSP bytes into an owned buffer.
    ///
    /// On failure the error reports how many logical bytes were still
    /// available when the read started.
    pub fn read_ebsp(&mut self, n: usize) -> Result<Vec<u8>> {
        if n > self.remaining() {
            return Err(self.out_of_bounds(n));
        }

        let start = self.checkpoint();
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.read_ebsp_u8() {
                Ok(byte) => out.push(byte),
                Err(_) => {
                    let available = out.len();
                    self.pos = start.pos;
                    self.zeros = start.zeros;
                    return Err(ProbeError::OutOfBounds {
                        offset: self.absolute_position(),
                        requested: n,
                        available,
                    });
                }
            }
        }
        Ok(out)
    }

    /// Whether the unread bytes hold anything besides RBSP trailing bits.
    ///
    /// Trailing bits are a single `0x80` stop byte optionally followed by
    /// zero padding; plain zero padding is treated the same way.
    pub fn more_rbsp_data(&self) -> bool {
        match self.rest().split_first() {
            None => false,
            Some((&0x80, tail)) | Some((&0x00, tail)) if tail.iter().all(|&b| b == 0) => false,
            Some(_) => true,
        }
    }

    fn out_of_bounds(&self, requested: usize) -> ProbeError {
        ProbeError::OutOfBounds {
            offset: self.absolute_position(),
            requested,
            available: self.remaining(),
        }
    }
}

/// Remove every emulation prevention byte from an EBSP buffer.
pub fn ebsp_to_rbsp(data: &[u8]) -> Vec<u8> {
    let mut cursor = ByteCursor::new(data);
    let mut out = Vec::with_capacity(data.len());
    while let Ok(byte) = cursor.read_ebsp_u8() {
        out.push(byte);
    }
    out
}

/// Insert emulation prevention bytes so `data` can be carried in a NAL unit.
///
/// A buffer ending in two zero bytes gets a closing `0x03`, since a NAL unit
/// may not end with `0x00`.
pub fn rbsp_to_ebsp(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 64 + 1);
    let mut zeros = 0u8;
    for &byte in data {
        if zeros >= 2 && byte <= EMULATION_PREVENTION_BYTE {
            out.push(EMULATION_PREVENTION_BYTE);
            zeros = 0;
        }
        out.push(byte);
        zeros = if byte == 0 { zeros + 1 } else { 0 };
    }
    if zeros >= 2 {
        out.push(EMULATION_PREVENTION_BYTE);
    }
    out
}
