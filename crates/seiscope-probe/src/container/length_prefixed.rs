//! Length-prefixed NAL unit streams

use bytes::Bytes;

use super::{Frame, Framing};
use crate::codec::Codec;
use crate::cursor::ByteCursor;
use crate::error::{ProbeError, Result};

/// Length field size of raw NALU dumps.
pub const RAW_LENGTH_SIZE: u8 = 4;

/// Whether `data` is exactly covered by a chain of `length_size`-byte
/// length fields and the units they declare.
pub fn chain_fits(data: &[u8], length_size: u8) -> bool {
    let mut cursor = ByteCursor::new(data);
    while !cursor.is_empty() {
        let Ok(length) = cursor.read_be_uint(usize::from(length_size)) else {
            return false;
        };
        if cursor.skip(length as usize).is_err() {
            return false;
        }
    }
    true
}

/// Yields each length-prefixed unit as its own frame.
///
/// A length running past the end of the buffer yields
/// [`ProbeError::TruncatedNalu`] and ends the stream.
#[derive(Debug)]
pub struct LengthPrefixedDemuxer {
    data: Bytes,
    /// Absolute offset of `data[0]`
    base: usize,
    codec: Codec,
    length_size: u8,
    pos: usize,
    done: bool,
}

impl LengthPrefixedDemuxer {
    pub fn new(data: Bytes, base: usize, codec: Codec) -> Self {
        Self::with_length_size(data, base, codec, RAW_LENGTH_SIZE)
    }

    /// Use `length_size`-byte length fields (1 to 4).
    pub fn with_length_size(data: Bytes, base: usize, codec: Codec, length_size: u8) -> Self {
        Self {
            data,
            base,
            codec,
            length_size,
            pos: 0,
            done: false,
        }
    }

    fn read_unit(&mut self) -> Option<Result<Frame>> {
        loop {
            if self.pos >= self.data.len() {
                return None;
            }

            let mut cursor = ByteCursor::with_base(&self.data[self.pos..], self.base + self.pos);
            let length = match cursor.read_be_uint(usize::from(self.length_size)) {
                Ok(length) => length as usize,
                Err(e) => return Some(Err(e)),
            };

            let start = self.pos;
            let available = cursor.remaining();
            if length > available {
                return Some(Err(ProbeError::TruncatedNalu {
                    offset: self.base + start,
                    declared: length,
                    available,
                }));
            }

            self.pos = start + usize::from(self.length_size) + length;
            if length == 0 {
                continue;
            }

            return Some(Ok(Frame {
                offset: self.base + start,
                data: self.data.slice(start..self.pos),
                codec: self.codec,
                framing: Framing::LengthPrefixed {
                    length_size: self.length_size,
                },
                timestamp_ms: None,
            }));
        }
    }
}

impl Iterator for LengthPrefixedDemuxer {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = self.read_unit();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}
