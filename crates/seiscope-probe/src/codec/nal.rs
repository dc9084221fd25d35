//! NAL unit parsing

use bytes::Bytes;

use super::Codec;
use crate::container::{Frame, Framing};
use crate::cursor::ByteCursor;
use crate::error::{ProbeError, Result};

/// H.264 NAL unit types (Table 7-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcNalType {
    /// Coded slice of a non-IDR picture
    NonIdrSlice,
    /// Coded slice data partitions A, B, C
    PartitionA,
    PartitionB,
    PartitionC,
    /// Coded slice of an IDR picture
    IdrSlice,
    /// Supplemental enhancement information
    Sei,
    /// Sequence Parameter Set
    Sps,
    /// Picture Parameter Set
    Pps,
    AccessUnitDelimiter,
    EndOfSequence,
    EndOfStream,
    FillerData,
    SpsExtension,
    PrefixNalUnit,
    SubsetSps,
    DepthParameterSet,
    AuxiliarySlice,
    SliceExtension,
    SliceExtensionDepthView,
    /// Reserved or unspecified
    Unknown(u8),
}

impl From<u8> for AvcNalType {
    fn from(value: u8) -> Self {
        match value {
            1 => AvcNalType::NonIdrSlice,
            2 => AvcNalType::PartitionA,
            3 => AvcNalType::PartitionB,
            4 => AvcNalType::PartitionC,
            5 => AvcNalType::IdrSlice,
            6 => AvcNalType::Sei,
            7 => AvcNalType::Sps,
            8 => AvcNalType::Pps,
            9 => AvcNalType::AccessUnitDelimiter,
            10 => AvcNalType::EndOfSequence,
            11 => AvcNalType::EndOfStream,
            12 => AvcNalType::FillerData,
            13 => AvcNalType::SpsExtension,
            14 => AvcNalType::PrefixNalUnit,
            15 => AvcNalType::SubsetSps,
            16 => AvcNalType::DepthParameterSet,
            19 => AvcNalType::AuxiliarySlice,
            20 => AvcNalType::SliceExtension,
            21 => AvcNalType::SliceExtensionDepthView,
            v => AvcNalType::Unknown(v),
        }
    }
}

/// A NAL unit located inside a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Nalu {
    /// Absolute offset of the NAL header in the container
    pub offset: usize,
    pub codec: Codec,
    pub nal_unit_type: u8,
    /// NAL unit bytes, header included, emulation prevention still present
    pub data: Bytes,
}

impl Nalu {
    /// Build a NAL unit from raw bytes; `None` if shorter than the header.
    pub fn new(codec: Codec, offset: usize, data: Bytes) -> Option<Self> {
        if data.len() < codec.nal_header_len() {
            return None;
        }
        Some(Self {
            offset,
            codec,
            nal_unit_type: codec.nal_unit_type(data[0]),
            data,
        })
    }

    pub fn is_sei(&self) -> bool {
        self.codec.is_sei(self.nal_unit_type)
    }

    /// NAL unit bytes after the header (still escaped).
    pub fn payload(&self) -> &[u8] {
        &self.data[self.codec.nal_header_len()..]
    }

    /// Absolute offset of the first byte after the header.
    pub fn payload_offset(&self) -> usize {
        self.offset + self.codec.nal_header_len()
    }
}

/// Iterates the NAL units of one frame.
///
/// Annex-B frames hold exactly one NAL unit. Length-prefixed frames are read
/// until exhausted; a length running past the frame ends the walk with
/// [`ProbeError::TruncatedNalu`].
#[derive(Debug)]
pub struct NaluWalker {
    codec: Codec,
    framing: Framing,
    data: Bytes,
    offset: usize,
    pos: usize,
    done: bool,
}

impl NaluWalker {
    pub fn new(frame: &Frame) -> Self {
        Self {
            codec: frame.codec,
            framing: frame.framing,
            data: frame.data.clone(),
            offset: frame.offset,
            pos: 0,
            done: false,
        }
    }

    fn next_length_prefixed(&mut self, length_size: usize) -> Option<Result<Nalu>> {
        loop {
            if self.pos >= self.data.len() {
                return None;
            }

            let mut cursor = ByteCursor::with_base(&self.data[self.pos..], self.offset + self.pos);
            let length = match cursor.read_be_uint(length_size) {
                Ok(length) => length as usize,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let start = self.pos + length_size;
            let available = self.data.len() - start;
            if length > available {
                self.done = true;
                return Some(Err(ProbeError::TruncatedNalu {
                    offset: self.offset + self.pos,
                    declared: length,
                    available,
                }));
            }

            self.pos = start + length;
            if let Some(nalu) = Nalu::new(
                self.codec,
                self.offset + start,
                self.data.slice(start..start + length),
            ) {
                return Some(Ok(nalu));
            }
        }
    }
}

impl Iterator for NaluWalker {
    type Item = Result<Nalu>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.framing {
            Framing::AnnexB => {
                self.done = true;
                Nalu::new(self.codec, self.offset, self.data.clone()).map(Ok)
            }
            Framing::LengthPrefixed { length_size } => {
                let item = self.next_length_prefixed(usize::from(length_size));
                if item.is_none() {
                    self.done = true;
                }
                item
            }
        }
    }
}
