//! H.264 / H.265 bitstream handling
//!
//! This module provides:
//! - NAL unit header decoding for both codecs
//! - Walking Annex-B and length-prefixed frames into NAL units
//! - SEI message parsing (payload type, payload size, RBSP payload)

pub mod nal;
pub mod sei;

pub use nal::{AvcNalType, Nalu, NaluWalker};
pub use sei::{parse_sei, SeiMessage, SeiMessages};

use std::fmt;

use serde::Serialize;

/// Video codec carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Codec {
    #[serde(rename = "H.264")]
    H264,
    #[serde(rename = "H.265")]
    H265,
}

impl Codec {
    /// Size of the NAL unit header in bytes.
    pub fn nal_header_len(self) -> usize {
        match self {
            Codec::H264 => 1,
            Codec::H265 => 2,
        }
    }

    /// Extract `nal_unit_type` from the first header byte.
    pub fn nal_unit_type(self, header_byte: u8) -> u8 {
        match self {
            Codec::H264 => header_byte & 0x1F,
            Codec::H265 => (header_byte >> 1) & 0x3F,
        }
    }

    /// Whether `nal_unit_type` carries SEI messages for this codec.
    pub fn is_sei(self, nal_unit_type: u8) -> bool {
        match self {
            Codec::H264 => nal_unit_type == 6,
            Codec::H265 => matches!(nal_unit_type, 39 | 40),
        }
    }

    /// `lengthSizeMinusOne + 1` from an `avcC` / `hvcC` decoder
    /// configuration record.
    pub fn length_size_from_config(self, record: &[u8]) -> Option<u8> {
        let index = match self {
            Codec::H264 => 4,
            Codec::H265 => 21,
        };
        record.get(index).map(|b| (b & 0x03) + 1)
    }

    /// Guess the codec from a handful of NAL unit headers.
    ///
    /// H.265 parameter-set and SEI headers have a very regular second byte
    /// (`nuh_layer_id == 0`, `temporal_id_plus1 == 1`), which makes them easy
    /// to tell apart from H.264 headers. Ties resolve to H.264.
    pub fn sniff<'a, I>(nalus: I) -> Codec
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut avc_votes = 0u32;
        let mut hevc_votes = 0u32;

        for nalu in nalus {
            let Some(&first) = nalu.first() else {
                continue;
            };
            if first & 0x80 != 0 {
                continue;
            }

            if let Some(&second) = nalu.get(1) {
                let hevc_type = Codec::H265.nal_unit_type(first);
                let layer_id = ((first & 0x01) << 5) | (second >> 3);
                if matches!(hevc_type, 32..=34 | 39 | 40) && layer_id == 0 && second & 0x07 == 1 {
                    hevc_votes += 1;
                    continue;
                }
            }

            let avc_type = AvcNalType::from(Codec::H264.nal_unit_type(first));
            let ref_idc = (first >> 5) & 0x03;
            match avc_type {
                AvcNalType::Sps | AvcNalType::Pps | AvcNalType::IdrSlice if ref_idc != 0 => {
                    avc_votes += 1
                }
                AvcNalType::Sei | AvcNalType::AccessUnitDelimiter if ref_idc == 0 => {
                    avc_votes += 1
                }
                _ => {}
            }
        }

        if hevc_votes > avc_votes {
            Codec::H265
        } else {
            Codec::H264
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::H264 => write!(f, "H.264"),
            Codec::H265 => write!(f, "H.265"),
        }
    }
}
