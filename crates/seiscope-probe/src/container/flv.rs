//! FLV (Flash Video) demuxing
//!
//! Handles both the legacy AVC/HEVC video tag header and the Enhanced RTMP
//! extended header. Sequence headers are consumed here to learn the NAL
//! length size; only coded-frame packets are turned into frames.
//!
//! Some muxers write start-code delimited NAL units into video tags instead
//! of length-prefixed ones. Such payloads are split into one Annex-B frame
//! per NAL unit.

use std::collections::VecDeque;

use bytes::Bytes;

use super::{annexb, length_prefixed, Frame, Framing};
use crate::codec::Codec;
use crate::cursor::ByteCursor;
use crate::error::{ProbeError, Result};

/// FLV file header size, without `PreviousTagSize0`.
pub const FLV_HEADER_LEN: usize = 9;
const TAG_HEADER_LEN: usize = 11;
const PREVIOUS_TAG_SIZE_LEN: usize = 4;
const DEFAULT_LENGTH_SIZE: u8 = 4;

const TAG_TYPE_VIDEO: u8 = 9;

const CODEC_ID_AVC: u8 = 7;
const CODEC_ID_HEVC: u8 = 12;

const EX_HEADER_FLAG: u8 = 0x80;

/// Whether `data` starts with an FLV signature.
pub fn has_signature(data: &[u8]) -> bool {
    data.len() >= FLV_HEADER_LEN && data.starts_with(b"FLV")
}

/// What a video tag carries, after its header has been read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoPacket {
    /// Decoder configuration record
    SequenceHeader,
    /// NAL units, normally length-prefixed
    CodedFrames,
    /// Anything without NAL units (end of sequence, metadata, ...)
    Other,
}

#[derive(Debug)]
struct VideoTagHeader {
    codec: Codec,
    packet: VideoPacket,
    /// Bytes from the start of the tag body to the packet payload
    header_len: usize,
}

/// Iterates the coded video frames of an FLV file.
#[derive(Debug)]
pub struct FlvDemuxer {
    data: Bytes,
    pos: usize,
    length_size: u8,
    /// Annex-B units of the current tag not yet handed out
    pending: VecDeque<Frame>,
    done: bool,
}

impl FlvDemuxer {
    pub fn new(data: Bytes) -> Result<Self> {
        if !has_signature(&data) {
            return Err(ProbeError::unsupported(0, "missing FLV signature"));
        }

        let mut cursor = ByteCursor::new(&data);
        cursor.skip(5)?;
        let header_size = (cursor.read_be_u32()? as usize).max(FLV_HEADER_LEN);

        Ok(Self {
            pos: header_size + PREVIOUS_TAG_SIZE_LEN,
            data,
            length_size: DEFAULT_LENGTH_SIZE,
            pending: VecDeque::new(),
            done: false,
        })
    }

    /// NAL length size currently in effect.
    pub fn length_size(&self) -> u8 {
        self.length_size
    }

    fn next_tag(&mut self) -> Option<Result<Frame>> {
        loop {
            if self.pos >= self.data.len() {
                return None;
            }

            let mut cursor = ByteCursor::with_base(&self.data[self.pos..], self.pos);
            let (tag_type, data_size, timestamp) = match read_tag_header(&mut cursor) {
                Ok(header) => header,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let body_start = self.pos + TAG_HEADER_LEN;
            if let Err(e) = cursor.skip(data_size) {
                self.done = true;
                return Some(Err(e));
            }
            let body_end = body_start + data_size;
            self.pos = body_end + PREVIOUS_TAG_SIZE_LEN;

            if tag_type & 0x1F != TAG_TYPE_VIDEO {
                tracing::trace!("Skipping FLV tag type {} at offset {}", tag_type, body_start - TAG_HEADER_LEN);
                continue;
            }

            let body = self.data.slice(body_start..body_end);
            match self.video_frame(body, body_start, timestamp) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn video_frame(&mut self, body: Bytes, offset: usize, timestamp: u32) -> Result<Option<Frame>> {
        if body.is_empty() {
            return Ok(None);
        }

        let mut cursor = ByteCursor::with_base(&body, offset);
        let Some(header) = read_video_header(&mut cursor)? else {
            tracing::debug!("Skipping non-AVC/HEVC video tag at offset {}", offset);
            return Ok(None);
        };

        let payload = body.slice(header.header_len..);
        match header.packet {
            VideoPacket::SequenceHeader => {
                self.update_length_size(header.codec, &payload, offset + header.header_len);
                Ok(None)
            }
            VideoPacket::CodedFrames if self.is_annexb_payload(&payload) => {
                let base = offset + header.header_len;
                tracing::trace!("Annex-B payload in FLV video tag at offset {}", base);
                self.pending.extend(annexb::unit_ranges(&payload).map(|(start, end)| Frame {
                    offset: base + start,
                    data: payload.slice(start..end),
                    codec: header.codec,
                    framing: Framing::AnnexB,
                    timestamp_ms: Some(timestamp),
                }));
                Ok(self.pending.pop_front())
            }
            VideoPacket::CodedFrames => Ok(Some(Frame {
                offset: offset + header.header_len,
                data: payload,
                codec: header.codec,
                framing: Framing::LengthPrefixed {
                    length_size: self.length_size,
                },
                timestamp_ms: Some(timestamp),
            })),
            VideoPacket::Other => Ok(None),
        }
    }

    /// A payload opening with a start code is Annex-B unless it also reads
    /// as a complete length chain; NAL units of 256 to 511 bytes with
    /// 4-byte lengths start with `00 00 01`.
    fn is_annexb_payload(&self, payload: &[u8]) -> bool {
        annexb::start_code_len_at(payload, 0).is_some()
            && !length_prefixed::chain_fits(payload, self.length_size)
    }

    fn update_length_size(&mut self, codec: Codec, record: &[u8], offset: usize) {
        match codec.length_size_from_config(record) {
            Some(size) => {
                tracing::debug!("{} sequence header at offset {}: NAL length size {}", codec, offset, size);
                self.length_size = size;
            }
            None => tracing::debug!(
                "Short {} sequence header at offset {}, keeping NAL length size {}",
                codec,
                offset,
                self.length_size
            ),
        }
    }
}

impl Iterator for FlvDemuxer {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(frame) = self.pending.pop_front() {
            return Some(Ok(frame));
        }
        if self.done {
            return None;
        }
        let item = self.next_tag();
        if item.is_none() {
            self.done = true;
        }
        item
    }
}

/// Returns `(tag type, data size, timestamp in ms)`.
fn read_tag_header(cursor: &mut ByteCursor<'_>) -> Result<(u8, usize, u32)> {
    let tag_type = cursor.read_u8()?;
    let data_size = cursor.read_be_u24()? as usize;
    let timestamp = cursor.read_be_u24()?;
    let timestamp_ext = cursor.read_u8()?;
    let _stream_id = cursor.read_be_u24()?;
    Ok((tag_type, data_size, (u32::from(timestamp_ext) << 24) | timestamp))
}

/// `None` for codecs that do not carry H.264/H.265 NAL units.
fn read_video_header(cursor: &mut ByteCursor<'_>) -> Result<Option<VideoTagHeader>> {
    let first = cursor.read_u8()?;

    if first & EX_HEADER_FLAG != 0 {
        let packet_type = first & 0x0F;
        let fourcc = cursor.read(4)?;
        let codec = match fourcc {
            b"avc1" => Codec::H264,
            b"hvc1" => Codec::H265,
            _ => return Ok(None),
        };
        let (packet, header_len) = match packet_type {
            0 => (VideoPacket::SequenceHeader, 5),
            // CodedFrames carries a composition time offset
            1 => {
                cursor.skip(3)?;
                (VideoPacket::CodedFrames, 8)
            }
            // CodedFramesX
            3 => (VideoPacket::CodedFrames, 5),
            _ => (VideoPacket::Other, 5),
        };
        return Ok(Some(VideoTagHeader {
            codec,
            packet,
            header_len,
        }));
    }

    let codec = match first & 0x0F {
        CODEC_ID_AVC => Codec::H264,
        CODEC_ID_HEVC => Codec::H265,
        _ => return Ok(None),
    };
    let packet_type = cursor.read_u8()?;
    let _composition_time = cursor.read_be_u24()?;
    let packet = match packet_type {
        0 => VideoPacket::SequenceHeader,
        1 => VideoPacket::CodedFrames,
        _ => VideoPacket::Other,
    };

    Ok(Some(VideoTagHeader {
        codec,
        packet,
        header_len: 5,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn flv(tags: &[(u8, u32, Vec<u8>)]) -> Bytes {
        let mut out = vec![b'F', b'L', b'V', 0x01, 0x01, 0x00, 0x00, 0x00, 0x09];
        out.extend_from_slice(&[0, 0, 0, 0]);
        for (tag_type, timestamp, body) in tags {
            let size = body.len() as u32;
            out.push(*tag_type);
            out.extend_from_slice(&size.to_be_bytes()[1..]);
            out.extend_from_slice(&timestamp.to_be_bytes()[1..]);
            out.push((timestamp >> 24) as u8);
            out.extend_from_slice(&[0, 0, 0]);
            out.extend_from_slice(body);
            out.extend_from_slice(&(size + 11).to_be_bytes());
        }
        Bytes::from(out)
    }

    fn avc_sequence_header(length_size: u8) -> Vec<u8> {
        vec![
            0x17, 0x00, 0x00, 0x00, 0x00, // header
            0x01, 0x64, 0x00, 0x1F, 0xFC | (length_size - 1), 0xE0, // record
        ]
    }

    #[test]
    fn test_rejects_missing_signature() {
        assert_matches!(
            FlvDemuxer::new(Bytes::from_static(b"FLX\x01\x01\x00\x00\x00\x09")),
            Err(ProbeError::UnsupportedFormat { .. })
        );
    }

    #[test]
    fn test_legacy_avc_frame() {
        let body = vec![0x27, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x06, 0x80];
        let data = flv(&[(8, 0, vec![0xAF, 0x01, 0x21]), (9, 40, body)]);
        let frames: Vec<_> = FlvDemuxer::new(data).unwrap().collect::<Result<_>>().unwrap();

        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.codec, Codec::H264);
        assert_eq!(frame.timestamp_ms, Some(40));
        // 13 header bytes + 14 audio tag bytes + 4 + 11 + 5
        assert_eq!(frame.offset, 47);
        assert_eq!(&frame.data[..], &[0x00, 0x00, 0x00, 0x02, 0x06, 0x80]);
        assert_eq!(frame.framing, Framing::LengthPrefixed { length_size: 4 });
    }

    #[test]
    fn test_sequence_header_sets_length_size() {
        let frame_body = vec![0x27, 0x01, 0x00, 0x00, 0x00, 0x00, 0x02, 0x06, 0x80];
        let data = flv(&[(9, 0, avc_sequence_header(2)), (9, 0, frame_body)]);
        let mut demuxer = FlvDemuxer::new(data).unwrap();

        let frame = demuxer.next().unwrap().unwrap();
        assert_eq!(frame.framing, Framing::LengthPrefixed { length_size: 2 });
        assert_eq!(demuxer.length_size(), 2);
    }

    #[test]
    fn test_annexb_payload_split_into_units() {
        let mut body = vec![0x17, 0x01, 0x00, 0x00, 0x00];
        body.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x06, 0x05, 0x01, 0xAA, 0x80]);
        body.extend_from_slice(&[0x00, 0x00, 0x01, 0x65, 0x88]);
        let data = flv(&[(9, 80, body), (9, 120, vec![0x27, 0x01, 0x00, 0x00, 0x00])]);
        let frames: Vec<_> = FlvDemuxer::new(data).unwrap().collect::<Result<_>>().unwrap();

        assert_eq!(frames.len(), 3);
        // 13 header bytes + 11 tag header bytes + 5 + 4-byte start code
        assert_eq!(frames[0].offset, 33);
        assert_eq!(&frames[0].data[..], &[0x06, 0x05, 0x01, 0xAA, 0x80]);
        assert_eq!(frames[0].framing, Framing::AnnexB);
        assert_eq!(frames[0].timestamp_ms, Some(80));
        assert_eq!(&frames[1].data[..], &[0x65, 0x88]);
        assert_eq!(frames[1].timestamp_ms, Some(80));
        assert_eq!(frames[2].framing, Framing::LengthPrefixed { length_size: 4 });
        assert_eq!(frames[2].timestamp_ms, Some(120));
    }

    #[test]
    fn test_length_of_256_is_not_a_start_code() {
        let mut body = vec![0x17, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
        body.push(0x06);
        body.extend(std::iter::repeat(0x11).take(255));
        let data = flv(&[(9, 0, body)]);
        let frames: Vec<_> = FlvDemuxer::new(data).unwrap().collect::<Result<_>>().unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].framing, Framing::LengthPrefixed { length_size: 4 });
        assert_eq!(frames[0].data.len(), 260);
    }

    #[test]
    fn test_extended_timestamp() {
        let body = vec![0x27, 0x01, 0x00, 0x00, 0x00];
        let data = flv(&[(9, 0x0100_0010, body)]);
        let frame = FlvDemuxer::new(data).unwrap().next().unwrap().unwrap();
        assert_eq!(frame.timestamp_ms, Some(0x0100_0010));
    }

    #[test]
    fn test_enhanced_hevc_frames() {
        let mut coded = vec![0x91, b'h', b'v', b'c', b'1', 0x00, 0x00, 0x00];
        coded.extend_from_slice(&[0x00, 0x00, 0x00, 0x03, 0x4E, 0x01, 0x80]);
        let mut coded_x = vec![0x93, b'h', b'v', b'c', b'1'];
        coded_x.extend_from_slice(&[0x00, 0x00, 0x00, 0x03, 0x50, 0x01, 0x80]);

        let data = flv(&[(9, 0, coded), (9, 33, coded_x)]);
        let frames: Vec<_> = FlvDemuxer::new(data).unwrap().collect::<Result<_>>().unwrap();

        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.codec == Codec::H265));
        assert_eq!(&frames[0].data[..4], &[0x00, 0x00, 0x00, 0x03]);
        assert_eq!(&frames[1].data[4..], &[0x50, 0x01, 0x80]);
        assert_eq!(frames[1].timestamp_ms, Some(33));
    }

    #[test]
    fn test_enhanced_hevc_sequence_header() {
        let mut record = vec![0x01; 21];
        record.push(0xF0 | 0x01); // lengthSizeMinusOne = 1
        record.push(0x00);
        let mut seq = vec![0x90, b'h', b'v', b'c', b'1'];
        seq.extend_from_slice(&record);

        let data = flv(&[(9, 0, seq)]);
        let mut demuxer = FlvDemuxer::new(data).unwrap();
        assert!(demuxer.next().is_none());
        assert_eq!(demuxer.length_size(), 2);
    }

    #[test]
    fn test_unknown_codecs_skipped() {
        let vp6 = vec![0x14, 0x00, 0x00];
        let av1 = vec![0x91, b'a', b'v', b'0', b'1', 0x00, 0x00, 0x00];
        let data = flv(&[(9, 0, vp6), (9, 0, av1), (9, 0, vec![])]);
        assert_eq!(FlvDemuxer::new(data).unwrap().count(), 0);
    }

    #[test]
    fn test_overrunning_tag_ends_stream() {
        let mut data = flv(&[(9, 0, vec![0x27, 0x01, 0x00, 0x00, 0x00])]).to_vec();
        data.extend_from_slice(&[0x09, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x27]);
        let mut demuxer = FlvDemuxer::new(Bytes::from(data)).unwrap();

        assert!(demuxer.next().unwrap().is_ok());
        assert_matches!(demuxer.next(), Some(Err(ProbeError::OutOfBounds { .. })));
        assert!(demuxer.next().is_none());
    }
}
