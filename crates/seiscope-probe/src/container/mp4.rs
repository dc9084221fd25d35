//! MP4 / ISO-BMFF demuxing
//!
//! `mp4parse` reads `moov`. The sample tables of the first H.264/H.265 video
//! track then locate every video sample in the buffer, so audio or metadata
//! samples interleaved in `mdat` are never read as NAL units.

use std::io::Cursor;

use bytes::Bytes;
use mp4parse::{read_mp4, SampleEntry, Track, TrackType, VideoCodecSpecific};

use super::length_prefixed::RAW_LENGTH_SIZE;
use super::{Frame, Framing};
use crate::codec::Codec;
use crate::cursor::ByteCursor;
use crate::error::{ProbeError, Result};

const FTYP: &[u8; 4] = b"ftyp";
const HVCC: &[u8; 4] = b"hvcC";

/// Whether `data` starts with an `ftyp` box.
pub fn has_ftyp(data: &[u8]) -> bool {
    data.get(4..8) == Some(&FTYP[..])
}

/// Whether `data` starts with something shaped like a box header.
pub fn has_box_header(data: &[u8]) -> bool {
    let mut cursor = ByteCursor::new(data);
    let (Ok(size), Ok(box_type)) = (cursor.read_be_u32(), cursor.read(4)) else {
        return false;
    };
    // 0 runs to the end of the file, 1 is followed by a 64-bit size
    let size_ok = size <= 1 || size >= 8;
    size_ok && box_type.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
}

/// Body of the first `hvcC` box in `data`.
///
/// mp4parse 0.17 does not parse HEVC sample entries and reports them as
/// unknown, so the configuration record is located by its box type.
fn find_hvcc(data: &[u8]) -> Option<&[u8]> {
    let at = data.windows(HVCC.len()).position(|w| w == HVCC)?;
    let start = at.checked_sub(4)?;
    let size = ByteCursor::new(&data[start..]).read_be_u32().ok()? as usize;
    data.get(at + HVCC.len()..start.checked_add(size)?)
}

/// Codec and NAL length size of a video track.
fn video_config(track: &Track, data: &[u8]) -> Option<(Codec, u8)> {
    let entry = track.stsd.as_ref()?.descriptions.first()?;

    if let SampleEntry::Video(ve) = entry {
        if let VideoCodecSpecific::AVCConfig(avcc) = &ve.codec_specific {
            let length_size = Codec::H264
                .length_size_from_config(&avcc[..])
                .unwrap_or(RAW_LENGTH_SIZE);
            return Some((Codec::H264, length_size));
        }
    }

    let hvcc = find_hvcc(data)?;
    let length_size = Codec::H265
        .length_size_from_config(hvcc)
        .unwrap_or(RAW_LENGTH_SIZE);
    Some((Codec::H265, length_size))
}

/// Location and decode time of one video sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SampleRef {
    offset: u64,
    size: u32,
    timestamp_ms: Option<u32>,
}

/// Expand `stco`/`co64`, `stsc`, `stsz` and `stts` into one entry per sample.
fn sample_refs(track: &Track) -> Option<Vec<SampleRef>> {
    let stco = track.stco.as_ref()?;
    let stsc = track.stsc.as_ref()?;
    let stsz = track.stsz.as_ref()?;

    let sample_limit = match (&track.stts, stsz.sample_size) {
        (_, 0) => stsz.sample_sizes.len(),
        (Some(stts), _) => stts.samples.iter().map(|s| s.sample_count as usize).sum(),
        (None, _) => usize::MAX,
    };
    let size_of = |index: usize| match stsz.sample_size {
        0 => stsz.sample_sizes.get(index).copied(),
        size => Some(size),
    };

    let timescale = track.timescale.map(|s| s.0).filter(|&s| s > 0);
    let mut deltas = track
        .stts
        .iter()
        .flat_map(|stts| stts.samples.iter())
        .flat_map(|s| std::iter::repeat(s.sample_delta).take(s.sample_count as usize));
    let mut decode_time = 0u64;

    let mut refs = Vec::new();
    for (index, &chunk_offset) in stco.offsets.iter().enumerate() {
        let chunk = index as u32 + 1;
        let per_chunk = stsc
            .samples
            .iter()
            .take_while(|entry| entry.first_chunk <= chunk)
            .last()
            .map_or(0, |entry| entry.samples_per_chunk);

        let mut offset = chunk_offset;
        for _ in 0..per_chunk {
            if refs.len() >= sample_limit {
                return Some(refs);
            }
            let Some(size) = size_of(refs.len()) else {
                return Some(refs);
            };
            let timestamp_ms = timescale
                .and_then(|scale| u32::try_from(decode_time.saturating_mul(1000) / scale).ok());
            refs.push(SampleRef {
                offset,
                size,
                timestamp_ms,
            });
            offset = offset.saturating_add(u64::from(size));
            decode_time = decode_time.saturating_add(u64::from(deltas.next().unwrap_or(0)));
        }
    }
    Some(refs)
}

/// Iterates the samples of the first H.264/H.265 video track.
///
/// A sample whose range runs past the end of the buffer yields
/// [`ProbeError::OutOfBounds`]; the following samples are still read.
#[derive(Debug)]
pub struct Mp4Demuxer {
    data: Bytes,
    codec: Codec,
    length_size: u8,
    samples: std::vec::IntoIter<SampleRef>,
}

impl Mp4Demuxer {
    pub fn new(data: Bytes) -> Result<Self> {
        let context = read_mp4(&mut Cursor::new(&data[..]))
            .map_err(|e| ProbeError::unsupported(0, format!("MP4 parse error: {:?}", e)))?;

        let (track, codec, length_size) = context
            .tracks
            .iter()
            .filter(|t| matches!(t.track_type, TrackType::Video))
            .find_map(|t| video_config(t, &data).map(|(codec, size)| (t, codec, size)))
            .ok_or_else(|| ProbeError::unsupported(0, "no H.264/H.265 video track"))?;

        let samples = sample_refs(track)
            .ok_or_else(|| ProbeError::unsupported(0, "video track has no sample tables"))?;
        tracing::debug!(
            "MP4 {} track with {} samples, NAL length size {}",
            codec,
            samples.len(),
            length_size
        );

        Ok(Self {
            data,
            codec,
            length_size,
            samples: samples.into_iter(),
        })
    }
}

impl Iterator for Mp4Demuxer {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.samples.next()?;
        let size = sample.size as usize;
        let start = usize::try_from(sample.offset).unwrap_or(usize::MAX);

        let Some(data) = start
            .checked_add(size)
            .filter(|&end| end <= self.data.len())
            .map(|end| self.data.slice(start..end))
        else {
            return Some(Err(ProbeError::OutOfBounds {
                offset: start,
                requested: size,
                available: self.data.len().saturating_sub(start),
            }));
        };

        Some(Ok(Frame {
            offset: start,
            data,
            codec: self.codec,
            framing: Framing::LengthPrefixed {
                length_size: self.length_size,
            },
            timestamp_ms: sample.timestamp_ms,
        }))
    }
}
