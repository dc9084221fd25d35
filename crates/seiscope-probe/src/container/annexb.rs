//! Annex-B elementary streams (start-code delimited NAL units)

use bytes::Bytes;

use super::{Frame, Framing};
use crate::codec::Codec;
use crate::error::Result;

/// Length of the start code beginning at `pos`, if any.
pub fn start_code_len_at(data: &[u8], pos: usize) -> Option<usize> {
    match data.get(pos..)? {
        [0x00, 0x00, 0x01, ..] => Some(3),
        [0x00, 0x00, 0x00, 0x01, ..] => Some(4),
        _ => None,
    }
}

/// Position of the next `00 00 01` at or after `from`.
///
/// A four-byte start code is reported by its last three bytes; the leading
/// zero is left to the previous unit, which drops trailing zeros anyway.
pub fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(3)
        .position(|w| w == [0x00, 0x00, 0x01])
        .map(|i| from + i)
}

/// Advance past the next non-empty unit; `next` holds the pending start code.
fn next_unit(data: &[u8], next: &mut Option<usize>) -> Option<(usize, usize)> {
    loop {
        let start = (*next)? + 3;
        *next = find_start_code(data, start);
        let mut end = next.unwrap_or(data.len());
        while end > start && data[end - 1] == 0x00 {
            end -= 1;
        }
        if end > start {
            return Some((start, end));
        }
    }
}

/// `(start, end)` of each non-empty NAL unit, start codes excluded.
pub fn unit_ranges(data: &[u8]) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut next = find_start_code(data, 0);
    std::iter::from_fn(move || next_unit(data, &mut next))
}

/// NAL units of an Annex-B buffer, for codec sniffing.
pub fn nal_units(data: &[u8]) -> impl Iterator<Item = &[u8]> + '_ {
    unit_ranges(data).map(move |(start, end)| &data[start..end])
}

/// Splits an Annex-B stream into one frame per NAL unit.
#[derive(Debug)]
pub struct AnnexBDemuxer {
    data: Bytes,
    codec: Codec,
    next: Option<usize>,
}

impl AnnexBDemuxer {
    pub fn new(data: Bytes, codec: Codec) -> Self {
        let next = find_start_code(&data, 0);
        Self { data, codec, next }
    }
}

impl Iterator for AnnexBDemuxer {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let (start, end) = next_unit(&self.data, &mut self.next)?;
        Some(Ok(Frame {
            offset: start,
            data: self.data.slice(start..end),
            codec: self.codec,
            framing: Framing::AnnexB,
            timestamp_ms: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(data: &'static [u8]) -> Vec<Frame> {
        AnnexBDemuxer::new(Bytes::from_static(data), Codec::H264)
            .collect::<Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_start_code_helpers() {
        let data = [0xFF, 0x00, 0x00, 0x00, 0x01, 0x67];
        assert_eq!(start_code_len_at(&data, 1), Some(4));
        assert_eq!(start_code_len_at(&data, 2), Some(3));
        assert_eq!(start_code_len_at(&data, 0), None);
        assert_eq!(find_start_code(&data, 0), Some(2));
        assert_eq!(find_start_code(&data, 3), None);
    }

    #[test]
    fn test_mixed_start_codes() {
        let f = frames(&[
            0x00, 0x00, 0x00, 0x01, 0x67, 0x64, // 4-byte start code
            0x00, 0x00, 0x01, 0x06, 0x05, 0x00, 0x80, // 3-byte start code
        ]);
        assert_eq!(f.len(), 2);
        assert_eq!(f[0].offset, 4);
        assert_eq!(&f[0].data[..], &[0x67, 0x64]);
        assert_eq!(f[1].offset, 9);
        assert_eq!(&f[1].data[..], &[0x06, 0x05, 0x00, 0x80]);
        assert!(f.iter().all(|f| f.framing == Framing::AnnexB));
    }

    #[test]
    fn test_trailing_zeros_trimmed() {
        let f = frames(&[0x00, 0x00, 0x01, 0x06, 0x80, 0x00, 0x00, 0x00, 0x00, 0x01, 0x68, 0x00, 0x00]);
        assert_eq!(f.len(), 2);
        assert_eq!(&f[0].data[..], &[0x06, 0x80]);
        assert_eq!(&f[1].data[..], &[0x68]);
    }

    #[test]
    fn test_leading_garbage_and_empty_units_skipped() {
        let f = frames(&[0xAB, 0xCD, 0x00, 0x00, 0x01, 0x00, 0x00, 0x01, 0x09, 0xF0]);
        assert_eq!(f.len(), 1);
        assert_eq!(&f[0].data[..], &[0x09, 0xF0]);
    }

    #[test]
    fn test_no_start_code() {
        assert!(frames(&[0x01, 0x02, 0x03]).is_empty());
        assert!(frames(&[]).is_empty());
    }

    #[test]
    fn test_unit_ranges() {
        let data = [0x00, 0x00, 0x00, 0x01, 0x06, 0x80, 0x00, 0x00, 0x01, 0x65];
        let ranges: Vec<_> = unit_ranges(&data).collect();
        assert_eq!(ranges, vec![(4, 6), (9, 10)]);
    }

    #[test]
    fn test_nal_units_matches_demuxer() {
        let data: &[u8] = &[0x00, 0x00, 0x01, 0x40, 0x01, 0x00, 0x00, 0x01, 0x4E, 0x01];
        let units: Vec<&[u8]> = nal_units(data).collect();
        assert_eq!(units, vec![&[0x40, 0x01][..], &[0x4E, 0x01][..]]);
    }
}
