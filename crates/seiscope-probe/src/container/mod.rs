//! Container format detection and demuxing
//!
//! Every demuxer turns the container buffer into a stream of [`Frame`]s:
//! byte ranges that hold one or more NAL units of a single access unit.

pub mod annexb;
pub mod flv;
pub mod length_prefixed;
pub mod mp4;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::Serialize;

use crate::codec::Codec;
use crate::cursor::ByteCursor;
use crate::error::{ProbeError, Result};

pub use annexb::AnnexBDemuxer;
pub use flv::FlvDemuxer;
pub use length_prefixed::LengthPrefixedDemuxer;
pub use mp4::Mp4Demuxer;

/// How far into the input auto-detection looks for an Annex-B start code.
pub const DETECT_WINDOW: usize = 64 * 1024;

/// Length prefixes checked before a raw NALU stream is considered plausible.
const LENGTH_CHAIN_PROBES: usize = 8;

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "format", content = "codec")]
pub enum ContainerFormat {
    /// Flash Video (.flv), legacy or Enhanced RTMP video tags
    Flv,
    /// H.264 elementary stream with start codes (.h264, .264)
    H264AnnexB,
    /// H.265 elementary stream with start codes (.h265, .265)
    H265AnnexB,
    /// 4-byte length-prefixed NAL units
    RawNalu(Codec),
    /// MPEG-4 Part 14 (.mp4, .mov)
    Mp4,
}

impl ContainerFormat {
    /// Codec implied by the format, if the container fixes one.
    pub fn codec(&self) -> Option<Codec> {
        match self {
            ContainerFormat::H264AnnexB => Some(Codec::H264),
            ContainerFormat::H265AnnexB => Some(Codec::H265),
            ContainerFormat::RawNalu(codec) => Some(*codec),
            ContainerFormat::Flv | ContainerFormat::Mp4 => None,
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFormat::Flv => write!(f, "FLV"),
            ContainerFormat::H264AnnexB => write!(f, "H.264 Annex-B"),
            ContainerFormat::H265AnnexB => write!(f, "H.265 Annex-B"),
            ContainerFormat::RawNalu(codec) => write!(f, "{} length-prefixed NALU", codec),
            ContainerFormat::Mp4 => write!(f, "MP4"),
        }
    }
}

/// Caller's statement about the input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatHint {
    #[default]
    Auto,
    Flv,
    H264AnnexB,
    H265AnnexB,
    RawH264,
    RawH265,
    Mp4,
}

impl FormatHint {
    pub const NAMES: &'static [&'static str] =
        &["auto", "flv", "h264", "h265", "raw-h264", "raw-h265", "mp4"];
}

impl FromStr for FormatHint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(FormatHint::Auto),
            "flv" => Ok(FormatHint::Flv),
            "h264" | "264" | "avc" => Ok(FormatHint::H264AnnexB),
            "h265" | "265" | "hevc" => Ok(FormatHint::H265AnnexB),
            "raw-h264" => Ok(FormatHint::RawH264),
            "raw-h265" => Ok(FormatHint::RawH265),
            "mp4" => Ok(FormatHint::Mp4),
            other => Err(format!(
                "unknown format '{}', expected one of: {}",
                other,
                Self::NAMES.join(", ")
            )),
        }
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatHint::Auto => "auto",
            FormatHint::Flv => "flv",
            FormatHint::H264AnnexB => "h264",
            FormatHint::H265AnnexB => "h265",
            FormatHint::RawH264 => "raw-h264",
            FormatHint::RawH265 => "raw-h265",
            FormatHint::Mp4 => "mp4",
        };
        f.write_str(name)
    }
}

/// How NAL units are delimited inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// The frame is exactly one NAL unit (start code already removed)
    AnnexB,
    /// Big-endian length fields of `length_size` bytes precede each NAL unit
    LengthPrefixed { length_size: u8 },
}

/// Byte range of one access unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Absolute offset of `data[0]` in the container
    pub offset: usize,
    pub data: Bytes,
    pub codec: Codec,
    pub framing: Framing,
    /// Container timestamp in milliseconds, when the container has one
    pub timestamp_ms: Option<u32>,
}

#[derive(Debug)]
enum Inner {
    Flv(FlvDemuxer),
    AnnexB(AnnexBDemuxer),
    LengthPrefixed(LengthPrefixedDemuxer),
    Mp4(Mp4Demuxer),
}

/// Frame iterator over a container of any supported format.
#[derive(Debug)]
pub struct Demuxer {
    format: ContainerFormat,
    inner: Inner,
}

impl Demuxer {
    pub fn format(&self) -> ContainerFormat {
        self.format
    }
}

impl Iterator for Demuxer {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Flv(d) => d.next(),
            Inner::AnnexB(d) => d.next(),
            Inner::LengthPrefixed(d) => d.next(),
            Inner::Mp4(d) => d.next(),
        }
    }
}

/// Open a demuxer for `data`.
///
/// With [`FormatHint::Auto`] the format is detected; an explicit hint is
/// checked against the data and a mismatch is an error.
pub fn demux(data: Bytes, hint: FormatHint) -> Result<Demuxer> {
    let format = match hint {
        FormatHint::Auto => detect_format(&data)?,
        hint => check_hint(&data, hint)?,
    };
    tracing::debug!("Demuxing {} bytes as {}", data.len(), format);

    let inner = match format {
        ContainerFormat::Flv => Inner::Flv(FlvDemuxer::new(data)?),
        ContainerFormat::H264AnnexB => Inner::AnnexB(AnnexBDemuxer::new(data, Codec::H264)),
        ContainerFormat::H265AnnexB => Inner::AnnexB(AnnexBDemuxer::new(data, Codec::H265)),
        ContainerFormat::RawNalu(codec) => {
            Inner::LengthPrefixed(LengthPrefixedDemuxer::new(data, 0, codec))
        }
        ContainerFormat::Mp4 => Inner::Mp4(Mp4Demuxer::new(data)?),
    };

    Ok(Demuxer { format, inner })
}

/// Detect the container format from its leading bytes.
pub fn detect_format(data: &[u8]) -> Result<ContainerFormat> {
    if flv::has_signature(data) {
        return Ok(ContainerFormat::Flv);
    }
    if mp4::has_ftyp(data) {
        return Ok(ContainerFormat::Mp4);
    }

    let window = &data[..data.len().min(DETECT_WINDOW)];
    // A stream opening with a start code is Annex-B even if it also
    // happens to read as a length chain.
    if annexb::start_code_len_at(window, 0).is_some() {
        return Ok(annexb_format(window));
    }
    // Checked before searching for start codes: in a raw stream with 4-byte
    // lengths, any unit of 256 to 511 bytes has `00 00 01` in its length
    // field, which the window search would take for Annex-B.
    if let Some(codec) = sniff_length_chain(window, window.len() < data.len()) {
        return Ok(ContainerFormat::RawNalu(codec));
    }
    if annexb::find_start_code(window, 0).is_some() {
        return Ok(annexb_format(window));
    }

    Err(ProbeError::unsupported(0, "no known container signature"))
}

fn annexb_format(window: &[u8]) -> ContainerFormat {
    match Codec::sniff(annexb::nal_units(window)) {
        Codec::H264 => ContainerFormat::H264AnnexB,
        Codec::H265 => ContainerFormat::H265AnnexB,
    }
}

/// Check an explicit hint against the data.
///
/// Elementary-stream hints are refused for input that carries a container
/// signature, and raw hints also for input opening with a start code.
fn check_hint(data: &[u8], hint: FormatHint) -> Result<ContainerFormat> {
    let window = &data[..data.len().min(DETECT_WINDOW)];
    let container = flv::has_signature(data) || mp4::has_ftyp(data);
    let annexb_ok = !container && annexb::find_start_code(window, 0).is_some();
    let raw_ok = !container
        && annexb::start_code_len_at(window, 0).is_none()
        && sniff_length_chain(window, window.len() < data.len()).is_some();

    let (format, ok) = match hint {
        FormatHint::Auto => return detect_format(data),
        FormatHint::Flv => (ContainerFormat::Flv, flv::has_signature(data)),
        FormatHint::H264AnnexB => (ContainerFormat::H264AnnexB, annexb_ok),
        FormatHint::H265AnnexB => (ContainerFormat::H265AnnexB, annexb_ok),
        FormatHint::RawH264 => (ContainerFormat::RawNalu(Codec::H264), raw_ok),
        FormatHint::RawH265 => (ContainerFormat::RawNalu(Codec::H265), raw_ok),
        FormatHint::Mp4 => (ContainerFormat::Mp4, mp4::has_box_header(data)),
    };

    if ok {
        Ok(format)
    } else {
        Err(ProbeError::unsupported(
            0,
            format!("input does not look like {}", format),
        ))
    }
}

/// Follow up to a few 4-byte length prefixes and sniff the codec from the
/// NAL headers they point at.
///
/// A unit may run past the end of `window` when the window was cut from
/// longer input, or when at least one complete unit came before it.
fn sniff_length_chain(window: &[u8], window_cut: bool) -> Option<Codec> {
    let mut cursor = ByteCursor::new(window);
    let mut headers = Vec::new();

    while headers.len() < LENGTH_CHAIN_PROBES && !cursor.is_empty() {
        let length = cursor.read_be_u32().ok()? as usize;
        if length == 0 {
            continue;
        }
        // A unit cut off at the end still counts
        let unit = cursor.peek(length.min(cursor.remaining())).ok()?;
        match unit.first() {
            Some(header) if header & 0x80 == 0 => headers.push(unit),
            _ => return None,
        }
        if length > cursor.remaining() {
            let complete = headers.len() - 1;
            if complete == 0 && !window_cut {
                return None;
            }
            break;
        }
        cursor.skip(length).ok()?;
    }

    if headers.is_empty() {
        return None;
    }
    Some(Codec::sniff(headers))
}
