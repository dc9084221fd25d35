//! # seiscope-probe
//!
//! Pure Rust extraction of SEI (Supplemental Enhancement Information)
//! messages from H.264/H.265 streams.
//!
//! Live-streaming encoders embed per-frame metadata such as timestamps,
//! bitrate and loudness in SEI NAL units. This crate reaches those units
//! without decoding any video.
//!
//! ## Features
//!
//! - Containers: FLV (legacy and Enhanced RTMP), Annex-B elementary
//!   streams, length-prefixed NALU dumps, MP4 `mdat` payloads
//! - NAL unit walking for H.264 and H.265
//! - SEI message parsing with emulation prevention removal
//! - Payload classification with best-effort UTF-8 / JSON decoding
//!
//! ## Example
//!
//! ```no_run
//! use seiscope_probe::{extract_file, ExtractOptions};
//!
//! let extractor = extract_file("stream.flv", ExtractOptions::default()).unwrap();
//! println!("Container: {}", extractor.format());
//!
//! for record in extractor {
//!     match record {
//!         Ok(record) => {
//!             println!("{} ({} bytes)", record.type_name, record.size);
//!             if let Some(json) = &record.decoded_json {
//!                 println!("  {}", json);
//!             }
//!         }
//!         Err(e) => eprintln!("skipped: {}", e),
//!     }
//! }
//! ```

pub mod classify;
pub mod codec;
pub mod container;
pub mod cursor;
pub mod error;
pub mod extract;

pub use classify::{classify, DecodeOptions, SeiContext, SeiPayloadType, SeiRecord};
pub use codec::{parse_sei, Codec, Nalu, NaluWalker, SeiMessage};
pub use container::{demux, ContainerFormat, Demuxer, FormatHint, Frame, Framing};
pub use error::{ProbeError, Result};
pub use extract::{ExtractOptions, ExtractStats, SeiExtractor};

use std::path::Path;

use bytes::Bytes;

/// Extract SEI records from a file.
///
/// The file is read into memory once; frames and NAL units are slices of
/// that buffer. Container detection or hint validation happens here, so an
/// unsupported input fails before any record is produced.
///
/// # Example
///
/// ```no_run
/// use seiscope_probe::{extract_file, ExtractOptions, FormatHint};
///
/// let options = ExtractOptions::default().with_hint(FormatHint::H265AnnexB);
/// let count = extract_file("/path/to/stream.h265", options)
///     .unwrap()
///     .filter_map(Result::ok)
///     .count();
/// println!("{} SEI messages", count);
/// ```
pub fn extract_file<P: AsRef<Path>>(path: P, options: ExtractOptions) -> Result<SeiExtractor> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProbeError::FileNotFound(path.to_path_buf())
        } else {
            ProbeError::Io(e)
        }
    })?;

    tracing::debug!("Read {} bytes from {}", data.len(), path.display());
    extract_bytes(data, options)
}

/// Extract SEI records from an in-memory container.
pub fn extract_bytes(data: impl Into<Bytes>, options: ExtractOptions) -> Result<SeiExtractor> {
    let demuxer = demux(data.into(), options.hint)?;
    Ok(SeiExtractor::new(demuxer, options))
}

/// Detect the container format of `data`.
pub fn detect_format(data: &[u8]) -> Result<ContainerFormat> {
    container::detect_format(data)
}

/// Detect the container format of a file.
pub fn detect_file_format<P: AsRef<Path>>(path: P) -> Result<ContainerFormat> {
    use std::io::Read;

    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProbeError::FileNotFound(path.to_path_buf())
        } else {
            ProbeError::Io(e)
        }
    })?;

    let mut window = Vec::with_capacity(container::DETECT_WINDOW);
    file.take(container::DETECT_WINDOW as u64)
        .read_to_end(&mut window)?;
    detect_format(&window)
}
