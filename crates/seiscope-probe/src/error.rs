//! Error types for seiscope-probe

use std::path::PathBuf;

/// Result type for seiscope-probe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors that can occur while extracting SEI data.
///
/// Offsets are absolute byte positions in the container buffer.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The container signature or format hint was not recognized
    #[error("Unsupported format at offset {offset}: {reason}")]
    UnsupportedFormat { offset: usize, reason: String },

    /// A read went past the end of the available bytes
    #[error("Out of bounds at offset {offset}: need {requested} bytes, have {available}")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        available: usize,
    },

    /// A length-prefixed NAL unit declares more bytes than remain
    #[error("Truncated NAL unit at offset {offset}: declared {declared} bytes, have {available}")]
    TruncatedNalu {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// An SEI message header or payload runs past the end of its NAL unit
    #[error("Malformed SEI message at offset {offset}: declared {declared} bytes, have {available}")]
    MalformedSei {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// Payload is not valid UTF-8
    #[error("Payload at offset {offset} is not valid UTF-8")]
    TextDecode { offset: usize },

    /// Payload text is not valid JSON
    #[error("Payload at offset {offset} is not valid JSON: {reason}")]
    JsonParse { offset: usize, reason: String },
}

impl ProbeError {
    /// Create an unsupported format error.
    pub fn unsupported(offset: usize, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the whole parse rather than a single unit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::Io(_) | Self::UnsupportedFormat { .. }
        )
    }

    /// Byte offset the error refers to, if any.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::FileNotFound(_) | Self::Io(_) => None,
            Self::UnsupportedFormat { offset, .. }
            | Self::OutOfBounds { offset, .. }
            | Self::TruncatedNalu { offset, .. }
            | Self::MalformedSei { offset, .. }
            | Self::TextDecode { offset }
            | Self::JsonParse { offset, .. } => Some(*offset),
        }
    }
}
