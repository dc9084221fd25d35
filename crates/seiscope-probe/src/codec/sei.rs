//! SEI (Supplemental Enhancement Information) message parsing

use bytes::Bytes;

use super::nal::Nalu;
use crate::cursor::{ByteCursor, Checkpoint};
use crate::error::{ProbeError, Result};

/// One SEI message with its payload already unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeiMessage {
    /// Absolute offset of the message header in the container
    pub offset: usize,
    pub payload_type: u32,
    pub payload_size: usize,
    /// RBSP payload; always exactly `payload_size` bytes
    pub raw_bytes: Vec<u8>,
}

/// Parse the SEI messages carried by a NAL unit.
///
/// Non-SEI NAL units yield nothing.
pub fn parse_sei(nalu: &Nalu) -> SeiMessages {
    SeiMessages {
        payload: if nalu.is_sei() {
            nalu.data.slice(nalu.codec.nal_header_len()..)
        } else {
            Bytes::new()
        },
        base: nalu.payload_offset(),
        checkpoint: Checkpoint::default(),
        done: false,
    }
}

/// Iterator over the messages of one SEI NAL unit.
///
/// After the first error the iterator is exhausted.
#[derive(Debug)]
pub struct SeiMessages {
    payload: Bytes,
    base: usize,
    checkpoint: Checkpoint,
    done: bool,
}

impl SeiMessages {
    fn parse_message(&mut self) -> Option<Result<SeiMessage>> {
        let mut cursor = ByteCursor::with_base(&self.payload, self.base);
        // A payload ending in 00 00 leaves an escape pending for the next header
        if cursor.restore(self.checkpoint).is_err() || !cursor.more_rbsp_data() {
            return None;
        }

        let offset = cursor.absolute_position();
        let result = read_message(&mut cursor, offset);
        self.checkpoint = cursor.checkpoint();
        Some(result)
    }
}

impl Iterator for SeiMessages {
    type Item = Result<SeiMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = self.parse_message();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

fn read_message(cursor: &mut ByteCursor<'_>, offset: usize) -> Result<SeiMessage> {
    let payload_type = read_ff_coded(cursor).map_err(|e| malformed(e, offset, 1))?;
    let payload_size = read_ff_coded(cursor).map_err(|e| malformed(e, offset, 1))? as usize;

    let raw_bytes = cursor
        .read_ebsp(payload_size)
        .map_err(|e| malformed(e, offset, payload_size))?;

    Ok(SeiMessage {
        offset,
        payload_type,
        payload_size,
        raw_bytes,
    })
}

/// Read a `0xFF`-run coded value (`payloadType` / `payloadSize`).
fn read_ff_coded(cursor: &mut ByteCursor<'_>) -> Result<u32> {
    let mut value = 0u32;
    loop {
        let byte = cursor.read_ebsp_u8()?;
        value = value.saturating_add(u32::from(byte));
        if byte != 0xFF {
            return Ok(value);
        }
    }
}

/// Report a short read against the message header at `offset`.
fn malformed(err: ProbeError, offset: usize, declared: usize) -> ProbeError {
    match err {
        ProbeError::OutOfBounds { available, .. } => ProbeError::MalformedSei {
            offset,
            declared,
            available,
        },
        other => other,
    }
}
