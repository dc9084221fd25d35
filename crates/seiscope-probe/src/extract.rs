//! The extraction pipeline: container → frame → NAL unit → SEI message → record

use serde::Serialize;

use crate::classify::{classify, DecodeOptions, SeiContext, SeiRecord};
use crate::codec::{parse_sei, NaluWalker, SeiMessages};
use crate::container::{ContainerFormat, Demuxer, FormatHint};
use crate::error::{ProbeError, Result};

/// Options for [`SeiExtractor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Container format; [`FormatHint::Auto`] detects it
    pub hint: FormatHint,
    pub decode: DecodeOptions,
    /// Only emit these payload types; empty means all
    pub payload_types: Vec<u32>,
}

impl ExtractOptions {
    pub fn with_hint(mut self, hint: FormatHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn with_payload_types(mut self, types: impl IntoIterator<Item = u32>) -> Self {
        self.payload_types = types.into_iter().collect();
        self
    }

    fn wants(&self, payload_type: u32) -> bool {
        self.payload_types.is_empty() || self.payload_types.contains(&payload_type)
    }
}

/// Counters kept while extracting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub frames: usize,
    pub nalus: usize,
    pub sei_nalus: usize,
    /// Records emitted, after payload type filtering
    pub records: usize,
    pub errors: usize,
}

/// Pull-based SEI extraction over a whole container.
///
/// Yields one item per SEI message. Errors confined to a frame, NAL unit or
/// SEI message are yielded as `Err` items and extraction resumes with the
/// next unit.
#[derive(Debug)]
pub struct SeiExtractor {
    demuxer: Demuxer,
    options: ExtractOptions,
    walker: Option<(NaluWalker, Option<u32>)>,
    messages: Option<(SeiMessages, SeiContext)>,
    stats: ExtractStats,
}

impl SeiExtractor {
    pub fn new(demuxer: Demuxer, options: ExtractOptions) -> Self {
        Self {
            demuxer,
            options,
            walker: None,
            messages: None,
            stats: ExtractStats::default(),
        }
    }

    pub fn format(&self) -> ContainerFormat {
        self.demuxer.format()
    }

    pub fn stats(&self) -> ExtractStats {
        self.stats
    }

    fn fail(&mut self, err: ProbeError) -> Option<Result<SeiRecord>> {
        tracing::debug!("{}", err);
        self.stats.errors += 1;
        Some(Err(err))
    }
}

impl Iterator for SeiExtractor {
    type Item = Result<SeiRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((messages, context)) = &mut self.messages {
                let context = *context;
                match messages.next() {
                    Some(Ok(message)) => {
                        if !self.options.wants(message.payload_type) {
                            continue;
                        }
                        self.stats.records += 1;
                        return Some(Ok(classify(message, context, &self.options.decode)));
                    }
                    Some(Err(e)) => {
                        self.messages = None;
                        return self.fail(e);
                    }
                    None => self.messages = None,
                }
            }

            if let Some((walker, timestamp_ms)) = &mut self.walker {
                let timestamp_ms = *timestamp_ms;
                match walker.next() {
                    Some(Ok(nalu)) => {
                        self.stats.nalus += 1;
                        if nalu.is_sei() {
                            self.stats.sei_nalus += 1;
                            let context = SeiContext {
                                codec: nalu.codec,
                                nal_unit_type: nalu.nal_unit_type,
                                offset: nalu.offset,
                                timestamp_ms,
                            };
                            self.messages = Some((parse_sei(&nalu), context));
                        }
                        continue;
                    }
                    Some(Err(e)) => {
                        self.walker = None;
                        return self.fail(e);
                    }
                    None => self.walker = None,
                }
            }

            match self.demuxer.next()? {
                Ok(frame) => {
                    self.stats.frames += 1;
                    self.walker = Some((NaluWalker::new(&frame), frame.timestamp_ms));
                }
                Err(e) => return self.fail(e),
            }
        }
    }
}
