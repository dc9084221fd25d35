//! Rendering of SEI records as text, JSON or JSON Lines

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::config::OutputFormat;
use seiscope_probe::{Codec, ContainerFormat, ExtractStats, SeiRecord};

/// Serializable view of a record.
#[derive(Debug, Serialize)]
pub struct RecordView<'a> {
    pub codec: Codec,
    pub nal_unit_type: u8,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u32>,
    pub sei_type: u32,
    pub type_name: &'a str,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    pub decoded_string: Option<&'a str>,
    pub decoded_json: Option<&'a Value>,
}

impl<'a> RecordView<'a> {
    pub fn new(record: &'a SeiRecord, include_hex: bool) -> Self {
        Self {
            codec: record.codec,
            nal_unit_type: record.nal_unit_type,
            offset: record.offset,
            timestamp_ms: record.timestamp_ms,
            sei_type: record.sei_type,
            type_name: &record.type_name,
            size: record.size,
            uuid: record.uuid.as_deref(),
            hex: include_hex.then(|| hex::encode(&record.raw_bytes)),
            decoded_string: record.decoded_string.as_deref(),
            decoded_json: record.decoded_json.as_ref(),
        }
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    format: String,
    records: &'a [Value],
    stats: &'a ExtractStats,
}

/// Streams records to `out` in the configured format.
///
/// JSON output is buffered until [`RecordWriter::finish`] so it can be
/// emitted as one document; the other formats are written as they arrive.
pub struct RecordWriter<W: Write> {
    out: W,
    format: OutputFormat,
    hex: bool,
    written: usize,
    buffered: Vec<Value>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(out: W, format: OutputFormat, hex: bool) -> Self {
        Self {
            out,
            format,
            hex,
            written: 0,
            buffered: Vec::new(),
        }
    }

    pub fn write_record(&mut self, record: &SeiRecord) -> Result<()> {
        let view = RecordView::new(record, self.hex);
        self.written += 1;

        match self.format {
            OutputFormat::Text => write_text(&mut self.out, self.written, &view)?,
            OutputFormat::Jsonl => {
                serde_json::to_writer(&mut self.out, &view)?;
                writeln!(self.out)?;
            }
            OutputFormat::Json => self.buffered.push(serde_json::to_value(&view)?),
        }
        Ok(())
    }

    /// Write the trailer (or the whole JSON document) and hand back the sink.
    pub fn finish(mut self, format: ContainerFormat, stats: &ExtractStats) -> Result<W> {
        match self.format {
            OutputFormat::Text => {
                if self.written > 0 {
                    writeln!(self.out)?;
                }
                writeln!(self.out, "Container: {}", format)?;
                writeln!(
                    self.out,
                    "Frames: {}, NAL units: {}, SEI NAL units: {}",
                    stats.frames, stats.nalus, stats.sei_nalus
                )?;
                writeln!(
                    self.out,
                    "Records: {}, errors: {}",
                    stats.records, stats.errors
                )?;
            }
            OutputFormat::Jsonl => {}
            OutputFormat::Json => {
                let doc = JsonDocument {
                    format: format.to_string(),
                    records: &self.buffered,
                    stats,
                };
                serde_json::to_writer_pretty(&mut self.out, &doc)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

fn write_text<W: Write>(out: &mut W, index: usize, view: &RecordView<'_>) -> Result<()> {
    write!(
        out,
        "#{} {} offset={} type={} ({}) size={}",
        index, view.codec, view.offset, view.sei_type, view.type_name, view.size
    )?;
    if let Some(ts) = view.timestamp_ms {
        write!(out, " ts={}ms", ts)?;
    }
    writeln!(out)?;

    if let Some(uuid) = view.uuid {
        writeln!(out, "  uuid: {}", uuid)?;
    }
    match (view.decoded_json, view.decoded_string) {
        (Some(json), _) => writeln!(out, "  json: {}", json)?,
        (None, Some(text)) if !text.is_empty() => writeln!(out, "  text: {}", text.escape_debug())?,
        _ => {}
    }
    if let Some(hex) = &view.hex {
        writeln!(out, "  hex:  {}", hex)?;
    }
    Ok(())
}
