use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractConfig {
    /// Container format: auto, flv, h264, h265, raw-h264, raw-h265, mp4
    #[serde(default = "default_format")]
    pub format: String,

    /// Drop trailing NUL bytes before decoding payload text
    #[serde(default = "default_strip_trailing_nul")]
    pub strip_trailing_nul: bool,

    /// Payload types to keep (empty keeps all)
    #[serde(default)]
    pub types: Vec<u32>,

    /// Maximum number of records to print
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_format() -> String {
    "auto".to_string()
}

fn default_strip_trailing_nul() -> bool {
    true
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            strip_trailing_nul: default_strip_trailing_nul(),
            types: Vec::new(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable listing
    #[default]
    Text,
    /// One pretty-printed JSON document
    Json,
    /// One JSON object per line
    Jsonl,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Include raw payload bytes as hex
    #[serde(default = "default_hex")]
    pub hex: bool,
}

fn default_hex() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            hex: default_hex(),
        }
    }
}
