use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use seiscope::config::OutputFormat;

#[derive(Parser)]
#[command(name = "seiscope")]
#[command(author, version, about = "Extract SEI metadata from H.264/H.265 streams")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract SEI messages from a file
    Extract {
        /// Input file (FLV, MP4, Annex-B or length-prefixed NALUs)
        #[arg(required = true)]
        file: PathBuf,

        /// Container format (auto, flv, h264, h265, raw-h264, raw-h265, mp4)
        #[arg(short, long)]
        format: Option<String>,

        /// Output format
        #[arg(short, long, value_enum)]
        output: Option<OutputArg>,

        /// Only show this SEI payload type (repeatable)
        #[arg(short = 't', long = "type", value_name = "N")]
        types: Vec<u32>,

        /// Stop after N records
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Omit raw payload hex from the output
        #[arg(long)]
        no_hex: bool,

        /// Exit with an error if any unit failed to parse
        #[arg(long)]
        strict: bool,
    },

    /// Detect the container format of a file
    Detect {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,
    },

    /// List known SEI payload types
    Types,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputArg {
    Text,
    Json,
    Jsonl,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Text => OutputFormat::Text,
            OutputArg::Json => OutputFormat::Json,
            OutputArg::Jsonl => OutputFormat::Jsonl,
        }
    }
}
