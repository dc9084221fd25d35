mod cli;

use seiscope::{config, output::RecordWriter};
use seiscope_probe::{DecodeOptions, ExtractOptions, FormatHint, SeiPayloadType};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, OutputArg};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "seiscope=debug,seiscope_probe=trace".to_string()
        } else {
            "seiscope=info,seiscope_probe=warn".to_string()
        }
    });

    // stdout carries records; keep logs on stderr
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Extract {
            file,
            format,
            output,
            types,
            limit,
            no_hex,
            strict,
        } => {
            let args = ExtractArgs {
                format,
                output,
                types,
                limit,
                no_hex,
                strict,
            };
            extract(&file, cli.config.as_deref(), args)
        }
        Commands::Detect { file } => detect(&file),
        Commands::Types => list_types(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
    }
}

/// Command-line overrides for `extract`.
struct ExtractArgs {
    format: Option<String>,
    output: Option<OutputArg>,
    types: Vec<u32>,
    limit: Option<usize>,
    no_hex: bool,
    strict: bool,
}

fn extract(file: &Path, config_path: Option<&Path>, args: ExtractArgs) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let format = args.format.unwrap_or(config.extract.format);
    let hint: FormatHint = format.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let output_format = args
        .output
        .map(config::OutputFormat::from)
        .unwrap_or(config.output.format);
    let hex = config.output.hex && !args.no_hex;
    let types = if args.types.is_empty() {
        config.extract.types
    } else {
        args.types
    };
    let limit = args.limit.or(config.extract.limit);

    let options = ExtractOptions {
        hint,
        decode: DecodeOptions {
            strip_trailing_nul: config.extract.strip_trailing_nul,
        },
        payload_types: types,
    };

    tracing::info!("Extracting SEI from {:?}", file);
    let mut extractor = seiscope_probe::extract_file(file, options)
        .with_context(|| format!("Failed to open {:?}", file))?;
    tracing::debug!("Container format: {}", extractor.format());

    let stdout = std::io::stdout();
    let mut writer = RecordWriter::new(stdout.lock(), output_format, hex);
    let mut emitted = 0usize;

    for item in extractor.by_ref() {
        match item {
            Ok(record) => {
                writer.write_record(&record)?;
                emitted += 1;
                if limit.is_some_and(|limit| emitted >= limit) {
                    tracing::debug!("Record limit {} reached", emitted);
                    break;
                }
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    let stats = extractor.stats();
    writer.finish(extractor.format(), &stats)?;

    if args.strict && stats.errors > 0 {
        anyhow::bail!("{} unit(s) failed to parse", stats.errors);
    }

    Ok(())
}

fn detect(file: &Path) -> Result<()> {
    let format = seiscope_probe::detect_file_format(file)
        .with_context(|| format!("Failed to detect format of {:?}", file))?;
    println!("{}", format);
    Ok(())
}

fn list_types() -> Result<()> {
    for payload_type in SeiPayloadType::KNOWN {
        println!("{:>5}  {}", payload_type.code(), payload_type.name());
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Format: {}", config.extract.format);
            println!("  Strip trailing NUL: {}", config.extract.strip_trailing_nul);
            if !config.extract.types.is_empty() {
                println!("  Types: {:?}", config.extract.types);
            }
            println!("  Output: {:?} (hex: {})", config.output.format, config.output.hex);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Format: {}", config.extract.format);
            println!("  Output: {:?}", config.output.format);
        }
    }

    Ok(())
}
