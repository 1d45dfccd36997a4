use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Parser;
use rusty_soundprint::{generate_fingerprints, AudioSource, Configuration, Settings, Signature, TimeRange};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Generate fingerprints from audio files/streams.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Restrict the duration of the processed input audio, 0 means the whole input
    #[arg(short, long, default_value_t = 120)]
    length: u32,

    /// Skip this many seconds at the beginning of the input
    #[arg(short, long, default_value_t = 0.0)]
    start: f64,

    /// Read the fingerprint configuration from a JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input format hint used when reading from stdin
    #[arg(short, long)]
    format: Option<String>,

    /// Print the output in JSON format
    #[arg(short, long, conflicts_with = "plain")]
    json: bool,

    /// Print the just the fingerprint in text format
    #[arg(short, long)]
    plain: bool,

    /// File to analyze, `-` reads from stdin
    file: PathBuf,
}

#[derive(Serialize)]
struct Output<'a> {
    file: &'a Path,
    duration: f64,
    scheme: u32,
    fingerprint: Vec<String>,
}

fn load_configuration(path: Option<&Path>) -> anyhow::Result<Configuration> {
    let Some(path) = path else {
        return Ok(Configuration::default());
    };
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let settings: Settings =
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(settings.fingerprint)
}

fn encode(signatures: &[Signature]) -> Vec<String> {
    signatures.iter().map(|s| STANDARD.encode(s.to_bytes())).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_configuration(args.config.as_deref())?;

    let mut range = TimeRange::starting_at(args.start);
    if args.length > 0 {
        range = range.with_duration(f64::from(args.length));
    }

    let source = if args.file.as_os_str() == "-" {
        AudioSource::stream(std::io::stdin(), args.format.as_deref())
    } else {
        AudioSource::file(&args.file)
    };

    let signatures = generate_fingerprints(source, range, &config)
        .await
        .with_context(|| format!("fingerprinting {}", args.file.display()))?;
    tracing::debug!(signatures = signatures.len(), "fingerprint generated");

    let duration = signatures.len() as f64 * f64::from(config.item_duration_in_seconds());
    let fingerprint = encode(&signatures);

    if args.json {
        let output = Output { file: &args.file, duration, scheme: config.id(), fingerprint };
        println!("{}", serde_json::to_string(&output)?);
    } else if args.plain {
        println!("{}", fingerprint.join(","));
    } else {
        println!("FILE={}", args.file.display());
        println!("DURATION={duration:.2}");
        println!("SCHEME={:08x}", config.id());
        println!("FINGERPRINT={}", fingerprint.join(","));
    }

    Ok(())
}
