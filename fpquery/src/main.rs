use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use rusty_soundprint::{
    generate_fingerprints, query, AudioSource, Configuration, MemoryCorpus, QueryIndex, Settings, Signature,
    TimeRange, Track,
};
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::utils::DurationExt;

mod utils;

/// Identify audio clips against a set of reference tracks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Reference track, may be given many times
    #[arg(short, long = "reference", required = true)]
    references: Vec<PathBuf>,

    /// Skip this many seconds at the beginning of every clip
    #[arg(short, long, default_value_t = 0.0)]
    start: f64,

    /// Restrict the duration of every clip, 0 means the whole clip
    #[arg(short, long, default_value_t = 0)]
    length: u32,

    /// Read both configurations from a JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print every result as a line of JSON
    #[arg(short, long)]
    json: bool,

    /// Clips to identify
    #[arg(required = true)]
    clips: Vec<PathBuf>,
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn title_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn build_corpus(paths: &[PathBuf], config: &Configuration) -> anyhow::Result<MemoryCorpus> {
    let mut tasks = JoinSet::new();
    for (i, path) in paths.iter().enumerate() {
        let path = path.clone();
        let config = config.clone();
        tasks.spawn(async move {
            let signatures = generate_fingerprints(AudioSource::file(&path), TimeRange::full(), &config).await;
            (i, path, signatures)
        });
    }

    let mut corpus = MemoryCorpus::new();
    while let Some(joined) = tasks.join_next().await {
        let (i, path, signatures) = joined.context("fingerprinting task failed")?;
        let signatures: Vec<Signature> = signatures.with_context(|| format!("fingerprinting {}", path.display()))?;
        let duration = signatures.len() as f64 * f64::from(config.item_duration_in_seconds());
        let track = Track::new((i as u64).into(), title_of(&path)).with_duration(duration);
        corpus.insert(track, signatures);
    }
    Ok(corpus)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;
    let Settings { fingerprint: config, query: query_config } = settings;

    let corpus = build_corpus(&args.references, &config).await?;
    let index = QueryIndex::build(corpus.signatures(), &query_config)?;
    info!(tracks = index.track_count(), signatures = index.len(), "reference index ready");

    let mut range = TimeRange::starting_at(args.start);
    if args.length > 0 {
        range = range.with_duration(f64::from(args.length));
    }

    for clip in &args.clips {
        let signatures = generate_fingerprints(AudioSource::file(clip), range, &config)
            .await
            .with_context(|| format!("fingerprinting {}", clip.display()))?;
        let result = query(&signatures, &index, &query_config);

        if args.json {
            println!("{}", serde_json::to_string(&result)?);
            continue;
        }

        let (Some(best), Some(track)) = (result.best_match.as_ref(), result.track(&corpus)) else {
            println!("{}: no match", clip.display());
            continue;
        };
        let segment = &best.segment;
        println!(
            "{}: {} | votes {} ({} aligned), offset {}, distance {:0.02} | {} -- {} | {} -- {}",
            clip.display(),
            track.title(),
            best.votes,
            best.aligned_votes,
            best.offset,
            best.average_distance,
            (range.start() as f32 + segment.query_start(&config)).display_duration(),
            (range.start() as f32 + segment.query_end(&config)).display_duration(),
            segment.reference_start(&config).display_duration(),
            segment.reference_end(&config).display_duration(),
        );
    }

    Ok(())
}
