use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusty_soundprint::{
    generate_fingerprints, query, AudioSource, Configuration, Error, FingerprintCommand, MemoryCorpus, PcmBuffer,
    QueryConfiguration, QueryIndex, Signature, TimeRange, Track, TrackId, TrackStore,
};
use tokio_util::sync::CancellationToken;

mod common;

use common::{synthetic_music, wav_bytes};

const TRACK_SECONDS: f64 = 30.0;

fn track_audio(seed: u64) -> Vec<f64> {
    synthetic_music(seed, TRACK_SECONDS, Configuration::default().sample_rate())
}

async fn fingerprint(samples: &[f64], range: TimeRange) -> Vec<Signature> {
    let config = Configuration::default();
    let pcm = PcmBuffer::from_mono_f64(samples, config.sample_rate());
    generate_fingerprints(AudioSource::pcm(pcm), range, &config).await.unwrap()
}

async fn reference_corpus(seeds: &[u64]) -> MemoryCorpus {
    let mut corpus = MemoryCorpus::new();
    for &seed in seeds {
        let signatures = fingerprint(&track_audio(seed), TimeRange::full()).await;
        let track = Track::new(TrackId(seed), format!("song {seed}")).with_duration(TRACK_SECONDS);
        corpus.insert(track, signatures);
    }
    corpus
}

/// A start time that falls exactly on a window boundary of the reference.
fn window_aligned(windows: usize) -> f64 {
    let config = Configuration::default();
    (windows * config.hop()) as f64 / f64::from(config.sample_rate())
}

#[tokio::test]
async fn generation_is_deterministic() {
    let samples = track_audio(1);
    let a = fingerprint(&samples, TimeRange::full()).await;
    let b = fingerprint(&samples, TimeRange::full()).await;
    assert_eq!(a, b);
    assert!(a.iter().all(|s| s.len() == 128));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn identifies_a_clip_of_a_reference_track() {
    let corpus = reference_corpus(&[10, 11, 12, 13, 14]).await;
    let config = QueryConfiguration::default();
    let index = QueryIndex::build(corpus.signatures(), &config).unwrap();

    let clip = fingerprint(&track_audio(12), TimeRange::new(window_aligned(150), 10.0)).await;
    let result = query(&clip, &index, &config);

    assert!(result.successful);
    assert_eq!("song 12", result.track(&corpus).unwrap().title());
    let best = result.best_match.unwrap();
    assert_eq!(-150, best.offset);
    assert_eq!(clip.len(), best.votes);
    assert_eq!(0.0, best.average_distance);

    let fingerprint_config = Configuration::default();
    let expected_start = window_aligned(150) as f32;
    assert!((best.segment.reference_start(&fingerprint_config) - expected_start).abs() < 0.01);
    assert!((clip[0].timestamp().unwrap() - window_aligned(150)).abs() < 1e-9);
}

#[tokio::test]
async fn identifies_a_slightly_noisy_clip() {
    let corpus = reference_corpus(&[20, 21, 22]).await;
    let config = QueryConfiguration::default();
    let index = QueryIndex::build(corpus.signatures(), &config).unwrap();

    let rate = Configuration::default().sample_rate() as usize;
    let start = 100 * Configuration::default().hop();
    let mut rng = StdRng::seed_from_u64(99);
    let noisy = track_audio(21)[start..start + 12 * rate]
        .iter()
        .map(|x| x + rng.gen_range(-0.0002..0.0002))
        .collect::<Vec<_>>();

    let clip = fingerprint(&noisy, TimeRange::full()).await;
    let result = query(&clip, &index, &config);
    assert!(result.successful);
    assert_eq!(TrackId(21), result.best_match.unwrap().track_id);
}

#[tokio::test]
async fn audio_missing_from_the_corpus_is_not_identified() {
    let corpus = reference_corpus(&[30, 31]).await;
    let config = QueryConfiguration::default();
    let index = QueryIndex::build(corpus.signatures(), &config).unwrap();

    let clip = fingerprint(&track_audio(77), TimeRange::new(2.0, 10.0)).await;
    let result = query(&clip, &index, &config);
    assert!(!result.successful);
    assert!(result.track(&corpus).is_none());
}

#[tokio::test]
async fn wav_file_matches_the_same_pcm() {
    let sample_rate = 11025;
    let samples = synthetic_music(40, 8.0, sample_rate);
    let pcm = PcmBuffer::from_mono_f64(&samples, sample_rate);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.wav");
    std::fs::write(&path, wav_bytes(pcm.samples(), sample_rate)).unwrap();

    let config = Configuration::default();
    let from_file = generate_fingerprints(AudioSource::file(&path), TimeRange::full(), &config).await.unwrap();
    let from_pcm = generate_fingerprints(AudioSource::pcm(pcm), TimeRange::full(), &config).await.unwrap();
    assert!(!from_file.is_empty());
    assert_eq!(from_pcm, from_file);
}

#[tokio::test]
async fn cancelled_generation_returns_no_signatures() {
    let token = CancellationToken::new();
    token.cancel();

    let pcm = PcmBuffer::from_mono_f64(&track_audio(50), Configuration::default().sample_rate());
    let result = FingerprintCommand::new(AudioSource::pcm(pcm), Configuration::default())
        .run_with_cancellation(token)
        .await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn missing_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let source = AudioSource::file(dir.path().join("missing.mp3"));
    let result = generate_fingerprints(source, TimeRange::full(), &Configuration::default()).await;
    assert!(matches!(result, Err(Error::SourceUnavailable { .. })));
}

#[tokio::test]
async fn silence_fingerprints_to_zero_bits() {
    let samples = vec![0.0; 5 * Configuration::default().sample_rate() as usize];
    let signatures = fingerprint(&samples, TimeRange::full()).await;
    assert!(!signatures.is_empty());
    assert!(signatures.iter().all(|s| s.count_ones() == 0));
}

#[test]
fn corpus_metadata_is_kept() {
    let mut corpus = MemoryCorpus::new();
    corpus.insert(Track::new(TrackId(1), "a").with_duration(3.5), Vec::new());
    assert_eq!(Some(3.5), corpus.track(TrackId(1)).unwrap().duration());
}
