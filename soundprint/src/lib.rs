//! Audio identification by binary spectral fingerprints.
//!
//! Audio is cut into overlapping windows, every window is reduced to the
//! energies of logarithmically spaced bands and the changes of those energies
//! are encoded into fixed-width bit signatures. A [QueryIndex] built over the
//! signatures of reference tracks finds the track a short recording comes from:
//!
//! ```no_run
//! # async fn identify() -> Result<(), rusty_soundprint::Error> {
//! use rusty_soundprint::{
//!     generate_fingerprints, query, AudioSource, Configuration, MemoryCorpus, QueryConfiguration, QueryIndex,
//!     TimeRange, Track,
//! };
//!
//! let config = Configuration::default();
//! let query_config = QueryConfiguration::default();
//!
//! let mut corpus = MemoryCorpus::new();
//! let signatures = generate_fingerprints(AudioSource::file("song.flac"), TimeRange::full(), &config).await?;
//! corpus.insert(Track::new(corpus.next_id(), "Song"), signatures);
//!
//! let index = QueryIndex::build(corpus.signatures(), &query_config)?;
//! let clip = generate_fingerprints(AudioSource::file("clip.mp3"), TimeRange::new(0.0, 10.0), &config).await?;
//! let result = query(&clip, &index, &query_config);
//! if let Some(track) = result.track(&corpus) {
//!     println!("{}", track.title());
//! }
//! # Ok(())
//! # }
//! ```

pub use aggregator::{aggregate, QueryResult};
pub use audio_processor::ProcessorError;
pub use command::FingerprintCommand;
pub use config::{Configuration, EncoderScheme, QueryConfiguration, Settings, SpectrumScale, WindowFunction, SCHEME_VERSION};
pub use corpus::{MemoryCorpus, Track, TrackId, TrackStore};
pub use decode::{AudioSource, PcmBuffer};
pub use encoder::SignatureEncoder;
pub use error::Error;
pub use fingerprinter::Fingerprinter;
pub use framer::{AudioWindow, Framer, TimeRange, Windows};
pub use index::{QueryIndex, ReferenceEntry};
pub use matcher::{match_signatures, MatchEvidence, MatchSegment, TrackEvidence};
pub use signature::{hamming_distance, Signature};
pub use spectrum::{SpectralFrame, SpectralTransformer};

mod aggregator;
mod audio_processor;
mod command;
mod config;
mod corpus;
mod decode;
mod encoder;
mod error;
mod fingerprinter;
mod framer;
mod index;
mod matcher;
mod signature;
mod spectrum;
mod utils;

/// Fingerprints `range` of `source` on the blocking thread pool.
pub async fn generate_fingerprints(
    source: AudioSource,
    range: TimeRange,
    config: &Configuration,
) -> Result<Vec<Signature>, Error> {
    FingerprintCommand::new(source, config.clone()).with_range(range).run().await
}

/// Identifies the track `signatures` were taken from.
pub fn query(signatures: &[Signature], index: &QueryIndex, config: &QueryConfiguration) -> QueryResult {
    aggregate(&match_signatures(signatures, index, config), config)
}
