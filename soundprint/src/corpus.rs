use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::signature::Signature;

/// Identifier of a reference track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl Display for TrackId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        TrackId(id)
    }
}

/// Metadata of a reference track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    id: TrackId,
    title: String,
    artist: Option<String>,
    /// Seconds.
    duration: Option<f64>,
}

impl Track {
    pub fn new(id: TrackId, title: impl Into<String>) -> Self {
        Self { id, title: title.into(), artist: None, duration: None }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }
}

/// Lookup of track metadata by id.
pub trait TrackStore {
    fn track(&self, id: TrackId) -> Option<&Track>;
}

/// Tracks and their signatures held in memory.
#[derive(Debug, Default)]
pub struct MemoryCorpus {
    tracks: BTreeMap<TrackId, (Track, Vec<Signature>)>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a track, replacing any previous track with the same id.
    pub fn insert(&mut self, track: Track, signatures: Vec<Signature>) -> Option<Track> {
        self.tracks.insert(track.id(), (track, signatures)).map(|(previous, _)| previous)
    }

    /// An id not used by any track yet.
    pub fn next_id(&self) -> TrackId {
        self.tracks.keys().next_back().map_or(TrackId(0), |id| TrackId(id.0 + 1))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values().map(|(track, _)| track)
    }

    pub fn signatures_of(&self, id: TrackId) -> Option<&[Signature]> {
        self.tracks.get(&id).map(|(_, signatures)| signatures.as_slice())
    }

    /// Signatures of every track, ordered by id. Suitable for [QueryIndex::build](crate::QueryIndex::build).
    pub fn signatures(&self) -> impl Iterator<Item = (TrackId, &[Signature])> {
        self.tracks.iter().map(|(&id, (_, signatures))| (id, signatures.as_slice()))
    }
}

impl TrackStore for MemoryCorpus {
    fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id).map(|(track, _)| track)
    }
}

#[cfg(test)]
mod tests {
    use crate::corpus::{MemoryCorpus, Track, TrackId, TrackStore};
    use crate::signature::Signature;

    #[test]
    fn insert_and_lookup() {
        let mut corpus = MemoryCorpus::new();
        assert_eq!(TrackId(0), corpus.next_id());

        let id = corpus.next_id();
        corpus.insert(Track::new(id, "Intro").with_artist("Nobody"), vec![Signature::from_bits([true; 8], 0)]);
        assert_eq!(TrackId(1), corpus.next_id());
        assert_eq!(1, corpus.len());

        let track = corpus.track(id).unwrap();
        assert_eq!("Intro", track.title());
        assert_eq!(Some("Nobody"), track.artist());
        assert_eq!(1, corpus.signatures_of(id).unwrap().len());
        assert!(corpus.track(TrackId(7)).is_none());
    }

    #[test]
    fn replacing_returns_the_previous_track() {
        let mut corpus = MemoryCorpus::new();
        corpus.insert(Track::new(TrackId(5), "a"), Vec::new());
        let previous = corpus.insert(Track::new(TrackId(5), "b"), Vec::new());
        assert_eq!("a", previous.unwrap().title());
        assert_eq!(1, corpus.len());
        assert_eq!(TrackId(6), corpus.next_id());
    }

    #[test]
    fn signatures_are_ordered_by_id() {
        let mut corpus = MemoryCorpus::new();
        for id in [3, 1, 2] {
            corpus.insert(Track::new(TrackId(id), id.to_string()), Vec::new());
        }
        let ids = corpus.signatures().map(|(id, _)| id.0).collect::<Vec<_>>();
        assert_eq!(vec![1, 2, 3], ids);
    }

    #[test]
    fn id_serializes_as_a_number() {
        assert_eq!("42", serde_json::to_string(&TrackId(42)).unwrap());
    }
}
