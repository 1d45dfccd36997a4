use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::info;

use crate::config::QueryConfiguration;
use crate::corpus::TrackId;
use crate::error::Error;
use crate::signature::{extract_bits, hamming_distance, Signature};

/// A reference signature returned by [QueryIndex::lookup].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceEntry<'a> {
    entry: u32,
    track_id: TrackId,
    position: u32,
    words: &'a [u64],
}

impl<'a> ReferenceEntry<'a> {
    /// Insertion order of the signature within the index.
    pub fn id(&self) -> usize {
        self.entry as usize
    }

    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    /// Sequence index of the stored signature, see [Signature::index].
    pub fn position(&self) -> usize {
        self.position as usize
    }

    /// Packed bits of the stored signature.
    pub fn words(&self) -> &'a [u64] {
        self.words
    }

    pub fn hamming_distance(&self, signature: &Signature) -> u32 {
        hamming_distance(self.words, signature.words())
    }
}

/// Sub-band locality-sensitive hash index over the signatures of a corpus.
///
/// Every signature is split into `sub_bands` equally wide groups of bits and
/// each group is a key in its own hash table. Two signatures that differ in
/// fewer bits than there are sub-bands always share at least one key.
///
/// The index is immutable once built. Share it by reference or in an `Arc`.
#[derive(Debug)]
pub struct QueryIndex {
    hash_bits: usize,
    sub_bands: usize,
    words_per_signature: usize,
    tracks: usize,
    words: Vec<u64>,
    entries: Vec<(TrackId, u32)>,
    buckets: Box<[HashMap<u64, Vec<u32>>]>,
}

impl QueryIndex {
    /// Indexes every signature of `corpus`.
    ///
    /// Fails when the signatures of the corpus are not all equally wide or
    /// cannot be split into the configured number of sub-bands.
    pub fn build<'a, I>(corpus: I, config: &QueryConfiguration) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (TrackId, &'a [Signature])>,
    {
        config.validate()?;
        let sub_bands = config.sub_bands();

        let mut index = Self {
            hash_bits: 0,
            sub_bands,
            words_per_signature: 0,
            tracks: 0,
            words: Vec::new(),
            entries: Vec::new(),
            buckets: (0..sub_bands).map(|_| HashMap::new()).collect(),
        };

        for (track_id, signatures) in corpus {
            index.tracks += 1;
            for signature in signatures {
                let position = signature.index();
                if index.entries.is_empty() {
                    config.validate_for(signature.len())?;
                    index.hash_bits = signature.len();
                    index.words_per_signature = signature.words().len();
                } else if signature.len() != index.hash_bits {
                    return Err(Error::InconsistentSignature {
                        track_id,
                        position,
                        expected: index.hash_bits,
                        actual: signature.len(),
                    });
                }
                index.push(track_id, position, signature)?;
            }
        }

        info!(
            tracks = index.tracks,
            signatures = index.entries.len(),
            sub_bands,
            hash_bits = index.hash_bits,
            "built query index"
        );
        Ok(index)
    }

    fn push(&mut self, track_id: TrackId, position: usize, signature: &Signature) -> Result<(), Error> {
        let (Ok(entry), Ok(position)) = (u32::try_from(self.entries.len()), u32::try_from(position)) else {
            return Err(Error::invalid("too many signatures for a single index"));
        };

        let width = self.band_width();
        for (band, bucket) in self.buckets.iter_mut().enumerate() {
            let key = extract_bits(signature.words(), band * width, width);
            bucket.entry(key).or_default().push(entry);
        }
        self.words.extend_from_slice(signature.words());
        self.entries.push((track_id, position));
        Ok(())
    }

    /// Width of a sub-band in bits.
    pub fn band_width(&self) -> usize {
        self.hash_bits / self.sub_bands
    }

    /// Width of the indexed signatures, 0 for an empty index.
    pub fn hash_bits(&self) -> usize {
        self.hash_bits
    }

    pub fn sub_bands(&self) -> usize {
        self.sub_bands
    }

    /// Number of indexed signatures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tracks the index was built from.
    pub fn track_count(&self) -> usize {
        self.tracks
    }

    /// All reference signatures sharing at least one sub-band with `signature`,
    /// ordered by insertion.
    ///
    /// A signature of a different width than the indexed ones matches nothing.
    pub fn lookup(&self, signature: &Signature) -> Vec<ReferenceEntry<'_>> {
        if self.is_empty() || signature.len() != self.hash_bits {
            return Vec::new();
        }

        let width = self.band_width();
        let mut ids = Vec::new();
        for (band, bucket) in self.buckets.iter().enumerate() {
            let key = extract_bits(signature.words(), band * width, width);
            if let Some(entries) = bucket.get(&key) {
                ids.extend_from_slice(entries);
            }
        }
        ids.sort_unstable();
        ids.dedup();

        ids.into_iter().map(|id| self.entry(id)).collect()
    }

    fn entry(&self, id: u32) -> ReferenceEntry<'_> {
        let (track_id, position) = self.entries[id as usize];
        let start = id as usize * self.words_per_signature;
        ReferenceEntry {
            entry: id,
            track_id,
            position,
            words: &self.words[start..start + self.words_per_signature],
        }
    }

    /// Content of every bucket, keyed by sub-band value, as `(track, position)` pairs.
    ///
    /// Two indexes built from the same corpus return equal bucket sets.
    pub fn bucket_sets(&self) -> Vec<BTreeMap<u64, BTreeSet<(TrackId, u32)>>> {
        self.buckets
            .iter()
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|(&key, ids)| (key, ids.iter().map(|&id| self.entries[id as usize]).collect()))
                    .collect()
            })
            .collect()
    }
}
