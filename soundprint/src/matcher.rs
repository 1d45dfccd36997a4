use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::trace;

use crate::config::{Configuration, QueryConfiguration};
use crate::corpus::TrackId;
use crate::index::QueryIndex;
use crate::signature::Signature;

/// Part of the query that lines up with a reference track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchSegment {
    /// [Index](Signature::index) of the first aligned signature of the query.
    pub query_offset: usize,

    /// [Index](Signature::index) of the corresponding signature in the reference track.
    pub reference_offset: usize,

    /// Number of signatures from the first to the last aligned one.
    pub items_count: usize,
}

impl MatchSegment {
    /// Start of the segment in the query, relative to the start of the fingerprinted range.
    pub fn query_start(&self, config: &Configuration) -> f32 {
        config.item_duration_in_seconds() * self.query_offset as f32
    }

    pub fn query_end(&self, config: &Configuration) -> f32 {
        self.query_start(config) + self.duration(config)
    }

    /// Start of the segment in the reference track.
    pub fn reference_start(&self, config: &Configuration) -> f32 {
        config.item_duration_in_seconds() * self.reference_offset as f32
    }

    pub fn reference_end(&self, config: &Configuration) -> f32 {
        self.reference_start(config) + self.duration(config)
    }

    /// Duration of the segment (in seconds).
    pub fn duration(&self, config: &Configuration) -> f32 {
        config.item_duration_in_seconds() * self.items_count as f32
    }
}

/// Votes collected for a single reference track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEvidence {
    pub track_id: TrackId,

    /// Number of query signatures with at least one close enough reference signature.
    pub votes: usize,

    /// Number of voting query signatures consistent with the dominant offset.
    pub aligned_votes: usize,

    /// Most common difference between query and reference signature indices.
    /// Negative when the query starts later than the reference.
    pub offset: i64,

    /// Mean over voting query signatures of the distance to their closest reference signature.
    pub average_distance: f64,

    pub segment: MatchSegment,
}

impl TrackEvidence {
    /// Share of votes agreeing on the dominant offset.
    pub fn alignment_ratio(&self) -> f64 {
        if self.votes == 0 {
            return 0.0;
        }
        self.aligned_votes as f64 / self.votes as f64
    }
}

/// Evidence for every track that received at least one vote, ordered by track id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchEvidence {
    query_len: usize,
    tracks: Vec<TrackEvidence>,
}

impl MatchEvidence {
    /// Evidence of a query of `query_len` signatures, for tracks scored elsewhere.
    pub fn from_tracks(query_len: usize, mut tracks: Vec<TrackEvidence>) -> Self {
        tracks.sort_by_key(|evidence| evidence.track_id);
        Self { query_len, tracks }
    }

    /// Number of signatures in the query.
    pub fn query_len(&self) -> usize {
        self.query_len
    }

    pub fn tracks(&self) -> &[TrackEvidence] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&TrackEvidence> {
        self.tracks
            .binary_search_by_key(&id, |evidence| evidence.track_id)
            .ok()
            .map(|i| &self.tracks[i])
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[derive(Default)]
struct Tally {
    votes: usize,
    distance_sum: u64,
    histogram: BTreeMap<i64, usize>,
    hits: Vec<(usize, Vec<i64>)>,
}

/// Collects votes of `query` against `index`.
///
/// Candidates are looked up in parallel; votes are accumulated in query order.
/// Alignment offsets use [Signature::index] on both sides, so sequences with
/// dropped signatures keep their offsets.
pub fn match_signatures(query: &[Signature], index: &QueryIndex, config: &QueryConfiguration) -> MatchEvidence {
    if query.is_empty() || index.is_empty() {
        return MatchEvidence { query_len: query.len(), tracks: Vec::new() };
    }

    let threshold = config.hamming_threshold();
    let hits = query
        .par_iter()
        .map(|signature| {
            index
                .lookup(signature)
                .into_iter()
                .filter_map(|entry| {
                    let distance = entry.hamming_distance(signature);
                    (distance <= threshold).then(|| (entry.track_id(), entry.position(), distance))
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut tallies: BTreeMap<TrackId, Tally> = BTreeMap::new();
    for (signature, candidates) in query.iter().zip(&hits) {
        let query_index = signature.index();
        let mut per_track: BTreeMap<TrackId, (u32, BTreeSet<i64>)> = BTreeMap::new();
        for &(track_id, position, distance) in candidates {
            let (min_distance, offsets) = per_track.entry(track_id).or_insert((u32::MAX, BTreeSet::new()));
            *min_distance = (*min_distance).min(distance);
            offsets.insert(query_index as i64 - position as i64);
        }

        for (track_id, (min_distance, offsets)) in per_track {
            let tally = tallies.entry(track_id).or_default();
            tally.votes += 1;
            tally.distance_sum += u64::from(min_distance);
            for &offset in &offsets {
                *tally.histogram.entry(offset).or_default() += 1;
            }
            tally.hits.push((query_index, offsets.into_iter().collect()));
        }
    }

    let tolerance = i64::from(config.offset_tolerance());
    let tracks = tallies
        .into_iter()
        .map(|(track_id, tally)| evidence(track_id, tally, tolerance))
        .collect::<Vec<_>>();

    trace!(query = query.len(), tracks = tracks.len(), "collected votes");
    MatchEvidence { query_len: query.len(), tracks }
}

fn evidence(track_id: TrackId, tally: Tally, tolerance: i64) -> TrackEvidence {
    // Ascending iteration keeps the smallest offset on ties.
    let mut offset = 0;
    let mut best = 0;
    for (&candidate, &count) in &tally.histogram {
        if count > best {
            best = count;
            offset = candidate;
        }
    }

    let mut aligned_votes = 0;
    let mut first = usize::MAX;
    let mut last = 0;
    for (query_index, offsets) in &tally.hits {
        if offsets.iter().any(|o| (o - offset).abs() <= tolerance) {
            aligned_votes += 1;
            first = first.min(*query_index);
            last = last.max(*query_index);
        }
    }

    let segment = if aligned_votes > 0 {
        MatchSegment {
            query_offset: first,
            reference_offset: (first as i64 - offset).max(0) as usize,
            items_count: last - first + 1,
        }
    } else {
        MatchSegment { query_offset: 0, reference_offset: 0, items_count: 0 }
    };

    TrackEvidence {
        track_id,
        votes: tally.votes,
        aligned_votes,
        offset,
        average_distance: tally.distance_sum as f64 / tally.votes as f64,
        segment,
    }
}
