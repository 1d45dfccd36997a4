use std::cmp::Ordering;

use serde::Serialize;

use crate::config::QueryConfiguration;
use crate::corpus::{Track, TrackStore};
use crate::matcher::{MatchEvidence, TrackEvidence};

/// Outcome of a single query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// `true` iff some track passed the vote and alignment thresholds.
    pub successful: bool,

    /// The winning track, if any.
    pub best_match: Option<TrackEvidence>,

    /// Number of tracks that passed the thresholds.
    pub candidates: usize,
}

impl QueryResult {
    pub fn no_match() -> Self {
        Self { successful: false, best_match: None, candidates: 0 }
    }

    /// Metadata of the winning track.
    pub fn track<'s, S: TrackStore>(&self, store: &'s S) -> Option<&'s Track> {
        self.best_match.as_ref().and_then(|best| store.track(best.track_id))
    }
}

/// Picks the strongest track out of `evidence`.
///
/// Tracks with fewer than `min_votes` votes or whose votes are too scattered
/// in time are dropped. Among the rest the most votes win, then the lowest
/// average distance, then the lowest track id.
pub fn aggregate(evidence: &MatchEvidence, config: &QueryConfiguration) -> QueryResult {
    let qualifying = evidence
        .tracks()
        .iter()
        .filter(|track| track.votes >= config.min_votes() && track.alignment_ratio() >= config.min_alignment_ratio())
        .collect::<Vec<_>>();

    let best = qualifying.iter().copied().min_by(|a, b| rank(a, b));
    match best {
        Some(best) => QueryResult { successful: true, best_match: Some(best.clone()), candidates: qualifying.len() },
        None => QueryResult::no_match(),
    }
}

fn rank(a: &TrackEvidence, b: &TrackEvidence) -> Ordering {
    b.votes
        .cmp(&a.votes)
        .then_with(|| a.average_distance.total_cmp(&b.average_distance))
        .then_with(|| a.track_id.cmp(&b.track_id))
}
