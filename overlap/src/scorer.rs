//! Sequence scorer.
//!
//! For each candidate source, the matched positions become a signed timeline:
//! positive segments for runs of overlapping shingles, negative segments for
//! the gaps between them. Maximal-sum runs above the threshold are emitted as
//! [`Sequence`]s, and identical runs found through different sources are
//! merged into one.

use crate::document::Document;
use crate::fragment::{CandidateSource, MatchFragment, Sequence};
use crate::provider::ProviderResult;
use crate::weighting::Weighting;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// When off, candidate sources are reported as-is without sequence
    /// extraction.
    pub enabled: bool,
    /// Sequences scoring at or below this are dropped.
    pub min_score: f64,
    /// Sources matching fewer positions than this are not scored.
    pub min_source_positions: usize,
    pub weighting: Weighting,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_score: 1.0,
            min_source_positions: 1,
            weighting: Weighting::default(),
        }
    }
}

/// One timeline entry: an open run of matches, or a gap penalty with no
/// positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub score: f64,
    pub positions: Vec<usize>,
}

impl Segment {
    fn run(position: usize, weight: f64) -> Self {
        Self {
            score: weight,
            positions: vec![position],
        }
    }

    /// `missed` is the gap length, or the summed weight of the missed
    /// positions. The penalty magnitude is at least `width` before the
    /// `width - 1` correction, so a penalty is always negative.
    fn gap(missed: f64, width: usize) -> Self {
        let n = width as f64;
        Self {
            score: (-missed).min(-n) + (n - 1.0),
            positions: Vec::new(),
        }
    }

    pub fn is_gap(&self) -> bool {
        self.positions.is_empty()
    }
}

/// A maximal run extracted from one timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub score: f64,
    pub positions: BTreeSet<usize>,
}

/// Build the signed timeline for `positions`. Positions closer than `width`
/// overlap and extend the current run; every run is closed with `width - 1`.
pub fn build_timeline(
    positions: &BTreeSet<usize>,
    weights: &[f64],
    width: usize,
    gap_weighting: bool,
) -> Vec<Segment> {
    let n = width as f64;
    let weight = |p: usize| weights.get(p).copied().unwrap_or(0.0);
    let mut timeline = Vec::new();
    let mut current: Option<Segment> = None;
    let mut last = 0usize;

    for &position in positions {
        let Some(mut run) = current.take() else {
            current = Some(Segment::run(position, weight(position)));
            last = position;
            continue;
        };

        if position - last < width {
            run.score += weight(position);
            run.positions.push(position);
            current = Some(run);
        } else {
            run.score += n - 1.0;
            timeline.push(run);
            let missed = if gap_weighting {
                (last + 1..position).map(weight).sum()
            } else {
                (position - last) as f64
            };
            timeline.push(Segment::gap(missed, width));
            current = Some(Segment::run(position, weight(position)));
        }
        last = position;
    }

    if let Some(mut run) = current {
        run.score += n - 1.0;
        timeline.push(run);
    }
    timeline
}

/// Extract every maximal run scoring strictly above `min_score`.
///
/// A running sum grows a candidate run; positions seen since the last peak
/// join the run only when the sum reaches a new peak. When the sum drops to
/// zero or the timeline ends, the run is finalized and the scan resumes just
/// after the segment where it peaked, so a later, separate run is still found.
pub fn extract_runs(timeline: &[Segment], min_score: f64) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut start = 0;

    while start < timeline.len() {
        let mut running = 0.0;
        let mut best = 0.0;
        let mut peak: Option<usize> = None;
        let mut grown = BTreeSet::new();
        let mut pending: Vec<usize> = Vec::new();
        let mut idx = start;

        while idx < timeline.len() {
            let segment = &timeline[idx];
            running += segment.score;
            pending.extend_from_slice(&segment.positions);
            if running > best {
                best = running;
                grown.extend(pending.drain(..));
                peak = Some(idx);
            }
            if running <= 0.0 {
                break;
            }
            idx += 1;
        }

        match peak {
            Some(peak) => {
                if best > min_score {
                    runs.push(Run {
                        score: best,
                        positions: grown,
                    });
                }
                start = peak + 1;
            }
            None => start = idx + 1,
        }
    }
    runs
}

/// Scores candidate sources against one document's term weights.
pub struct Scorer {
    config: ScoringConfig,
    width: usize,
    weights: Vec<f64>,
}

impl Scorer {
    pub fn new(
        config: ScoringConfig,
        document: &Document,
        results: &HashMap<String, ProviderResult>,
        index_size: u64,
    ) -> Self {
        Self {
            weights: config
                .weighting
                .position_weights(document, results, index_size),
            width: document.width(),
            config,
        }
    }

    /// Scorer with explicit per-position weights.
    pub fn with_weights(config: ScoringConfig, width: usize, weights: Vec<f64>) -> Self {
        Self {
            config,
            width,
            weights,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Runs for one candidate, before consolidation.
    pub fn score_candidate(&self, candidate: &CandidateSource) -> Vec<Run> {
        if candidate.size() < self.config.min_source_positions {
            return Vec::new();
        }
        let timeline = build_timeline(
            candidate.positions(),
            &self.weights,
            self.width,
            self.config.weighting.gap_weighting,
        );
        extract_runs(&timeline, self.config.min_score)
    }

    /// Score every candidate and merge runs with identical positions. Output
    /// is ordered by position set.
    pub fn score(&self, candidates: &[CandidateSource]) -> Vec<Sequence> {
        let mut merged: BTreeMap<Vec<usize>, Sequence> = BTreeMap::new();
        for candidate in candidates {
            for run in self.score_candidate(candidate) {
                let mut sequence = Sequence::new(run.positions, run.score);
                sequence.add_source(candidate.id());
                match merged.entry(sequence.key()) {
                    Entry::Occupied(mut existing) => existing.get_mut().absorb(sequence),
                    Entry::Vacant(slot) => {
                        slot.insert(sequence);
                    }
                }
            }
        }
        log::debug!(
            "Scored {} candidates into {} sequences",
            candidates.len(),
            merged.len()
        );
        merged.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(min_score: f64) -> ScoringConfig {
        ScoringConfig {
            enabled: true,
            min_score,
            min_source_positions: 1,
            weighting: Weighting::flat(),
        }
    }

    fn candidate(id: &str, positions: &[usize]) -> CandidateSource {
        let mut c = CandidateSource::new(id);
        c.add_positions(positions.iter().copied());
        c
    }

    fn scorer(min_score: f64, len: usize) -> Scorer {
        Scorer::with_weights(flat(min_score), 3, vec![1.0; len])
    }

    // ── timeline ─────────────────────────────────────────────────

    #[test]
    fn test_contiguous_run_closes_with_width_correction() {
        let timeline = build_timeline(&BTreeSet::from([0, 1, 2]), &[1.0; 3], 3, false);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].score, 5.0);
        assert_eq!(timeline[0].positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_gap_inside_width_still_extends() {
        // gap of 2 < n=3 keeps the run open
        let timeline = build_timeline(&BTreeSet::from([0, 2]), &[1.0; 3], 3, false);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].score, 4.0);
    }

    #[test]
    fn test_flat_gap_penalty() {
        let timeline = build_timeline(&BTreeSet::from([0, 5]), &[1.0; 6], 3, false);
        let scores: Vec<f64> = timeline.iter().map(|s| s.score).collect();
        // min(-5, -3) + 2: magnitude clamped to at least n before the n-1
        // correction, so a gap segment is never positive
        assert_eq!(scores, vec![3.0, -3.0, 3.0]);
        assert!(timeline[1].is_gap());
    }

    #[test]
    fn test_short_gap_is_clamped_to_width() {
        // gap of exactly n: min(-3, -3) + 2 = -1
        let timeline = build_timeline(&BTreeSet::from([0, 3]), &[1.0; 4], 3, false);
        assert_eq!(timeline[1].score, -1.0);
    }

    #[test]
    fn test_weighted_gap_penalty() {
        let weights = vec![1.0, 2.0, 2.0, 2.0, 2.0, 1.0];
        let timeline = build_timeline(&BTreeSet::from([0, 5]), &weights, 3, true);
        // missed 1..5 sum to 8 → min(-8, -3) + 2
        assert_eq!(timeline[1].score, -6.0);

        let light = vec![1.0, 0.1, 0.1, 0.1, 0.1, 1.0];
        let timeline = build_timeline(&BTreeSet::from([0, 5]), &light, 3, true);
        assert_eq!(timeline[1].score, -1.0);
    }

    #[test]
    fn test_gap_penalty_never_positive() {
        for width in 1..6 {
            for missed in [0.0, 0.5, 1.0, 3.0, 20.0] {
                assert!(Segment::gap(missed, width).score < 0.0);
            }
        }
    }

    // ── extraction ───────────────────────────────────────────────

    #[test]
    fn test_single_run_score() {
        let sequences = scorer(0.0, 3).score(&[candidate("s", &[0, 1, 2])]);
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].score(), 5.0);
        assert_eq!(sequences[0].positions(), &BTreeSet::from([0, 1, 2]));
    }

    #[test]
    fn test_separated_matches_make_two_runs() {
        let sequences = scorer(0.0, 6).score(&[candidate("s", &[0, 5])]);
        assert_eq!(sequences.len(), 2);
        assert!(sequences.iter().all(|s| s.score() == 3.0));
        assert_eq!(sequences[0].positions(), &BTreeSet::from([0]));
        assert_eq!(sequences[1].positions(), &BTreeSet::from([5]));
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(scorer(3.0, 6).score(&[candidate("s", &[0, 5])]).is_empty());
        assert_eq!(scorer(2.99, 6).score(&[candidate("s", &[0, 5])]).len(), 2);
    }

    #[test]
    fn test_runs_bridge_small_gap() {
        // [5, -1, 5] peaks at 9 across the gap
        let sequences = scorer(0.0, 8).score(&[candidate("s", &[0, 1, 2, 5, 6, 7])]);
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].score(), 9.0);
        assert_eq!(sequences[0].positions().len(), 6);
    }

    #[test]
    fn test_dip_positions_join_only_on_new_peak() {
        let timeline = vec![
            Segment { score: 4.0, positions: vec![0] },
            Segment { score: -3.0, positions: vec![] },
            Segment { score: 1.0, positions: vec![9] },
        ];
        let runs = extract_runs(&timeline, 0.0);
        // running sums 4, 1, 2: position 9 never lifts the sum past the peak
        assert_eq!(runs[0].score, 4.0);
        assert_eq!(runs[0].positions, BTreeSet::from([0]));
        // scan resumes after the peak and finds the tail on its own
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].positions, BTreeSet::from([9]));
    }

    #[test]
    fn test_min_source_positions() {
        let config = ScoringConfig {
            min_source_positions: 4,
            ..flat(0.0)
        };
        let scorer = Scorer::with_weights(config, 3, vec![1.0; 3]);
        assert!(scorer.score(&[candidate("s", &[0, 1, 2])]).is_empty());
    }

    // ── consolidation ────────────────────────────────────────────

    #[test]
    fn test_identical_runs_merge_sources() {
        let sequences = scorer(0.0, 3).score(&[
            candidate("http://a.example", &[0, 1, 2]),
            candidate("http://b.example", &[0, 1, 2]),
        ]);
        assert_eq!(sequences.len(), 1);
        assert_eq!(
            sequences[0].sources(),
            &BTreeSet::from(["http://a.example".to_string(), "http://b.example".to_string()])
        );
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let candidates = vec![
            candidate("x", &[0, 1, 2, 8, 9, 20]),
            candidate("y", &[3, 4, 5, 6, 15]),
        ];
        let s = scorer(0.5, 21);
        let first: Vec<(Vec<usize>, f64)> =
            s.score(&candidates).iter().map(|q| (q.key(), q.score())).collect();
        let second: Vec<(Vec<usize>, f64)> =
            s.score(&candidates).iter().map(|q| (q.key(), q.score())).collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_rarity_weights_from_results() {
        let doc = Document::index("alpha beta gamma delta", 1).unwrap();
        let mut results = HashMap::new();
        let mut hit = ProviderResult::new();
        hit.put("s", "");
        hit.set_total(10);
        results.insert("alpha".to_string(), hit);
        let config = ScoringConfig {
            min_score: 0.0,
            ..ScoringConfig::default()
        };
        let scorer = Scorer::new(config, &doc, &results, 1000);
        let runs = scorer.score_candidate(&candidate("s", &[0]));
        // ln(100)/ln(1000) with n=1 adds no correction
        assert!((runs[0].score - 2.0 / 3.0).abs() < 1e-9);
    }
}
