//! Disjoint character coverage.
//!
//! Each character of the document is owned by at most one fragment: the
//! highest-ranked fragment whose positions span it. Ownership backs the
//! overall similarity figure and the set of fragments still visible once
//! overlaps are resolved.

use crate::document::{round_ratio, Document};
use crate::fragment::{MatchFragment, Sequence};
use std::collections::BTreeSet;

/// Per-character owner, as an index into the fragment slice it was resolved
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    claims: Vec<Option<usize>>,
}

/// Claim every character of every fragment's position spans. A fragment takes
/// a character only from a strictly lower-ranked owner, so among equal ranks
/// the earlier fragment keeps it.
pub fn resolve_by_character<F: MatchFragment>(fragments: &[F], document: &Document) -> Coverage {
    let len = document.char_len();
    let mut claims: Vec<Option<usize>> = vec![None; len];
    let ranks: Vec<_> = fragments.iter().map(|f| f.rank()).collect();

    for (idx, fragment) in fragments.iter().enumerate() {
        for &position in fragment.positions() {
            let Some((start, end)) = document.span(position) else {
                continue;
            };
            for slot in &mut claims[start.min(len)..end.min(len)] {
                let take = match *slot {
                    None => true,
                    Some(owner) => ranks[idx] > ranks[owner],
                };
                if take {
                    *slot = Some(idx);
                }
            }
        }
    }
    Coverage { claims }
}

impl Coverage {
    pub fn owner_at(&self, char_index: usize) -> Option<usize> {
        self.claims.get(char_index).copied().flatten()
    }

    pub fn claims(&self) -> &[Option<usize>] {
        &self.claims
    }

    pub fn claimed_chars(&self) -> usize {
        self.claims.iter().filter(|c| c.is_some()).count()
    }

    /// Indices of fragments that own at least one character.
    pub fn visible(&self) -> BTreeSet<usize> {
        self.claims.iter().flatten().copied().collect()
    }

    /// Claimed characters of the raw text, with `...` standing in for each
    /// unclaimed stretch between them.
    pub fn overlap_as_text(&self, document: &Document) -> String {
        let mut out = String::new();
        let mut in_gap = false;
        let mut started = false;
        for (ch, claim) in document.text().chars().zip(&self.claims) {
            if claim.is_some() {
                if in_gap && started {
                    out.push_str("...");
                }
                out.push(ch);
                in_gap = false;
                started = true;
            } else {
                in_gap = true;
            }
        }
        out
    }
}

/// Fraction of document positions covered by any fragment, rounded half-up to
/// three decimals.
pub fn similarity<F: MatchFragment>(fragments: &[F], document: &Document) -> f64 {
    let covered: BTreeSet<usize> = fragments
        .iter()
        .flat_map(|f| f.positions().iter().copied())
        .filter(|&p| p < document.len())
        .collect();
    round_ratio(covered.len(), document.len())
}

/// Sources behind the sequences that survive coverage resolution.
pub fn sources_of_visible(sequences: &[Sequence], coverage: &Coverage) -> BTreeSet<String> {
    coverage
        .visible()
        .into_iter()
        .filter_map(|idx| sequences.get(idx))
        .flat_map(|s| s.sources().iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::CandidateSource;

    fn sequence(positions: &[usize], score: f64, source: &str) -> Sequence {
        let mut s = Sequence::new(positions.iter().copied().collect(), score);
        s.add_source(source);
        s
    }

    // "alpha beta gamma delta epsilon" with n=2
    // positions: 0 "alpha beta" [0,10), 1 "beta gamma" [6,16),
    //            2 "gamma delta" [11,22), 3 "delta epsilon" [17,30)
    fn doc() -> Document {
        Document::index("alpha beta gamma delta epsilon", 2).unwrap()
    }

    #[test]
    fn test_higher_score_wins_shared_chars() {
        let doc = doc();
        let fragments = vec![sequence(&[0, 1], 2.0, "low"), sequence(&[1, 2], 6.0, "high")];
        let coverage = resolve_by_character(&fragments, &doc);
        // "beta" belongs to both spans
        assert_eq!(coverage.owner_at(7), Some(1));
        assert_eq!(coverage.owner_at(0), Some(0));
        assert_eq!(coverage.visible(), BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_higher_rank_wins_regardless_of_order() {
        let doc = doc();
        let fragments = vec![sequence(&[1, 2], 6.0, "high"), sequence(&[0, 1], 2.0, "low")];
        let coverage = resolve_by_character(&fragments, &doc);
        assert_eq!(coverage.owner_at(7), Some(0));
    }

    #[test]
    fn test_tie_goes_to_larger_size() {
        let doc = doc();
        let fragments = vec![sequence(&[1], 3.0, "small"), sequence(&[0, 1, 2], 3.0, "big")];
        let coverage = resolve_by_character(&fragments, &doc);
        assert_eq!(coverage.owner_at(8), Some(1));
        // the small fragment is fully shadowed
        assert_eq!(coverage.visible(), BTreeSet::from([1]));
        assert_eq!(
            sources_of_visible(&fragments, &coverage),
            BTreeSet::from(["big".to_string()])
        );
    }

    #[test]
    fn test_candidates_rank_by_size() {
        let doc = doc();
        let mut a = CandidateSource::new("a");
        a.add_positions([1]);
        let mut b = CandidateSource::new("b");
        b.add_positions([0, 1]);
        let coverage = resolve_by_character(&[a, b], &doc);
        assert_eq!(coverage.owner_at(7), Some(1));
    }

    #[test]
    fn test_overlap_as_text_marks_gaps() {
        let doc = doc();
        let fragments = vec![sequence(&[0], 1.0, "a"), sequence(&[3], 1.0, "b")];
        let coverage = resolve_by_character(&fragments, &doc);
        assert_eq!(coverage.overlap_as_text(&doc), "alpha beta...delta epsilon");
    }

    #[test]
    fn test_similarity_bounds() {
        let doc = doc();
        assert_eq!(similarity::<Sequence>(&[], &doc), 0.0);
        let all = vec![sequence(&[0, 1, 2, 3], 9.0, "x")];
        assert_eq!(similarity(&all, &doc), 1.0);
        let half = vec![sequence(&[0], 1.0, "x"), sequence(&[0, 3], 1.0, "y")];
        assert_eq!(similarity(&half, &doc), 0.5);
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::index("short", 3).unwrap();
        let coverage = resolve_by_character(&[sequence(&[0], 1.0, "x")], &doc);
        assert_eq!(coverage.claimed_chars(), 0);
        assert!(coverage.visible().is_empty());
    }
}
