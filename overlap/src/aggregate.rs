//! Inverts per-term results into one candidate per source.

use crate::document::Document;
use crate::fragment::CandidateSource;
use crate::provider::ProviderResult;
use std::collections::{BTreeMap, HashMap};

/// Every source reported for any term becomes a candidate holding all
/// positions of every term it matched. Output is ordered by source id.
pub fn aggregate(
    results: &HashMap<String, ProviderResult>,
    document: &Document,
) -> Vec<CandidateSource> {
    let mut by_source: BTreeMap<&str, CandidateSource> = BTreeMap::new();
    for (term, result) in results {
        let Some(positions) = document.locate(term) else {
            continue;
        };
        for source in result.sources() {
            by_source
                .entry(source)
                .or_insert_with(|| CandidateSource::new(source))
                .add_positions(positions.iter().copied());
        }
    }
    by_source.into_values().collect()
}
