//! Per-term weights.
//!
//! A term matched by few documents in the provider's index is stronger
//! evidence of copying than a common phrase. With rarity weighting on, each
//! term's weight is derived from its reported hit count against the index
//! size; otherwise every term weighs the same. `factor` scales either way.

use crate::document::Document;
use crate::provider::ProviderResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMethod {
    /// `ln(N / t) / ln(N)`
    #[default]
    Idf,
    /// `log10(N) / 2` when `t == 1`, else `(log_t(N) - 1) / 4`
    Log,
    /// `(1 - t / N) ^ ln(N)`
    Pow,
    /// `1 - t / N`
    Linear,
}

impl WeightMethod {
    /// Raw rarity value for a term reported in `total` of `index_size` documents.
    pub fn rarity(self, total: u64, index_size: u64) -> f64 {
        let t = total as f64;
        let n = index_size as f64;
        match self {
            Self::Idf => (n / t).ln() / n.ln(),
            Self::Log => {
                if total == 1 {
                    n.log10() / 2.0
                } else {
                    (n.ln() / t.ln() - 1.0) / 4.0
                }
            }
            Self::Pow => (1.0 - t / n).powf(n.ln()),
            Self::Linear => 1.0 - t / n,
        }
    }
}

impl fmt::Display for WeightMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idf => "idf",
            Self::Log => "log",
            Self::Pow => "pow",
            Self::Linear => "linear",
        };
        f.write_str(name)
    }
}

impl FromStr for WeightMethod {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to linear.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "idf" => Self::Idf,
            "log" => Self::Log,
            "pow" => Self::Pow,
            _ => Self::Linear,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weighting {
    pub rarity: bool,
    pub method: WeightMethod,
    pub factor: f64,
    /// Penalize gaps by the summed weight of the missed positions instead of
    /// their count.
    pub gap_weighting: bool,
}

impl Default for Weighting {
    fn default() -> Self {
        Self {
            rarity: true,
            method: WeightMethod::Idf,
            factor: 1.0,
            gap_weighting: false,
        }
    }
}

impl Weighting {
    /// Every term weighs 1.
    pub fn flat() -> Self {
        Self {
            rarity: false,
            factor: 1.0,
            gap_weighting: false,
            ..Self::default()
        }
    }

    /// Weight of a term with `total` reported hits, or `None` when the term
    /// had no result. Non-finite rarity values fall back to 1.
    pub fn weight(&self, total: Option<u64>, index_size: u64) -> f64 {
        let base = match total {
            Some(total) if self.rarity => self.method.rarity(total, index_size),
            _ => 1.0,
        };
        let base = if base.is_finite() { base } else { 1.0 };
        base * self.factor
    }

    /// Weight of every position of `document`, indexed by position.
    pub fn position_weights(
        &self,
        document: &Document,
        results: &HashMap<String, ProviderResult>,
        index_size: u64,
    ) -> Vec<f64> {
        let mut by_term: HashMap<&str, f64> = HashMap::new();
        document
            .shingles()
            .iter()
            .map(|shingle| {
                *by_term.entry(shingle.term.as_str()).or_insert_with(|| {
                    let total = results.get(&shingle.term).map(ProviderResult::total_results);
                    self.weight(total, index_size)
                })
            })
            .collect()
    }
}
