//! Word tokenization and shingle generation.
//!
//! Words follow UAX #29 word boundaries and are lowercased; whitespace and
//! punctuation never become tokens. Offsets are character offsets into the
//! input, not byte offsets, so coverage resolution can walk the raw text one
//! character at a time.

use unicode_segmentation::UnicodeSegmentation;

/// One shingle instance: `n` consecutive tokens joined by a single space,
/// spanning from the first token's start to the last token's end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shingle {
    pub term: String,
    pub start: usize,
    pub end: usize,
}

/// Split content into lowercased word tokens as `(start, end, word)` triples.
pub fn tokenize_words(content: &str) -> Vec<(usize, usize, String)> {
    let mut tokens = Vec::new();
    let mut chars_seen = 0usize;
    let mut bytes_seen = 0usize;

    for (byte_start, word) in content.unicode_word_indices() {
        chars_seen += content[bytes_seen..byte_start].chars().count();
        let len = word.chars().count();
        tokens.push((chars_seen, chars_seen + len, word.to_lowercase()));
        chars_seen += len;
        bytes_seen = byte_start + word.len();
    }
    tokens
}

/// Build the ordered shingle stream of exactly `width` tokens per shingle.
/// Content with fewer than `width` tokens yields nothing; `width == 1`
/// yields the tokens themselves.
pub fn shingles(content: &str, width: usize) -> Vec<Shingle> {
    if width == 0 {
        return Vec::new();
    }
    let words = tokenize_words(content);
    words
        .windows(width)
        .map(|window| {
            let term = window
                .iter()
                .map(|(_, _, w)| w.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            Shingle {
                term,
                start: window[0].0,
                end: window[width - 1].1,
            }
        })
        .collect()
}
