//! Quotation and reference-section stripping.
//!
//! Runs before shingling so that text the author already attributes does not
//! produce matches. Every removed span is overwritten with `.` filler of the
//! same character length; dots never tokenize, and offsets into the stripped
//! text stay valid offsets into the raw text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// A trailing references section: a line holding only a heading, and
/// everything after it.
static REFERENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)[^\S ]\s*(?:bibliography|citations|references|works cited)\s*[^\S ].*")
        .expect("references pattern is valid")
});

/// A quotation (ASCII or Unicode quote marks) or a bracketed span.
static QUOTED_OR_BRACKETED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"["\u{201C}\u{201F}\u{301D}\u{301F}\u{FF02}]"#,
        r#"[^"\u{201D}\u{201E}\u{301E}\u{301F}\u{FF02}]+"#,
        r#"["\u{201D}\u{201E}\u{301E}\u{301F}\u{FF02}]"#,
        r"|\p{Ps}[^\p{Pe}]+\p{Pe}",
    ))
    .expect("quotation pattern is valid")
});

fn filler(caps: &Captures) -> String {
    ".".repeat(caps[0].chars().count())
}

/// Replace quoted spans, bracketed spans and a trailing references section
/// with equal-length filler.
pub fn strip_citations(text: &str) -> String {
    let without_references = REFERENCES.replace(text, filler);
    QUOTED_OR_BRACKETED
        .replace_all(&without_references, filler)
        .into_owned()
}
