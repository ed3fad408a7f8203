//! Best-effort extraction of certificate fields from OCR lines.
//!
//! Every function here is total: no match yields `None` or an empty vector.
//! The heuristics are intentionally loose (a bare uppercase run can be any
//! token on the page); callers treat the results as suggestions.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::analysis::ExtractedFields;

/// Code patterns, tried in this order for every line. A token is the longest
/// run of uppercase letters, digits and hyphens; see [`is_word_head`] for the
/// one case that is rejected.
static CODE_PATTERNS: LazyLock<[(Regex, usize); 3]> = LazyLock::new(|| {
    [
        // "Cert #AB-12", "Certificate: X9"
        (
            Regex::new(r"(?i:\bcert(?:ificate)?)\s*[#:]?\s*([A-Z0-9][A-Z0-9-]*)").unwrap(),
            1,
        ),
        // "No: ABC123", "Number. 42-A", "ID X77"
        (
            Regex::new(r"(?i:\b(?:no|number|id))[:.\s]\s*([A-Z0-9][A-Z0-9-]*)").unwrap(),
            1,
        ),
        // bare "XJ92716"
        (Regex::new(r"[A-Z][A-Z0-9]{5,}").unwrap(), 6),
    ]
});

/// Labeled issuer lines. The value starts at the first character that is
/// neither whitespace nor a separator.
static ISSUER_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\bissued\s+by\s*[:.]?\s*([^\s:.].*)").unwrap(),
        Regex::new(r"(?i)\bprovider\s*[:.]?\s*([^\s:.].*)").unwrap(),
        Regex::new(r"(?i)\bcertif(?:ying|ication)\s+authority\s*[:.]?\s*([^\s:.].*)").unwrap(),
        Regex::new(r"(?i)\borgani[sz]ation\s*[:.]?\s*([^\s:.].*)").unwrap(),
    ]
});

/// A label with nothing after it, e.g. `Provider:`.
static BARE_ISSUER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:issued\s+by|provider|certif(?:ying|ication)\s+authority|organi[sz]ation)\s*[:.]?$",
    )
    .unwrap()
});

static DATE_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // 05/01/2024, 5-1-24
        Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-](?:\d{4}|\d{2})\b").unwrap(),
        // January 5th, 2024
        Regex::new(
            r"(?i)\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b",
        )
        .unwrap(),
        // 2024-01-05, 2024/1/5
        Regex::new(r"\b\d{4}[/-]\d{1,2}[/-]\d{1,2}\b").unwrap(),
    ]
});

/// Words that disqualify a line from the unlabeled issuer fallback.
const ISSUER_FALLBACK_STOPWORDS: [&str; 5] = ["date", "cert", "valid", "expire", "course"];

/// First plausible certificate code, scanning lines in order.
pub fn extract_certificate_code<S: AsRef<str>>(lines: &[S]) -> Option<String> {
    for line in lines {
        let line = line.as_ref();
        for (pattern, min_len) in CODE_PATTERNS.iter() {
            let found = pattern.captures_iter(line).find_map(|caps| {
                let token = caps.get(1).or_else(|| caps.get(0))?;
                let code = token.as_str();
                (code.len() >= *min_len && !is_word_head(code, &line[token.end()..]))
                    .then_some(code)
            });
            if let Some(code) = found {
                return Some(code.to_string());
            }
        }
    }
    None
}

/// An all-letter token that runs into lowercase text is the start of an
/// ordinary word ("No", "Of"), not a code.
fn is_word_head(token: &str, rest: &str) -> bool {
    token.chars().all(|c| c.is_ascii_alphabetic())
        && rest.chars().next().is_some_and(char::is_lowercase)
}

/// Issuing authority: a labeled line if any, otherwise the first short
/// line that is neither a bare label nor a date/validity/course caption.
pub fn extract_possible_issuer<S: AsRef<str>>(lines: &[S]) -> Option<String> {
    for line in lines {
        for pattern in ISSUER_PATTERNS.iter() {
            let Some(caps) = pattern.captures(line.as_ref()) else {
                continue;
            };
            let value = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    lines.iter().map(|line| line.as_ref().trim()).find_map(|line| {
        let len = line.chars().count();
        let lower = line.to_lowercase();
        let plausible = len > 5
            && len < 50
            && !BARE_ISSUER_LABEL.is_match(line)
            && !ISSUER_FALLBACK_STOPWORDS
                .iter()
                .any(|word| lower.contains(word));
        plausible.then(|| line.to_string())
    })
}

/// Every date-like substring, in line order, then pattern order, then
/// position within the line. Duplicates are kept.
pub fn extract_possible_dates<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut dates = Vec::new();
    for line in lines {
        for pattern in DATE_PATTERNS.iter() {
            dates.extend(
                pattern
                    .find_iter(line.as_ref())
                    .map(|m| m.as_str().to_string()),
            );
        }
    }
    dates
}

/// Run all extractors and assemble the analysis body.
pub fn extract_fields<S: AsRef<str>>(lines: &[S]) -> ExtractedFields {
    ExtractedFields {
        text: lines
            .iter()
            .map(|line| line.as_ref())
            .collect::<Vec<&str>>()
            .join("\n"),
        possible_code: extract_certificate_code(lines),
        possible_issuer: extract_possible_issuer(lines),
        possible_dates: extract_possible_dates(lines),
    }
}
