use std::fmt;
use std::sync::{Arc, OnceLock};

use fancy_regex::Regex;

use crate::error::{Error, Result};

/// A regex wrapper that keeps its source string around but compiles lazily,
/// once, on first use.
///
/// `fancy-regex` is used instead of an Oniguruma binding because delimiter
/// patterns here routinely need JS-style lookaround (a close pattern such as
/// `(?=\s)`), not the `\A`/`\G` anchors a TextMate-flavored engine cares about.
pub struct Pattern {
    pattern: String,
    compiled: OnceLock<Option<Arc<Regex>>>,
}

impl Pattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            compiled: OnceLock::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn compiled(&self) -> Option<&Arc<Regex>> {
        self.compiled
            .get_or_init(|| Regex::new(&self.pattern).ok().map(Arc::new))
            .as_ref()
    }

    /// Compile eagerly and surface the failure, instead of silently degrading
    /// to "never matches" the way [`Pattern::find_at`] does at tokenize time.
    pub fn validate(&self) -> Result<()> {
        Regex::new(&self.pattern)
            .map(|_| ())
            .map_err(|err| Error::InvalidPattern {
                pattern: self.pattern.clone(),
                reason: err.to_string(),
            })
    }

    /// `true` if this pattern can produce a zero-width match, which would let
    /// an open delimiter fire forever at the same offset.
    ///
    /// Matching against `""` alone is not enough: a lookaround pattern such as
    /// `(?=x)` is zero-width by construction but needs a following character
    /// to succeed at all, so `find("")` reports no match and the check would
    /// wrongly pass a pattern this exact family is meant to catch (the S4/S6
    /// lookahead-close shape). Instead, probe the compiled pattern, anchored
    /// at every position, against a handful of haystacks covering the
    /// character classes a delimiter pattern is likely to test for
    /// (whitespace, letters, digits, punctuation) as well as the empty
    /// string itself. This is a heuristic, not a proof — a pathological
    /// pattern keyed off some other character entirely could still slip
    /// through — but it catches every zero-width shape this crate's own
    /// configuration surface actually produces.
    pub fn can_match_empty(&self) -> bool {
        const PROBES: &[&str] = &[
            "",
            " \t\n",
            "abcxyzABCXYZ",
            "0123456789",
            ".,;:!?()[]{}<>\"'`~@#$%^&*-+=|\\/_",
        ];

        let Some(regex) = self.compiled() else {
            return false;
        };

        PROBES.iter().any(|haystack| zero_width_match_anywhere(regex, haystack))
    }

    /// Search for the earliest match at or after `start`. Returns byte offsets
    /// relative to the full `text`, not to `start`.
    pub fn find_at(&self, text: &str, start: usize) -> Option<(usize, usize)> {
        let regex = self.compiled()?;
        let haystack = text.get(start..)?;
        match regex.find(haystack) {
            Ok(Some(m)) => Some((m.start() + start, m.end() + start)),
            _ => None,
        }
    }

    /// Like [`Pattern::find_at`], but only accepted if the match begins
    /// exactly at `pos` (used wherever a boundary must be checked right here,
    /// not scanned for further ahead).
    pub fn match_at(&self, text: &str, pos: usize) -> Option<(usize, usize)> {
        match self.find_at(text, pos) {
            Some((s, e)) if s == pos => Some((s, e)),
            _ => None,
        }
    }
}

/// Whether `regex` produces a match anchored exactly at some position in
/// `haystack` (i.e. starting right there, not further ahead) whose span is
/// empty. Anchoring matters: a lookaround's success depends on what sits at
/// the position it's tested from, so this checks every position in turn
/// rather than asking once whether the pattern matches anywhere in the
/// haystack.
fn zero_width_match_anywhere(regex: &Regex, haystack: &str) -> bool {
    for pos in 0..=haystack.len() {
        if !haystack.is_char_boundary(pos) {
            continue;
        }
        if let Ok(Some(m)) = regex.find(&haystack[pos..]) {
            if m.start() == 0 && m.end() == 0 {
                return true;
            }
        }
    }
    false
}

/// Regex-escape every character of `text` (§4.1: "Strings become patterns by
/// regex-escaping every character").
pub(crate) fn escape_regex_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 4);
    for ch in text.chars() {
        if "\\.+*?()|[]{}^$".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl Pattern {
    /// Build a pattern that matches `text` literally rather than as regex
    /// source, for callers (such as [`crate::nesting::mask::masks_for_meta`])
    /// that are handed plain delimiter characters rather than a pattern.
    pub fn literal(text: &str) -> Self {
        Pattern::new(escape_regex_literal(text))
    }
}

impl Clone for Pattern {
    fn clone(&self) -> Self {
        // Fresh lazy compilation rather than cloning the cached `Arc` so a
        // cloned `Pattern` never shares compiled-or-not state with its source.
        Pattern::new(self.pattern.clone())
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({})", self.pattern)
    }
}

/// A close pattern, or the absence of one meaning "close at start of the
/// next line". A sub-mode with no explicit close runs until end of line,
/// and the engine re-enters it fresh on every following line.
#[derive(Debug, Clone)]
pub enum ClosePattern {
    Explicit(Pattern),
    AtStartOfLine,
}

impl ClosePattern {
    pub fn explicit(pattern: impl Into<String>) -> Self {
        ClosePattern::Explicit(Pattern::new(pattern))
    }

    pub fn match_at(&self, text: &str, pos: usize) -> Option<(usize, usize)> {
        match self {
            ClosePattern::Explicit(pattern) => pattern.match_at(text, pos),
            ClosePattern::AtStartOfLine => (pos == 0).then_some((0, 0)),
        }
    }

    pub fn find_at(&self, text: &str, start: usize) -> Option<(usize, usize)> {
        match self {
            ClosePattern::Explicit(pattern) => pattern.find_at(text, start),
            // A start-of-line close never fires mid-line: it is only ever
            // consulted at the top of a fresh line, at offset 0.
            ClosePattern::AtStartOfLine => None,
        }
    }

    /// Search for this close ahead of `pos`, folding in the start-of-line
    /// case (only ever a hit when `pos == 0`) so callers can treat both
    /// variants of `close` uniformly.
    pub fn find_ahead(&self, text: &str, pos: usize) -> Option<(usize, usize)> {
        match self {
            ClosePattern::Explicit(_) => self.find_at(text, pos),
            ClosePattern::AtStartOfLine => self.match_at(text, pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_match_ahead() {
        let pattern = Pattern::new(r"-->".to_string());
        assert_eq!(pattern.find_at("a <!-- b --> c", 0), Some((8, 11)));
    }

    #[test]
    fn match_at_rejects_non_anchored_hits() {
        let pattern = Pattern::new(r"-->".to_string());
        assert_eq!(pattern.match_at("a --> b", 0), None);
        assert_eq!(pattern.match_at("a --> b", 2), Some((2, 5)));
    }

    #[test]
    fn supports_lookahead_close() {
        let pattern = Pattern::new(r"(?=\s)".to_string());
        assert_eq!(pattern.match_at("foo bar", 3), Some((3, 3)));
        assert_eq!(pattern.match_at("foo bar", 2), None);
    }

    #[test]
    fn detects_zero_width_open() {
        let pattern = Pattern::new(r"(?=x)".to_string());
        assert!(pattern.can_match_empty());
        let pattern = Pattern::new(r"x".to_string());
        assert!(!pattern.can_match_empty());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let pattern = Pattern::new("(".to_string());
        assert!(pattern.validate().is_err());
    }

    #[test]
    fn start_of_line_close_only_matches_at_zero() {
        let close = ClosePattern::AtStartOfLine;
        assert_eq!(close.match_at("anything", 0), Some((0, 0)));
        assert_eq!(close.match_at("anything", 1), None);
    }
}
