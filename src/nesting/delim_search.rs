//! Finding the next delimiter that matters, and arbitrating between several
//! candidates that all matched at the same position.

use std::sync::Arc;

use crate::config::compiled::{CompiledMaskConfig, CompiledSubConfig};
use crate::pattern::Pattern;

/// A candidate boundary match: either a sub-mode's `open`, or a mask's
/// `open`, found somewhere at or after the search start.
#[derive(Clone, Debug)]
pub struct MatchRecord {
    pub start: usize,
    pub end: usize,
    /// The offset this match was originally found at, before any scoped
    /// retraction shifted what the caller considers "current". Kept
    /// alongside `start` rather than overwritten in place, so a caller that
    /// retried the search after a retraction can still tell the two apart.
    pub original_start: usize,
    pub config_index: usize,
}

impl MatchRecord {
    pub fn is_zero_width(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Default tie-break law (testable property S6): earliest position wins;
/// among matches at the same position, a zero-width match wins over a
/// non-empty one; among same-width-class matches, the longer match wins;
/// any remaining tie keeps whichever candidate was registered (iterated)
/// first.
pub fn default_comparator(candidate: &MatchRecord, current_best: &MatchRecord) -> bool {
    if candidate.start != current_best.start {
        return candidate.start < current_best.start;
    }

    let candidate_zero = candidate.is_zero_width();
    let best_zero = current_best.is_zero_width();
    if candidate_zero != best_zero {
        return candidate_zero;
    }

    if candidate.len() != current_best.len() {
        return candidate.len() > current_best.len();
    }

    false
}

pub type Comparator = dyn Fn(&MatchRecord, &MatchRecord) -> bool + Send + Sync;

/// Search every sub-mode config's `open` pattern and every top-level mask's
/// `open` pattern for the earliest, highest-priority match at or after
/// `from`. Mask opens are searched first in iteration order (and so win
/// comparator ties against sub-mode opens declared later), matching how a
/// mode's config list is meant to be read top-to-bottom.
pub fn search_open(
    masks: &[Arc<CompiledMaskConfig>],
    subs: &[Arc<CompiledSubConfig>],
    text: &str,
    from: usize,
    comparator: &Comparator,
) -> Option<(BoundaryKind, MatchRecord)> {
    let mut best: Option<(BoundaryKind, MatchRecord)> = None;

    let mut consider = |kind: BoundaryKind, index: usize, pattern: &Pattern| {
        if let Some((start, end)) = pattern.find_at(text, from) {
            let record = MatchRecord {
                start,
                end,
                original_start: start,
                config_index: index,
            };
            let replace = match &best {
                None => true,
                Some((_, current)) => comparator(&record, current),
            };
            if replace {
                best = Some((kind, record));
            }
        }
    };

    for (i, mask) in masks.iter().enumerate() {
        consider(BoundaryKind::Mask, i, &mask.open);
    }
    for (i, sub) in subs.iter().enumerate() {
        consider(BoundaryKind::Sub, i, &sub.open);
    }

    best
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryKind {
    Sub,
    Mask,
}
