//! The top parser (§4.3) and the four sub-parser variants (§4.4), unified
//! into one state machine parameterized by [`DelimHandling`] instead of four
//! parallel classes.
//!
//! Neither function here keeps a persisted "which phase am I in" flag.
//! Both recompute what to do from `stream.pos()` and the current `NestState`
//! on every call, retracting and restoring the stream within that single
//! call (`retract::drive_retracted`) rather than across several. This
//! collapses what would otherwise be several distinct pre-entry/pre-close
//! phases into one fresh evaluation each time; see `DESIGN.md` for why this
//! is equivalent for every observable `(span, style)` sequence.

use std::sync::Arc;

use crate::config::compiled::{CompiledSubConfig, DelimHandling};
use crate::mode::{Mode, Style};
use crate::nesting::delim_search::{default_comparator, search_open, BoundaryKind, MatchRecord};
use crate::nesting::electric;
use crate::nesting::mask::{self, MaskOutcome};
use crate::nesting::retract::drive_retracted;
use crate::nesting::state::{MaskFrame, NestState, StackFrame};
use crate::nesting::NestingMode;
use crate::stream::Stream;

fn clear_suffixes(state: &mut NestState, blank_line: bool) {
    if blank_line {
        state.pending_suffixes.retain(|s| s.inline);
    } else {
        state.pending_suffixes.clear();
    }
}

fn drive_host(mode: &NestingMode, stream: &mut dyn Stream, state: &mut NestState) -> Option<Style> {
    mode.config().host.token(stream, state.host_state.as_mut())
}

fn as_nesting_mode(mode: &dyn Mode) -> Option<&NestingMode> {
    mode.as_any().downcast_ref::<NestingMode>()
}

/// §4.3: drive the host mode, watching for the next sub-mode/mask entry.
pub(crate) fn top_token(mode: &NestingMode, stream: &mut dyn Stream, state: &mut NestState) -> Option<Style> {
    let pos = stream.pos();
    let text = stream.string().to_string();
    let line_is_blank = text.trim().is_empty();

    // Suffixes are tried first (elevated priority, §4.3) by simply leading
    // the candidate list with them; `search_open`'s own scan order then
    // reproduces the declared "try suffixes, then ordinary configs" law.
    let suffix_subs: Vec<Arc<CompiledSubConfig>> = state.pending_suffixes.iter().map(|s| s.config.clone()).collect();
    let mut combined = suffix_subs;
    combined.extend(mode.config().subs.iter().cloned());

    let found = search_open(&mode.config().masks, &combined, &text, pos, mode.config().comparator.as_ref());

    match found {
        None => {
            clear_suffixes(state, line_is_blank);
            drive_host(mode, stream, state)
        }
        Some((BoundaryKind::Mask, rec)) if rec.start != pos => drive_retracted(stream, rec.start, |s| drive_host(mode, s, state)),
        Some((BoundaryKind::Mask, rec)) => {
            clear_suffixes(state, line_is_blank);
            let config = mode.config().masks[rec.config_index].clone();
            state.masks.push(MaskFrame { config });
            match mask::mask_token(stream, state, rec.end) {
                MaskOutcome::Styled(style) => style,
                MaskOutcome::Delegate => top_token(mode, stream, state),
            }
        }
        Some((BoundaryKind::Sub, rec)) if rec.start != pos => drive_retracted(stream, rec.start, |s| drive_host(mode, s, state)),
        Some((BoundaryKind::Sub, rec)) => {
            let sub = combined[rec.config_index].clone();
            #[cfg(feature = "debug")]
            log::debug!(
                "[top_token] entering sub-mode at {}..{} (open '{}')",
                rec.start,
                rec.end,
                sub.open.pattern()
            );
            clear_suffixes(state, line_is_blank);
            enter_sub(stream, state, sub, rec)
        }
    }
}

fn enter_sub(stream: &mut dyn Stream, state: &mut NestState, sub: Arc<CompiledSubConfig>, rec: MatchRecord) -> Option<Style> {
    let mut sub_state = sub.mode.start_state();

    let style = match &sub.handling {
        DelimHandling::Static => {
            stream.set_pos(rec.end);
            sub.delim_style
        }
        DelimHandling::Include => {
            // The open text is ordinary content: let the fresh sub-mode state
            // consume it on its own terms, from its very first character.
            sub.mode.token(stream, sub_state.as_mut())
        }
        DelimHandling::Separate => drive_retracted(stream, rec.end, |s| sub.mode.token(s, sub_state.as_mut())),
        DelimHandling::TokenizeWith(delim_mode) => {
            let mut delim_state = delim_mode.start_state();
            drive_retracted(stream, rec.end, |s| delim_mode.token(s, delim_state.as_mut()))
        }
    };

    state.stack.push(StackFrame {
        config: sub,
        state: sub_state,
    });

    style
}

/// §4.4: resume the active sub-mode, watching for its own close, its own
/// masks, or (when it is itself a nesting mode) its own nested activity.
pub(crate) fn sub_token(mode: &NestingMode, stream: &mut dyn Stream, state: &mut NestState) -> Option<Style> {
    let pos = stream.pos();
    let sub = state.stack.last().unwrap().config.clone();
    let sub_mode_handle = sub.mode.clone();

    // §4.4a: when the active sub is itself a `NestingMode` that is already
    // busy (a deeper sub or mask of its own already active), our own close
    // can't be reached without unwinding it first. Delegate wholesale.
    if let Some(inner) = as_nesting_mode(sub_mode_handle.as_ref()) {
        let frame_state = state.stack.last_mut().unwrap().state.as_mut();
        if let Some(inner_state) = frame_state.as_any_mut().downcast_mut::<NestState>() {
            if inner_state.in_sub_mode() || inner_state.in_mask() {
                return inner.token(stream, inner_state);
            }
        }
    }

    let text = stream.string().to_string();

    // Our own masks take priority over closing.
    if !sub.masks.is_empty() {
        if let Some((_, rec)) = search_open(&sub.masks, &[], &text, pos, &default_comparator) {
            let own_close = sub.close.find_ahead(&text, pos);
            let mask_wins = match &own_close {
                None => true,
                Some((cs, ce)) => default_comparator(
                    &rec,
                    &MatchRecord {
                        start: *cs,
                        end: *ce,
                        original_start: *cs,
                        config_index: 0,
                    },
                ),
            };
            if mask_wins {
                if rec.start == pos {
                    state.masks.push(MaskFrame {
                        config: sub.masks[rec.config_index].clone(),
                    });
                    return match mask::mask_token(stream, state, rec.end) {
                        MaskOutcome::Styled(style) => style,
                        MaskOutcome::Delegate => sub_token(mode, stream, state),
                    };
                }
                return drive_retracted(stream, rec.start, |s| drive_sub(&sub, s, state));
            }
        }
    }

    // If the sub is itself a (currently idle) nesting mode, let it run its
    // own open search for this call rather than reimplementing arbitration
    // against its configuration from outside, unless our own close fires
    // exactly here. That must win, since the sub has no way to contest it.
    let is_inner_nesting = as_nesting_mode(sub_mode_handle.as_ref()).is_some();
    let closes_here = sub.close.match_at(&text, pos).is_some();

    if is_inner_nesting && !closes_here {
        return match sub.close.find_ahead(&text, pos) {
            Some((close_start, _)) => drive_retracted(stream, close_start, |s| drive_sub(&sub, s, state)),
            None => drive_sub(&sub, stream, state),
        };
    }

    match sub.close.find_ahead(&text, pos) {
        Some((cs, ce)) if cs == pos => finalize_close(mode, stream, state, &sub, cs, ce),
        Some((cs, _)) => drive_retracted(stream, cs, |s| drive_sub(&sub, s, state)),
        None => drive_sub(&sub, stream, state),
    }
}

fn drive_sub(sub: &Arc<CompiledSubConfig>, stream: &mut dyn Stream, state: &mut NestState) -> Option<Style> {
    let frame_state = state.stack.last_mut().unwrap().state.as_mut();
    sub.mode.token(stream, frame_state)
}

/// Consume the close delimiter text for the sub-mode on top of the stack,
/// pop its frame once the close is fully consumed, and arm whatever side
/// effects (electric re-indent, suffix chaining) its configuration declares.
///
/// A close pattern is allowed to be zero-width (S4: a lookahead close). When
/// that leaves this call having consumed nothing at all, there is no token
/// to report for it: cascade straight into whatever should run next now
/// that the frame is gone, the same way `mask::mask_token` cascades past a
/// zero-width mask close instead of returning an empty span.
fn finalize_close(mode: &NestingMode, stream: &mut dyn Stream, state: &mut NestState, sub: &Arc<CompiledSubConfig>, cs: usize, ce: usize) -> Option<Style> {
    let style = match &sub.handling {
        DelimHandling::Static => {
            stream.set_pos(ce);
            sub.delim_style
        }
        DelimHandling::Include if ce > cs => {
            let frame_state = state.stack.last_mut().unwrap().state.as_mut();
            sub.mode.token(stream, frame_state)
        }
        DelimHandling::Include => None,
        DelimHandling::Separate if ce > cs => {
            let frame_state = state.stack.last_mut().unwrap().state.as_mut();
            sub.mode.token(stream, frame_state)
        }
        DelimHandling::Separate => {
            stream.set_pos(ce);
            None
        }
        DelimHandling::TokenizeWith(delim_mode) if ce > cs => {
            let mut delim_state = delim_mode.start_state();
            let style = delim_mode.token(stream, delim_state.as_mut());
            if stream.pos() < ce {
                stream.set_pos(ce);
            }
            style
        }
        DelimHandling::TokenizeWith(_) => {
            stream.set_pos(ce);
            None
        }
    };

    if stream.pos() >= ce {
        if let Some(frame) = state.stack.pop() {
            #[cfg(feature = "debug")]
            log::debug!(
                "[finalize_close] closed sub-mode (open '{}') at {}..{}, stack depth now {}",
                frame.config.open.pattern(),
                cs,
                ce,
                state.stack.len()
            );
            if frame.config.electric {
                electric::arm(&mut state.electric, &stream.string()[cs..ce]);
            }
            if !frame.config.suffixes.is_empty() {
                state.pending_suffixes = frame.config.suffixes.clone();
            }
        }

        if stream.pos() == cs {
            return if state.in_sub_mode() {
                sub_token(mode, stream, state)
            } else {
                top_token(mode, stream, state)
            };
        }
    }

    style
}
