//! The mask sub-machine (§4.5): a non-exiting region that suppresses every
//! delimiter search except its own close, with recursion for masks nested
//! inside masks (an escape sequence inside a string literal, for instance).
//!
//! Unlike a sub-mode, a mask never hands the stream to a different `Mode`:
//! it only changes which style label is attached to whatever mode was
//! already driving the stream (the host, or the active sub-mode). That's why
//! [`crate::nesting::state::MaskFrame`] carries only a `config`, never a
//! `ModeState`: see `DESIGN.md` for why this engine gives masks their own
//! stack instead of reusing `StackFrame`'s fake host/sub activation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::config::compiled::CompiledMaskConfig;
use crate::error::Result;
use crate::mode::{ModeMeta, Style};
use crate::nesting::delim_search::{default_comparator, search_open, MatchRecord};
use crate::nesting::state::{MaskFrame, NestState};
use crate::pattern::Pattern;
use crate::stream::Stream;

pub(crate) const STRING_STYLE: Style = "string";
pub(crate) const ESCAPE_STYLE: Style = "string-escape";
pub(crate) const LINE_COMMENT_STYLE: Style = "comment";
pub(crate) const BLOCK_COMMENT_STYLE: Style = "comment";

type MaskMetaKey = (Vec<char>, Option<char>, Vec<String>, Option<(String, String)>);

fn cache() -> &'static Mutex<HashMap<MaskMetaKey, Arc<Vec<Arc<CompiledMaskConfig>>>>> {
    static CACHE: OnceLock<Mutex<HashMap<MaskMetaKey, Arc<Vec<Arc<CompiledMaskConfig>>>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Synthesize the implicit masks a mode's [`ModeMeta`] asks for: "strings,
/// escapes, and comments do not terminate me" for free (§4.1's
/// `compileNestMasksAtMode`). Memoized on the meta tuple itself (append-only,
/// key-addressed, per §5) rather than per `NestingMode` instance, since
/// compilation happens before any `NestingMode` exists to own the cache.
pub fn masks_for_meta(meta: &ModeMeta) -> Result<Arc<Vec<Arc<CompiledMaskConfig>>>> {
    let key = (
        meta.string_quotes.clone(),
        meta.string_escape,
        meta.line_comment.clone(),
        meta.block_comment.clone(),
    );

    if let Some(hit) = cache().lock().unwrap().get(&key) {
        return Ok(hit.clone());
    }

    let built = Arc::new(build_masks_for_meta(meta)?);
    cache().lock().unwrap().insert(key, built.clone());
    Ok(built)
}

fn build_masks_for_meta(meta: &ModeMeta) -> Result<Vec<Arc<CompiledMaskConfig>>> {
    use crate::pattern::{escape_regex_literal, ClosePattern};

    let mut masks = Vec::new();

    for &quote in &meta.string_quotes {
        let quote_src = escape_regex_literal(&quote.to_string());
        let open = Pattern::new(quote_src.clone());
        open.validate()?;
        let close = Pattern::new(quote_src);
        close.validate()?;

        let mut nested = Vec::new();
        if let Some(escape) = meta.string_escape {
            // An escape consumes exactly its own two characters (escape +
            // escaped char) and closes immediately: a zero-width close
            // searched right where the open match ends.
            let escape_open = Pattern::new(format!("{}.", escape_regex_literal(&escape.to_string())));
            escape_open.validate()?;
            let escape_close = Pattern::new(String::new());
            escape_close.validate()?;
            nested.push(Arc::new(CompiledMaskConfig {
                open: escape_open,
                close: ClosePattern::Explicit(escape_close),
                style: ESCAPE_STYLE,
                masks: Vec::new(),
            }));
        }

        masks.push(Arc::new(CompiledMaskConfig {
            open,
            close: ClosePattern::Explicit(close),
            style: STRING_STYLE,
            masks: nested,
        }));
    }

    for marker in &meta.line_comment {
        let open = Pattern::literal(marker);
        open.validate()?;
        masks.push(Arc::new(CompiledMaskConfig {
            open,
            close: ClosePattern::AtStartOfLine,
            style: LINE_COMMENT_STYLE,
            masks: Vec::new(),
        }));
    }

    if let Some((start, end)) = &meta.block_comment {
        let open = Pattern::literal(start);
        open.validate()?;
        let close = Pattern::literal(end);
        close.validate()?;
        masks.push(Arc::new(CompiledMaskConfig {
            open,
            close: ClosePattern::Explicit(close),
            style: BLOCK_COMMENT_STYLE,
            masks: Vec::new(),
        }));
    }

    Ok(masks)
}

/// What [`mask_token`] resolved for this call. `Delegate` means every active
/// mask popped without consuming a character (a chain of zero-width closes)
/// and the caller must fall through to whichever of `sub_token`/`top_token`
/// is now responsible. Distinct from `Styled(None)`, which is a real,
/// consumed-but-unstyled span.
pub(crate) enum MaskOutcome {
    Styled(Option<Style>),
    Delegate,
}

/// Resume the active mask stack on an ordinary call: the delimiter search
/// starts from the stream's current position, same as the emission anchor.
/// Requires `state.masks` to be non-empty.
pub(crate) fn resume(stream: &mut dyn Stream, state: &mut NestState) -> MaskOutcome {
    let pos = stream.pos();
    mask_token(stream, state, pos)
}

/// Drive the mask stack for one `NestingMode::token` call, searching ahead
/// of `search_from` rather than the stream's current position. Used right
/// after a caller pushes a freshly-entered [`MaskFrame`] whose own open match
/// already consumed text up to `search_from`, so that text isn't rescanned
/// as if it could itself contain the mask's close. Requires `state.masks` to
/// be non-empty.
pub(crate) fn mask_token(stream: &mut dyn Stream, state: &mut NestState, mut search_from: usize) -> MaskOutcome {
    let pos = stream.pos();
    let text = stream.string().to_string();

    loop {
        let top = state
            .masks
            .last()
            .cloned()
            .expect("mask_token requires an active mask");

        if !top.config.masks.is_empty() {
            if let Some((_, rec)) = search_open(&top.config.masks, &[], &text, search_from, &default_comparator) {
                let own_close = top.config.close.find_ahead(&text, search_from);
                let nested_wins = match &own_close {
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

                if nested_wins {
                    if rec.start == search_from {
                        #[cfg(feature = "debug")]
                        log::trace!(
                            "[mask_token] entering nested mask at {}..{}, depth now {}",
                            rec.start,
                            rec.end,
                            state.masks.len() + 1
                        );
                        state.masks.push(MaskFrame {
                            config: top.config.masks[rec.config_index].clone(),
                        });
                        search_from = rec.end;
                        continue;
                    }
                    return emit_to(stream, pos, rec.start, top.style);
                }
            }
        }

        if let Some((cs, ce)) = top.config.close.find_ahead(&text, search_from) {
            if cs == search_from {
                state.masks.pop();
                #[cfg(feature = "debug")]
                log::trace!("[mask_token] closed mask at {}..{}, depth now {}", cs, ce, state.masks.len());
                if ce > pos {
                    return emit_to(stream, pos, ce, top.style);
                }
                // A zero-width close with nothing to emit since the true
                // start of this call: this mask contributed nothing of its
                // own (e.g. a close-at-start-of-line firing on resume).
                // Cascade to whichever context is responsible now.
                if state.masks.is_empty() {
                    return MaskOutcome::Delegate;
                }
                search_from = ce;
                continue;
            }
            return emit_to(stream, pos, cs, top.style);
        }

        return emit_to(stream, pos, text.len(), top.style);
    }
}

fn emit_to(stream: &mut dyn Stream, pos: usize, boundary: usize, style: Style) -> MaskOutcome {
    if boundary <= pos {
        // Every open pattern is validated non-zero-width at compile time, so
        // this is unreachable in practice; guarantee forward progress anyway
        // per §7 rather than stall the editor on a pathological config.
        let advance = stream.string()[pos..].chars().next().map(char::len_utf8).unwrap_or(0);
        stream.set_pos(pos + advance.max(1));
    } else {
        stream.set_pos(boundary);
    }
    MaskOutcome::Styled(Some(style))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_stream::LineStream;

    fn string_mask_with_escape() -> ModeMeta {
        ModeMeta {
            string_quotes: vec!['"'],
            string_escape: Some('\\'),
            line_comment: Vec::new(),
            block_comment: None,
        }
    }

    #[test]
    fn synthesizes_string_and_escape_masks() {
        let masks = masks_for_meta(&string_mask_with_escape()).unwrap();
        assert_eq!(masks.len(), 1);
        assert_eq!(masks[0].style, STRING_STYLE);
        assert_eq!(masks[0].masks.len(), 1);
        assert_eq!(masks[0].masks[0].style, ESCAPE_STYLE);
    }

    #[test]
    fn escape_inside_string_does_not_close_the_string() {
        let masks = masks_for_meta(&string_mask_with_escape()).unwrap();
        let mut state = NestState::new(Box::new(crate::line_stream::NullModeState));
        state.masks.push(MaskFrame {
            config: masks[0].clone(),
        });

        let mut stream = LineStream::new(r#"a\"b""#);
        // consume "a"
        stream.set_pos(1);

        let outcome = resume(&mut stream, &mut state);
        match outcome {
            MaskOutcome::Styled(Some(style)) => assert_eq!(style, ESCAPE_STYLE),
            _ => panic!("expected the escape sequence to be styled"),
        }
        assert_eq!(stream.pos(), 3); // consumed `\"`
        assert_eq!(state.mask_depth(), 1); // back to the string mask, still open
    }

    #[test]
    fn memoization_returns_the_same_allocation() {
        let meta = string_mask_with_escape();
        let a = masks_for_meta(&meta).unwrap();
        let b = masks_for_meta(&meta).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
