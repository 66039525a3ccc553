//! The nesting-mode façade: a [`Mode`] that wraps a host mode and a compiled
//! set of sub-mode/mask configurations (§1–§4), presenting the whole thing as
//! one ordinary `Mode` an embedder can use exactly like any other, including
//! as *someone else's* sub-mode, which is how recursive nesting (S3) happens
//! at all.
//!
//! [`NestingMode::token`] never keeps a "which phase am I in" discriminant.
//! Every call re-derives what to do from [`NestState`]'s structural fields
//! and the stream's current position; see `DESIGN.md` for the equivalence
//! argument.

use std::any::Any;

use crate::config::compiled::CompiledNestConfig;
use crate::mode::{Mode, ModeState, Style};
use crate::nesting::mask::MaskOutcome;
use crate::nesting::state::NestState;
use crate::stream::Stream;

pub(crate) mod delim_search;
pub(crate) mod electric;
mod engine;
pub(crate) mod mask;
pub(crate) mod retract;
pub mod state;

/// A host mode plus its compiled sub-mode/mask configuration, driven as one
/// [`Mode`]. Build the configuration with
/// [`crate::config::raw::NestModeConfig`] and hand it to [`NestingMode::new`].
pub struct NestingMode {
    config: CompiledNestConfig,
}

impl NestingMode {
    pub fn new(config: CompiledNestConfig) -> Self {
        Self { config }
    }

    pub(crate) fn config(&self) -> &CompiledNestConfig {
        &self.config
    }
}

impl Mode for NestingMode {
    fn start_state(&self) -> Box<dyn ModeState> {
        Box::new(NestState::new(self.config.host.start_state()))
    }

    fn token(&self, stream: &mut dyn Stream, state: &mut dyn ModeState) -> Option<Style> {
        let state = state
            .as_any_mut()
            .downcast_mut::<NestState>()
            .expect("NestingMode::token called with a foreign ModeState");

        if state.in_mask() {
            #[cfg(feature = "debug")]
            log::trace!("[NestingMode::token] resuming mask, depth {}", state.mask_depth());
            match mask::resume(stream, state) {
                MaskOutcome::Styled(style) => style,
                MaskOutcome::Delegate => self.token(stream, state),
            }
        } else if state.in_sub_mode() {
            #[cfg(feature = "debug")]
            log::trace!("[NestingMode::token] resuming sub-mode at pos {}", stream.pos());
            engine::sub_token(self, stream, state)
        } else {
            #[cfg(feature = "debug")]
            log::trace!("[NestingMode::token] driving host at pos {}", stream.pos());
            engine::top_token(self, stream, state)
        }
    }

    fn indent(&self, state: &dyn ModeState, text_after: &str) -> Option<i64> {
        let state = state.as_any().downcast_ref::<NestState>()?;

        if electric::is_armed_for(&state.electric, text_after) {
            return self.config.host.indent(state.host_state.as_ref(), text_after);
        }

        match state.stack.last() {
            Some(frame) => frame.config.mode.indent(frame.state.as_ref(), text_after),
            None => self.config.host.indent(state.host_state.as_ref(), text_after),
        }
    }

    fn blank_line(&self, state: &mut dyn ModeState) -> bool {
        let state = match state.as_any_mut().downcast_mut::<NestState>() {
            Some(state) => state,
            None => return false,
        };

        match state.stack.last_mut() {
            Some(frame) => frame.config.mode.blank_line(frame.state.as_mut()),
            None => self.config.host.blank_line(state.host_state.as_mut()),
        }
    }

    fn inner_mode<'a>(&'a self, state: &'a dyn ModeState) -> Option<(&'a dyn Mode, &'a dyn ModeState)> {
        let state = state.as_any().downcast_ref::<NestState>()?;

        let (mode, mode_state): (&dyn Mode, &dyn ModeState) = match state.stack.last() {
            Some(frame) => (frame.config.mode.as_ref(), frame.state.as_ref()),
            None => (self.config.host.as_ref(), state.host_state.as_ref()),
        };

        // Follow the chain all the way down: the active sub-mode may itself
        // be a `NestingMode` with a sub-mode of its own active.
        Some(mode.inner_mode(mode_state).unwrap_or((mode, mode_state)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::raw::{mode_handle, NestModeConfig, SubModeConfig, SuffixConfig};
    use crate::line_stream::{LineStream, NullModeState};
    use crate::mode::{ModeMeta, ModeRef, NoopResolver};
    use crate::nesting::mask::{ESCAPE_STYLE, STRING_STYLE};
    use crate::stream::Stream as _;

    /// A host/sub-mode stand-in that consumes every remaining visible
    /// character on the line in one call and reports a fixed style, enough
    /// to exercise boundary placement without a real language's lexer.
    struct WordMode(Option<Style>);

    impl Mode for WordMode {
        fn start_state(&self) -> Box<dyn ModeState> {
            Box::new(NullModeState)
        }

        fn token(&self, stream: &mut dyn Stream, _state: &mut dyn ModeState) -> Option<Style> {
            let end = stream.string().len();
            stream.set_pos(end);
            self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Like [`WordMode`], but advertising string/escape mask metadata so its
    /// masks get synthesized at compile time (§4.1a).
    struct MaskedHostMode(ModeMeta);

    impl Mode for MaskedHostMode {
        fn start_state(&self) -> Box<dyn ModeState> {
            Box::new(NullModeState)
        }

        fn token(&self, stream: &mut dyn Stream, _state: &mut dyn ModeState) -> Option<Style> {
            let end = stream.string().len();
            stream.set_pos(end);
            None
        }

        fn meta(&self) -> ModeMeta {
            self.0.clone()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn word(style: Style) -> ModeRef {
        mode_handle(Arc::new(WordMode(Some(style))))
    }

    fn collect_spans(mode: &NestingMode, stream: &mut LineStream, state: &mut Box<dyn ModeState>) -> Vec<(String, Option<Style>)> {
        let mut spans = Vec::new();
        while !stream.eol() {
            let start = stream.pos();
            let style = mode.token(stream, state.as_mut());
            let end = stream.pos();
            assert!(end > start, "token() must make progress ({start}..{end})");
            spans.push((stream.string()[start..end].to_string(), style));
        }
        spans
    }

    #[test]
    fn s1_static_delimiters_around_a_sub_mode() {
        let config = NestModeConfig::new(mode_handle(Arc::new(WordMode(None))))
            .with(SubModeConfig::new(r"<%", word("js")).close(r"%>").delim_style("delim"));
        let mode = NestingMode::new(config.compile(&NoopResolver).unwrap());

        let mut stream = LineStream::new("a <% 1+2 %> b");
        let mut state = mode.start_state();

        assert_eq!(
            collect_spans(&mode, &mut stream, &mut state),
            vec![
                ("a ".to_string(), None),
                ("<%".to_string(), Some("delim")),
                (" 1+2 ".to_string(), Some("js")),
                ("%>".to_string(), Some("delim")),
                (" b".to_string(), None),
            ]
        );
    }

    #[test]
    fn s2_mask_prevents_escape_from_closing_the_string() {
        let meta = ModeMeta {
            string_quotes: vec!['"'],
            string_escape: Some('\\'),
            line_comment: Vec::new(),
            block_comment: None,
        };
        let config = NestModeConfig::new(mode_handle(Arc::new(MaskedHostMode(meta))));
        let mode = NestingMode::new(config.compile(&NoopResolver).unwrap());

        let mut stream = LineStream::new("\"a\\\"b\"");
        let mut state = mode.start_state();

        assert_eq!(
            collect_spans(&mode, &mut stream, &mut state),
            vec![
                ("\"a".to_string(), Some(STRING_STYLE)),
                ("\\\"".to_string(), Some(ESCAPE_STYLE)),
                ("b".to_string(), Some(STRING_STYLE)),
                ("\"".to_string(), Some(STRING_STYLE)),
            ]
        );
    }

    #[test]
    fn s3_recursive_nesting_pairs_delimiters_at_each_depth() {
        let inner_config = NestModeConfig::new(mode_handle(Arc::new(WordMode(Some("in")))))
            .with(SubModeConfig::new("<<", word("x")).close(">>").delim_style("delim2"));
        let inner = Arc::new(NestingMode::new(inner_config.compile(&NoopResolver).unwrap()));

        let outer_config = NestModeConfig::new(mode_handle(Arc::new(WordMode(Some("out")))))
            .with(SubModeConfig::new(r"\[\[", ModeRef::handle(inner)).close(r"\]\]").delim_style("delim1"));
        let outer = NestingMode::new(outer_config.compile(&NoopResolver).unwrap());

        let mut stream = LineStream::new("[[ a << b >> c ]]");
        let mut state = outer.start_state();

        assert_eq!(
            collect_spans(&outer, &mut stream, &mut state),
            vec![
                ("[[".to_string(), Some("delim1")),
                (" a ".to_string(), Some("in")),
                ("<<".to_string(), Some("delim2")),
                (" b ".to_string(), Some("x")),
                (">>".to_string(), Some("delim2")),
                (" c ".to_string(), Some("in")),
                ("]]".to_string(), Some("delim1")),
            ]
        );
    }

    #[test]
    fn inner_mode_reaches_the_deepest_active_leaf() {
        let inner_config = NestModeConfig::new(mode_handle(Arc::new(WordMode(Some("in")))))
            .with(SubModeConfig::new("<<", word("x")).close(">>").delim_style("delim2"));
        let inner = Arc::new(NestingMode::new(inner_config.compile(&NoopResolver).unwrap()));

        let outer_config = NestModeConfig::new(mode_handle(Arc::new(WordMode(Some("out")))))
            .with(SubModeConfig::new(r"\[\[", ModeRef::handle(inner)).close(r"\]\]").delim_style("delim1"));
        let outer = NestingMode::new(outer_config.compile(&NoopResolver).unwrap());

        let mut stream = LineStream::new("[[ a << b >> c ]]");
        let mut state = outer.start_state();

        // Drive past "[[ a " so the innermost `<<` region is active, then
        // confirm `inner_mode` reaches past both `NestingMode` layers to the
        // leaf `x` mode rather than stopping at the outer `in` sub-mode.
        while stream.pos() < 6 {
            outer.token(&mut stream, state.as_mut());
        }

        let nest_state = state.as_any().downcast_ref::<NestState>().unwrap();
        let (mode, _) = outer.inner_mode(nest_state).unwrap();
        assert!(mode.as_any().downcast_ref::<WordMode>().is_some());
    }

    #[test]
    fn s4_suffix_fires_once_right_after_its_parent_closes() {
        let suffix = SuffixConfig::new(SubModeConfig::new("bar", word("barz")).close("$").delim_style("bar-open"));
        let config = NestModeConfig::new(mode_handle(Arc::new(WordMode(None)))).with(
            SubModeConfig::new("foo", word("fooz"))
                .close(r"(?=\s)")
                .delim_style("foo-open")
                .suffix(suffix),
        );
        let mode = NestingMode::new(config.compile(&NoopResolver).unwrap());

        let mut stream = LineStream::new("foo bar rest");
        let mut state = mode.start_state();

        assert_eq!(
            collect_spans(&mode, &mut stream, &mut state),
            vec![
                ("foo".to_string(), Some("foo-open")),
                (" ".to_string(), None),
                ("bar".to_string(), Some("bar-open")),
                (" rest".to_string(), Some("barz")),
            ]
        );
    }

    #[test]
    fn s5_close_at_start_of_line_fires_on_the_next_line() {
        let config = NestModeConfig::new(mode_handle(Arc::new(WordMode(None))))
            .with(SubModeConfig::new("#", word("comment")).include_delimiters());
        let mode = NestingMode::new(config.compile(&NoopResolver).unwrap());
        let mut state = mode.start_state();

        let mut line1 = LineStream::new("# hello");
        assert_eq!(collect_spans(&mode, &mut line1, &mut state), vec![("# hello".to_string(), Some("comment"))]);

        let mut line2 = LineStream::new("world");
        assert_eq!(collect_spans(&mode, &mut line2, &mut state), vec![("world".to_string(), None)]);
    }

    #[test]
    fn s6_default_comparator_breaks_ties_by_declaration_order_then_length() {
        // Two zero-width opens tied on position and width: the first
        // declared wins.
        let config = NestModeConfig::new(mode_handle(Arc::new(WordMode(None))))
            .with(SubModeConfig::new("(?=.)", word("za")).include_delimiters())
            .with(SubModeConfig::new("(?=a)", word("zb")).include_delimiters());
        let mode = NestingMode::new(config.compile(&NoopResolver).unwrap());
        let mut stream = LineStream::new("abc");
        let mut state = mode.start_state();
        assert_eq!(mode.token(&mut stream, state.as_mut()), Some("za"));

        // Two non-empty opens tied on position: the longer wins.
        let config = NestModeConfig::new(mode_handle(Arc::new(WordMode(None))))
            .with(SubModeConfig::new("ab", word("short")).close("$").delim_style("short"))
            .with(SubModeConfig::new("abc", word("long")).close("$").delim_style("long"));
        let mode = NestingMode::new(config.compile(&NoopResolver).unwrap());
        let mut stream = LineStream::new("abcx");
        let mut state = mode.start_state();
        assert_eq!(mode.token(&mut stream, state.as_mut()), Some("long"));
        assert_eq!(stream.pos(), 3);
    }
}
