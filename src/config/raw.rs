use std::sync::Arc;

use crate::config::compiled::{
    CompiledMaskConfig, CompiledNestConfig, CompiledSubConfig, CompiledSuffix, DelimHandling,
};
use crate::error::{Error, Result};
use crate::mode::{Mode, ModeRef, ModeResolver, Style};
use crate::nesting::delim_search::{default_comparator, Comparator};
use crate::nesting::mask;
use crate::pattern::{ClosePattern, Pattern};

/// A nested sub-mode configuration: when `open` matches, tokenization hands
/// off to `mode` until `close` matches (or, absent a `close`, until the next
/// start of line).
#[derive(Clone)]
pub struct SubModeConfig {
    open: String,
    close: Option<String>,
    mode: ModeRef,
    delim_style: Option<Style>,
    handling: DelimHandlingSpec,
    electric: bool,
    masks: Vec<MaskConfig>,
    suffixes: Vec<SuffixConfig>,
}

#[derive(Clone)]
enum DelimHandlingSpec {
    Static,
    Separate,
    TokenizeWith(ModeRef),
    Include,
}

impl SubModeConfig {
    pub fn new(open: impl Into<String>, mode: ModeRef) -> Self {
        Self {
            open: open.into(),
            close: None,
            mode,
            delim_style: None,
            handling: DelimHandlingSpec::Static,
            electric: false,
            masks: Vec::new(),
            suffixes: Vec::new(),
        }
    }

    /// Set the pattern that ends this sub-mode. Without one, the sub-mode
    /// runs to the end of the line and is re-entered fresh on the next line.
    pub fn close(mut self, close: impl Into<String>) -> Self {
        self.close = Some(close.into());
        self
    }

    /// Style applied to the open/close delimiter text itself. Ignored under
    /// [`SubModeConfig::include_delimiters`], which never emits a separate
    /// delimiter token.
    pub fn delim_style(mut self, style: Style) -> Self {
        self.delim_style = Some(style);
        self
    }

    /// Re-tokenize the delimiter text through the sub-mode itself (the
    /// "Separate" variant of §4.4), instead of emitting it as one flat
    /// `delim_style` token.
    pub fn tokenize_delimiters(mut self) -> Self {
        self.handling = DelimHandlingSpec::Separate;
        self
    }

    /// Tokenize the delimiter text with a dedicated mode of its own (the
    /// "Tokenize-with" variant of §4.4).
    pub fn tokenize_delimiters_with(mut self, mode: ModeRef) -> Self {
        self.handling = DelimHandlingSpec::TokenizeWith(mode);
        self
    }

    /// Treat delimiter text as ordinary sub-mode content, no separate token
    /// at all (the "Include" variant of §4.4).
    pub fn include_delimiters(mut self) -> Self {
        self.handling = DelimHandlingSpec::Include;
        self
    }

    /// Mark this sub-mode's delimiters as "electric": consuming the close
    /// delimiter arms a re-indent hint for lines that start with it (see
    /// [`crate::nesting::electric`]).
    pub fn electric(mut self, electric: bool) -> Self {
        self.electric = electric;
        self
    }

    /// Register a mask active only while this sub-mode's own region is open,
    /// e.g. a string literal inside an embedded block whose own close
    /// marker must not fire from inside that string.
    pub fn mask(mut self, mask: MaskConfig) -> Self {
        self.masks.push(mask);
        self
    }

    /// Register a config tried, in priority order, once right after this
    /// sub-mode closes.
    pub fn suffix(mut self, suffix: SuffixConfig) -> Self {
        self.suffixes.push(suffix);
        self
    }

    pub(crate) fn compile(self, resolver: &dyn ModeResolver) -> Result<CompiledSubConfig> {
        let open = Pattern::new(self.open);
        open.validate()?;
        // A zero-width open only stalls under `Static`/`Separate`/`TokenizeWith`
        // handling: each of those either advances the stream to `rec.end`
        // (== `rec.start` for a genuinely zero-width match, so no progress at
        // all) or retracts the stream's visible end to that same position
        // before handing it to a mode, which leaves that mode looking at an
        // already-exhausted view. `Include` handling never retracts and never
        // sets the cursor itself — the open match is purely a trigger, and
        // the sub-mode's own `token` call is the one consuming characters
        // from the real, untouched stream — so a zero-width open is exactly
        // the intended shape there (a lookahead boundary detector).
        if open.can_match_empty() && !matches!(self.handling, DelimHandlingSpec::Include) {
            return Err(Error::ZeroWidthOpen {
                open: open.pattern().to_string(),
            });
        }

        let close = match self.close {
            Some(pattern) => {
                let pattern = Pattern::new(pattern);
                pattern.validate()?;
                ClosePattern::Explicit(pattern)
            }
            None => ClosePattern::AtStartOfLine,
        };

        let mode = self.mode.resolve(resolver)?;

        let handling = match self.handling {
            DelimHandlingSpec::Static => DelimHandling::Static,
            DelimHandlingSpec::Separate => DelimHandling::Separate,
            DelimHandlingSpec::Include => DelimHandling::Include,
            DelimHandlingSpec::TokenizeWith(mode_ref) => {
                DelimHandling::TokenizeWith(mode_ref.resolve(resolver)?)
            }
        };

        let masks = self
            .masks
            .into_iter()
            .map(MaskConfig::compile)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(Arc::new)
            .collect();

        let suffixes = self
            .suffixes
            .into_iter()
            .map(|suffix| suffix.compile(resolver))
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledSubConfig {
            open,
            close,
            mode,
            delim_style: self.delim_style,
            handling,
            electric: self.electric,
            masks,
            suffixes,
        })
    }
}

/// A one-shot, elevated-priority config tried immediately after its parent
/// sub-mode closes (§4.3's suffix chaining; scenario S4 in the round-trip
/// tests). A suffix is a full [`SubModeConfig`], not just a style, its
/// open pattern wins over the ordinary config set for exactly one search,
/// and matching it enters its own sub-mode exactly like any other.
#[derive(Clone)]
pub struct SuffixConfig {
    config: SubModeConfig,
    inline: bool,
}

impl SuffixConfig {
    pub fn new(config: SubModeConfig) -> Self {
        Self {
            config,
            inline: false,
        }
    }

    /// Mark this suffix as surviving an empty line with no match (§3
    /// invariant 6): ordinarily a failed search on a non-blank line clears
    /// all pending suffixes, and a blank line only clears the `inline` ones.
    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    fn compile(self, resolver: &dyn ModeResolver) -> Result<CompiledSuffix> {
        Ok(CompiledSuffix {
            config: Arc::new(self.config.compile(resolver)?),
            inline: self.inline,
        })
    }
}

/// A non-exiting region (string literal, comment, escape sequence): once
/// entered it never hands control to a different `Mode`, it only changes
/// which style is applied to whatever mode was already driving the stream,
/// until its own `close` fires. May itself nest further masks (e.g. an
/// escape sequence inside a string).
#[derive(Clone)]
pub struct MaskConfig {
    open: String,
    close: Option<String>,
    style: Style,
    masks: Vec<MaskConfig>,
}

impl MaskConfig {
    pub fn new(open: impl Into<String>, style: Style) -> Self {
        Self {
            open: open.into(),
            close: None,
            style,
            masks: Vec::new(),
        }
    }

    pub fn close(mut self, close: impl Into<String>) -> Self {
        self.close = Some(close.into());
        self
    }

    pub fn mask(mut self, mask: MaskConfig) -> Self {
        self.masks.push(mask);
        self
    }

    pub(crate) fn compile(self) -> Result<CompiledMaskConfig> {
        let open = Pattern::new(self.open);
        open.validate()?;
        if open.can_match_empty() {
            return Err(Error::ZeroWidthOpen {
                open: open.pattern().to_string(),
            });
        }

        let close = match self.close {
            Some(pattern) => {
                let pattern = Pattern::new(pattern);
                pattern.validate()?;
                ClosePattern::Explicit(pattern)
            }
            None => ClosePattern::AtStartOfLine,
        };

        let masks = self
            .masks
            .into_iter()
            .map(MaskConfig::compile)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(Arc::new)
            .collect();

        Ok(CompiledMaskConfig {
            open,
            close,
            style: self.style,
            masks,
        })
    }
}

/// One entry in a mode's ordered list of root-level nesting configurations:
/// either a sub-mode hand-off or a mask region.
#[derive(Clone)]
pub enum ModeConfig {
    Sub(SubModeConfig),
    Mask(MaskConfig),
}

impl From<SubModeConfig> for ModeConfig {
    fn from(sub: SubModeConfig) -> Self {
        ModeConfig::Sub(sub)
    }
}

impl From<MaskConfig> for ModeConfig {
    fn from(mask: MaskConfig) -> Self {
        ModeConfig::Mask(mask)
    }
}

/// The raw, ergonomic builder for a nesting mode: a host mode plus an ordered
/// list of root-level sub-mode/mask configurations. Call
/// [`NestModeConfig::compile`] to turn it into an immutable, shareable
/// [`CompiledNestConfig`].
pub struct NestModeConfig {
    pub(crate) host: ModeRef,
    pub(crate) configs: Vec<ModeConfig>,
    pub(crate) comparator: Arc<Comparator>,
}

impl NestModeConfig {
    pub fn new(host: ModeRef) -> Self {
        Self {
            host,
            configs: Vec::new(),
            comparator: Arc::new(default_comparator),
        }
    }

    pub fn with(mut self, config: impl Into<ModeConfig>) -> Self {
        self.configs.push(config.into());
        self
    }

    /// Override the default priority-arbitration law (§4.2) for this mode.
    pub fn comparator(mut self, comparator: impl Fn(&crate::nesting::delim_search::MatchRecord, &crate::nesting::delim_search::MatchRecord) -> bool + Send + Sync + 'static) -> Self {
        self.comparator = Arc::new(comparator);
        self
    }

    pub fn compile(self, resolver: &dyn ModeResolver) -> Result<CompiledNestConfig> {
        let host = self.host.resolve(resolver)?;

        let mut subs = Vec::new();
        let mut masks = Vec::new();
        for config in self.configs {
            match config {
                ModeConfig::Sub(sub) => subs.push(Arc::new(sub.compile(resolver)?)),
                ModeConfig::Mask(mask) => masks.push(Arc::new(mask.compile()?)),
            }
        }

        // Two sub-modes declared with the literal same open pattern can
        // never be disambiguated by the default comparator (§4.2 only
        // breaks ties on position and match width). That's a configuration
        // mistake, not something to silently resolve by declaration order.
        for i in 0..subs.len() {
            for j in (i + 1)..subs.len() {
                if subs[i].open.pattern() == subs[j].open.pattern() {
                    return Err(Error::ConflictingMode {
                        name: subs[i].open.pattern().to_string(),
                    });
                }
            }
        }

        // §4.1a: fold in the masks implied by the host's own `ModeMeta`
        // (string quotes, their escape character, line comments) so callers
        // get "strings and comments aren't interrupted by a sub-mode entry"
        // without writing out a `MaskConfig` for each one by hand.
        let meta = host.meta();
        if !meta.is_empty() {
            masks.extend(mask::masks_for_meta(&meta)?);
        }

        Ok(CompiledNestConfig {
            host,
            subs,
            masks,
            comparator: self.comparator,
        })
    }
}

/// Convenience constructor mirroring [`ModeRef::handle`] for call sites that
/// already have a concrete mode object rather than a name to resolve later.
pub fn mode_handle(mode: Arc<dyn Mode>) -> ModeRef {
    ModeRef::handle(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_stream::NullModeState;
    use crate::mode::NoopResolver;
    use crate::stream::Stream as _;

    struct Stub;
    impl Mode for Stub {
        fn start_state(&self) -> Box<dyn crate::mode::ModeState> {
            Box::new(NullModeState)
        }
        fn token(&self, stream: &mut dyn crate::stream::Stream, _state: &mut dyn crate::mode::ModeState) -> Option<Style> {
            stream.skip_to_end();
            None
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn stub() -> ModeRef {
        mode_handle(Arc::new(Stub))
    }

    #[test]
    fn rejects_a_zero_width_sub_open() {
        let config = SubModeConfig::new(r"(?=x)", stub());
        let err = config.compile(&NoopResolver).unwrap_err();
        assert!(matches!(err, Error::ZeroWidthOpen { .. }));
    }

    #[test]
    fn rejects_a_zero_width_mask_open() {
        let err = MaskConfig::new(r"(?=x)", "string").compile().unwrap_err();
        assert!(matches!(err, Error::ZeroWidthOpen { .. }));
    }

    #[test]
    fn allows_a_zero_width_open_under_include_handling() {
        // `Static`/`Separate`/`TokenizeWith` all either set the cursor to
        // `rec.end` directly or retract the stream to it, either of which
        // stalls for a genuinely zero-width match. `Include` never retracts
        // and never moves the cursor itself — the sub-mode's own `token`
        // call consumes from the untouched stream — so a zero-width open is
        // the intended, stall-free shape there (S6 exercises this end to
        // end with `NestingMode`).
        let config = SubModeConfig::new(r"(?=x)", stub()).include_delimiters();
        assert!(config.compile(&NoopResolver).is_ok());
    }

    #[test]
    fn rejects_an_invalid_pattern() {
        let config = SubModeConfig::new("(", stub());
        let err = config.compile(&NoopResolver).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn rejects_an_unresolved_named_mode_spec() {
        let config = NestModeConfig::new(ModeRef::named("nonexistent"));
        let err = config.compile(&NoopResolver).unwrap_err();
        assert!(matches!(err, Error::UnresolvedModeSpec(name) if name == "nonexistent"));
    }

    #[test]
    fn rejects_two_sub_configs_with_the_same_open_pattern() {
        let config = NestModeConfig::new(stub())
            .with(SubModeConfig::new("foo", stub()).close("$"))
            .with(SubModeConfig::new("foo", stub()).close("$"));
        let err = config.compile(&NoopResolver).unwrap_err();
        assert!(matches!(err, Error::ConflictingMode { name } if name == "foo"));
    }

    #[test]
    fn accepts_distinct_sub_configs() {
        let config = NestModeConfig::new(stub())
            .with(SubModeConfig::new("foo", stub()).close("$"))
            .with(SubModeConfig::new("bar", stub()).close("$"));
        assert!(config.compile(&NoopResolver).is_ok());
    }
}
