use std::sync::Arc;

use crate::mode::{Mode, Style};
use crate::nesting::delim_search::Comparator;
use crate::pattern::{ClosePattern, Pattern};

/// How the open/close delimiter text itself gets tokenized: the four
/// separate sub-parser variants this is modeled on, reduced to one enum a
/// single engine dispatches on rather than four near-identical state
/// machines.
#[derive(Clone)]
pub enum DelimHandling {
    /// Emit the delimiter text as one token in `delim_style`; the sub-mode
    /// never sees it.
    Static,
    /// Hand the delimiter text to the sub-mode's own `token`, so it gets
    /// re-tokenized as inner-language content (prefixed with `delim_style`
    /// when present).
    Separate,
    /// Tokenize the delimiter text with a dedicated mode of its own, rather
    /// than the sub-mode that handles the region's interior.
    TokenizeWith(Arc<dyn Mode>),
    /// Delimiter text is ordinary sub-mode content: no separate token at all.
    Include,
}

/// A compiled, immutable sub-mode configuration, shareable across every
/// [`crate::nesting::state::NestState`] driven by the same [`CompiledNestConfig`].
#[derive(Clone)]
pub struct CompiledSubConfig {
    pub open: Pattern,
    pub close: ClosePattern,
    pub mode: Arc<dyn Mode>,
    pub delim_style: Option<Style>,
    pub handling: DelimHandling,
    pub electric: bool,
    /// Masks active while this sub-mode's own region is open, e.g. a string
    /// literal inside an embedded block whose own close marker must not fire
    /// from inside that string.
    pub masks: Vec<Arc<CompiledMaskConfig>>,
    /// Configs tried, in order, with elevated priority immediately after this
    /// sub-mode closes (see [`CompiledSuffix`]).
    pub suffixes: Vec<CompiledSuffix>,
}

/// A config activated once, with elevated priority, right after its parent
/// sub-mode closes, e.g. trailing tag attributes after a bracketed name.
#[derive(Clone)]
pub struct CompiledSuffix {
    pub config: Arc<CompiledSubConfig>,
    /// Whether this suffix survives being offered on a blank line with no
    /// match (§3 invariant 6): `false` means it is discarded like any other
    /// failed search; `true` means a blank line doesn't count against it.
    pub inline: bool,
}

/// A compiled mask region. Masks nest into other masks, never into a fresh
/// `Mode`/`ModeState` pair, see the module docs on
/// [`crate::nesting::mask`] for why.
#[derive(Clone)]
pub struct CompiledMaskConfig {
    pub open: Pattern,
    pub close: ClosePattern,
    pub style: Style,
    pub masks: Vec<Arc<CompiledMaskConfig>>,
}

#[derive(Clone)]
pub enum CompiledConfig {
    Sub(Arc<CompiledSubConfig>),
    Mask(Arc<CompiledMaskConfig>),
}

impl CompiledConfig {
    pub fn open(&self) -> &Pattern {
        match self {
            CompiledConfig::Sub(sub) => &sub.open,
            CompiledConfig::Mask(mask) => &mask.open,
        }
    }
}

/// The fully compiled, `Send + Sync`, reference-counted configuration for a
/// [`crate::nesting::NestingMode`]: a host mode plus its ordered sub-mode and
/// mask configurations. Build one via [`crate::config::raw::NestModeConfig::compile`].
pub struct CompiledNestConfig {
    pub host: Arc<dyn Mode>,
    pub subs: Vec<Arc<CompiledSubConfig>>,
    pub masks: Vec<Arc<CompiledMaskConfig>>,
    /// Priority-arbitration law for same-offset candidates (§4.2). One
    /// comparator per mode rather than per config, a simplification recorded
    /// in `DESIGN.md`.
    pub comparator: Arc<Comparator>,
}

impl CompiledNestConfig {
    pub fn sub_configs(&self) -> &[Arc<CompiledSubConfig>] {
        &self.subs
    }

    pub fn mask_configs(&self) -> &[Arc<CompiledMaskConfig>] {
        &self.masks
    }
}
