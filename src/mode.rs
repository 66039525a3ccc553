//! The `Mode`/`ModeState` contract: the seam between this engine and both the
//! host mode it wraps and whatever sub-modes its configuration names.
//!
//! Object safety matters here: a [`NestingMode`](crate::nesting::NestingMode)
//! holds its host and every sub-mode as `Arc<dyn Mode>`, and a sub-mode may
//! itself be a `NestingMode`, discovered through [`Mode::as_any`] the same way
//! `csa-executor`'s `Transport` trait exposes `as_any` for downcasting
//! concrete transports behind a trait object.

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;

/// A style label attached to a token span. Modes are free to use whatever
/// vocabulary their consumer expects (CSS class names, theme scope names,
/// …), this crate never interprets the string itself.
pub type Style = &'static str;

/// Per-document state a [`Mode`] threads across lines. Cloned whenever the
/// embedding editor needs to fork/copy a line's state (e.g. to resume
/// tokenizing from an arbitrary line without replaying the whole document).
pub trait ModeState: Send + Sync {
    fn clone_box(&self) -> Box<dyn ModeState>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn ModeState> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A single-step, line-at-a-time tokenizer: the contract both the host mode
/// and every sub-mode configuration must satisfy.
pub trait Mode: Send + Sync {
    fn start_state(&self) -> Box<dyn ModeState>;

    /// Consume at least one character from `stream` (unless already at end of
    /// line) and return the style that applies to the consumed span, or
    /// `None` for an unstyled span.
    fn token(&self, stream: &mut dyn crate::stream::Stream, state: &mut dyn ModeState) -> Option<Style>;

    /// Suggest an indentation amount for the line following `state`, given
    /// the text already typed after the cursor on the new line. Most modes
    /// never need this; the default declines to suggest anything.
    fn indent(&self, _state: &dyn ModeState, _text_after: &str) -> Option<i64> {
        None
    }

    /// Whether this mode reports no style for a blank line on its own, or
    /// wants a chance to consume it specially (a block comment that should
    /// stay highlighted through blank lines, for instance). The default
    /// reports "nothing special", which tells the engine to fall through to
    /// its own blank-line handling.
    fn blank_line(&self, _state: &mut dyn ModeState) -> bool {
        false
    }

    /// String-quote characters, the escape character used inside them,
    /// line-comment markers, and a block-comment delimiter pair, if this mode
    /// has any it wants turned into implicit mask configurations (see
    /// [`crate::nesting::mask::masks_for_meta`]). The default declares none.
    fn meta(&self) -> ModeMeta {
        ModeMeta::default()
    }

    /// The mode/state pair currently responsible for styling, for consumers
    /// (bracket matchers, `innerMode`-aware editor features) that need to
    /// reach past a composite mode like [`crate::nesting::NestingMode`] to
    /// whichever leaf mode is actually driving the cursor right now. Plain
    /// (non-composite) modes are their own inner mode, so the default is
    /// `None`, "ask the caller's own `(mode, state)`, there is no deeper
    /// layer here".
    fn inner_mode<'a>(&'a self, _state: &'a dyn ModeState) -> Option<(&'a dyn Mode, &'a dyn ModeState)> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// The subset of a mode's metadata this engine can turn into implicit mask
/// configurations, so an embedder gets "strings, escapes, and line comments
/// don't get interrupted by a sub-mode entry" for free instead of writing out
/// a mask for each one by hand.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModeMeta {
    pub string_quotes: Vec<char>,
    pub string_escape: Option<char>,
    /// Line-comment markers, as a `Vec` from the start: no single-marker
    /// special case that could silently drop an array of markers passed by
    /// a caller.
    pub line_comment: Vec<String>,
    pub block_comment: Option<(String, String)>,
}

impl ModeMeta {
    pub fn is_empty(&self) -> bool {
        self.string_quotes.is_empty() && self.line_comment.is_empty() && self.block_comment.is_none()
    }
}

/// Names a mode without holding it directly, for configuration built before a
/// concrete mode registry exists.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModeSpec {
    pub name: String,
}

impl ModeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Either a named mode waiting to be resolved, or a mode handle supplied
/// directly (the common case when the embedder constructs its sub-modes
/// up front and wires them by hand rather than through a registry).
#[derive(Clone)]
pub enum ModeRef {
    Spec(ModeSpec),
    Handle(Arc<dyn Mode>),
}

impl ModeRef {
    pub fn named(name: impl Into<String>) -> Self {
        ModeRef::Spec(ModeSpec::new(name))
    }

    pub fn handle(mode: Arc<dyn Mode>) -> Self {
        ModeRef::Handle(mode)
    }

    pub(crate) fn resolve(self, resolver: &dyn ModeResolver) -> Result<Arc<dyn Mode>> {
        match self {
            ModeRef::Handle(mode) => Ok(mode),
            ModeRef::Spec(spec) => resolver.resolve(&spec),
        }
    }
}

/// Turns a [`ModeSpec`] into a concrete mode object. Supplied by the
/// embedding editor; this crate never maintains its own mode registry.
pub trait ModeResolver {
    fn resolve(&self, spec: &ModeSpec) -> Result<Arc<dyn Mode>>;
}

/// A resolver for embedders that only ever pass [`ModeRef::Handle`], any
/// named spec reaching it is necessarily a configuration mistake.
pub struct NoopResolver;

impl ModeResolver for NoopResolver {
    fn resolve(&self, spec: &ModeSpec) -> Result<Arc<dyn Mode>> {
        Err(crate::error::Error::UnresolvedModeSpec(spec.name.clone()))
    }
}
