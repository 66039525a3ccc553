use std::sync::Arc;

use crate::config::compiled::{CompiledMaskConfig, CompiledSubConfig, CompiledSuffix};
use crate::mode::ModeState;

/// One active sub-mode on the nesting stack: which configuration opened it,
/// and the sub-mode's own threaded state.
///
/// Invariant: there is at most one of these per [`NestState`] at a time. A
/// second sub-mode can only become active by delegating into *this* frame's
/// own `mode`, which (if it is itself a nesting mode) carries its own,
/// independent stack inside `state`. See `DESIGN.md` for why `stack` is still
/// a `Vec` rather than an `Option` despite this.
#[derive(Clone)]
pub struct StackFrame {
    pub config: Arc<CompiledSubConfig>,
    pub state: Box<dyn ModeState>,
}

/// One active mask region (string, comment, escape, …). Masks never carry a
/// `Mode`/`ModeState` pair of their own; see [`crate::nesting::mask`].
#[derive(Clone)]
pub struct MaskFrame {
    pub config: Arc<CompiledMaskConfig>,
}

/// The full per-document state threaded across lines for a
/// [`crate::nesting::NestingMode`].
#[derive(Clone)]
pub struct NestState {
    pub(crate) host_state: Box<dyn ModeState>,
    pub(crate) stack: Vec<StackFrame>,
    pub(crate) masks: Vec<MaskFrame>,
    /// Suffixes armed by the most recent sub-mode close, tried in order with
    /// elevated priority for exactly one more open-search (§4.3, §3
    /// invariant 6).
    pub(crate) pending_suffixes: Vec<CompiledSuffix>,
    /// The delimiter text most recently consumed by an `electric` sub-mode
    /// configuration, consulted by [`crate::nesting::electric`].
    pub(crate) electric: Option<String>,
}

impl NestState {
    pub fn new(host_state: Box<dyn ModeState>) -> Self {
        Self {
            host_state,
            stack: Vec::new(),
            masks: Vec::new(),
            pending_suffixes: Vec::new(),
            electric: None,
        }
    }

    /// Whether a sub-mode is currently active (stack depth 1) versus the
    /// engine driving the host mode directly (stack depth 0).
    pub fn in_sub_mode(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn in_mask(&self) -> bool {
        !self.masks.is_empty()
    }

    /// Depth of nested masks currently active, useful for tests asserting
    /// the "mask containment" property (an escape mask never outlives its
    /// enclosing string mask).
    pub fn mask_depth(&self) -> usize {
        self.masks.len()
    }
}

impl ModeState for NestState {
    fn clone_box(&self) -> Box<dyn ModeState> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
