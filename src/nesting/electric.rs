//! Electric delimiters (§4.6): an indent hook fired immediately after a sub
//! configuration marked `electric` consumes its close delimiter. The only
//! behavior this engine implements is the default one: re-indent a line that
//! begins, after leading whitespace, with the armed close text, using the
//! host mode's own `indent`.
//!
//! This is a field on [`crate::nesting::state::NestState`] (`electric`),
//! consulted only by the `NestingMode` that owns it, rather than a single
//! mutable flag shared across nested instances.

/// Arm `state.electric` with the delimiter text that was just consumed.
pub(crate) fn arm(electric: &mut Option<String>, delim_text: &str) {
    *electric = Some(delim_text.to_string());
}

/// Whether `text_after` (the text already typed on the line `indent` is being
/// asked about) begins, after leading whitespace, with the armed delimiter.
pub(crate) fn is_armed_for(armed: &Option<String>, text_after: &str) -> bool {
    match armed {
        Some(delim) => !delim.is_empty() && text_after.trim_start().starts_with(delim.as_str()),
        None => false,
    }
}
