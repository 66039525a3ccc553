//! Scoped retraction of a stream's visible line end (the "StreamView" of
//! §2/§3): shortening what a driven mode can see so it stops exactly at a
//! known boundary, then restoring the real line before the caller becomes
//! observable again.
//!
//! Every boundary this engine retracts to is recomputed fresh on each
//! `token` call (see `DESIGN.md`), so no retraction ever survives past the
//! `drive_retracted` call that created it: no saved-line field needs to live
//! on `NestState` itself, and §5's resource-discipline rule is satisfied
//! structurally rather than by bookkeeping a flag.

use crate::stream::Stream;

/// Run `drive` against `stream` with its visible end shortened to `boundary`
/// (a byte offset into the stream's *current* line), then restore the
/// original line before returning. If `boundary` is at or past the end of
/// the line already, `drive` runs against the untouched stream.
pub(crate) fn drive_retracted<R>(stream: &mut dyn Stream, boundary: usize, drive: impl FnOnce(&mut dyn Stream) -> R) -> R {
    let original = stream.string().to_string();
    let needs_retraction = boundary < original.len();

    if needs_retraction {
        stream.set_string(original[..boundary].to_string());
    }

    let result = drive(stream);

    if needs_retraction {
        let pos = stream.pos();
        stream.set_string(original);
        stream.set_pos(pos);
    }

    result
}
