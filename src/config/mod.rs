//! Configuration for a nesting mode: a raw, ergonomic builder
//! ([`raw::NestModeConfig`]) compiled once into an immutable, shareable form
//! ([`compiled::CompiledNestConfig`]).

pub mod compiled;
pub mod raw;

pub use compiled::{CompiledConfig, CompiledMaskConfig, CompiledNestConfig, CompiledSubConfig, CompiledSuffix};
pub use raw::{mode_handle, MaskConfig, ModeConfig, NestModeConfig, SubModeConfig, SuffixConfig};
