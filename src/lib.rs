//! A nesting tokenizer combinator: wrap a line-at-a-time host mode with an
//! ordered set of sub-mode and mask configurations, and drive the result
//! through the same single-step tokenizer interface as any other mode.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nestmode::config::{mode_handle, NestModeConfig, SubModeConfig};
//! use nestmode::mode::{Mode, ModeState, NoopResolver, Style};
//! use nestmode::nesting::NestingMode;
//! use nestmode::stream::Stream;
//!
//! # #[cfg(feature = "reference-stream")]
//! # fn run() {
//! use nestmode::line_stream::{LineStream, NullModeState};
//!
//! struct PlainText;
//! impl Mode for PlainText {
//!     fn start_state(&self) -> Box<dyn ModeState> { Box::new(NullModeState) }
//!     fn token(&self, stream: &mut dyn Stream, _state: &mut dyn ModeState) -> Option<Style> {
//!         stream.skip_to_end();
//!         None
//!     }
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//! }
//!
//! struct Script;
//! impl Mode for Script {
//!     fn start_state(&self) -> Box<dyn ModeState> { Box::new(NullModeState) }
//!     fn token(&self, stream: &mut dyn Stream, _state: &mut dyn ModeState) -> Option<Style> {
//!         stream.skip_to_end();
//!         Some("js")
//!     }
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//! }
//!
//! let config = NestModeConfig::new(mode_handle(Arc::new(PlainText)))
//!     .with(SubModeConfig::new(r"<%", mode_handle(Arc::new(Script))).close(r"%>").delim_style("delim"));
//! let mode = NestingMode::new(config.compile(&NoopResolver).unwrap());
//!
//! let mut stream = LineStream::new("a <% 1+2 %> b");
//! let mut state = mode.start_state();
//! while !stream.eol() {
//!     mode.token(&mut stream, state.as_mut());
//! }
//! # }
//! # #[cfg(feature = "reference-stream")]
//! # run();
//! ```
//!
//! Doc density is deliberately uneven across this crate: some modules carry
//! a full rationale, others a single line. There is no blanket
//! `#![deny(missing_docs)]` forcing every public item through the same
//! template.

pub mod config;
pub mod error;
#[cfg(feature = "reference-stream")]
pub mod line_stream;
pub mod mode;
pub mod nesting;
pub mod pattern;
pub mod stream;

pub use error::{Error, Result};
pub use mode::{Mode, ModeMeta, ModeRef, ModeResolver, ModeSpec, ModeState, NoopResolver, Style};
pub use nesting::state::NestState;
pub use nesting::NestingMode;
pub use stream::Stream;
