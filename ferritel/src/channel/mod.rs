//! Channel layer for prompt detection and line framing.
//!
//! This module turns the received byte stream into what the session
//! consumes: a rolling window scanned for login prompts while in raw mode,
//! and discrete lines once the shell prompt has been seen.

mod ansi;
mod buffer;
mod lines;
mod patterns;

pub use ansi::AnsiStripper;
pub use buffer::PatternBuffer;
pub use lines::LineFramer;
pub use patterns::{LoginAction, LoginRule, LoginRules, compile_prompt_pattern};
