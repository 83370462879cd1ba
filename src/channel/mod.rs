// src/channel/mod.rs

//! Incremental decoding of child output into text.

mod buffer;
mod newlines;

pub use buffer::{ChannelBuffer, OutputCallback};
pub use newlines::normalize_newlines;
