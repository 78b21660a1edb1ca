//! Shared utilities used across the engine.

pub mod error;

pub use error::{ChatError, ResultExt};
