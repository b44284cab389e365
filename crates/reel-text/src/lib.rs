//! Text normalization and sentence splitting for the ReelForge pipeline.

pub mod clean;
pub mod error;

pub use clean::{clean_text, split_sentences};
pub use error::{TextError, TextResult};
