//! Agent patterns — structured reasoning strategies.
//!
//! - **Reflection** — evaluate → reflect → revise translation judging
//!
//! Prompts for the pattern live in [`prompts`].

pub mod prompts;
pub mod reflection;

pub use reflection::{NO_REVISION_NOTE, ReflectionPipeline};

#[cfg(test)]
pub(crate) mod test_helpers;
