//! Template placeholder substitution with a format baseline compliance engine.
//!
//! A `.docx` template plus a skill payload yield a finished document under a
//! strict editorial contract: only runs holding a matched placeholder may
//! change, and every later formatting correction is scoped to those runs.
//! [`pipeline::run`] is the single entry point; it returns the four-artifact
//! bundle or a typed [`EngineError`].
pub mod config;
pub mod docx;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod placeholder;
pub mod report;
pub mod skills;
pub mod staging;
pub mod substitute;
pub mod templates;
pub mod util;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::{BaselineSource, BracketMode, FixMode, FormatMode, FormatOptions, Preset};
pub use error::{EngineError, ExitStatus};
pub use pipeline::{run, RunRequest};
pub use report::ArtifactBundle;
