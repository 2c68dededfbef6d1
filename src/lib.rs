//! MRI dataset preparation.
//!
//! Selects scan files by a tabular metadata filter, copies them into a
//! per-subject layout, and caches a center-slice artifact per subject.
//! The crate has no entry point of its own; the `mri-prep` binary is the
//! orchestrator.

pub mod artifact;
pub mod config;
pub mod data;
pub mod discovery;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod volume;

pub use config::PrepConfig;
pub use error::PrepError;
pub use pipeline::{Pipeline, RunReport};
