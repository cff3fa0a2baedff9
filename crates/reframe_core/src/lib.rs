//! reframe core - job orchestration for media transformation
//!
//! Durable jobs of pipeline steps, a runner that walks them, and a
//! pipeline controller that takes one image or video target through a
//! chain of processors. Media tooling, analysis and the processors
//! themselves are supplied through traits.

pub mod config;
pub mod jobs;
pub mod logging;
pub mod media;
pub mod models;
pub mod orchestrator;
pub mod process_state;
pub mod workspace;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
