//! Library exports for the training-job compositor.
/// Semantic classes and their ordering.
pub mod classes;
/// Job settings loaded from TOML.
pub mod config;
mod config_defaults;
/// Top-level job runner.
pub mod job;
/// Decoding of the base image and annotation layers.
pub mod layers;
/// Scoped per-job log file and output redirection.
pub mod log_sink;
/// Console logging for binaries.
pub mod logging;
/// Ground-truth mask derivation.
pub mod mask;
/// The single trainer call.
pub mod orchestrator;
/// Class plan resolution.
pub mod plan;
/// External trainer interface.
pub mod trainer;
