//! Interface to the external model trainer.
//!
//! The trainer owns patch sampling, model fitting and artifact persistence. This crate
//! only hands it one fully-specified request per job.

use std::{collections::BTreeMap, path::Path};

use image::RgbImage;
use thiserror::Error;

use crate::{classes::SemanticClass, mask::GroundTruth};

mod command;

pub use command::CommandTrainer;

/// Everything the trainer needs for one job.
#[derive(Debug, Clone)]
pub struct TrainingRequest<'a> {
    pub image: &'a RgbImage,
    pub ground_truth: BTreeMap<SemanticClass, &'a GroundTruth>,
    pub patch_height: u32,
    pub patch_width: u32,
    pub output_paths: BTreeMap<SemanticClass, &'a Path>,
    pub epochs: u32,
    pub max_samples_per_class: u32,
    pub batch_size: u32,
}

/// Errors raised by a trainer before it could report a status.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("Failed to prepare trainer inputs in {path}: {source}")]
    Workspace {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: String,
        source: image::ImageError,
    },
    #[error("Failed to write trainer manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("Failed to run trainer `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Trainer crashed: {0}")]
    Crashed(String),
}

/// A model trainer reachable from this crate.
///
/// `Ok(true)` means every path in `request.output_paths` now holds a trained model;
/// `Ok(false)` means the trainer ran and reported failure.
pub trait Trainer {
    fn train(&self, request: &TrainingRequest<'_>) -> Result<bool, TrainerError>;
}

impl<T: Trainer + ?Sized> Trainer for &T {
    fn train(&self, request: &TrainingRequest<'_>) -> Result<bool, TrainerError> {
        (**self).train(request)
    }
}

impl<T: Trainer + ?Sized> Trainer for Box<T> {
    fn train(&self, request: &TrainingRequest<'_>) -> Result<bool, TrainerError> {
        (**self).train(request)
    }
}
