//! Issues the single trainer call for a resolved class plan.

use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;

use crate::{
    classes::SemanticClass,
    config::InvocationConfig,
    plan::ClassPlan,
    trainer::{Trainer, TrainerError, TrainingRequest},
};

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("The trainer reported failure for classes: {}", format_classes(.classes))]
    TrainingFailed { classes: Vec<SemanticClass> },
    #[error("The trainer failed: {0}")]
    Trainer(#[from] TrainerError),
}

fn format_classes(classes: &[SemanticClass]) -> String {
    classes
        .iter()
        .map(|class| class.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Classes trained by a successful job and where their models were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingReport {
    pub artifacts: Vec<(SemanticClass, PathBuf)>,
}

impl TrainingReport {
    pub fn classes(&self) -> impl Iterator<Item = SemanticClass> + '_ {
        self.artifacts.iter().map(|(class, _)| *class)
    }
}

/// Build the request for `plan` and call `trainer` exactly once.
///
/// Failures are not retried. Artifact files are not checked here.
pub fn orchestrate<T: Trainer + ?Sized>(
    image: &RgbImage,
    plan: &ClassPlan,
    config: &InvocationConfig,
    trainer: &T,
) -> Result<TrainingReport, OrchestrationError> {
    let request = TrainingRequest {
        image,
        ground_truth: plan
            .entries()
            .map(|(class, entry)| (class, &entry.ground_truth))
            .collect(),
        patch_height: config.patch_height(),
        patch_width: config.patch_width(),
        output_paths: plan
            .entries()
            .map(|(class, entry)| (class, entry.destination.as_path()))
            .collect(),
        epochs: config.epochs(),
        max_samples_per_class: config.max_samples_per_class(),
        batch_size: config.batch_size(),
    };
    let classes: Vec<_> = plan.classes().collect();
    tracing::info!(
        "Training {} on {}x{} patches for up to {} epochs",
        format_classes(&classes),
        request.patch_width,
        request.patch_height,
        request.epochs
    );
    if !trainer.train(&request)? {
        return Err(OrchestrationError::TrainingFailed { classes });
    }
    Ok(TrainingReport {
        artifacts: plan
            .entries()
            .map(|(class, entry)| (class, entry.destination.clone()))
            .collect(),
    })
}
