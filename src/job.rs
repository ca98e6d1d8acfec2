//! One training job, from decoded layers to trained models.

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    config::{ConfigError, InvocationConfig, JobConfig},
    layers::{InputPaths, JobInputs, LayerError},
    log_sink::LogSink,
    mask::{MaskError, derive_class_masks},
    orchestrator::{OrchestrationError, TrainingReport, orchestrate},
    plan::{ClassPlan, ModelSlots},
    trainer::Trainer,
};

/// Output slots declared for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutputs {
    pub models: ModelSlots,
    pub log_file: PathBuf,
}

/// Top-level error of a job. Every variant keeps its underlying cause.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Layer(#[from] LayerError),
    #[error(transparent)]
    Mask(#[from] MaskError),
    #[error(transparent)]
    Training(#[from] OrchestrationError),
}

/// Run one job: validate settings, derive ground truth, plan, and train.
///
/// The job log sink is held for the whole call and released on every exit path.
pub fn run_job<T: Trainer + ?Sized>(
    inputs: &JobInputs,
    outputs: &JobOutputs,
    config: &JobConfig,
    trainer: &T,
) -> Result<TrainingReport, JobError> {
    let invocation = config.training.validated()?;
    let _sink = LogSink::enter(Some(outputs.log_file.as_path()), &config.logging);
    train_decoded(inputs, outputs, &invocation, trainer)
}

/// Like [`run_job`], but decodes the input files inside the job log sink so decode
/// failures are recorded in the job log.
pub fn run_job_from_paths<T: Trainer + ?Sized>(
    paths: &InputPaths,
    outputs: &JobOutputs,
    config: &JobConfig,
    trainer: &T,
) -> Result<TrainingReport, JobError> {
    let invocation = config.training.validated()?;
    let _sink = LogSink::enter(Some(outputs.log_file.as_path()), &config.logging);
    let inputs = JobInputs::load(paths).inspect_err(|err| {
        tracing::error!("Rejected job inputs: {err}");
    })?;
    train_decoded(&inputs, outputs, &invocation, trainer)
}

fn train_decoded<T: Trainer + ?Sized>(
    inputs: &JobInputs,
    outputs: &JobOutputs,
    invocation: &InvocationConfig,
    trainer: &T,
) -> Result<TrainingReport, JobError> {
    let masks = derive_class_masks(inputs.image.dimensions(), &inputs.layers).inspect_err(|err| {
        tracing::error!("Rejected job inputs: {err}");
    })?;
    let plan = ClassPlan::build(masks, &outputs.models);
    let report = orchestrate(&inputs.image, &plan, invocation, trainer).inspect_err(|err| {
        tracing::error!("{err}");
    })?;
    tracing::info!("Finishing the training job.");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classes::SemanticClass,
        config::TrainingSettings,
        layers::AnnotationLayers,
        log_sink::{active_log_file, test_lock},
        trainer::{TrainerError, TrainingRequest},
    };
    use image::{RgbImage, RgbaImage};
    use std::cell::Cell;
    use tempfile::tempdir;

    struct CountingTrainer {
        calls: Cell<usize>,
    }

    impl Trainer for CountingTrainer {
        fn train(&self, request: &TrainingRequest<'_>) -> Result<bool, TrainerError> {
            self.calls.set(self.calls.get() + 1);
            tracing::info!("training {} classes", request.ground_truth.len());
            Ok(true)
        }
    }

    fn inputs(size: u32) -> JobInputs {
        let blank = RgbaImage::new(size, size);
        JobInputs {
            image: RgbImage::new(size, size),
            layers: AnnotationLayers {
                selection: blank.clone(),
                background: blank.clone(),
                symbols: blank,
                staff: None,
                text: None,
            },
        }
    }

    fn outputs(dir: &std::path::Path) -> JobOutputs {
        JobOutputs {
            models: ModelSlots {
                background: dir.join("bg.model"),
                symbols: dir.join("sym.model"),
                staff: None,
                text: None,
            },
            log_file: dir.join("job.log"),
        }
    }

    #[test]
    fn invalid_settings_fail_before_logging_or_training() {
        let _lock = test_lock();
        let dir = tempdir().unwrap();
        let trainer = CountingTrainer { calls: Cell::new(0) };
        let config = JobConfig {
            training: TrainingSettings {
                batch_size: 100,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = run_job(&inputs(4), &outputs(dir.path()), &config, &trainer).unwrap_err();
        assert!(matches!(err, JobError::Config(ConfigError::OutOfRange { .. })));
        assert_eq!(trainer.calls.get(), 0);
        assert!(!dir.path().join("job.log").exists());
    }

    #[test]
    fn successful_job_logs_to_its_file_and_releases_it() {
        let _lock = test_lock();
        let dir = tempdir().unwrap();
        let trainer = CountingTrainer { calls: Cell::new(0) };
        let before = active_log_file();
        let report = run_job(&inputs(4), &outputs(dir.path()), &JobConfig::default(), &trainer)
            .unwrap();
        assert_eq!(trainer.calls.get(), 1);
        assert_eq!(
            report.classes().collect::<Vec<_>>(),
            vec![SemanticClass::Background, SemanticClass::Symbols]
        );
        assert_eq!(active_log_file(), before);
        let log = std::fs::read_to_string(dir.path().join("job.log")).unwrap();
        assert!(log.contains("training 2 classes"));
        assert!(log.contains("Finishing the training job."));
    }

    #[test]
    fn mismatched_layer_is_logged_and_returned() {
        let _lock = test_lock();
        let dir = tempdir().unwrap();
        let trainer = CountingTrainer { calls: Cell::new(0) };
        let mut inputs = inputs(4);
        inputs.layers.text = Some(RgbaImage::new(5, 4));
        let err = run_job(&inputs, &outputs(dir.path()), &JobConfig::default(), &trainer)
            .unwrap_err();
        assert!(matches!(err, JobError::Mask(MaskError::ShapeMismatch { .. })));
        assert_eq!(trainer.calls.get(), 0);
        let log = std::fs::read_to_string(dir.path().join("job.log")).unwrap();
        assert!(log.contains("Rejected job inputs"));
    }

    #[test]
    fn undecodable_layer_is_logged_to_the_job_file() {
        let _lock = test_lock();
        let dir = tempdir().unwrap();
        let image = dir.path().join("page.png");
        RgbImage::new(4, 4).save(&image).unwrap();
        let layer = dir.path().join("layer.png");
        RgbaImage::new(4, 4).save(&layer).unwrap();
        let corrupt = dir.path().join("symbols.png");
        std::fs::write(&corrupt, b"not a png").unwrap();
        let paths = InputPaths {
            image,
            selection: layer.clone(),
            background: layer,
            symbols: corrupt,
            staff: None,
            text: None,
        };
        let trainer = CountingTrainer { calls: Cell::new(0) };

        let err = run_job_from_paths(&paths, &outputs(dir.path()), &JobConfig::default(), &trainer)
            .unwrap_err();

        assert!(matches!(err, JobError::Layer(LayerError::Decode { .. })));
        assert_eq!(trainer.calls.get(), 0);
        let log = std::fs::read_to_string(dir.path().join("job.log")).unwrap();
        assert!(log.contains("Rejected job inputs: Failed to decode symbols layer"));
    }
}
