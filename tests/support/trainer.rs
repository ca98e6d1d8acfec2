use std::{
    cell::RefCell,
    collections::BTreeMap,
    path::PathBuf,
};

use pixelwise_trainer::{
    classes::SemanticClass,
    mask::GroundTruth,
    trainer::{Trainer, TrainerError, TrainingRequest},
};

/// What the stub saw on its one call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub ground_truth: BTreeMap<SemanticClass, GroundTruth>,
    pub output_paths: BTreeMap<SemanticClass, PathBuf>,
    pub patch: (u32, u32),
}

/// Records each request and writes a placeholder model to every output path.
#[derive(Default)]
pub struct StubTrainer {
    pub calls: RefCell<Vec<RecordedCall>>,
}

impl Trainer for StubTrainer {
    fn train(&self, request: &TrainingRequest<'_>) -> Result<bool, TrainerError> {
        for path in request.output_paths.values() {
            std::fs::write(path, b"stub model").map_err(|source| TrainerError::Workspace {
                path: path.to_path_buf(),
                source,
            })?;
        }
        self.calls.borrow_mut().push(RecordedCall {
            ground_truth: request
                .ground_truth
                .iter()
                .map(|(class, mask)| (*class, (*mask).clone()))
                .collect(),
            output_paths: request
                .output_paths
                .iter()
                .map(|(class, path)| (*class, path.to_path_buf()))
                .collect(),
            patch: (request.patch_height, request.patch_width),
        });
        Ok(true)
    }
}

/// Reports failure without writing anything.
pub struct FailingTrainer;

impl Trainer for FailingTrainer {
    fn train(&self, _: &TrainingRequest<'_>) -> Result<bool, TrainerError> {
        Ok(false)
    }
}

/// Panics mid-call, like a trainer that crashes.
pub struct PanickingTrainer;

impl Trainer for PanickingTrainer {
    fn train(&self, _: &TrainingRequest<'_>) -> Result<bool, TrainerError> {
        panic!("trainer crashed")
    }
}
