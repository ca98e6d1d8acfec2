use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    io::{BufRead, BufReader, ErrorKind, Read},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
};

use image::{GrayImage, Luma};
use serde::Serialize;
use tempfile::TempDir;

use super::{Trainer, TrainerError, TrainingRequest};
use crate::{
    classes::SemanticClass,
    config::RedirectLevel,
    log_sink::record_redirected,
    mask::GroundTruth,
};

const MANIFEST_FILE_NAME: &str = "manifest.json";
const IMAGE_FILE_NAME: &str = "image.png";

/// Runs an external trainer program on a JSON manifest.
///
/// The base image and each ground-truth mask are written as PNG files into a scratch
/// directory next to `manifest.json`; the manifest path is passed as the last argument.
/// Masks are 8-bit grayscale with 255 marking labelled pixels. Each line the program
/// prints is recorded in the active log sink. Exit status zero means success.
#[derive(Debug, Clone)]
pub struct CommandTrainer {
    program: OsString,
    args: Vec<OsString>,
    redirect_level: RedirectLevel,
    scratch_root: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    image: PathBuf,
    ground_truth: BTreeMap<SemanticClass, PathBuf>,
    patch_height: u32,
    patch_width: u32,
    output_paths: &'a BTreeMap<SemanticClass, &'a Path>,
    epochs: u32,
    max_samples_per_class: u32,
    batch_size: u32,
}

impl CommandTrainer {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            redirect_level: RedirectLevel::default(),
            scratch_root: None,
        }
    }

    /// Append an argument placed before the manifest path.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Level used when recording the program's output lines.
    pub fn with_redirect_level(mut self, level: RedirectLevel) -> Self {
        self.redirect_level = level;
        self
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    fn scratch_dir(&self) -> Result<TempDir, TrainerError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pixelwise-trainer-");
        let created = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        created.map_err(|source| TrainerError::Workspace {
            path: self
                .scratch_root
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            source,
        })
    }

    fn write_inputs(
        &self,
        dir: &Path,
        request: &TrainingRequest<'_>,
    ) -> Result<PathBuf, TrainerError> {
        let image_path = dir.join(IMAGE_FILE_NAME);
        request
            .image
            .save(&image_path)
            .map_err(|source| TrainerError::Encode {
                what: "base image".to_string(),
                source,
            })?;

        let mut ground_truth = BTreeMap::new();
        for (class, mask) in &request.ground_truth {
            let path = dir.join(format!("{}.png", class.as_str()));
            mask_to_image(mask)
                .save(&path)
                .map_err(|source| TrainerError::Encode {
                    what: format!("{class} ground truth"),
                    source,
                })?;
            ground_truth.insert(*class, path);
        }

        let manifest = Manifest {
            image: image_path,
            ground_truth,
            patch_height: request.patch_height,
            patch_width: request.patch_width,
            output_paths: &request.output_paths,
            epochs: request.epochs,
            max_samples_per_class: request.max_samples_per_class,
            batch_size: request.batch_size,
        };
        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        let json = serde_json::to_vec_pretty(&manifest)?;
        fs::write(&manifest_path, json).map_err(|source| TrainerError::Workspace {
            path: manifest_path.clone(),
            source,
        })?;
        Ok(manifest_path)
    }
}

impl Trainer for CommandTrainer {
    fn train(&self, request: &TrainingRequest<'_>) -> Result<bool, TrainerError> {
        let scratch = self.scratch_dir()?;
        let manifest_path = self.write_inputs(scratch.path(), request)?;
        let program = self.program.to_string_lossy().into_owned();
        tracing::info!(
            "Running trainer `{program}` with manifest {}",
            manifest_path.display()
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&manifest_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TrainerError::Spawn {
                program: program.clone(),
                source,
            })?;

        let level = self.redirect_level;
        let stderr_reader = child.stderr.take().map(|stderr| {
            let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());
            thread::spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || {
                    forward_lines(stderr, "stderr", level)
                })
            })
        });
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, "stdout", level);
        }
        let status = child.wait().map_err(|source| TrainerError::Spawn {
            program: program.clone(),
            source,
        })?;
        if let Some(reader) = stderr_reader {
            reader
                .join()
                .map_err(|_| TrainerError::Crashed("stderr reader panicked".to_string()))?;
        }

        if status.success() {
            tracing::info!("Trainer `{program}` finished");
        } else {
            tracing::error!("Trainer `{program}` exited with {status}");
        }
        Ok(status.success())
    }
}

/// Record every line of `reader` until EOF.
///
/// Lines are decoded lossily and the pipe is drained to the end, so the program never
/// sees a closed stream while it is still writing.
fn forward_lines(reader: impl Read, stream: &str, level: RedirectLevel) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                record_redirected(level, stream, line.trim_end_matches(['\n', '\r']));
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                tracing::debug!("Stopped reading trainer {stream}: {err}");
                break;
            }
        }
    }
}

fn mask_to_image(mask: &GroundTruth) -> GrayImage {
    let (height, width) = mask.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        if mask[[y as usize, x as usize]] {
            Luma([u8::MAX])
        } else {
            Luma([0])
        }
    })
}
