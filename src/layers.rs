//! Input images for a training job.
//!
//! The base image is decoded to RGB; every annotation layer must carry an alpha channel,
//! since class membership is encoded as full opacity.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use image::{DynamicImage, RgbImage, RgbaImage};
use thiserror::Error;

use crate::classes::SemanticClass;

/// Identifies an input layer in error messages and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Image,
    Selection,
    Class(SemanticClass),
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Selection => f.write_str("selected regions layer"),
            Self::Class(class) => write!(f, "{class} layer"),
        }
    }
}

/// Errors raised while decoding job inputs.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("Failed to decode {kind} at {path}: {source}")]
    Decode {
        kind: LayerKind,
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("The {kind} at {path} has no alpha channel")]
    MissingAlpha { kind: LayerKind, path: PathBuf },
}

/// RGBA annotation layers supplied to one job.
#[derive(Debug, Clone)]
pub struct AnnotationLayers {
    pub selection: RgbaImage,
    pub background: RgbaImage,
    pub symbols: RgbaImage,
    pub staff: Option<RgbaImage>,
    pub text: Option<RgbaImage>,
}

impl AnnotationLayers {
    /// Layer for `class`, if it was supplied.
    pub fn class_layer(&self, class: SemanticClass) -> Option<&RgbaImage> {
        match class {
            SemanticClass::Background => Some(&self.background),
            SemanticClass::Symbols => Some(&self.symbols),
            SemanticClass::Staff => self.staff.as_ref(),
            SemanticClass::Text => self.text.as_ref(),
        }
    }

    /// Every supplied layer, selection first.
    pub fn supplied(&self) -> impl Iterator<Item = (LayerKind, &RgbaImage)> {
        let classes = [
            SemanticClass::Background,
            SemanticClass::Symbols,
            SemanticClass::Staff,
            SemanticClass::Text,
        ];
        std::iter::once((LayerKind::Selection, &self.selection)).chain(
            classes
                .into_iter()
                .filter_map(|class| self.class_layer(class).map(|layer| (LayerKind::Class(class), layer))),
        )
    }
}

/// Decoded inputs of one job.
#[derive(Debug, Clone)]
pub struct JobInputs {
    pub image: RgbImage,
    pub layers: AnnotationLayers,
}

/// Filesystem locations of the job inputs.
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub image: PathBuf,
    pub selection: PathBuf,
    pub background: PathBuf,
    pub symbols: PathBuf,
    pub staff: Option<PathBuf>,
    pub text: Option<PathBuf>,
}

impl JobInputs {
    /// Decode every input named in `paths`.
    pub fn load(paths: &InputPaths) -> Result<Self, LayerError> {
        let image = decode(LayerKind::Image, &paths.image)?.to_rgb8();
        let layers = AnnotationLayers {
            selection: load_layer(LayerKind::Selection, &paths.selection)?,
            background: load_layer(LayerKind::Class(SemanticClass::Background), &paths.background)?,
            symbols: load_layer(LayerKind::Class(SemanticClass::Symbols), &paths.symbols)?,
            staff: paths
                .staff
                .as_deref()
                .map(|path| load_layer(LayerKind::Class(SemanticClass::Staff), path))
                .transpose()?,
            text: paths
                .text
                .as_deref()
                .map(|path| load_layer(LayerKind::Class(SemanticClass::Text), path))
                .transpose()?,
        };
        tracing::debug!(
            "Loaded {}x{} image with staff layer: {}, text layer: {}",
            image.width(),
            image.height(),
            layers.staff.is_some(),
            layers.text.is_some()
        );
        Ok(Self { image, layers })
    }
}

fn decode(kind: LayerKind, path: &Path) -> Result<DynamicImage, LayerError> {
    image::open(path).map_err(|source| LayerError::Decode {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

/// Decode an annotation layer, refusing images without alpha.
pub fn load_layer(kind: LayerKind, path: &Path) -> Result<RgbaImage, LayerError> {
    let decoded = decode(kind, path)?;
    if !decoded.color().has_alpha() {
        return Err(LayerError::MissingAlpha {
            kind,
            path: path.to_path_buf(),
        });
    }
    Ok(decoded.to_rgba8())
}
