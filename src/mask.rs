//! Ground-truth masks derived from annotation alpha.
//!
//! A pixel belongs to a class when its alpha is fully opaque. Symbols, staff and text
//! masks are clipped to the selected regions. The background layer is produced already
//! clipped by the annotation tool, so only its own alpha is thresholded.

use image::RgbaImage;
use ndarray::{Array2, Zip};
use thiserror::Error;

use crate::{
    classes::SemanticClass,
    layers::{AnnotationLayers, LayerKind},
};

/// Alpha value that marks a labelled pixel.
pub const OPAQUE: u8 = u8::MAX;

/// Boolean per-pixel labels for one class, shaped `(height, width)`.
pub type GroundTruth = Array2<bool>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskError {
    #[error("The {layer} is {} but the image is {}", format_dims(.found), format_dims(.expected))]
    ShapeMismatch {
        layer: LayerKind,
        expected: (u32, u32),
        found: (u32, u32),
    },
}

fn format_dims(dims: &(u32, u32)) -> String {
    format!("{}x{}", dims.0, dims.1)
}

/// Pixels inside the user-curated training region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMask(Array2<bool>);

impl SelectionMask {
    pub fn from_layer(layer: &RgbaImage) -> Self {
        Self(alpha_mask(layer))
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.0
    }

    /// Clear every pixel of `mask` that lies outside the selection.
    fn restrict(&self, mask: &mut Array2<bool>) {
        Zip::from(mask)
            .and(&self.0)
            .for_each(|labelled, &selected| *labelled &= selected);
    }
}

/// `true` wherever `layer` is fully opaque.
pub fn alpha_mask(layer: &RgbaImage) -> Array2<bool> {
    let (width, height) = layer.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        layer.get_pixel(x as u32, y as u32)[3] == OPAQUE
    })
}

/// Ground truth for one class layer.
pub fn class_ground_truth(
    class: SemanticClass,
    layer: &RgbaImage,
    selection: &SelectionMask,
) -> GroundTruth {
    let mut mask = alpha_mask(layer);
    if class != SemanticClass::Background {
        selection.restrict(&mut mask);
    }
    mask
}

/// Masks for every supplied class layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMasks {
    pub background: GroundTruth,
    pub symbols: GroundTruth,
    pub staff: Option<GroundTruth>,
    pub text: Option<GroundTruth>,
}

impl ClassMasks {
    pub fn get(&self, class: SemanticClass) -> Option<&GroundTruth> {
        match class {
            SemanticClass::Background => Some(&self.background),
            SemanticClass::Symbols => Some(&self.symbols),
            SemanticClass::Staff => self.staff.as_ref(),
            SemanticClass::Text => self.text.as_ref(),
        }
    }

    /// Whether a layer for `class` was supplied.
    pub fn has(&self, class: SemanticClass) -> bool {
        self.get(class).is_some()
    }

    pub(crate) fn take(&mut self, class: SemanticClass) -> Option<GroundTruth> {
        match class {
            SemanticClass::Background => Some(std::mem::take(&mut self.background)),
            SemanticClass::Symbols => Some(std::mem::take(&mut self.symbols)),
            SemanticClass::Staff => self.staff.take(),
            SemanticClass::Text => self.text.take(),
        }
    }
}

/// Check every supplied layer against the base image size.
pub fn check_shapes(image_dims: (u32, u32), layers: &AnnotationLayers) -> Result<(), MaskError> {
    for (layer, buffer) in layers.supplied() {
        let found = buffer.dimensions();
        if found != image_dims {
            return Err(MaskError::ShapeMismatch {
                layer,
                expected: image_dims,
                found,
            });
        }
    }
    Ok(())
}

/// Derive ground truth for every supplied class.
///
/// All shapes are checked before any class is composed.
pub fn derive_class_masks(
    image_dims: (u32, u32),
    layers: &AnnotationLayers,
) -> Result<ClassMasks, MaskError> {
    check_shapes(image_dims, layers)?;
    let selection = SelectionMask::from_layer(&layers.selection);
    let derive = |class: SemanticClass, layer: &RgbaImage| class_ground_truth(class, layer, &selection);
    Ok(ClassMasks {
        background: derive(SemanticClass::Background, &layers.background),
        symbols: derive(SemanticClass::Symbols, &layers.symbols),
        staff: layers
            .staff
            .as_ref()
            .map(|layer| derive(SemanticClass::Staff, layer)),
        text: layers
            .text
            .as_ref()
            .map(|layer| derive(SemanticClass::Text, layer)),
    })
}
