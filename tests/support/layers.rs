use image::{Rgb, RgbImage, Rgba, RgbaImage};
use pixelwise_trainer::{layers::AnnotationLayers, layers::JobInputs};

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub const fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

pub fn opaque_in(size: u32, rect: Rect) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        if rect.contains(x, y) {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 0])
        }
    })
}

pub fn fully_opaque(size: u32) -> RgbaImage {
    opaque_in(size, Rect::new(0, 0, size, size))
}

/// 100x100 page with background top-left and symbols bottom-right.
pub fn quadrant_inputs(selection: RgbaImage) -> JobInputs {
    JobInputs {
        image: RgbImage::from_pixel(100, 100, Rgb([240, 235, 220])),
        layers: AnnotationLayers {
            selection,
            background: opaque_in(100, Rect::new(0, 0, 50, 50)),
            symbols: opaque_in(100, Rect::new(50, 50, 100, 100)),
            staff: None,
            text: None,
        },
    }
}
