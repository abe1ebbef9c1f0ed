use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::boxes::BoundingBox;
use crate::error::DetectError;
use crate::image_input::ImageInputError;

/// Scale and padding recorded by [`letterbox`], sufficient to invert it.
///
/// Invariants: `scale > 0`, `0 <= pad_x < target.0`, `0 <= pad_y < target.1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LetterboxParams {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    target: (u32, u32),
}

impl LetterboxParams {
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[must_use]
    pub fn pad_x(&self) -> f32 {
        self.pad_x
    }

    #[must_use]
    pub fn pad_y(&self) -> f32 {
        self.pad_y
    }

    #[must_use]
    pub fn target(&self) -> (u32, u32) {
        self.target
    }

    /// Maps a canvas-space box back to original-image pixels.
    #[must_use]
    pub fn unletterbox(&self, bbox: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: (bbox.x1 - self.pad_x) / self.scale,
            y1: (bbox.y1 - self.pad_y) / self.scale,
            x2: (bbox.x2 - self.pad_x) / self.scale,
            y2: (bbox.y2 - self.pad_y) / self.scale,
            score: bbox.score,
        }
    }
}

/// Letterboxed canvas plus the parameters that produced it.
#[derive(Debug, Clone)]
pub struct Letterboxed {
    pub canvas: RgbImage,
    pub params: LetterboxParams,
}

/// Resizes `image` into a `target` canvas, preserving aspect ratio.
///
/// The image is scaled by `min(Tw / w, Th / h)` with bilinear resampling (up
/// or down), centered, and the remaining border is filled with `pad_color`.
/// Padding is split evenly and may be fractional; the resized image is pasted
/// at the truncated integer offset.
///
/// # Errors
///
/// `InvalidImage` for a zero-sized source, `InvalidConfig` for a zero-sized target.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn letterbox(image: &RgbImage, target: (u32, u32), pad_color: [u8; 3]) -> Result<Letterboxed, DetectError> {
    let (orig_w, orig_h) = image.dimensions();
    let (target_w, target_h) = target;

    if orig_w == 0 || orig_h == 0 {
        return Err(ImageInputError::InvalidDimensions {
            width: orig_w,
            height: orig_h,
        }
        .into());
    }

    if target_w == 0 || target_h == 0 {
        return Err(DetectError::InvalidConfig(format!(
            "letterbox target must be non-zero, got {target_w}x{target_h}"
        )));
    }

    let scale = (target_w as f32 / orig_w as f32).min(target_h as f32 / orig_h as f32);
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ImageInputError::InvalidDimensions {
            width: orig_w,
            height: orig_h,
        }
        .into());
    }

    // Extreme aspect ratios can round a side to zero
    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_w);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_h);

    let pad_x = (target_w - new_w) as f32 / 2.0;
    let pad_y = (target_h - new_h) as f32 / 2.0;

    let resized = if (new_w, new_h) == (orig_w, orig_h) {
        image.clone()
    } else {
        image::imageops::resize(image, new_w, new_h, FilterType::Triangle)
    };

    let mut canvas = RgbImage::from_pixel(target_w, target_h, Rgb(pad_color));
    image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    debug!(scale, pad_x, pad_y, new_w, new_h, "letterboxed");

    Ok(Letterboxed {
        canvas,
        params: LetterboxParams {
            scale,
            pad_x,
            pad_y,
            target,
        },
    })
}

/// Inverse of [`letterbox`] for one box: `(v - pad) / scale` on every coordinate.
#[must_use]
pub fn unletterbox(bbox: &BoundingBox, params: &LetterboxParams) -> BoundingBox {
    params.unletterbox(bbox)
}

/// Converts a canvas into the `[1, 3, H, W]` channel-first tensor the detector
/// expects, with every value divided by 255.
#[must_use]
pub fn to_input_tensor(canvas: &RgbImage) -> Array4<f32> {
    let (width, height) = canvas.dimensions();
    let (width, height) = (width as usize, height as usize);
    let mut tensor = Array4::<f32>::zeros((1, 3, height, width));

    for (x, y, pixel) in canvas.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = f32::from(pixel[0]) / 255.0;
        tensor[[0, 1, y, x]] = f32::from(pixel[1]) / 255.0;
        tensor[[0, 2, y, x]] = f32::from(pixel[2]) / 255.0;
    }

    tensor
}
