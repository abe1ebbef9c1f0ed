use std::io::Cursor;

use image::{ImageFormat, ImageReader, Limits, RgbImage};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ImageLimits;

/// Allowed image formats - explicit allowlist
const ALLOWED_FORMATS: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

#[derive(Error, Debug)]
pub enum ImageInputError {
    #[error("image decode failed")]
    Decode(#[source] image::ImageError),

    #[error("input bytes empty")]
    EmptyInput,

    #[error("input too large: {size} bytes, max {max_size}")]
    InputTooLarge { size: usize, max_size: usize },

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("decompressed image too large: {width}x{height} pixels (max: {max_pixels})")]
    PixelCountTooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
}

/// Decodes raw upload bytes into an RGB image.
///
/// Checks run cheapest first: byte length, format allowlist, then header
/// dimensions, so oversized images are rejected before any pixel is decoded.
///
/// # Errors
///
/// Any failure is an [`ImageInputError`]; no partial image is returned.
#[instrument(skip(limits, raw_bytes), fields(input_size = raw_bytes.len()))]
pub fn decode_image(limits: &ImageLimits, raw_bytes: &[u8]) -> Result<RgbImage, ImageInputError> {
    if raw_bytes.is_empty() {
        return Err(ImageInputError::EmptyInput);
    }

    if raw_bytes.len() > limits.max_input_bytes {
        return Err(ImageInputError::InputTooLarge {
            size: raw_bytes.len(),
            max_size: limits.max_input_bytes,
        });
    }

    let format = validate_format(raw_bytes)?;

    let (width, height) = ImageReader::with_format(Cursor::new(raw_bytes), format)
        .into_dimensions()
        .map_err(ImageInputError::Decode)?;
    validate_dimensions(limits, width, height)?;

    let mut decode_limits = Limits::default();
    decode_limits.max_image_width = Some(limits.max_dimension);
    decode_limits.max_image_height = Some(limits.max_dimension);
    decode_limits.max_alloc = Some(limits.max_alloc_bytes);

    let mut reader = ImageReader::with_format(Cursor::new(raw_bytes), format);
    reader.limits(decode_limits);

    let image = reader.decode().map_err(ImageInputError::Decode)?.to_rgb8();
    debug!(width, height, format = ?format, "image decoded");

    Ok(image)
}

fn validate_format(raw_bytes: &[u8]) -> Result<ImageFormat, ImageInputError> {
    let format = image::guess_format(raw_bytes)
        .map_err(|_| ImageInputError::UnsupportedFormat("unrecognized".into()))?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(ImageInputError::UnsupportedFormat(format!("{format:?}")));
    }

    Ok(format)
}

/// Rejects zero-sized images and images over the configured size limits.
///
/// # Errors
///
/// `InvalidDimensions` for a zero or over-long side, `PixelCountTooLarge` past the pixel budget.
pub fn validate_dimensions(limits: &ImageLimits, width: u32, height: u32) -> Result<(), ImageInputError> {
    if width == 0 || height == 0 || width > limits.max_dimension || height > limits.max_dimension {
        return Err(ImageInputError::InvalidDimensions { width, height });
    }

    let pixel_count = u64::from(width).saturating_mul(u64::from(height));
    if pixel_count > limits.max_image_pixels {
        return Err(ImageInputError::PixelCountTooLarge {
            width,
            height,
            max_pixels: limits.max_image_pixels,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ExtendedColorType, ImageEncoder};

    fn create_test_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        buffer
    }

    #[test]
    fn decodes_png_to_rgb() {
        let png = create_test_png(40, 30);
        let image = decode_image(&ImageLimits::default(), &png).unwrap();
        assert_eq!(image.dimensions(), (40, 30));
        assert_eq!(image.get_pixel(5, 7).0, [5, 7, 12]);
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            decode_image(&ImageLimits::default(), &[]),
            Err(ImageInputError::EmptyInput)
        ));
    }

    #[test]
    fn rejects_garbage() {
        let result = decode_image(&ImageLimits::default(), &[0xFF, 0xFE, 0x00]);
        assert!(matches!(result, Err(ImageInputError::UnsupportedFormat(_))));
    }

    #[test]
    fn rejects_truncated_png() {
        let png = create_test_png(16, 16);
        let result = decode_image(&ImageLimits::default(), &png[..png.len() / 2]);
        assert!(matches!(result, Err(ImageInputError::Decode(_))));
    }

    #[test]
    fn rejects_gif() {
        let gif_header = [0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00];
        let result = decode_image(&ImageLimits::default(), &gif_header);
        assert!(matches!(result, Err(ImageInputError::UnsupportedFormat(_))));
    }

    #[test]
    fn rejects_oversized_input() {
        let limits = ImageLimits {
            max_input_bytes: 100,
            ..Default::default()
        };
        let data = vec![0u8; 101];
        assert!(matches!(
            decode_image(&limits, &data),
            Err(ImageInputError::InputTooLarge { size: 101, max_size: 100 })
        ));
    }

    #[test]
    fn rejects_pixel_bomb_before_decode() {
        let limits = ImageLimits {
            max_image_pixels: 100,
            ..Default::default()
        };
        let png = create_test_png(20, 20);
        assert!(matches!(
            decode_image(&limits, &png),
            Err(ImageInputError::PixelCountTooLarge { width: 20, height: 20, .. })
        ));
    }

    #[test]
    fn zero_dimensions_are_invalid() {
        let limits = ImageLimits::default();
        assert!(matches!(
            validate_dimensions(&limits, 0, 10),
            Err(ImageInputError::InvalidDimensions { width: 0, height: 10 })
        ));
        assert!(validate_dimensions(&limits, 10, 0).is_err());
        assert!(validate_dimensions(&limits, 1, 1).is_ok());
    }

    #[test]
    fn over_long_side_is_invalid() {
        let limits = ImageLimits {
            max_dimension: 64,
            ..Default::default()
        };
        assert!(validate_dimensions(&limits, 65, 1).is_err());
        assert!(validate_dimensions(&limits, 64, 64).is_ok());
    }
}
