use image::{DynamicImage, RgbImage};

use crate::error::OcrError;

/// Channel count the native `ocr_set_image_data` entry is always called with.
pub const RGB_CHANNELS: i32 = 3;

/// Converts any decoded image into the tightly packed RGB8 buffer the native
/// library reads (`width * 3` bytes per row, no padding).
pub fn to_packed_rgb(image: &DynamicImage) -> Result<RgbImage, OcrError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(OcrError::InvalidInput(format!(
            "image is empty ({}x{})",
            width, height
        )));
    }
    if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
        return Err(OcrError::InvalidInput(format!(
            "image dimensions {}x{} exceed the native limit",
            width, height
        )));
    }

    match image {
        DynamicImage::ImageRgb8(rgb) => Ok(rgb.clone()),
        other => Ok(other.to_rgb8()),
    }
}
