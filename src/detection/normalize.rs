use image::GrayImage;
use image::imageops::{crop_imm, overlay};
use tracing::debug;

use crate::detection::preprocessing::{self, Polarity};
use crate::error::Result;
use crate::models::{NormalizedTensor, PreviewImage, RawImage, TENSOR_SIZE};

/// Contrast settings for the first normalization step.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeParams {
    pub clip_limit: f32,
    pub tile_grid: u32,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: 8,
        }
    }
}

/// Normalizer output: classifier input plus the 8-bit grid it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub tensor: NormalizedTensor,
    pub pixels: GrayImage,
    pub preview: PreviewImage,
}

/// Turn one raw digit image into the canonical 28x28 tensor.
pub fn normalize(image: &RawImage, params: NormalizeParams) -> Result<Normalized> {
    normalize_with_polarity(image, params, Polarity::detect(image))
}

/// Same as [`normalize`] with the stroke polarity already known, as for
/// crops cut out of a larger image.
pub fn normalize_with_polarity(
    image: &RawImage,
    params: NormalizeParams,
    polarity: Polarity,
) -> Result<Normalized> {
    // 1. Even out lighting
    let equalized = preprocessing::apply_clahe(image, params.clip_limit, params.tile_grid);

    // 2. Strokes become foreground
    let binary = preprocessing::binarize(&equalized, polarity);

    // 3. Drop specks
    let denoised = preprocessing::remove_speckles(&binary);

    // 4. Thicken strokes so they survive the downscale
    let thick = preprocessing::dilate_2x2(&denoised);

    // 5. Crop around all foreground at once
    let Some(bbox) = preprocessing::foreground_bounds(&thick) else {
        debug!(
            width = image.width(),
            height = image.height(),
            "No foreground after binarization, using blank tensor"
        );
        return Ok(Normalized {
            tensor: NormalizedTensor::zeros(),
            pixels: GrayImage::new(TENSOR_SIZE, TENSOR_SIZE),
            preview: PreviewImage::blank()?,
        });
    };
    let digit = crop_imm(&thick, bbox.x, bbox.y, bbox.width, bbox.height).to_image();

    // 6. Pad to a square; odd differences leave the extra pixel on the right/bottom
    let size = bbox.width.max(bbox.height);
    let mut padded = GrayImage::new(size, size);
    let dx = (size - bbox.width) / 2;
    let dy = (size - bbox.height) / 2;
    overlay(&mut padded, &digit, dx as i64, dy as i64);

    // 7. Shrink to the classifier size
    let resized = preprocessing::resize_area(&padded, TENSOR_SIZE, TENSOR_SIZE);

    debug!(
        crop_x = bbox.x,
        crop_y = bbox.y,
        crop_w = bbox.width,
        crop_h = bbox.height,
        "Digit normalized"
    );

    // 8. Scale into [0, 1]; 9. keep a lossless preview
    Ok(Normalized {
        tensor: NormalizedTensor::from_image(&resized),
        preview: PreviewImage::encode(&resized)?,
        pixels: resized,
    })
}
