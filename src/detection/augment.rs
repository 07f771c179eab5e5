use image::{GrayImage, ImageBuffer, Luma};
use imageproc::geometric_transformations::{Interpolation, rotate as rotate_about};

use crate::detection::preprocessing::dilate_2x2;
use crate::models::{NormalizedTensor, TENSOR_LEN, TENSOR_SIZE};

/// Pixel offsets (dx, dy) of the translated variants, in output order.
pub const SHIFTS: [(i32, i32); 4] = [(-2, 0), (2, 0), (0, -2), (0, 2)];
/// Rotation angles in degrees, positive is counter-clockwise on screen.
pub const ROTATIONS: [f32; 2] = [-10.0, 10.0];
/// Number of variants produced by [`augment`].
pub const VARIANT_COUNT: usize = 1 + SHIFTS.len() + ROTATIONS.len() + 1;

/// Perturbed copies of a tensor in a fixed order: identity, the four
/// shifts, the two rotations, then a stroke-thickened copy.
pub fn augment(tensor: &NormalizedTensor) -> Vec<NormalizedTensor> {
    let mut variants = Vec::with_capacity(VARIANT_COUNT);
    variants.push(tensor.clone());
    for (dx, dy) in SHIFTS {
        variants.push(translate(tensor, dx, dy));
    }
    for angle in ROTATIONS {
        variants.push(rotate(tensor, angle));
    }
    variants.push(thicken(tensor));
    variants
}

/// Move content by whole pixels, filling exposed cells with zero.
///
/// Written out by hand because `imageproc::geometric_transformations::translate`
/// replicates edge pixels instead of zero filling.
pub fn translate(tensor: &NormalizedTensor, dx: i32, dy: i32) -> NormalizedTensor {
    let size = TENSOR_SIZE as i32;
    let mut out = vec![0.0f32; TENSOR_LEN];
    for y in 0..size {
        let sy = y - dy;
        if !(0..size).contains(&sy) {
            continue;
        }
        for x in 0..size {
            let sx = x - dx;
            if (0..size).contains(&sx) {
                out[(y * size + x) as usize] = tensor.get(sx as u32, sy as u32);
            }
        }
    }
    from_samples(out)
}

/// Rotate about the grid centre without growing the canvas. Samples that
/// fall outside the source are zero.
pub fn rotate(tensor: &NormalizedTensor, degrees: f32) -> NormalizedTensor {
    let center = (TENSOR_SIZE as f32 - 1.0) / 2.0;
    let grid: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(TENSOR_SIZE, TENSOR_SIZE, |x, y| Luma([tensor.get(x, y)]));

    // imageproc turns clockwise on screen for positive angles
    let rotated = rotate_about(
        &grid,
        (center, center),
        -degrees.to_radians(),
        Interpolation::Bilinear,
        Luma([0.0f32]),
    );
    from_samples(rotated.into_raw())
}

/// Back to bytes (truncating), one 2x2 dilation, back to [0, 1].
pub fn thicken(tensor: &NormalizedTensor) -> NormalizedTensor {
    let bytes = GrayImage::from_fn(TENSOR_SIZE, TENSOR_SIZE, |x, y| {
        Luma([(tensor.get(x, y) * 255.0) as u8])
    });
    NormalizedTensor::from_image(&dilate_2x2(&bytes))
}

fn from_samples(values: Vec<f32>) -> NormalizedTensor {
    // Length is fixed by construction, so this cannot fail
    NormalizedTensor::from_values(values).unwrap_or_else(|_| NormalizedTensor::zeros())
}
