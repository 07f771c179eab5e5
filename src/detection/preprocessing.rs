use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::median_filter;
use imageproc::morphology::{Mask, grayscale_dilate};

use crate::models::BoundingBox;

const HIST_BINS: usize = 256;
/// Share of frame pixels that must fall in the dark Otsu class before the
/// image is read as light strokes on a dark board.
const DARK_FRAME_RATIO: f64 = 0.95;

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into `tile_grid` x `tile_grid` tiles (padded by
/// reflection so every tile has the same size). Each tile gets its own
/// clipped-histogram lookup table and every output pixel blends the tables
/// of the four nearest tile centres bilinearly.
pub fn apply_clahe(img: &GrayImage, clip_limit: f32, tile_grid: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let grid = tile_grid.max(1) as usize;
    let tile_w = (width as usize).div_ceil(grid);
    let tile_h = (height as usize).div_ceil(grid);
    let tile_area = tile_w * tile_h;

    let clip = ((clip_limit * tile_area as f32 / HIST_BINS as f32) as usize).max(1);
    let lut_scale = 255.0 / tile_area as f32;

    let mut luts = vec![[0u8; HIST_BINS]; grid * grid];
    for ty in 0..grid {
        for tx in 0..grid {
            let mut hist = [0usize; HIST_BINS];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let sy = reflect_101(y as i64, height as i64);
                for x in tx * tile_w..(tx + 1) * tile_w {
                    let sx = reflect_101(x as i64, width as i64);
                    hist[img.get_pixel(sx, sy)[0] as usize] += 1;
                }
            }
            clip_histogram(&mut hist, clip);

            let lut = &mut luts[ty * grid + tx];
            let mut sum = 0usize;
            for (bin, count) in hist.iter().enumerate() {
                sum += count;
                lut[bin] = (sum as f32 * lut_scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    let last = grid as i64 - 1;

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        let tyf = y as f32 * inv_th - 0.5;
        let ty1 = tyf.floor() as i64;
        let ya = tyf - ty1 as f32;
        let (ty1, ty2) = (ty1.max(0) as usize, (ty1 + 1).min(last) as usize);

        for x in 0..width {
            let txf = x as f32 * inv_tw - 0.5;
            let tx1 = txf.floor() as i64;
            let xa = txf - tx1 as f32;
            let (tx1, tx2) = (tx1.max(0) as usize, (tx1 + 1).min(last) as usize);

            let v = img.get_pixel(x, y)[0] as usize;
            let top = luts[ty1 * grid + tx1][v] as f32 * (1.0 - xa) + luts[ty1 * grid + tx2][v] as f32 * xa;
            let bottom = luts[ty2 * grid + tx1][v] as f32 * (1.0 - xa) + luts[ty2 * grid + tx2][v] as f32 * xa;
            let blended = top * (1.0 - ya) + bottom * ya;
            output.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }

    output
}

/// Clip every bin at `limit` and hand the excess back evenly.
fn clip_histogram(hist: &mut [usize; HIST_BINS], limit: usize) {
    let mut clipped = 0;
    for count in hist.iter_mut() {
        if *count > limit {
            clipped += *count - limit;
            *count = limit;
        }
    }

    let batch = clipped / HIST_BINS;
    let residual = clipped - batch * HIST_BINS;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual > 0 {
        let step = (HIST_BINS / residual).max(1);
        for bin in (0..HIST_BINS).step_by(step).take(residual) {
            hist[bin] += 1;
        }
    }
}

/// Mirror an out-of-range index back into `0..len` without repeating the edge.
fn reflect_101(mut i: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * len - 2 - i;
        } else {
            return i as u32;
        }
    }
}

/// Which side of the Otsu split holds the strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Ink on paper; the binarization is inverted.
    DarkOnLight,
    /// Chalk on a board, MNIST style.
    LightOnDark,
}

impl Polarity {
    /// Ink on paper unless the image frame is (almost) entirely in the dark
    /// Otsu class. A light page always shows somewhere along the frame,
    /// even when the ink covers most of the image.
    pub fn detect(img: &GrayImage) -> Self {
        if is_uniform(img) {
            return Polarity::DarkOnLight;
        }
        let level = otsu_level(img);
        let (width, height) = img.dimensions();

        let mut frame = 0usize;
        let mut dark = 0usize;
        for (x, y, pixel) in img.enumerate_pixels() {
            if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                frame += 1;
                if pixel[0] <= level {
                    dark += 1;
                }
            }
        }

        if dark as f64 >= DARK_FRAME_RATIO * frame as f64 {
            Polarity::LightOnDark
        } else {
            Polarity::DarkOnLight
        }
    }
}

fn is_uniform(img: &GrayImage) -> bool {
    let mut samples = img.pixels().map(|p| p[0]);
    match samples.next() {
        Some(first) => samples.all(|v| v == first),
        None => true,
    }
}

/// Otsu threshold mapping strokes to 255 and background to 0.
///
/// A single-intensity image has nothing to separate and binarizes to all
/// background.
pub fn binarize(img: &GrayImage, polarity: Polarity) -> GrayImage {
    let mut output = GrayImage::new(img.width(), img.height());
    if is_uniform(img) {
        return output;
    }

    let level = otsu_level(img);
    for (x, y, pixel) in img.enumerate_pixels() {
        let dark = pixel[0] <= level;
        let stroke = match polarity {
            Polarity::DarkOnLight => dark,
            Polarity::LightOnDark => !dark,
        };
        output.put_pixel(x, y, Luma([if stroke { 255u8 } else { 0u8 }]));
    }
    output
}

/// 3x3 median filter to drop isolated speckles.
pub fn remove_speckles(img: &GrayImage) -> GrayImage {
    median_filter(img, 1, 1)
}

/// One pass of grey dilation with a 2x2 square anchored at its bottom-right
/// cell: each output pixel is the max over itself and its up/left neighbours.
pub fn dilate_2x2(img: &GrayImage) -> GrayImage {
    let square = GrayImage::from_pixel(2, 2, Luma([255u8]));
    grayscale_dilate(img, &Mask::from_image(&square, 1, 1))
}

/// Smallest box enclosing every non-zero pixel, or `None` for an empty image.
pub fn foreground_bounds(img: &GrayImage) -> Option<BoundingBox> {
    let (width, height) = img.dimensions();
    let mut min_x = width;
    let mut min_y = height;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut has_content = false;

    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[0] > 0 {
            has_content = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    has_content.then(|| BoundingBox::from_corners(min_x, min_y, max_x, max_y))
}

/// Resize with pixel-area relation.
///
/// Shrinking averages every source pixel by the fraction of it covered by
/// the destination pixel. Enlarging falls back to linear interpolation with
/// area-style offsets, which keeps hard edges mostly intact.
pub fn resize_area(img: &GrayImage, new_width: u32, new_height: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if (width, height) == (new_width, new_height) {
        return img.clone();
    }

    let x_weights = axis_weights(width, new_width);
    let y_weights = axis_weights(height, new_height);

    let mut output = GrayImage::new(new_width, new_height);
    for (dy, row) in y_weights.iter().enumerate() {
        for (dx, col) in x_weights.iter().enumerate() {
            let mut acc = 0.0f64;
            for &(sy, wy) in row {
                for &(sx, wx) in col {
                    acc += img.get_pixel(sx, sy)[0] as f64 * wy * wx;
                }
            }
            output.put_pixel(dx as u32, dy as u32, Luma([acc.round().clamp(0.0, 255.0) as u8]));
        }
    }
    output
}

/// Per destination index, the contributing source indices and their weights
/// (weights sum to one).
fn axis_weights(src: u32, dst: u32) -> Vec<Vec<(u32, f64)>> {
    let scale = src as f64 / dst as f64;

    if scale >= 1.0 {
        return (0..dst)
            .map(|d| {
                let start = d as f64 * scale;
                let end = start + scale;
                let mut weights = Vec::new();
                let mut s = start.floor() as u32;
                while (s as f64) < end && s < src {
                    let overlap = end.min(s as f64 + 1.0) - start.max(s as f64);
                    if overlap > 1e-9 {
                        weights.push((s, overlap / scale));
                    }
                    s += 1;
                }
                weights
            })
            .collect();
    }

    let inv_scale = dst as f64 / src as f64;
    (0..dst)
        .map(|d| {
            let sx = (d as f64 * scale).floor() as i64;
            let frac = (d + 1) as f64 - (sx + 1) as f64 * inv_scale;
            let mut frac = if frac <= 0.0 { 0.0 } else { frac - frac.floor() };
            let mut s = sx;
            if s < 0 {
                s = 0;
                frac = 0.0;
            }
            if s >= src as i64 - 1 {
                s = src as i64 - 1;
                frac = 0.0;
            }
            let s = s as u32;
            if frac == 0.0 {
                vec![(s, 1.0)]
            } else {
                vec![(s, 1.0 - frac), (s + 1, frac)]
            }
        })
        .collect()
}
