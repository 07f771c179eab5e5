use image::{GrayImage, Luma};
use image::imageops::crop_imm;
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::detection::preprocessing::{self, Polarity};
use crate::models::{BoundingBox, Contour, RawImage};

/// Foreground components that are not nested inside another component's hole.
///
/// Foreground is labelled with 8-connectivity and background with the dual
/// 4-connectivity. A foreground component is external when it touches the
/// image border or borders a background region that reaches the border.
pub fn find_external_contours(binary: &GrayImage) -> Vec<Contour> {
    let (width, height) = binary.dimensions();
    let foreground = connected_components(binary, Connectivity::Eight, Luma([0u8]));
    let background = connected_components(binary, Connectivity::Four, Luma([255u8]));

    let on_border = |x: u32, y: u32| x == 0 || y == 0 || x + 1 == width || y + 1 == height;

    // Background regions connected to the outside of the image
    let mut outer: HashSet<u32> = HashSet::new();
    for (x, y, label) in background.enumerate_pixels() {
        if label[0] != 0 && on_border(x, y) {
            outer.insert(label[0]);
        }
    }

    // Keyed by label so output order is deterministic
    let mut regions: BTreeMap<u32, Contour> = BTreeMap::new();
    let mut external: HashSet<u32> = HashSet::new();

    for (x, y, label) in foreground.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue;
        }

        regions
            .entry(label_val)
            .and_modify(|c| {
                c.min_x = c.min_x.min(x);
                c.min_y = c.min_y.min(y);
                c.max_x = c.max_x.max(x);
                c.max_y = c.max_y.max(y);
                c.pixel_count += 1;
            })
            .or_insert(Contour {
                label: label_val,
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                pixel_count: 1,
            });

        if external.contains(&label_val) {
            continue;
        }
        let touches_outside = on_border(x, y)
            || neighbours4(x, y, width, height)
                .any(|(nx, ny)| outer.contains(&background.get_pixel(nx, ny)[0]));
        if touches_outside {
            external.insert(label_val);
        }
    }

    regions
        .into_values()
        .filter(|c| external.contains(&c.label))
        .collect()
}

fn neighbours4(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let candidates = [
        (x.checked_sub(1), Some(y)),
        ((x + 1 < width).then_some(x + 1), Some(y)),
        (Some(x), y.checked_sub(1)),
        (Some(x), (y + 1 < height).then_some(y + 1)),
    ];
    candidates
        .into_iter()
        .filter_map(|(nx, ny)| Some((nx?, ny?)))
}

/// Split a raw image into per-digit crops, left to right.
///
/// Crops come from the original grayscale so each digit can be normalized
/// on its own. Components smaller than `min_size` in either dimension are
/// treated as noise.
pub fn segment(image: &RawImage, min_size: u32) -> Vec<(BoundingBox, RawImage)> {
    segment_with_polarity(image, min_size, Polarity::detect(image))
}

pub fn segment_with_polarity(
    image: &RawImage,
    min_size: u32,
    polarity: Polarity,
) -> Vec<(BoundingBox, RawImage)> {
    let binary = preprocessing::binarize(image, polarity);

    let mut digits: Vec<(BoundingBox, RawImage)> = find_external_contours(&binary)
        .into_iter()
        .filter(|c| c.width() >= min_size && c.height() >= min_size)
        .map(|c| {
            debug!(x = c.min_x, y = c.min_y, pixels = c.area(), "Component kept");
            let bbox = c.bounding_box();
            let crop = crop_imm(image, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
            (bbox, crop)
        })
        .collect();

    digits.sort_by_key(|(bbox, _)| bbox.x);
    digits
}
