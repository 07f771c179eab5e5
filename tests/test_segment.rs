//! Integration tests for multi-digit segmentation.
//!
//! Tests cover:
//! - Single square scenario on a dark background
//! - Noise filtering and left-to-right ordering
//! - Components nested in a hole are not reported separately
//! - Crops come from the original grayscale

mod common;

use digitread::detection::contours::{find_external_contours, segment};
use image::Luma;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use common::*;

#[test]
fn test_single_square_on_black() {
    let mut img = RawImage::new(28, 28);
    draw_filled_rect_mut(&mut img, Rect::at(9, 6).of_size(10, 10), Luma([255u8]));

    let digits = segment(&img, 10);

    assert_eq!(digits.len(), 1);
    let (bbox, crop) = &digits[0];
    assert_eq!(*bbox, BoundingBox { x: 9, y: 6, width: 10, height: 10 });
    assert_eq!(crop.dimensions(), (10, 10));
}

#[test]
fn test_digits_sorted_left_to_right() {
    let img = three_digit_page();
    let digits = segment(&img, 10);

    assert_eq!(digits.len(), 3);
    let xs: Vec<u32> = digits.iter().map(|(bbox, _)| bbox.x).collect();
    assert!(xs.windows(2).all(|w| w[0] <= w[1]), "not sorted: {:?}", xs);
    assert_eq!(digits[0].0, BoundingBox { x: 20, y: 15, width: 10, height: 50 });
}

#[test]
fn test_boxes_stay_inside_image_and_above_noise_floor() {
    let mut img = three_digit_page();
    // Specks and a thin scratch that must be filtered
    draw_bar(&mut img, 70, 5, 3, 3);
    draw_bar(&mut img, 150, 70, 40, 4);
    img.put_pixel(5, 5, INK);

    let (width, height) = img.dimensions();
    let digits = segment(&img, 10);

    assert_eq!(digits.len(), 3);
    for (bbox, crop) in &digits {
        assert!(bbox.fits_within(width, height), "{:?} escapes the image", bbox);
        assert!(bbox.width >= 10 && bbox.height >= 10);
        assert_eq!(crop.dimensions(), (bbox.width, bbox.height));
    }
}

#[test]
fn test_crop_is_taken_from_grayscale_original() {
    let mut img = blank_page(60, 40);
    draw_filled_rect_mut(&mut img, Rect::at(10, 10).of_size(20, 20), Luma([40u8]));
    img.put_pixel(15, 15, Luma([5u8]));

    let digits = segment(&img, 10);

    assert_eq!(digits.len(), 1);
    let (bbox, crop) = &digits[0];
    assert_eq!((bbox.x, bbox.y), (10, 10));
    assert_eq!(crop.get_pixel(0, 0)[0], 40);
    assert_eq!(crop.get_pixel(5, 5)[0], 5);
}

#[test]
fn test_component_inside_hole_is_not_external() {
    let mut img = blank_page(100, 100);
    draw_ring(&mut img, 50, 50, 40, 28);
    // A dot sitting inside the ring's hole
    draw_bar(&mut img, 45, 45, 12, 12);

    let digits = segment(&img, 10);
    assert_eq!(digits.len(), 1);
    assert_eq!(digits[0].0, BoundingBox { x: 10, y: 10, width: 81, height: 81 });
}

#[test]
fn test_external_contours_on_binary_image() {
    let mut binary = RawImage::new(30, 30);
    // Outer frame touching the border, with a blob inside its hole
    draw_filled_rect_mut(&mut binary, Rect::at(0, 0).of_size(30, 30), Luma([255u8]));
    draw_filled_rect_mut(&mut binary, Rect::at(3, 3).of_size(24, 24), Luma([0u8]));
    draw_filled_rect_mut(&mut binary, Rect::at(10, 10).of_size(5, 5), Luma([255u8]));

    let contours = find_external_contours(&binary);
    assert_eq!(contours.len(), 1);
    assert_eq!(contours[0].width(), 30);
    assert_eq!(contours[0].height(), 30);
}

#[test]
fn test_no_components_gives_empty_sequence() {
    assert!(segment(&blank_page(64, 64), 10).is_empty());
    assert!(segment(&RawImage::new(64, 64), 10).is_empty());
}
