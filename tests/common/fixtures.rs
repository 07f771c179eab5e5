use digitread::{Classifier, DigitError, NormalizedTensor, ProbabilityVector, RawImage};
use image::{ImageFormat, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const INK: Luma<u8> = Luma([20u8]);
pub const PAPER: Luma<u8> = Luma([235u8]);

/// Light page of the given size.
pub fn blank_page(width: u32, height: u32) -> RawImage {
    RawImage::from_pixel(width, height, PAPER)
}

/// Dark bar standing in for a handwritten "1".
pub fn draw_bar(img: &mut RawImage, x: i32, y: i32, width: u32, height: u32) {
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(width, height), INK);
}

/// Dark ring standing in for a handwritten "0".
pub fn draw_ring(img: &mut RawImage, cx: i32, cy: i32, outer: i32, inner: i32) {
    draw_filled_circle_mut(img, (cx, cy), outer, INK);
    draw_filled_circle_mut(img, (cx, cy), inner, PAPER);
}

/// A page with a single digit-like stroke pattern in the middle.
pub fn single_digit_page() -> RawImage {
    let mut img = blank_page(120, 90);
    draw_bar(&mut img, 50, 15, 12, 60);
    draw_bar(&mut img, 40, 15, 22, 8);
    img
}

/// Three digits placed right-to-left in drawing order.
pub fn three_digit_page() -> RawImage {
    let mut img = blank_page(240, 80);
    draw_ring(&mut img, 190, 40, 22, 12);
    draw_bar(&mut img, 20, 15, 10, 50);
    draw_ring(&mut img, 110, 40, 20, 10);
    img
}

pub fn encode_png(img: &RawImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes
}

/// One-hot-ish distribution peaking at `digit`.
pub fn peaked(digit: usize) -> ProbabilityVector {
    let mut scores = [0.0f32; 10];
    scores[digit % 10] = 0.55;
    scores[(digit + 1) % 10] = 0.25;
    scores[(digit + 3) % 10] = 0.20;
    ProbabilityVector(scores)
}

/// Returns the same distribution for every input.
pub struct FixedClassifier(pub ProbabilityVector);

impl Classifier for FixedClassifier {
    fn predict(&self, _tensor: &NormalizedTensor) -> digitread::Result<ProbabilityVector> {
        Ok(self.0)
    }
}

/// Deterministic stand-in for a trained model: the label depends on the
/// total ink in the tensor. An empty tensor maps to 0.
pub struct MassClassifier;

pub fn ink_mass(tensor: &NormalizedTensor) -> f32 {
    tensor.values().iter().sum()
}

impl Classifier for MassClassifier {
    fn predict(&self, tensor: &NormalizedTensor) -> digitread::Result<ProbabilityVector> {
        let label = ink_mass(tensor).round() as usize % 10;
        Ok(peaked(label))
    }
}

/// Wraps another classifier and counts invocations.
pub struct CountingClassifier<C> {
    pub inner: C,
    pub calls: AtomicUsize,
}

impl<C> CountingClassifier<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<C: Classifier> Classifier for CountingClassifier<C> {
    fn predict(&self, tensor: &NormalizedTensor) -> digitread::Result<ProbabilityVector> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.predict(tensor)
    }
}

/// Fails whenever the tensor carries more ink than `limit`.
pub struct HeavyInkFails {
    pub limit: f32,
}

impl Classifier for HeavyInkFails {
    fn predict(&self, tensor: &NormalizedTensor) -> digitread::Result<ProbabilityVector> {
        if ink_mass(tensor) > self.limit {
            return Err(DigitError::Inference("simulated failure".into()));
        }
        Ok(peaked(7))
    }
}

/// Fails only on the `fail_on`-th call (zero-based).
pub struct FailOnCall {
    pub fail_on: usize,
    pub calls: AtomicUsize,
}

impl FailOnCall {
    pub fn new(fail_on: usize) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Classifier for FailOnCall {
    fn predict(&self, _tensor: &NormalizedTensor) -> digitread::Result<ProbabilityVector> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            return Err(DigitError::Inference("simulated failure".into()));
        }
        Ok(peaked(4))
    }
}
