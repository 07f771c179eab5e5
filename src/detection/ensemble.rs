use tracing::debug;

use crate::classifier::Classifier;
use crate::detection::augment::augment;
use crate::error::Result;
use crate::models::{Alternative, NUM_CLASSES, NormalizedTensor, PreviewImage, PredictionResult, ProbabilityVector};

/// How many top-ranked labels are considered before dropping the winner.
const TOP_K: usize = 3;

/// Classification strategy for one normalized digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensemble {
    /// Bare tensor plus every augmented variant, averaged.
    Augmented,
    /// The bare tensor only.
    Single,
}

/// Classify a tensor and turn the (averaged) distribution into a result.
pub fn score(
    tensor: &NormalizedTensor,
    preview: PreviewImage,
    classifier: &dyn Classifier,
    mode: Ensemble,
) -> Result<PredictionResult> {
    let mut distributions = vec![classifier.predict(tensor)?];
    if mode == Ensemble::Augmented {
        for variant in augment(tensor) {
            distributions.push(classifier.predict(&variant)?);
        }
    }
    debug!(calls = distributions.len(), "Classifier ensemble complete");

    let averaged = average(&distributions);
    let (digit, confidence) = argmax(&averaged);
    let alternatives = rank_alternatives(&averaged, digit);

    Ok(PredictionResult {
        digit: digit as u8,
        confidence,
        alternatives,
        preview,
    })
}

/// Element-wise mean of the distributions.
pub fn average(distributions: &[ProbabilityVector]) -> ProbabilityVector {
    let mut sums = [0.0f64; NUM_CLASSES];
    for dist in distributions {
        for (acc, &p) in sums.iter_mut().zip(dist.scores()) {
            *acc += p as f64;
        }
    }
    let n = distributions.len().max(1) as f64;
    ProbabilityVector(sums.map(|s| (s / n) as f32))
}

/// Index and value of the largest score; the lowest index wins ties.
pub fn argmax(dist: &ProbabilityVector) -> (usize, f32) {
    let mut best = 0;
    for (i, &p) in dist.scores().iter().enumerate() {
        if p > dist.0[best] {
            best = i;
        }
    }
    (best, dist.0[best])
}

/// Up to two runner-up labels from the top three, highest first.
pub fn rank_alternatives(dist: &ProbabilityVector, label: usize) -> Vec<Alternative> {
    let mut order: Vec<usize> = (0..NUM_CLASSES).collect();
    // Stable sort keeps lower indices first among equal scores
    order.sort_by(|&a, &b| dist.0[b].total_cmp(&dist.0[a]));

    order
        .into_iter()
        .take(TOP_K)
        .filter(|&i| i != label)
        .take(TOP_K - 1)
        .map(|i| Alternative {
            digit: i as u8,
            confidence: dist.0[i],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(values: [f32; NUM_CLASSES]) -> ProbabilityVector {
        ProbabilityVector(values)
    }

    #[test]
    fn argmax_prefers_lowest_index_on_tie() {
        let d = dist([0.1, 0.3, 0.3, 0.0, 0.0, 0.0, 0.0, 0.3, 0.0, 0.0]);
        assert_eq!(argmax(&d), (1, 0.3));
    }

    #[test]
    fn alternatives_exclude_label_and_are_sorted() {
        let d = dist([0.05, 0.1, 0.6, 0.0, 0.2, 0.0, 0.0, 0.05, 0.0, 0.0]);
        let alts = rank_alternatives(&d, 2);
        assert_eq!(alts.len(), 2);
        assert_eq!(alts[0].digit, 4);
        assert_eq!(alts[1].digit, 1);
    }

    #[test]
    fn alternatives_break_ties_by_index() {
        let d = dist([0.1; NUM_CLASSES]);
        let (label, _) = argmax(&d);
        assert_eq!(label, 0);
        let digits: Vec<u8> = rank_alternatives(&d, label).iter().map(|a| a.digit).collect();
        assert_eq!(digits, vec![1, 2]);
    }

    #[test]
    fn average_is_element_wise_mean() {
        let mut a = [0.0; NUM_CLASSES];
        a[3] = 1.0;
        let mut b = [0.0; NUM_CLASSES];
        b[5] = 1.0;
        let avg = average(&[dist(a), dist(b)]);
        assert_eq!(avg.0[3], 0.5);
        assert_eq!(avg.0[5], 0.5);
        assert_eq!(avg.0[0], 0.0);
    }
}
