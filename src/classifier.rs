use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use std::path::Path;
use std::time::UNIX_EPOCH;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, instrument};

use crate::config::TensorLayout;
use crate::error::{DigitError, Result};
use crate::models::{ModelInfo, NormalizedTensor, ProbabilityVector};

/// Maps a normalized 28x28 tensor to a distribution over the ten digits.
///
/// Implementations must be pure: the same tensor always yields the same
/// vector, so a single instance can be shared across requests.
pub trait Classifier: Send + Sync {
    fn predict(&self, tensor: &NormalizedTensor) -> Result<ProbabilityVector>;
}

/// Classifier backed by an rten model file.
pub struct RtenClassifier {
    model: Model,
    layout: TensorLayout,
    apply_softmax: bool,
}

impl RtenClassifier {
    /// Load the model once. Any failure here means the process must not serve.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, layout: TensorLayout, apply_softmax: bool) -> Result<Self> {
        let path = path.as_ref();
        let unavailable = |reason: String| DigitError::ClassifierUnavailable {
            path: path.display().to_string(),
            reason,
        };

        if !path.exists() {
            return Err(unavailable("model file not found".to_string()));
        }
        let model = Model::load_file(path).map_err(|e| unavailable(e.to_string()))?;

        info!(?layout, apply_softmax, "Classifier loaded");
        Ok(Self {
            model,
            layout,
            apply_softmax,
        })
    }
}

impl Classifier for RtenClassifier {
    fn predict(&self, tensor: &NormalizedTensor) -> Result<ProbabilityVector> {
        // NHWC and NCHW hold the same bytes for a single channel; only the shape differs.
        let input = NdTensor::from_data(self.layout.shape(), tensor.values().to_vec());

        let output: NdTensor<f32, 2> = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| DigitError::Inference(e.to_string()))?
            .try_into()
            .map_err(|e| DigitError::Inference(format!("unexpected model output: {}", e)))?;

        let mut scores: Vec<f32> = output.iter().copied().collect();
        if self.apply_softmax {
            softmax(&mut scores);
        }
        debug!(?scores, "Raw classifier output");
        ProbabilityVector::from_scores(&scores)
    }
}

fn softmax(scores: &mut [f32]) {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    if sum > 0.0 {
        for s in scores.iter_mut() {
            *s /= sum;
        }
    }
}

/// Best-effort metadata for the artifact at `path`. Never fails.
pub fn model_info(path: &Path, description: &str) -> ModelInfo {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let model_file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut info = ModelInfo {
        model_file,
        model_path: absolute.display().to_string(),
        description: description.to_string(),
        file_size_bytes: None,
        last_modified: None,
        last_modified_rfc3339: None,
    };

    let Ok(meta) = std::fs::metadata(path) else {
        debug!(path = %path.display(), "Model file not present, reporting names only");
        return info;
    };
    info.file_size_bytes = Some(meta.len());

    if let Ok(modified) = meta.modified() {
        if let Ok(since_epoch) = modified.duration_since(UNIX_EPOCH) {
            info.last_modified = Some(since_epoch.as_secs_f64());
        }
        info.last_modified_rfc3339 = OffsetDateTime::from(modified).format(&Rfc3339).ok();
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one_and_keeps_order() {
        let mut scores = vec![1.0, 3.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0];
        softmax(&mut scores);
        let total: f32 = scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(scores[1] > scores[2] && scores[2] > scores[0]);
        assert!(scores.iter().all(|&s| s >= 0.0));
    }

    #[test]
    fn load_missing_model_is_unavailable() {
        let result = RtenClassifier::load("/nonexistent/model.rten", TensorLayout::Nhwc, false);
        assert!(matches!(result, Err(DigitError::ClassifierUnavailable { .. })));
    }
}
