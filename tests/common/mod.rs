mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from digitread for tests
pub use digitread::{
    BoundingBox, Classifier, NormalizedTensor, PredictionResult, ProbabilityVector, RawImage,
    Recognizer, RecognizerConfig,
};
