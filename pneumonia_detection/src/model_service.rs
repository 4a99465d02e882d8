use ndarray::{Array, Ix4};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("expected input shape {expected:?}, got {got:?}")]
    InputShape {
        expected: [usize; 4],
        got: Vec<usize>,
    },
    #[error("inference failed: {0}")]
    Runtime(String),
    #[error("model returned an empty output tensor")]
    EmptyOutput,
    #[error("model returned a non-finite probability: {0}")]
    NonFinite(f32),
}

impl From<ort::Error> for ModelError {
    fn from(err: ort::Error) -> Self {
        ModelError::Runtime(err.to_string())
    }
}

/// A loaded binary classifier returning P(pneumonia) for one preprocessed image.
pub trait ModelService: Send + Sync + 'static {
    fn infer(&self, input: &Array<f32, Ix4>) -> Result<f32, ModelError>;
}
