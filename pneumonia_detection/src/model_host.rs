use crate::{
    config::ModelConfig,
    model_service::{ModelError, ModelService},
    ort_service::OrtModelService,
};
use ndarray::{Array, Ix4};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("model is not loaded")]
    NotLoaded,
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Owns the classifier for the lifetime of the process.
///
/// Loading is best effort: a host without a model keeps serving and reports
/// itself as unloaded instead of aborting startup.
pub struct ModelHost<M: ModelService> {
    model: Option<M>,
}

impl ModelHost<OrtModelService> {
    pub fn load(model_config: &ModelConfig) -> Self {
        match OrtModelService::new(model_config) {
            Ok(model) => {
                tracing::info!("Model loaded successfully");
                Self::with_model(model)
            }
            Err(e) => {
                tracing::warn!("Model not loaded, predictions are disabled: {}", e);
                Self::unloaded()
            }
        }
    }
}

impl<M: ModelService> ModelHost<M> {
    pub fn with_model(model: M) -> Self {
        Self { model: Some(model) }
    }

    pub fn unloaded() -> Self {
        Self { model: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn infer(&self, input: &Array<f32, Ix4>) -> Result<f32, HostError> {
        let model = self.model.as_ref().ok_or(HostError::NotLoaded)?;
        Ok(model.infer(input)?)
    }
}
