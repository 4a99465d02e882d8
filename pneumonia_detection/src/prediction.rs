use crate::{
    codec::{decode_base64, decode_image, CodecError, ImageSource},
    model_host::{HostError, ModelHost},
    model_service::{ModelError, ModelService},
    preprocess::{bytes_to_tensor, image_to_tensor, PreprocessError},
};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("invalid image data: {0}")]
    InvalidImageData(CodecError),
    #[error("preprocessing failed: {0}")]
    Preprocessing(PreprocessError),
    #[error("{0}")]
    Inference(ModelError),
    #[error("prediction task failed: {0}")]
    Task(String),
}

impl From<HostError> for PredictionError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::NotLoaded => PredictionError::ModelNotLoaded,
            HostError::Model(e) => PredictionError::Inference(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    Pneumonia,
    Normal,
}

impl Diagnosis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Diagnosis::Pneumonia => "Pneumonia Detected",
            Diagnosis::Normal => "Normal",
        }
    }
}

impl Serialize for Diagnosis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Verdict for one image. Percentages are rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    #[serde(rename = "prediction")]
    pub label: Diagnosis,
    pub confidence: f64,
    pub pneumonia_probability: f64,
    pub normal_probability: f64,
}

impl PredictionResult {
    /// Maps P(pneumonia) to a verdict; exactly 0.5 is reported as normal.
    pub fn from_probability(probability: f32) -> Self {
        let p = probability as f64;
        let (label, confidence) = if p > DECISION_THRESHOLD {
            (Diagnosis::Pneumonia, p * 100.)
        } else {
            (Diagnosis::Normal, (1. - p) * 100.)
        };

        Self {
            label,
            confidence: round2(confidence),
            pneumonia_probability: round2(p * 100.),
            normal_probability: round2((1. - p) * 100.),
        }
    }
}

/// Rounds to two decimals with halves going away from zero, so an exact
/// 0.125 becomes 0.13 where half-to-even rounding would give 0.12.
fn round2(value: f64) -> f64 {
    (value * 100.).round() / 100.
}

pub struct PredictionService<M: ModelService> {
    host: Arc<ModelHost<M>>,
}

impl<M: ModelService> PredictionService<M> {
    pub fn new(host: ModelHost<M>) -> Self {
        Self {
            host: Arc::new(host),
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.host.is_loaded()
    }

    #[instrument(skip(self, source))]
    pub async fn predict(&self, source: ImageSource) -> Result<PredictionResult, PredictionError> {
        if !self.host.is_loaded() {
            return Err(PredictionError::ModelNotLoaded);
        }

        let host = self.host.clone();
        let result = tokio::task::spawn_blocking(move || run_pipeline(&host, source))
            .await
            .map_err(|e| PredictionError::Task(e.to_string()))??;

        tracing::debug!(
            "Prediction: {} ({:.2}% confidence)",
            result.label.as_str(),
            result.confidence
        );

        Ok(result)
    }
}

fn run_pipeline<M: ModelService>(
    host: &ModelHost<M>,
    source: ImageSource,
) -> Result<PredictionResult, PredictionError> {
    let tensor = match source {
        ImageSource::Upload(image_data) => {
            bytes_to_tensor(&image_data).map_err(PredictionError::Preprocessing)?
        }
        ImageSource::Base64(encoded) => {
            let image_data = decode_base64(&encoded).map_err(PredictionError::InvalidImageData)?;
            let img = decode_image(&image_data).map_err(PredictionError::InvalidImageData)?;
            image_to_tensor(&img)
        }
    };

    let probability = host.infer(&tensor)?;

    Ok(PredictionResult::from_probability(probability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_base64;
    use crate::testing::{png_bytes, ConstantModel, CountingModel, FailingModel};

    #[test]
    fn test_probabilities_sum_to_hundred() {
        for step in 0..=1000 {
            let p = step as f32 / 1000.;
            let result = PredictionResult::from_probability(p);
            let total = result.pneumonia_probability + result.normal_probability;
            assert!((total - 100.).abs() <= 0.01 + 1e-9, "p={} total={}", p, total);
            assert!(result.confidence >= 50.);
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let at_threshold = PredictionResult::from_probability(0.5);
        assert_eq!(at_threshold.label, Diagnosis::Normal);
        assert_eq!(at_threshold.confidence, 50.);

        let above = PredictionResult::from_probability(0.5001);
        assert_eq!(above.label, Diagnosis::Pneumonia);
    }

    #[test]
    fn test_confidence_follows_label() {
        let pneumonia = PredictionResult::from_probability(0.9);
        assert_eq!(pneumonia.label, Diagnosis::Pneumonia);
        assert_eq!(pneumonia.confidence, 90.);
        assert_eq!(pneumonia.pneumonia_probability, 90.);
        assert_eq!(pneumonia.normal_probability, 10.);

        let normal = PredictionResult::from_probability(0.123456);
        assert_eq!(normal.label, Diagnosis::Normal);
        assert_eq!(normal.confidence, 87.65);
        assert_eq!(normal.pneumonia_probability, 12.35);
    }

    #[test]
    fn test_round2_halves_away_from_zero() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(12.5), 12.5);
        assert_eq!(round2(87.654), 87.65);
    }

    #[test]
    fn test_diagnosis_serializes_as_label() {
        assert_eq!(
            serde_json::to_value(Diagnosis::Pneumonia).unwrap(),
            Diagnosis::Pneumonia.as_str()
        );
        assert_eq!(serde_json::to_value(Diagnosis::Normal).unwrap(), "Normal");
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(PredictionResult::from_probability(0.75)).unwrap();

        assert_eq!(json["prediction"], "Pneumonia Detected");
        assert_eq!(json["confidence"], 75.0);
        assert_eq!(json["pneumonia_probability"], 75.0);
        assert_eq!(json["normal_probability"], 25.0);
    }

    #[tokio::test]
    async fn test_predict_upload() {
        let service = PredictionService::new(ModelHost::with_model(ConstantModel(0.8)));

        let result = service
            .predict(ImageSource::Upload(png_bytes(40, 30)))
            .await
            .unwrap();

        assert_eq!(result.label, Diagnosis::Pneumonia);
        assert_eq!(result.confidence, 80.);
    }

    #[tokio::test]
    async fn test_predict_base64_with_and_without_prefix() {
        let service = PredictionService::new(ModelHost::with_model(ConstantModel(0.2)));
        let encoded = encode_base64(&png_bytes(16, 16));

        let plain = service
            .predict(ImageSource::Base64(encoded.clone()))
            .await
            .unwrap();
        let prefixed = service
            .predict(ImageSource::Base64(format!("data:image/png;base64,{}", encoded)))
            .await
            .unwrap();

        assert_eq!(plain, prefixed);
        assert_eq!(plain.label, Diagnosis::Normal);
    }

    #[tokio::test]
    async fn test_unloaded_model_short_circuits() {
        let service = PredictionService::new(ModelHost::<ConstantModel>::unloaded());

        let result = service.predict(ImageSource::Upload(png_bytes(4, 4))).await;

        assert!(!service.is_model_loaded());
        assert!(matches!(result, Err(PredictionError::ModelNotLoaded)));
    }

    #[tokio::test]
    async fn test_bad_inputs_map_to_tagged_errors() {
        let model = CountingModel::new(0.6);
        let service = PredictionService::new(ModelHost::with_model(model.clone()));

        let garbage_base64 = service
            .predict(ImageSource::Base64("%%%".to_string()))
            .await;
        assert!(matches!(
            garbage_base64,
            Err(PredictionError::InvalidImageData(_))
        ));

        let not_an_image = service
            .predict(ImageSource::Base64(encode_base64(b"plain text")))
            .await;
        assert!(matches!(
            not_an_image,
            Err(PredictionError::InvalidImageData(_))
        ));

        let bad_upload = service
            .predict(ImageSource::Upload(b"plain text".to_vec()))
            .await;
        assert!(matches!(bad_upload, Err(PredictionError::Preprocessing(_))));

        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_inference_failure_is_propagated() {
        let service = PredictionService::new(ModelHost::with_model(FailingModel));

        let result = service.predict(ImageSource::Upload(png_bytes(8, 8))).await;

        assert!(matches!(result, Err(PredictionError::Inference(_))));
    }
}
