use crate::prediction::PredictionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("AI model not loaded. Please check model file.")]
    ModelNotLoaded,
    #[error("No file uploaded")]
    NoFileUploaded,
    #[error("Malformed multipart upload")]
    MalformedUpload,
    #[error("No file selected")]
    NoFileSelected,
    #[error("Invalid file format. Please upload {0} files.")]
    InvalidFileFormat(String),
    #[error("No base64 image data provided")]
    NoImageData,
    #[error("Invalid base64 image data")]
    InvalidImageData,
    #[error("Failed to preprocess image")]
    Preprocessing,
    #[error("Prediction failed: {0}")]
    Inference(String),
    #[error("File too large. Maximum upload size is {0} bytes.")]
    PayloadTooLarge(usize),
    #[error("Server error: {0}")]
    Server(String),
}

impl ApiError {
    pub fn invalid_format(allowed_extensions: &[String]) -> Self {
        ApiError::InvalidFileFormat(describe_extensions(allowed_extensions))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoFileUploaded
            | ApiError::MalformedUpload
            | ApiError::NoFileSelected
            | ApiError::InvalidFileFormat(_)
            | ApiError::NoImageData
            | ApiError::InvalidImageData => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ModelNotLoaded
            | ApiError::Preprocessing
            | ApiError::Inference(_)
            | ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        tracing::error!("Prediction pipeline failed: {}", err);
        match err {
            PredictionError::ModelNotLoaded => ApiError::ModelNotLoaded,
            PredictionError::InvalidImageData(_) => ApiError::InvalidImageData,
            PredictionError::Preprocessing(_) => ApiError::Preprocessing,
            PredictionError::Inference(e) => ApiError::Inference(e.to_string()),
            PredictionError::Task(e) => ApiError::Server(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            tracing::warn!(status = status.as_u16(), "Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// "png", "jpg", "jpeg" becomes "PNG, JPG, or JPEG".
fn describe_extensions(allowed_extensions: &[String]) -> String {
    let names: Vec<String> = allowed_extensions
        .iter()
        .map(|ext| ext.to_uppercase())
        .collect();
    match names.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{} or {}", first, second),
        [init @ .., last] => format!("{}, or {}", init.join(", "), last),
    }
}
