mod error;
mod health;
mod home;
mod metrics;
mod predict;
mod predict_base64;

use crate::{model_service::ModelService, prediction::PredictionResult, server::SharedState};
use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;

pub use error::ApiError;

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub success: bool,
    pub result: PredictionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

pub fn api_routes<M: ModelService>() -> Router<SharedState<M>> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::healthcheck::<M>))
        .route("/predict", post(predict::predict::<M>))
        .route("/predict-base64", post(predict_base64::predict_base64::<M>))
        .route("/metrics", get(metrics::metrics_handler::<M>))
}
