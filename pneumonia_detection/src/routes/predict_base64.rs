use crate::{
    codec::ImageSource,
    model_service::ModelService,
    routes::{ApiError, PredictionResponse},
    server::SharedState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "/predict-base64";

#[instrument(skip(state, payload))]
pub async fn predict_base64<M: ModelService>(
    State(state): State<SharedState<M>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    state.metrics.record_request(ROUTE);

    if !state.prediction_service.is_model_loaded() {
        return Err(ApiError::ModelNotLoaded);
    }

    let Json(body) = payload.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(state.upload.max_body_bytes)
        } else {
            tracing::debug!("Rejected JSON body: {}", e.body_text());
            ApiError::NoImageData
        }
    })?;

    let encoded = match body {
        Value::Object(mut fields) => match fields.remove("image") {
            Some(Value::String(encoded)) => encoded,
            Some(_) => return Err(ApiError::InvalidImageData),
            None => return Err(ApiError::NoImageData),
        },
        _ => return Err(ApiError::NoImageData),
    };

    let started = Instant::now();

    let result = state
        .prediction_service
        .predict(ImageSource::Base64(encoded))
        .await?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    state.metrics.record_prediction_duration(elapsed_ms, ROUTE);
    state.metrics.record_prediction(result.label.as_str());
    tracing::info!(
        label = result.label.as_str(),
        confidence = result.confidence,
        elapsed_ms,
        "Prediction completed"
    );

    Ok(Json(PredictionResponse {
        success: true,
        result,
        filename: None,
    }))
}
