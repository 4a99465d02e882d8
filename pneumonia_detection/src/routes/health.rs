use crate::{model_service::ModelService, server::SharedState};
use axum::{extract::State, response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct Status {
    status: String,
    model_status: String,
    service: String,
}

pub async fn healthcheck<M: ModelService>(State(state): State<SharedState<M>>) -> impl IntoResponse {
    let model_status = if state.prediction_service.is_model_loaded() {
        "loaded"
    } else {
        "not loaded"
    };

    Json(Status {
        status: "healthy".into(),
        model_status: model_status.into(),
        service: "pneumonia-detection".into(),
    })
}
