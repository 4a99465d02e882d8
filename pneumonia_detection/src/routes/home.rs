use axum::response::Json;
use serde_json::{json, Value};

pub async fn home() -> Json<Value> {
    Json(json!({
        "message": "HealthScan Pneumonia Detection API",
        "version": "1.0",
        "endpoints": {
            "/predict": "POST - Upload image for pneumonia detection",
            "/predict-base64": "POST - Send a base64 encoded image for pneumonia detection",
            "/health": "GET - Check service health",
            "/metrics": "GET - Prometheus metrics"
        }
    }))
}
