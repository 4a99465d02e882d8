use crate::{
    codec::{allowed_file, secure_filename, ImageSource},
    model_service::ModelService,
    routes::{ApiError, PredictionResponse},
    server::SharedState,
};
use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        State,
    },
    http::StatusCode,
    response::Json,
};
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "/predict";
const FILE_FIELD: &str = "file";

struct Upload {
    filename: String,
    image_data: Vec<u8>,
}

#[instrument(skip(state, multipart))]
pub async fn predict<M: ModelService>(
    State(state): State<SharedState<M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    state.metrics.record_request(ROUTE);

    if !state.prediction_service.is_model_loaded() {
        return Err(ApiError::ModelNotLoaded);
    }

    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Request is not a multipart upload: {}", e);
        ApiError::NoFileUploaded
    })?;

    let upload = read_file_field(&mut multipart, state.upload.max_body_bytes)
        .await?
        .ok_or(ApiError::NoFileUploaded)?;

    if upload.filename.is_empty() {
        return Err(ApiError::NoFileSelected);
    }

    if !allowed_file(&upload.filename, &state.upload.allowed_extensions) {
        return Err(ApiError::invalid_format(&state.upload.allowed_extensions));
    }

    let filename = secure_filename(&upload.filename);
    let started = Instant::now();

    let result = state
        .prediction_service
        .predict(ImageSource::Upload(upload.image_data))
        .await?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    state.metrics.record_prediction_duration(elapsed_ms, ROUTE);
    state.metrics.record_prediction(result.label.as_str());
    tracing::info!(
        filename = %filename,
        label = result.label.as_str(),
        confidence = result.confidence,
        elapsed_ms,
        "Prediction completed"
    );

    Ok(Json(PredictionResponse {
        success: true,
        result,
        filename: Some(filename),
    }))
}

/// Finds the `file` part of the form. Parts without a filename are form
/// fields, not uploads, and are skipped.
async fn read_file_field(
    multipart: &mut Multipart,
    max_body_bytes: usize,
) -> Result<Option<Upload>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_body_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let image_data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_body_bytes))?;

        return Ok(Some(Upload {
            filename,
            image_data: image_data.to_vec(),
        }));
    }

    Ok(None)
}

fn multipart_error(err: MultipartError, max_body_bytes: usize) -> ApiError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(max_body_bytes)
    } else if status.is_client_error() {
        tracing::debug!("Rejected multipart body: {}", err.body_text());
        ApiError::MalformedUpload
    } else {
        ApiError::Server(err.body_text())
    }
}
