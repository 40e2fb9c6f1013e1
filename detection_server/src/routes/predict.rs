use crate::{
    frame::{DecodeError, Frame},
    frame_buffer::Submission,
    server::SharedState,
};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

const IMAGE_FIELD: &str = "image";

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Missing multipart field `image`")]
    MissingImage,
    #[error("{}", .0.body_text())]
    NotMultipart(#[from] MultipartRejection),
    #[error("Malformed multipart body: {}", .0.body_text())]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    Decode(#[from] DecodeError),
    #[error("Decoding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = match &self {
            PredictError::MissingImage => StatusCode::UNPROCESSABLE_ENTITY,
            PredictError::NotMultipart(rejection) => rejection.status(),
            // 413 when the upload exceeds the body limit.
            PredictError::Multipart(e) => e.status(),
            PredictError::Decode(_) => StatusCode::BAD_REQUEST,
            PredictError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize, Deserialize)]
pub struct Acknowledgement {
    pub status: String,
}

/// Decodes the upload and parks it in the frame buffer. Returns as soon as the
/// frame is stored; never waits for inference.
#[instrument(skip(state, multipart))]
pub async fn submit_frame(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Acknowledgement>, PredictError> {
    state.metrics.record_request("/predict/");
    let mut multipart = multipart?;

    let mut image_data = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            image_data = Some(field.bytes().await?);
            break;
        }
    }
    let image_data = image_data.ok_or(PredictError::MissingImage)?;

    let decoded = tokio::task::spawn_blocking(move || Frame::decode(&image_data)).await?;
    let frame = match decoded {
        Ok(frame) => frame,
        Err(e) => {
            state.metrics.record_decode_failure();
            tracing::warn!("Rejected upload: {}", e);
            return Err(e.into());
        }
    };

    let (width, height) = (frame.width(), frame.height());
    let submission = state.pipeline.frames().submit(frame);
    state
        .metrics
        .record_frame_received(submission == Submission::Replaced);

    if submission == Submission::Replaced {
        tracing::debug!("Dropped an unprocessed frame in favour of a newer one");
    }
    tracing::debug!("Queued {}x{} frame for prediction", width, height);

    Ok(Json(Acknowledgement {
        status: "Image received for prediction".into(),
    }))
}
