use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model API answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Maximum connection retries exceeded.")]
    MaxRetriesExceeded,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarmupResponse {
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionResult {
    pub detections: Vec<Detection>,
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub total_objects: Option<usize>,
    #[serde(default)]
    pub message: Option<String>,
}

/// HTTP client for the detection server's `/`, `/predict/` and `/result/`.
pub struct ModelApiClient {
    http: Client,
    base_url: String,
}

impl ModelApiClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Polls `/` with exponential back-off and jitter until the server answers.
    pub async fn wait_until_ready(&self, max_retries: u32) -> Result<WarmupResponse, ClientError> {
        let mut retry_delay = Duration::from_millis(50);
        let max_retry_delay = Duration::from_secs(1);

        for attempt in 1..=max_retries {
            match self.check_health().await {
                Ok(warmup) => return Ok(warmup),
                Err(e) => {
                    tracing::warn!(
                        "Model API not reachable (attempt {}/{}): {}",
                        attempt,
                        max_retries,
                        e
                    );
                }
            }

            if attempt < max_retries {
                let jitter = rand::random::<f32>() * 0.2 + 0.9;
                sleep(retry_delay.mul_f32(jitter)).await;
                retry_delay = (retry_delay * 2).min(max_retry_delay);
            }
        }

        Err(ClientError::MaxRetriesExceeded)
    }

    pub async fn check_health(&self) -> Result<WarmupResponse, ClientError> {
        let response = self.http.get(format!("{}/", self.base_url)).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    #[instrument(skip(self, jpeg), fields(bytes = jpeg.len()))]
    pub async fn submit_frame(&self, jpeg: Vec<u8>) -> Result<(), ClientError> {
        let part = multipart::Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = multipart::Form::new().part("image", part);

        let response = self
            .http
            .post(format!("{}/predict/", self.base_url))
            .multipart(form)
            .send()
            .await?;
        ensure_success(response).await?;

        Ok(())
    }

    pub async fn latest_result(&self) -> Result<PredictionResult, ClientError> {
        let response = self
            .http
            .get(format!("{}/result/", self.base_url))
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Multipart, State},
        http::StatusCode as AxumStatus,
        routing::{get, post},
        Json, Router,
    };
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Stub {
        uploads: Arc<AtomicUsize>,
        upload_bytes: Arc<AtomicUsize>,
    }

    async fn warmup() -> Json<serde_json::Value> {
        Json(serde_json::json!({"detections": [{"class_name": "cat", "confidence": 0.4}]}))
    }

    async fn predict(
        State(stub): State<Stub>,
        mut multipart: Multipart,
    ) -> Result<Json<serde_json::Value>, AxumStatus> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| AxumStatus::BAD_REQUEST)?
        {
            if field.name() == Some("image") {
                let data = field.bytes().await.map_err(|_| AxumStatus::BAD_REQUEST)?;
                if data.is_empty() {
                    return Err(AxumStatus::BAD_REQUEST);
                }
                stub.uploads.fetch_add(1, Ordering::SeqCst);
                stub.upload_bytes.fetch_add(data.len(), Ordering::SeqCst);
                return Ok(Json(
                    serde_json::json!({"status": "Image received for prediction"}),
                ));
            }
        }
        Err(AxumStatus::UNPROCESSABLE_ENTITY)
    }

    async fn result() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "detections": [{"class_name": "dog", "confidence": 0.8, "bbox": [1.0, 2.0, 3.0, 4.0]}],
            "timestamp": 1700000000.5,
            "total_objects": 1
        }))
    }

    async fn spawn_stub() -> (String, Stub) {
        let stub = Stub::default();
        let router = Router::new()
            .route("/", get(warmup))
            .route("/predict/", post(predict))
            .route("/result/", get(result))
            .with_state(stub.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (format!("http://{}/", addr), stub)
    }

    #[tokio::test]
    async fn test_round_trip_against_stub_server() {
        let (base_url, stub) = spawn_stub().await;
        let client = ModelApiClient::new(&base_url, Duration::from_secs(5)).unwrap();
        assert!(!client.base_url().ends_with('/'));

        let warmup = client.wait_until_ready(3).await.unwrap();
        assert_eq!(warmup.detections[0].class_name, "cat");
        assert!(warmup.detections[0].bbox.is_none());

        client.submit_frame(vec![1, 2, 3, 4]).await.unwrap();
        assert_eq!(stub.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(stub.upload_bytes.load(Ordering::SeqCst), 4);

        let result = client.latest_result().await.unwrap();
        assert_eq!(result.total_objects, Some(1));
        assert_eq!(result.timestamp, Some(1700000000.5));
        assert_eq!(result.detections[0].bbox, Some([1.0, 2.0, 3.0, 4.0]));
    }

    #[tokio::test]
    async fn test_rejected_upload_surfaces_status() {
        let (base_url, _) = spawn_stub().await;
        let client = ModelApiClient::new(&base_url, Duration::from_secs(5)).unwrap();

        let err = client.submit_frame(Vec::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Status { status, .. } if status == StatusCode::BAD_REQUEST
        ));
    }

    #[tokio::test]
    async fn test_gives_up_on_unreachable_server() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            ModelApiClient::new(&format!("http://{}", addr), Duration::from_millis(200)).unwrap();
        assert!(matches!(
            client.wait_until_ready(2).await,
            Err(ClientError::MaxRetriesExceeded)
        ));
    }
}
