use detection_server::{
    config::ServerConfig,
    detection::{BoundingBox, Detection},
    detector::{Detector, DetectorError},
    frame::Frame,
    pipeline::Pipeline,
    server::{HttpServer, SharedState},
    telemetry::Metrics,
    worker::{warm_up, InferenceWorker, WorkerHandle},
    ResultResponse, WarmupResponse,
};
use image::{ImageBuffer, Rgb};
use reqwest::{multipart, StatusCode};
use std::{
    io::Cursor,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::broadcast;

/// One-pixel-wide frames yield nothing; anything else yields three detections,
/// two of which tie on confidence. Frames 3 pixels wide make the detector fail.
struct ScriptedDetector;

impl Detector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        match frame.width() {
            1 => Ok(Vec::new()),
            3 => Err(DetectorError::Output("scripted failure".to_string())),
            width => {
                let w = width as f32;
                Ok(vec![
                    detection("dog", 0.5, w),
                    detection("cat", 0.9, w),
                    detection("bird", 0.5, w),
                ])
            }
        }
    }
}

fn detection(class_name: &str, confidence: f32, width: f32) -> Detection {
    Detection {
        class_id: 0,
        class_name: class_name.to_string(),
        confidence,
        bbox: BoundingBox {
            x1: 0.,
            y1: 0.,
            x2: width,
            y2: 1.,
        },
    }
}

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    pipeline: Arc<Pipeline>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Option<WorkerHandle>,
}

impl TestApp {
    async fn spawn() -> Self {
        Self::spawn_with_upload_limit(1024 * 1024).await
    }

    async fn spawn_with_upload_limit(max_upload_bytes: usize) -> Self {
        let mut detector = ScriptedDetector;
        let warmup = warm_up(&mut detector, 16).unwrap();

        let pipeline = Arc::new(Pipeline::new(warmup));
        let metrics = Arc::new(Metrics::new().unwrap());
        let worker = InferenceWorker::new(
            detector,
            pipeline.clone(),
            metrics.clone(),
            Duration::from_millis(10),
        )
        .spawn()
        .unwrap();

        let server_config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_upload_bytes,
        };
        let state = SharedState {
            pipeline: pipeline.clone(),
            metrics,
        };
        let server = HttpServer::new(state, &server_config).await.unwrap();
        let base_url = format!("http://{}", server.local_addr().unwrap());

        let (shutdown_tx, _) = broadcast::channel(1);
        server.run(shutdown_tx.subscribe()).await.unwrap();

        Self {
            base_url,
            client: reqwest::Client::new(),
            pipeline,
            shutdown_tx,
            worker: Some(worker),
        }
    }

    async fn submit(&self, bytes: Vec<u8>) -> reqwest::Response {
        let part = multipart::Part::bytes(bytes)
            .file_name("frame.png")
            .mime_str("image/png")
            .unwrap();
        let form = multipart::Form::new().part("image", part);

        self.client
            .post(format!("{}/predict/", self.base_url))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    async fn result(&self) -> serde_json::Value {
        self.client
            .get(format!("{}/result/", self.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn wait_for_result(&self, completed: u64) -> serde_json::Value {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.pipeline.inferences_completed() < completed {
            assert!(Instant::now() < deadline, "no inference within 5s");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.result().await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb([0, 128, 255]));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
    cursor.into_inner()
}

#[tokio::test]
async fn test_result_before_any_inference_is_not_ready() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/result/", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: ResultResponse = response.json().await.unwrap();
    assert!(body.detections.is_empty());
    assert!(body.timestamp.is_none());
    assert_eq!(body.message.as_deref(), Some("No prediction available yet"));
}

#[tokio::test]
async fn test_root_serves_warmup_detections() {
    let app = TestApp::spawn().await;

    let body: serde_json::Value = app
        .client
        .get(format!("{}/", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(body["detections"][0].get("bbox").is_none());
    let parsed: WarmupResponse = serde_json::from_value(body).unwrap();
    let names: Vec<_> = parsed
        .detections
        .iter()
        .map(|d| d.class_name.as_str())
        .collect();
    assert_eq!(names, vec!["cat", "dog", "bird"]);
}

#[tokio::test]
async fn test_frame_without_objects_yields_empty_result() {
    let app = TestApp::spawn().await;

    let response = app.submit(png(1, 1)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let ack: serde_json::Value = response.json().await.unwrap();
    assert_eq!(ack["status"], "Image received for prediction");

    let body = app.wait_for_result(1).await;
    assert_eq!(body["detections"], serde_json::json!([]));
    assert_eq!(body["total_objects"], 0);
    assert!(body["timestamp"].as_f64().unwrap() > 0.);
}

#[tokio::test]
async fn test_result_is_sorted_by_confidence_with_stable_ties() {
    let app = TestApp::spawn().await;

    app.submit(png(8, 4)).await;
    let body: ResultResponse = serde_json::from_value(app.wait_for_result(1).await).unwrap();

    let names: Vec<_> = body
        .detections
        .iter()
        .map(|d| d.class_name.as_str())
        .collect();
    assert_eq!(names, vec!["cat", "dog", "bird"]);
    assert_eq!(body.total_objects, Some(3));
    assert_eq!(body.detections[0].bbox, [0., 0., 8., 1.]);
}

#[tokio::test]
async fn test_undecodable_upload_leaves_state_untouched() {
    let app = TestApp::spawn().await;

    app.submit(png(8, 4)).await;
    let before = app.wait_for_result(1).await;

    let response = app.submit(b"not an image at all".to_vec()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: serde_json::Value = response.json().await.unwrap();
    assert!(error["detail"].as_str().unwrap().contains("decoding"));

    assert!(!app.pipeline.frames().is_pending());
    assert_eq!(app.result().await, before);
}

#[tokio::test]
async fn test_missing_image_field_is_rejected() {
    let app = TestApp::spawn().await;

    let form = multipart::Form::new().text("picture", "nope");
    let response = app
        .client
        .post(format!("{}/predict", app.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!app.pipeline.frames().is_pending());
}

#[tokio::test]
async fn test_non_multipart_upload_gets_json_error() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/predict/", app.base_url))
        .header("content-type", "image/png")
        .body(png(4, 4))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let error: serde_json::Value = response.json().await.unwrap();
    assert!(!error["detail"].as_str().unwrap().is_empty());
    assert!(!app.pipeline.frames().is_pending());
}

#[tokio::test]
async fn test_oversized_upload_is_rejected_with_413() {
    let app = TestApp::spawn_with_upload_limit(16 * 1024).await;

    let response = app.submit(vec![0u8; 64 * 1024]).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let error: serde_json::Value = response.json().await.unwrap();
    assert!(error["detail"].is_string());
    assert!(!app.pipeline.frames().is_pending());
}

#[tokio::test]
async fn test_inference_failure_keeps_stale_result() {
    let app = TestApp::spawn().await;

    app.submit(png(8, 4)).await;
    let before = app.wait_for_result(1).await;

    app.submit(png(3, 3)).await;
    let deadline = Instant::now() + Duration::from_secs(5);
    while app.pipeline.inference_failures() < 1 {
        assert!(Instant::now() < deadline, "failure not observed within 5s");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(app.result().await, before);

    let health: serde_json::Value = app
        .client
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "Available");
    assert_eq!(health["inference_failures"], 1);
    assert_eq!(health["inferences_completed"], 1);

    app.submit(png(1, 1)).await;
    let body = app.wait_for_result(2).await;
    assert_eq!(body["total_objects"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_frames() {
    let app = TestApp::spawn().await;

    app.submit(png(1, 1)).await;
    app.wait_for_result(1).await;

    let text = app
        .client
        .get(format!("{}/metrics", app.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("frames_received_total"));
}
