use crate::{
    config::{Config, Validatable},
    detector::Detector,
    labels::load_class_names,
    ort_detector::OrtDetector,
    pipeline::Pipeline,
    server::{HttpServer, SharedState},
    telemetry::Metrics,
    worker::{warm_up, InferenceWorker},
};
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let class_names = load_class_names(&config.labels.get_path()).map_err(|e| {
        tracing::error!("Failed to load class labels: {:?}", e);
        e
    })?;

    let detector = match OrtDetector::new(&config.model, class_names) {
        Ok(detector) => detector,
        Err(e) => {
            tracing::error!("Failed to initialize detector: {:?}", e);
            return Err(Box::new(e));
        }
    };

    serve(detector, &config).await
}

/// Warms the detector up, hands it to the inference worker and serves HTTP
/// until a shutdown signal arrives.
pub async fn serve<D: Detector>(
    mut detector: D,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let warmup = match warm_up(&mut detector, config.worker.warmup_size) {
        Ok(detections) => detections,
        Err(e) => {
            tracing::error!("Warm-up inference failed, refusing to start: {}", e);
            return Err(Box::new(e));
        }
    };

    let pipeline = Arc::new(Pipeline::new(warmup));
    let metrics = Arc::new(Metrics::new()?);

    let worker = InferenceWorker::new(
        detector,
        pipeline.clone(),
        metrics.clone(),
        config.worker.poll_interval(),
    )
    .spawn()?;

    let state = SharedState { pipeline, metrics };
    let server = HttpServer::new(state, &config.server).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    if let Ok(Err(e)) = server_handle.await {
        tracing::error!("HTTP server exited with an error: {}", e);
    }
    tokio::task::spawn_blocking(move || worker.stop()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
