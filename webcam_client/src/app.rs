use crate::client::ModelApiClient;
use crate::config::Config;
use crate::source::open_source;
use crate::streamer::{poll_results, Streamer};

use std::sync::Arc;
use tokio::{signal, sync::broadcast};

const CONNECT_RETRIES: u32 = 10;

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let source = match open_source(&config.source, config.stream.jpeg_quality) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("Failed to open frame source: {}", e);
            return Err(e.into());
        }
    };

    let client = Arc::new(ModelApiClient::new(
        &config.model_api.get_address(),
        config.stream.get_request_timeout(),
    )?);

    let warmup = match client.wait_until_ready(CONNECT_RETRIES).await {
        Ok(warmup) => warmup,
        Err(e) => {
            tracing::error!("Model API at {} is not reachable: {}", client.base_url(), e);
            return Err(e.into());
        }
    };
    tracing::info!(
        "Connected to model API at {} ({} warm-up detections)",
        client.base_url(),
        warmup.detections.len()
    );

    let (shutdown_tx, _) = broadcast::channel(1);
    let streamer_shutdown_rx = shutdown_tx.subscribe();
    let poller_shutdown_rx = shutdown_tx.subscribe();

    let poller_handle = tokio::spawn(poll_results(
        client.clone(),
        config.stream.get_result_poll_interval(),
        poller_shutdown_rx,
    ));

    let streamer = Streamer::new(
        source,
        client,
        config.stream.get_frame_interval(),
        config.stream.report_every,
    );
    let streamer_handle = tokio::spawn(streamer.run(streamer_shutdown_rx));

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown.");
        let _ = signal_tx.send(());
    });

    let stats = streamer_handle.await?;

    let _ = shutdown_tx.send(());
    let _ = poller_handle.await;

    stats.log_summary();

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
