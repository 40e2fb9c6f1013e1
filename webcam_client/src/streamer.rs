use crate::client::ModelApiClient;
use crate::source::FrameSource;
use parking_lot::Mutex;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::broadcast,
    time::{interval, MissedTickBehavior},
};

#[derive(Debug, Default, Clone)]
pub struct StreamStats {
    pub captured: u64,
    pub sent: u64,
    pub failed: u64,
    pub elapsed: Duration,
}

impl StreamStats {
    /// Percentage of captured frames the server acknowledged.
    pub fn success_rate(&self) -> f64 {
        if self.captured == 0 {
            return 0.0;
        }
        self.sent as f64 / self.captured as f64 * 100.0
    }

    pub fn average_fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.sent as f64 / secs
    }

    pub fn log_summary(&self) {
        tracing::info!(
            frames_captured = self.captured,
            frames_sent = self.sent,
            frames_failed = self.failed,
            success_rate = %format!("{:.1}%", self.success_rate()),
            average_fps = %format!("{:.2}", self.average_fps()),
            duration_secs = %format!("{:.1}", self.elapsed.as_secs_f64()),
            "Streaming finished"
        );
    }
}

pub struct Streamer {
    source: Arc<Mutex<Box<dyn FrameSource>>>,
    client: Arc<ModelApiClient>,
    frame_interval: Duration,
    report_every: u64,
}

impl Streamer {
    pub fn new(
        source: Box<dyn FrameSource>,
        client: Arc<ModelApiClient>,
        frame_interval: Duration,
        report_every: u64,
    ) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            client,
            frame_interval,
            report_every: report_every.max(1),
        }
    }

    /// Sends frames until the source is exhausted or shutdown is signalled.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> StreamStats {
        let mut stats = StreamStats::default();
        let started = Instant::now();

        let mut ticker = interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Streamer received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let source = self.source.clone();
                    let frame =
                        tokio::task::spawn_blocking(move || source.lock().next_frame()).await;

                    let jpeg = match frame {
                        Ok(Ok(Some(jpeg))) => jpeg,
                        Ok(Ok(None)) => {
                            tracing::info!("Frame source exhausted");
                            break;
                        }
                        Ok(Err(e)) => {
                            tracing::warn!("Failed to read frame: {}", e);
                            continue;
                        }
                        Err(e) => {
                            tracing::error!("Capture task failed: {}", e);
                            break;
                        }
                    };
                    stats.captured += 1;

                    match self.client.submit_frame(jpeg).await {
                        Ok(()) => {
                            stats.sent += 1;
                            if stats.sent % self.report_every == 0 {
                                tracing::info!(
                                    "Sent {} frames ({:.1} fps)",
                                    stats.sent,
                                    stats.sent as f64 / started.elapsed().as_secs_f64()
                                );
                            }
                        }
                        Err(e) => {
                            stats.failed += 1;
                            tracing::warn!("Failed to send frame: {}", e);
                        }
                    }
                }
            }
        }

        stats.elapsed = started.elapsed();
        stats
    }
}

/// Logs every result whose timestamp differs from the last one seen and
/// returns how many were logged.
pub async fn poll_results(
    client: Arc<ModelApiClient>,
    poll_interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> u64 {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_timestamp: Option<f64> = None;
    let mut logged = 0;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                match client.latest_result().await {
                    Ok(result) => {
                        if result.timestamp.is_some() && result.timestamp != last_timestamp {
                            last_timestamp = result.timestamp;
                            logged += 1;
                            let summary: Vec<String> = result
                                .detections
                                .iter()
                                .map(|d| format!("{} {:.2}", d.class_name, d.confidence))
                                .collect();
                            tracing::info!(
                                timestamp = result.timestamp,
                                total_objects = result.detections.len(),
                                "New prediction: [{}]",
                                summary.join(", ")
                            );
                        }
                    }
                    Err(e) => tracing::debug!("Result poll failed: {}", e),
                }
            }
        }
    }

    logged
}
