use crate::{
    detection::{sort_by_confidence, Detection},
    detector::{Detector, DetectorError},
    frame::Frame,
    pipeline::Pipeline,
    telemetry::Metrics,
};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant, SystemTime},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceFailure {
    #[error("Detector failed: {0}")]
    Detector(#[from] DetectorError),
    #[error("Detector panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing was pending within the wait interval.
    Idle,
    /// A frame was processed and its result published.
    Published,
    /// A frame was taken but detection failed; the previous result stands.
    Failed,
}

/// Runs the detector on a synthetic noise frame so the model is exercised
/// before any traffic arrives.
pub fn warm_up<D: Detector>(
    detector: &mut D,
    size: u32,
) -> Result<Vec<Detection>, InferenceFailure> {
    let frame = Frame::random(size, size);
    let mut detections = invoke(detector, &frame)?;
    sort_by_confidence(&mut detections);

    tracing::info!(
        "Warm-up inference on a {}x{} frame returned {} detections",
        size,
        size,
        detections.len()
    );
    Ok(detections)
}

/// Calls the detector, turning a panic into an ordinary failure.
fn invoke<D: Detector>(
    detector: &mut D,
    frame: &Frame,
) -> Result<Vec<Detection>, InferenceFailure> {
    match panic::catch_unwind(AssertUnwindSafe(|| detector.detect(frame))) {
        Ok(result) => Ok(result?),
        Err(payload) => Err(InferenceFailure::Panicked(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The single consumer of the frame buffer. Exactly one detection runs at a
/// time; frames arriving meanwhile coalesce in the buffer.
pub struct InferenceWorker<D: Detector> {
    detector: D,
    pipeline: Arc<Pipeline>,
    metrics: Arc<Metrics>,
    poll_interval: Duration,
}

impl<D: Detector> InferenceWorker<D> {
    pub fn new(
        detector: D,
        pipeline: Arc<Pipeline>,
        metrics: Arc<Metrics>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            detector,
            pipeline,
            metrics,
            poll_interval,
        }
    }

    /// One `Idle -> Running -> Idle` cycle, waiting at most one poll interval
    /// for a frame.
    pub fn step(&mut self) -> Step {
        let Some(frame) = self.pipeline.claim_frame(self.poll_interval) else {
            return Step::Idle;
        };

        let started = Instant::now();
        let outcome = invoke(&mut self.detector, &frame);
        let elapsed = started.elapsed();
        drop(frame);

        let step = match outcome {
            Ok(detections) => {
                let result = self
                    .pipeline
                    .results()
                    .publish(detections, SystemTime::now());
                self.pipeline.record_completed();
                self.metrics.record_inference(elapsed.as_millis() as u64);
                tracing::debug!(
                    "Published {} detections in {:.1}ms",
                    result.len(),
                    elapsed.as_secs_f64() * 1000.
                );
                Step::Published
            }
            Err(err) => {
                self.pipeline.record_failure();
                self.metrics.record_inference_failure();
                tracing::error!("Inference failed, keeping previous result: {}", err);
                Step::Failed
            }
        };

        self.pipeline.set_busy(false);
        step
    }

    pub fn spawn(mut self) -> std::io::Result<WorkerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let pipeline = self.pipeline.clone();

        let handle = thread::Builder::new().name("inference-worker".into()).spawn({
            let stop = stop.clone();
            move || {
                tracing::info!("Inference worker started");
                while !stop.load(Ordering::Acquire) {
                    self.step();
                }
                tracing::info!("Inference worker stopped");
            }
        })?;

        Ok(WorkerHandle {
            stop,
            pipeline,
            handle: Some(handle),
        })
    }
}

/// Owner handle for the worker thread.
pub struct WorkerHandle {
    stop: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Requests shutdown and blocks until the thread exits. An in-flight
    /// inference runs to completion first.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        self.pipeline.frames().wake();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Inference worker thread panicked");
            }
        }
    }
}
