use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    frames_received: Counter<u64>,
    frames_dropped: Counter<u64>,
    decode_failures: Counter<u64>,
    inference_failures: Counter<u64>,
    inference_duration: Histogram<u64>,
    registry: Registry,
    // Keeps the pipeline alive if the global provider is replaced later.
    _provider: SdkMeterProvider,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();

        let meter = provider.meter("detection_server");
        global::set_meter_provider(provider.clone());

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let frames_received = meter
            .u64_counter("frames_received_total")
            .with_description("Frames accepted into the frame buffer")
            .build();

        let frames_dropped = meter
            .u64_counter("frames_dropped_total")
            .with_description("Pending frames overwritten before inference")
            .build();

        let decode_failures = meter
            .u64_counter("decode_failures_total")
            .with_description("Uploads rejected because the image could not be decoded")
            .build();

        let inference_failures = meter
            .u64_counter("inference_failures_total")
            .with_description("Detector passes that failed or panicked")
            .build();

        let inference_duration = meter
            .u64_histogram("inference_duration_ms")
            .with_boundaries(generate_boundaries((10, 50, 100, 500, 2000)))
            .with_description("Duration of detector passes in milliseconds")
            .build();

        Ok(Metrics {
            request_counter,
            frames_received,
            frames_dropped,
            decode_failures,
            inference_failures,
            inference_duration,
            registry,
            _provider: provider,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_frame_received(&self, replaced_pending: bool) {
        self.frames_received.add(1, &[]);
        if replaced_pending {
            self.frames_dropped.add(1, &[]);
        }
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.add(1, &[]);
    }

    pub fn record_inference(&self, duration_ms: u64) {
        self.inference_duration.record(duration_ms, &[]);
    }

    pub fn record_inference_failure(&self) {
        self.inference_failures.add(1, &[]);
    }

    /// Prometheus text exposition of everything registered so far.
    pub fn encode(&self) -> anyhow::Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Histogram bucket edges: fine steps at low latencies, coarser towards the tail.
fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_part = (parts.0..=parts.1).step_by(5);
    let middle_part = (parts.1..=parts.2).step_by(10);
    let end_part = (parts.2..=parts.3).step_by(50);
    let tail_part = (parts.3..=parts.4).step_by(500);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
