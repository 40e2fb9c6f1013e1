use clap::Parser;
use detection_server::{
    config::{self, Validatable},
    detection::sort_by_confidence,
    detector::Detector,
    frame::Frame,
    load_class_names,
    ort_detector::OrtDetector,
};
use std::path::PathBuf;

/// Runs the configured model once on an image file and prints what it found.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to run detection on (JPEG, PNG, ...)
    #[arg(long, value_name = "FILE")]
    image: PathBuf,

    /// Only print detections at or above this confidence (0.0 - 1.0)
    #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
    confidence: f32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let args = Args::parse();
    let config = config::get_configuration()?;

    let class_names = load_class_names(&config.labels.get_path())?;
    let mut detector = OrtDetector::new(&config.model, class_names)?;

    let bytes = std::fs::read(&args.image)?;
    let frame = Frame::decode(&bytes)?;

    let mut detections = detector.detect(&frame)?;
    sort_by_confidence(&mut detections);
    detections.retain(|detection| detection.confidence >= args.confidence);

    println!(
        "{} ({}x{}): {} objects at confidence >= {:.2}",
        args.image.display(),
        frame.width(),
        frame.height(),
        detections.len(),
        args.confidence
    );
    for detection in &detections {
        let [x1, y1, x2, y2] = detection.bbox.as_array();
        println!(
            "{:<15} {:.3} [{},{},{},{}]",
            detection.class_name, detection.confidence, x1 as i32, y1 as i32, x2 as i32, y2 as i32
        );
    }

    Ok(())
}
