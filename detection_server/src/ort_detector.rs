use crate::{
    config::{ModelConfig, Validatable},
    detection::{sort_by_confidence, BoundingBox, Detection},
    detector::{Detector, DetectorError},
    frame::Frame,
    labels::class_name,
};
use image::imageops::FilterType;
use ndarray::{Array, ArrayView2, Axis, Ix3, Ix4};
use ort::{
    execution_providers::TensorRTExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};

const OUTPUT_NAME: &str = "output0";

/// YOLO-style detector backed by a single ONNX Runtime session.
pub struct OrtDetector {
    session: Session,
    input_size: u32,
    min_probability: f32,
    iou_threshold: f32,
    class_names: Vec<String>,
}

impl OrtDetector {
    pub fn new(
        model_config: &ModelConfig,
        class_names: Vec<String>,
    ) -> Result<Self, DetectorError> {
        model_config.validate().map_err(DetectorError::Load)?;

        let session = Session::builder()?
            .with_execution_providers([TensorRTExecutionProvider::default()
                .with_engine_cache(true)
                .build()])?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_config.get_path())?;

        tracing::info!(
            "Loaded ONNX model {:?} with {} class labels",
            model_config.get_path(),
            class_names.len()
        );

        Ok(Self {
            session,
            input_size: model_config.input_size,
            min_probability: model_config.min_probability,
            iou_threshold: model_config.iou_threshold,
            class_names,
        })
    }

    fn run_inference(
        &mut self,
        input: &Array<f32, Ix4>,
    ) -> Result<Array<f32, Ix3>, DetectorError> {
        let tensor_ref = TensorRef::from_array_view(input.view())?;
        let outputs = self.session.run(ort::inputs![tensor_ref])?;

        let (shape, data) = outputs[OUTPUT_NAME].try_extract_tensor::<f32>()?;
        let array = ndarray::ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())?;

        array
            .into_dimensionality::<Ix3>()
            .map_err(|e| DetectorError::Output(format!("expected a rank 3 tensor: {}", e)))
    }
}

impl Detector for OrtDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        let input = frame_to_tensor(frame, self.input_size);
        let output = self.run_inference(&input)?;

        if output.shape()[0] != 1 || output.shape()[1] < 5 {
            return Err(DetectorError::Output(format!(
                "unsupported output shape {:?}",
                output.shape()
            )));
        }

        let scale_x = frame.width() as f32 / self.input_size as f32;
        let scale_y = frame.height() as f32 / self.input_size as f32;
        let candidates = decode_output(
            output.index_axis(Axis(0), 0),
            (scale_x, scale_y),
            self.min_probability,
            &self.class_names,
        );

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

/// Resizes to a square NCHW tensor with channels scaled to `[0, 1]`.
fn frame_to_tensor(frame: &Frame, input_size: u32) -> Array<f32, Ix4> {
    let img = frame
        .image()
        .resize_exact(input_size, input_size, FilterType::CatmullRom)
        .to_rgb8();

    let size = input_size as usize;
    let mut input = Array::zeros((1, 3, size, size));
    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

/// Decodes a `[4 + classes, anchors]` view. Each anchor column holds
/// `cx, cy, w, h` in input-tensor pixels followed by per-class scores.
fn decode_output(
    output: ArrayView2<f32>,
    (scale_x, scale_y): (f32, f32),
    min_probability: f32,
    class_names: &[String],
) -> Vec<Detection> {
    let mut detections = Vec::new();

    for anchor in output.axis_iter(Axis(1)) {
        let best = anchor
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .reduce(|accum, row| if row.1 > accum.1 { row } else { accum });

        let Some((class_id, prob)) = best else {
            continue;
        };
        if prob < min_probability {
            continue;
        }

        let xc = anchor[0] * scale_x;
        let yc = anchor[1] * scale_y;
        let w = anchor[2] * scale_x;
        let h = anchor[3] * scale_y;

        detections.push(Detection {
            class_id,
            class_name: class_name(class_names, class_id),
            confidence: prob,
            bbox: BoundingBox {
                x1: xc - w / 2.,
                y1: yc - h / 2.,
                x2: xc + w / 2.,
                y2: yc + h / 2.,
            },
        });
    }

    detections
}

/// Per-class greedy suppression; keeps the highest-confidence box of any
/// overlapping same-class group.
fn non_max_suppression(mut boxes: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    sort_by_confidence(&mut boxes);
    let mut kept: Vec<Detection> = Vec::new();

    for candidate in boxes {
        let suppressed = kept.iter().any(|keeper| {
            keeper.class_id == candidate.class_id
                && keeper.bbox.iou(&candidate.bbox) >= iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use ndarray::Array2;

    fn anchor_columns(anchors: &[[f32; 6]]) -> Array2<f32> {
        let mut output = Array2::zeros((6, anchors.len()));
        for (i, anchor) in anchors.iter().enumerate() {
            for (row, value) in anchor.iter().enumerate() {
                output[[row, i]] = *value;
            }
        }
        output
    }

    fn labels() -> Vec<String> {
        vec!["person".to_string(), "ball".to_string()]
    }

    #[test]
    fn test_frame_to_tensor() {
        let frame = Frame::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            100,
            50,
            Rgb([255, 0, 0]),
        )));

        let input = frame_to_tensor(&frame, 64);

        assert_eq!(input.shape(), &[1, 3, 64, 64]);
        assert!((input[[0, 0, 10, 10]] - 1.0).abs() < 1e-3);
        assert!(input[[0, 1, 10, 10]].abs() < 1e-3);
    }

    #[test]
    fn test_decode_output_scales_and_filters() {
        let output = anchor_columns(&[
            [320., 320., 64., 32., 0.9, 0.1],
            [100., 100., 10., 10., 0.05, 0.1],
            [50., 60., 20., 20., 0.2, 0.6],
        ]);

        let detections = decode_output(output.view(), (2.0, 0.5), 0.25, &labels());

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_name, "person");
        assert_eq!(detections[0].bbox.as_array(), [576., 152., 704., 168.]);
        assert_eq!(detections[1].class_name, "ball");
        assert_eq!(detections[1].class_id, 1);
    }

    #[test]
    fn test_decode_output_names_unknown_classes() {
        let output = anchor_columns(&[[10., 10., 2., 2., 0.0, 0.9]]);
        let detections = decode_output(output.view(), (1.0, 1.0), 0.25, &[]);

        assert_eq!(detections[0].class_name, "class_1");
    }

    #[test]
    fn test_non_max_suppression_is_per_class() {
        let make = |class_id: usize, confidence: f32, x1: f32| Detection {
            class_id,
            class_name: class_name(&labels(), class_id),
            confidence,
            bbox: BoundingBox {
                x1,
                y1: 0.,
                x2: x1 + 10.,
                y2: 10.,
            },
        };

        let kept = non_max_suppression(
            vec![
                make(0, 0.6, 1.),
                make(0, 0.9, 0.),
                make(1, 0.8, 0.),
                make(0, 0.7, 50.),
            ],
            0.7,
        );

        let summary: Vec<_> = kept.iter().map(|d| (d.class_id, d.confidence)).collect();
        assert_eq!(summary, vec![(0, 0.9), (1, 0.8), (0, 0.7)]);
    }
}
