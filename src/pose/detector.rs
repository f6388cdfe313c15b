use anyhow::{Context, Result};
use image::RgbaImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use super::estimator::PoseEstimator;
use super::keypoint::{KeypointName, Pose};
use super::preprocess::preprocess_for_movenet;

/// ONNX Runtime 上の MoveNet SinglePose Lightning
pub struct MoveNetEstimator {
    session: Session,
}

impl MoveNetEstimator {
    /// ONNXモデルを読み込む
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load ONNX model")?;

        Ok(Self { session })
    }

    /// フレームで推論し、フレームのピクセル座標で姿勢を返す
    pub fn detect(&mut self, frame: &RgbaImage) -> Result<Pose> {
        let input = preprocess_for_movenet(frame);
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Inference failed")?;

        // [1, 1, 17, 3] の並びは (y, x, score)
        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract output tensor")?;

        let mut raw = [[0.0f32; 3]; KeypointName::COUNT];
        for (i, kp) in raw.iter_mut().enumerate() {
            let y = output[[0, 0, i, 0]];
            let x = output[[0, 0, i, 1]];
            let score = output[[0, 0, i, 2]];
            *kp = [x, y, score];
        }

        Ok(Pose::from_normalized(&raw, frame.width(), frame.height()))
    }
}

impl PoseEstimator for MoveNetEstimator {
    /// SinglePose は常に17点を出す。誰もいないフレームは全体にスコアが低く、
    /// ランドマーク検索で除外される
    fn estimate(&mut self, frame: &RgbaImage) -> Result<Vec<Pose>> {
        let pose = self.detect(frame)?;
        if pose.keypoints.iter().any(|kp| kp.is_confident()) {
            Ok(vec![pose])
        } else {
            Ok(Vec::new())
        }
    }
}
