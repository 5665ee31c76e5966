use anyhow::{Context, Result};
use image::RgbaImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use super::detection::{DetectionResult, Detector};
use super::landmark::{Landmark, LandmarkIndex, LandmarkSet};
use super::preprocess::preprocess_for_movenet;
use crate::config::DetectorConfig;

/// MoveNet SinglePose を使用した姿勢検出器
///
/// セグメンテーションマスクは出力しない（マスク無しフレームとして合成される）。
pub struct MoveNetDetector {
    session: Session,
    /// これ未満の平均信頼度は「人物なし」として空のランドマーク列を返す
    min_pose_score: f32,
}

impl MoveNetDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P, min_pose_score: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .with_context(|| format!("Failed to load ONNX model {}", model_path.as_ref().display()))?;

        Ok(Self {
            session,
            min_pose_score,
        })
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        Self::new(&config.model, config.min_pose_score)
    }

    /// 前処理済みテンソルからランドマークを検出
    ///
    /// 入力: [1, 192, 192, 3] の f32 テンソル
    fn infer(&mut self, input: Array4<f32>) -> Result<LandmarkSet> {
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Inference failed")?;

        // MoveNet の出力は [1, 1, 17, 3] (y, x, confidence)
        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract output tensor")?;

        let mut landmarks = [Landmark::default(); LandmarkIndex::COUNT];
        for (i, landmark) in landmarks.iter_mut().enumerate() {
            let y = output[[0, 0, i, 0]];
            let x = output[[0, 0, i, 1]];
            let confidence = output[[0, 0, i, 2]];
            *landmark = Landmark::new(x, y, confidence);
        }

        let set = LandmarkSet::from_array(landmarks);
        if set.average_visibility() < self.min_pose_score {
            return Ok(LandmarkSet::empty());
        }
        Ok(set)
    }
}

impl Detector for MoveNetDetector {
    async fn detect(&mut self, frame: RgbaImage) -> Result<DetectionResult> {
        let input = preprocess_for_movenet(&frame);
        let landmarks = self.infer(input)?;
        Ok(DetectionResult::new(frame, landmarks, None))
    }
}
