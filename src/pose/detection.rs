//! Output contract of the external pose/segmentation detector.

use anyhow::Result;
use image::{GrayImage, RgbaImage};

use super::landmark::{LandmarkIndex, LandmarkSet};
use crate::error::PipelineError;

/// One frame's detector output. Immutable once built.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    frame: RgbaImage,
    landmarks: LandmarkSet,
    mask: Option<GrayImage>,
}

impl DetectionResult {
    pub fn new(frame: RgbaImage, landmarks: LandmarkSet, mask: Option<GrayImage>) -> Self {
        Self {
            frame,
            landmarks,
            mask,
        }
    }

    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn landmarks(&self) -> &LandmarkSet {
        &self.landmarks
    }

    /// Subject probability per pixel (255 = subject), aligned with the frame.
    pub fn mask(&self) -> Option<&GrayImage> {
        self.mask.as_ref()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    /// Rejects results that break the detector contract.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let (width, height) = self.frame.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::MalformedResult("source frame is empty".into()));
        }

        let count = self.landmarks.len();
        if count != 0 && count != LandmarkIndex::COUNT {
            return Err(PipelineError::MalformedResult(format!(
                "expected 0 or {} landmarks, got {count}",
                LandmarkIndex::COUNT
            )));
        }
        if let Some(i) = self.landmarks.iter().position(|l| !l.is_finite()) {
            return Err(PipelineError::MalformedResult(format!(
                "landmark {i} has a non-finite component"
            )));
        }

        if let Some(mask) = &self.mask {
            if mask.dimensions() != (width, height) {
                return Err(PipelineError::MalformedResult(format!(
                    "mask is {}x{} but frame is {width}x{height}",
                    mask.width(),
                    mask.height()
                )));
            }
        }
        Ok(())
    }
}

/// Pose/segmentation detector.
///
/// The frame loop awaits each call before acquiring the next frame, so at most
/// one inference is ever in flight.
#[allow(async_fn_in_trait)]
pub trait Detector {
    async fn detect(&mut self, frame: RgbaImage) -> Result<DetectionResult>;
}
