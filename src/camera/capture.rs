use image::RgbaImage;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use tracing::{info, warn};

use super::source::{CameraError, FrameSource};
use crate::config::CameraConfig;

/// OpenCVを使用したカメラキャプチャ
///
/// `start()` までデバイスは開かない。開けなかった場合はフレームループ側で致命的エラーとして扱う。
pub struct OpenCvCamera {
    index: i32,
    /// 0 はドライバの既定値
    width: u32,
    height: u32,
    fps: u32,
    /// 左右反転（セルフィー表示）
    mirror: bool,
    capture: Option<VideoCapture>,
}

impl OpenCvCamera {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            index: config.index,
            width: config.width,
            height: config.height,
            fps: config.fps,
            mirror: config.mirror,
            capture: None,
        }
    }

    fn open(&self) -> Result<VideoCapture, CameraError> {
        let unsupported = |e: opencv::Error| CameraError::Unsupported(e.to_string());

        let mut capture =
            VideoCapture::new(self.index, VideoCaptureAPIs::CAP_ANY as i32).map_err(unsupported)?;

        if !capture.is_opened().map_err(unsupported)? {
            return Err(CameraError::Unavailable(format!(
                "camera {} could not be opened (blocked, busy or missing)",
                self.index
            )));
        }

        // 解像度を設定
        if self.width > 0 {
            capture.set(videoio::CAP_PROP_FRAME_WIDTH, self.width as f64).map_err(unsupported)?;
        }
        if self.height > 0 {
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, self.height as f64).map_err(unsupported)?;
        }
        if self.fps > 0 {
            capture.set(videoio::CAP_PROP_FPS, self.fps as f64).map_err(unsupported)?;
        }
        // 最新フレームのみ保持する（遅延を溜めない）
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0).map_err(unsupported)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).map_err(unsupported)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).map_err(unsupported)? as u32;
        let actual_fps = capture.get(videoio::CAP_PROP_FPS).map_err(unsupported)?;
        info!(
            camera = self.index,
            width = actual_width,
            height = actual_height,
            fps = actual_fps,
            "camera opened"
        );

        Ok(capture)
    }
}

impl FrameSource for OpenCvCamera {
    fn start(&mut self) -> Result<(), CameraError> {
        if self.capture.is_some() {
            return Ok(());
        }
        self.capture = Some(self.open()?);
        Ok(())
    }

    /// フレームを読み込む（RGBA形式）
    fn read_frame(&mut self) -> Result<RgbaImage, CameraError> {
        let capture = self.capture.as_mut().ok_or(CameraError::NotStarted)?;

        let mut frame = Mat::default();
        let grabbed = capture
            .read(&mut frame)
            .map_err(|e| CameraError::StreamLost(e.to_string()))?;

        if !grabbed || frame.empty() {
            return Err(CameraError::EmptyFrame);
        }

        mat_to_rgba(&frame, self.mirror)
            .map_err(|e| CameraError::StreamLost(e.to_string()))?
            .ok_or(CameraError::EmptyFrame)
    }

    fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                warn!(camera = self.index, "failed to release camera: {e}");
            }
        }
    }
}

/// BGR(A) Mat を RGBA 画像に変換
fn mat_to_rgba(frame: &Mat, mirror: bool) -> opencv::Result<Option<RgbaImage>> {
    let code = if frame.channels() == 4 {
        imgproc::COLOR_BGRA2RGBA
    } else {
        imgproc::COLOR_BGR2RGBA
    };
    let mut rgba = Mat::default();
    imgproc::cvt_color_def(frame, &mut rgba, code)?;

    let rgba = if mirror {
        let mut flipped = Mat::default();
        core::flip(&rgba, &mut flipped, 1)?;
        flipped
    } else {
        rgba
    };

    let width = rgba.cols() as u32;
    let height = rgba.rows() as u32;
    let bytes = rgba.data_bytes()?.to_vec();
    Ok(RgbaImage::from_raw(width, height, bytes))
}
