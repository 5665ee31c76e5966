use image::RgbaImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera access was denied")]
    PermissionDenied(String),
    #[error("camera API is not supported on this device")]
    Unsupported(String),
    #[error("camera is not available")]
    Unavailable(String),
    #[error("camera stream was lost")]
    StreamLost(String),
    #[error("camera stream has not been started")]
    NotStarted,
    #[error("empty frame received")]
    EmptyFrame,
}

impl CameraError {
    /// Fatal errors stop the frame loop; an empty frame only skips a cycle.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CameraError::EmptyFrame)
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            CameraError::PermissionDenied(d)
            | CameraError::Unsupported(d)
            | CameraError::Unavailable(d)
            | CameraError::StreamLost(d) => Some(d),
            CameraError::NotStarted | CameraError::EmptyFrame => None,
        }
    }
}

/// Live frame stream.
///
/// `read_frame` returns the *current* frame; frames the caller was too slow to
/// read are never queued.
pub trait FrameSource {
    fn start(&mut self) -> Result<(), CameraError>;
    fn read_frame(&mut self) -> Result<RgbaImage, CameraError>;
    fn stop(&mut self);
}
