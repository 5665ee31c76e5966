//! Error taxonomy for the overlay pipeline.
//!
//! Every failure that reaches the host does so as an `error` bridge event; its
//! [`Severity`] decides whether the frame loop (or startup) halts or keeps going.

use std::path::PathBuf;

use thiserror::Error;

use crate::camera::CameraError;

/// How a failure affects the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Needs user or host intervention; the affected subsystem stops.
    Fatal,
    /// Affects one frame only; the loop continues with the next cycle.
    Transient,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("failed to load garment asset {}", path.display())]
    AssetLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to load pose model")]
    ModelLoad { detail: String },

    #[error("pose detection failed")]
    Detection { detail: String },

    #[error("malformed detection result: {0}")]
    MalformedResult(String),

    #[error("unhandled failure in frame pipeline")]
    Panic { detail: String },
}

impl PipelineError {
    pub fn severity(&self) -> Severity {
        match self {
            PipelineError::Camera(err) if err.is_fatal() => Severity::Fatal,
            PipelineError::Camera(_) => Severity::Transient,
            PipelineError::ModelLoad { .. } => Severity::Fatal,
            // 衣服なしで合成を続ける
            PipelineError::AssetLoad { .. }
            | PipelineError::Detection { .. }
            | PipelineError::MalformedResult(_)
            | PipelineError::Panic { .. } => Severity::Transient,
        }
    }

    /// Underlying cause, forwarded as the optional `error` field of the event.
    pub fn detail(&self) -> Option<String> {
        match self {
            PipelineError::Camera(err) => err.detail().map(str::to_string),
            PipelineError::AssetLoad { source, .. } => Some(source.to_string()),
            PipelineError::ModelLoad { detail }
            | PipelineError::Detection { detail }
            | PipelineError::Panic { detail } => Some(detail.clone()),
            PipelineError::MalformedResult(_) => None,
        }
    }

    /// Wraps a caught panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        PipelineError::Panic { detail }
    }
}
