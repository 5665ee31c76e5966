pub mod detection;
#[cfg(feature = "desktop")]
pub mod detector;
pub mod landmark;
#[cfg(feature = "desktop")]
pub mod preprocess;

pub use detection::{DetectionResult, Detector};
#[cfg(feature = "desktop")]
pub use detector::MoveNetDetector;
pub use landmark::{Landmark, LandmarkIndex, LandmarkSet};
#[cfg(feature = "desktop")]
pub use preprocess::preprocess_for_movenet;
