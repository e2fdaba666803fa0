//! Person detection and frame annotation

mod bridge;
mod detector;
mod http;
mod stats;


pub use bridge::AnnotationBridge;
pub use detector::{BoundingBox, Detection, DetectionResult, Detector};
pub use http::HttpDetector;
pub use stats::DetectionStats;
