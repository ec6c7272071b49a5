//! Detection processing

pub mod detection;
pub mod scripted;

pub use detection::{select_best, DetectionPipeline, DetectionStats, Detector};
pub use scripted::ScriptedDetector;
