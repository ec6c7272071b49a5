//! pantilt-eye: vision boundary and the tracking loop
//!
//! Frames come from a [`FrameSource`], detections from a [`Detector`]
//! wrapped in a [`DetectionPipeline`]. The [`TrackingCoordinator`] runs one
//! background worker that turns the best detection into a servo command
//! through the control law and the actuator guard, and sweeps while no
//! target is in view.

pub mod camera;
pub mod processing;
pub mod mode;
pub mod scan;
pub mod status;
pub mod coordinator;

pub use camera::{FrameSource, SyntheticCamera};
pub use coordinator::{
    CycleOutcome, EmergencyHandle, FinalStats, StatusHandle, TrackingCoordinator, TrackingLoop,
};
pub use mode::{MissAction, ModeMachine, TrackingMode};
pub use processing::{select_best, DetectionPipeline, DetectionStats, Detector, ScriptedDetector};
pub use scan::ScanPattern;
pub use status::SystemStatus;
