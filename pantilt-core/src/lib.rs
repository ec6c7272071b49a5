//! pantilt-core: shared types, errors and configuration for the pan-tilt
//! pet tracking rig.

pub mod types;
pub mod error;
pub mod config;

pub use error::{Error, Result};
pub use types::{
    BoundingBox, ControlError, Correction, Detection, Frame, PanTilt, PetClass, PixelPoint,
};
pub use config::{
    CameraConfig, ControlConfig, ControlLawKind, LoggingConfig, PidAxisGains, PidConfig,
    ScanConfig, ServoConfig, TrackerConfig, TrackingConfig,
};
