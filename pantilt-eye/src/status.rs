//! Observable system status

use crate::mode::TrackingMode;
use chrono::{DateTime, Utc};
use pantilt_core::{Correction, PanTilt, PetClass};
use serde::Serialize;
use std::fmt;

/// Snapshot of the coordinator state; observers only ever get a copy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub mode: TrackingMode,
    pub target_detected: bool,
    pub target_class: Option<PetClass>,
    pub target_confidence: Option<f32>,
    pub angles: PanTilt,
    pub correction_applied: Correction,
    pub total_detections: u64,
    /// Corrections refused by the actuator guard
    pub rejected_corrections: u64,
    pub dropped_frames: u64,
    pub tracking_duration_secs: f64,
    pub last_detection_time: Option<DateTime<Utc>>,
    pub is_running: bool,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            mode: TrackingMode::Standby,
            target_detected: false,
            target_class: None,
            target_confidence: None,
            angles: PanTilt::CENTER,
            correction_applied: Correction::ZERO,
            total_detections: 0,
            rejected_corrections: 0,
            dropped_frames: 0,
            tracking_duration_secs: 0.0,
            last_detection_time: None,
            is_running: false,
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.mode, self.angles)?;
        match (self.target_class, self.target_confidence) {
            (Some(class), Some(confidence)) if self.target_detected => {
                write!(f, ", target {} ({:.2})", class, confidence)?
            }
            _ => write!(f, ", no target")?,
        }
        write!(
            f,
            ", correction ({:.2}, {:.2}), detections {}, running {:.1}s",
            self.correction_applied.pan,
            self.correction_applied.tilt,
            self.total_detections,
            self.tracking_duration_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_standby_at_center() {
        let status = SystemStatus::default();
        assert_eq!(status.mode, TrackingMode::Standby);
        assert_eq!(status.angles, PanTilt::CENTER);
        assert!(!status.is_running);
    }

    #[test]
    fn test_serializes_lowercase_mode() {
        let status = SystemStatus::default();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["mode"], "standby");
        assert_eq!(json["target_class"], serde_json::Value::Null);
    }

    #[test]
    fn test_display() {
        let mut status = SystemStatus::default();
        status.mode = TrackingMode::Tracking;
        status.target_detected = true;
        status.target_class = Some(PetClass::Cat);
        status.target_confidence = Some(0.91);
        let line = status.to_string();
        assert!(line.contains("TRACKING"));
        assert!(line.contains("target Cat (0.91)"));
    }
}
