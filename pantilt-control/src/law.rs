//! The control-law contract shared by every variant

use pantilt_core::{ControlError, Correction};
use serde::Serialize;
use std::time::Instant;

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerStatus {
    Uninitialized,
    Ready,
    Running,
    /// Last unclamped output exceeded the bound
    Saturated,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Pan,
    Tilt,
}

/// Decomposed contributions of the last update on one axis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AxisComponents {
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
    pub output: f64,
    pub raw_output: f64,
    pub saturated: bool,
}

impl AxisComponents {
    pub fn is_zero(&self) -> bool {
        self.proportional == 0.0
            && self.integral == 0.0
            && self.derivative == 0.0
            && self.output == 0.0
            && self.raw_output == 0.0
            && !self.saturated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Components {
    pub pan: AxisComponents,
    pub tilt: AxisComponents,
}

impl Components {
    pub fn is_zero(&self) -> bool {
        self.pan.is_zero() && self.tilt.is_zero()
    }
}

/// Aggregates over the trailing window of one axis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AxisStats {
    pub samples: usize,
    pub mean_abs_error: f64,
    pub mean_output: f64,
    pub output_variance: f64,
    pub saturation_rate: f64,
    pub deadband_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub name: String,
    pub status: ControllerStatus,
    pub total_updates: u64,
    pub pan: AxisStats,
    pub tilt: AxisStats,
}

/// Maps a pixel error to a bounded angular correction.
///
/// `compute` must keep each axis of the result within the law's configured
/// correction bound, and must return zero on an axis whose error magnitude
/// is inside the deadband.
pub trait ControlLaw: Send {
    fn name(&self) -> &str;

    /// Compute with an explicit timestamp (used by time-dependent laws)
    fn compute_at(&mut self, error: ControlError, now: Instant) -> Correction;

    fn compute(&mut self, error: ControlError) -> Correction {
        self.compute_at(error, Instant::now())
    }

    /// P/I/D contributions of the last update
    fn components(&self) -> Components;

    fn statistics(&self) -> PerformanceStats;

    fn status(&self) -> ControllerStatus;

    /// Zero accumulators and history; gains and limits are kept
    fn reset(&mut self);

    /// Clear history and move to the terminal `Uninitialized` status
    fn cleanup(&mut self);
}

/// Errors strictly inside the deadband count as zero
pub(crate) fn apply_deadband(error: f64, deadband: f64) -> f64 {
    if error.abs() < deadband {
        0.0
    } else {
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadband_is_strict() {
        assert_eq!(apply_deadband(4.9, 5.0), 0.0);
        assert_eq!(apply_deadband(-4.9, 5.0), 0.0);
        assert_eq!(apply_deadband(5.0, 5.0), 5.0);
        assert_eq!(apply_deadband(-7.0, 5.0), -7.0);
        assert_eq!(apply_deadband(0.1, 0.0), 0.1);
    }

    #[test]
    fn test_components_zero() {
        assert!(Components::default().is_zero());
        let mut c = Components::default();
        c.tilt.derivative = 0.5;
        assert!(!c.is_zero());
    }
}
