//! Proportional control law with deadband and per-axis gains

use crate::history::{AxisSample, PerformanceWindow};
use crate::law::{
    apply_deadband, AxisComponents, Components, ControlLaw, ControllerStatus, PerformanceStats,
};
use pantilt_core::config::ControlConfig;
use pantilt_core::{ControlError, Correction, Error, Result};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProportionalParameters {
    pub pan_gain: f64,
    pub tilt_gain: f64,
    pub max_correction: f64,
    pub deadband: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProportionalState {
    pub status: ControllerStatus,
    pub last_error: ControlError,
    pub last_output: Correction,
    pub total_corrections: u64,
}

/// `pan = clip(ex * pan_gain)`, `tilt = clip(-ey * tilt_gain)`
pub struct ProportionalLaw {
    name: String,
    params: ProportionalParameters,
    status: ControllerStatus,
    last_error: ControlError,
    last_output: Correction,
    last_update: Option<Instant>,
    components: Components,
    total_corrections: u64,
    pan_history: PerformanceWindow,
    tilt_history: PerformanceWindow,
}

impl ProportionalLaw {
    pub fn new(
        pan_gain: f64,
        tilt_gain: f64,
        max_correction: f64,
        deadband: f64,
        history_window: usize,
    ) -> Result<Self> {
        if !(max_correction > 0.0) {
            return Err(Error::Configuration(format!(
                "max correction must be > 0, got {}",
                max_correction
            )));
        }
        if !(deadband >= 0.0) {
            return Err(Error::Configuration(format!(
                "deadband must be >= 0, got {}",
                deadband
            )));
        }

        info!(
            "Proportional law: gains ({:.4}, {:.4}), max correction {:.1}°, deadband {:.1}px",
            pan_gain, tilt_gain, max_correction, deadband
        );

        Ok(Self {
            name: "SimpleP".to_string(),
            params: ProportionalParameters {
                pan_gain,
                tilt_gain,
                max_correction,
                deadband,
            },
            status: ControllerStatus::Ready,
            last_error: ControlError::default(),
            last_output: Correction::ZERO,
            last_update: None,
            components: Components::default(),
            total_corrections: 0,
            pan_history: PerformanceWindow::new(history_window),
            tilt_history: PerformanceWindow::new(history_window),
        })
    }

    pub fn from_config(config: &ControlConfig) -> Result<Self> {
        Self::new(
            config.pan_gain,
            config.tilt_gain,
            config.max_correction,
            config.deadband_px,
            config.history_window,
        )
    }

    pub fn set_gains(&mut self, pan_gain: f64, tilt_gain: f64) {
        self.params.pan_gain = pan_gain;
        self.params.tilt_gain = tilt_gain;
        info!("Proportional gains updated: ({:.4}, {:.4})", pan_gain, tilt_gain);
    }

    pub fn set_max_correction(&mut self, max_correction: f64) -> Result<()> {
        if !(max_correction > 0.0) {
            return Err(Error::Configuration(format!(
                "max correction must be > 0, got {}",
                max_correction
            )));
        }
        self.params.max_correction = max_correction;
        Ok(())
    }

    pub fn set_deadband(&mut self, deadband: f64) -> Result<()> {
        if !(deadband >= 0.0) {
            return Err(Error::Configuration(format!(
                "deadband must be >= 0, got {}",
                deadband
            )));
        }
        self.params.deadband = deadband;
        Ok(())
    }

    pub fn parameters(&self) -> ProportionalParameters {
        self.params
    }

    pub fn state(&self) -> ProportionalState {
        ProportionalState {
            status: self.status,
            last_error: self.last_error,
            last_output: self.last_output,
            total_corrections: self.total_corrections,
        }
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    fn axis(&self, error: f64, gain: f64) -> (AxisComponents, bool) {
        let effective = apply_deadband(error, self.params.deadband);
        let limit = self.params.max_correction;
        let raw = effective * gain;
        let output = raw.clamp(-limit, limit);
        let components = AxisComponents {
            proportional: raw,
            integral: 0.0,
            derivative: 0.0,
            output,
            raw_output: raw,
            saturated: raw.abs() > limit,
        };
        (components, error.abs() < self.params.deadband)
    }
}

impl ControlLaw for ProportionalLaw {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute_at(&mut self, error: ControlError, now: Instant) -> Correction {
        if matches!(
            self.status,
            ControllerStatus::Uninitialized | ControllerStatus::Error
        ) {
            warn!("{} compute called in {:?} status", self.name, self.status);
            return Correction::ZERO;
        }

        let (pan, pan_deadband) = self.axis(error.pan, self.params.pan_gain);
        // Image rows grow downward: a target below centre needs negative tilt
        let (tilt, tilt_deadband) = self.axis(-error.tilt, self.params.tilt_gain);

        self.pan_history.push(AxisSample {
            error: error.pan,
            output: pan.output,
            saturated: pan.saturated,
            in_deadband: pan_deadband,
        });
        self.tilt_history.push(AxisSample {
            error: error.tilt,
            output: tilt.output,
            saturated: tilt.saturated,
            in_deadband: tilt_deadband,
        });

        self.status = if pan.saturated || tilt.saturated {
            ControllerStatus::Saturated
        } else {
            ControllerStatus::Running
        };

        let correction = Correction::new(pan.output, tilt.output);
        self.components = Components { pan, tilt };
        self.last_error = error;
        self.last_output = correction;
        self.last_update = Some(now);
        self.total_corrections += 1;

        debug!(
            "{} error ({:.1}, {:.1}) -> correction ({:.3}, {:.3})",
            self.name, error.pan, error.tilt, correction.pan, correction.tilt
        );
        correction
    }

    fn components(&self) -> Components {
        self.components
    }

    fn statistics(&self) -> PerformanceStats {
        PerformanceStats {
            name: self.name.clone(),
            status: self.status,
            total_updates: self.total_corrections,
            pan: self.pan_history.stats(),
            tilt: self.tilt_history.stats(),
        }
    }

    fn status(&self) -> ControllerStatus {
        self.status
    }

    fn reset(&mut self) {
        self.last_error = ControlError::default();
        self.last_output = Correction::ZERO;
        self.last_update = None;
        self.components = Components::default();
        self.total_corrections = 0;
        self.pan_history.clear();
        self.tilt_history.clear();
        if self.status != ControllerStatus::Error {
            self.status = ControllerStatus::Ready;
        }
        debug!("{} reset", self.name);
    }

    fn cleanup(&mut self) {
        self.pan_history.clear();
        self.tilt_history.clear();
        self.status = ControllerStatus::Uninitialized;
        info!("{} cleaned up", self.name);
    }
}
