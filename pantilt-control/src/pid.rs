//! PID control law: an independent single-axis controller per axis

use crate::history::{AxisSample, PerformanceWindow};
use crate::law::{
    apply_deadband, Axis, AxisComponents, Components, ControlLaw, ControllerStatus,
    PerformanceStats,
};
use pantilt_core::config::{ControlConfig, PidAxisGains};
use pantilt_core::{ControlError, Correction, Error, Result};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PidParameters {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub output_limits: (f64, f64),
    pub integral_limits: (f64, f64),
    pub sample_time_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct PidState {
    integral: f64,
    prev_error: f64,
    prev_time: Instant,
    components: AxisComponents,
}

impl PidState {
    fn new(now: Instant) -> Self {
        Self {
            integral: 0.0,
            prev_error: 0.0,
            prev_time: now,
            components: AxisComponents::default(),
        }
    }
}

/// Single-axis PID controller with integral clamping and rate limiting
#[derive(Debug, Clone)]
pub struct PidAxis {
    name: String,
    kp: f64,
    ki: f64,
    kd: f64,
    output_limits: (f64, f64),
    integral_limits: (f64, f64),
    sample_time: Duration,
    state: PidState,
    status: ControllerStatus,
    total_updates: u64,
    saturation_count: u64,
    history: PerformanceWindow,
}

impl PidAxis {
    pub fn new(
        name: impl Into<String>,
        gains: PidAxisGains,
        output_limits: (f64, f64),
        integral_limits: (f64, f64),
        sample_time: Duration,
        history_window: usize,
    ) -> Result<Self> {
        let name = name.into();
        check_limits(&name, "output", output_limits)?;
        check_limits(&name, "integral", integral_limits)?;

        debug!(
            "{}: kp={}, ki={}, kd={}, output {:?}, integral {:?}",
            name, gains.kp, gains.ki, gains.kd, output_limits, integral_limits
        );

        Ok(Self {
            name,
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            output_limits,
            integral_limits,
            sample_time,
            state: PidState::new(Instant::now()),
            status: ControllerStatus::Ready,
            total_updates: 0,
            saturation_count: 0,
            history: PerformanceWindow::new(history_window),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update(&mut self, error: f64) -> f64 {
        self.update_at(error, Instant::now())
    }

    pub fn update_at(&mut self, error: f64, now: Instant) -> f64 {
        self.step(error, false, now)
    }

    pub(crate) fn step(&mut self, error: f64, in_deadband: bool, now: Instant) -> f64 {
        if matches!(
            self.status,
            ControllerStatus::Uninitialized | ControllerStatus::Error
        ) {
            warn!("{} update called in {:?} status", self.name, self.status);
            return 0.0;
        }

        let elapsed = now.saturating_duration_since(self.state.prev_time);
        if elapsed < self.sample_time && self.total_updates > 0 {
            return self.state.components.output;
        }
        let dt = elapsed.as_secs_f64();

        let proportional = self.kp * error;

        if dt > 0.0 {
            let (imin, imax) = self.integral_limits;
            self.state.integral = (self.state.integral + error * dt).clamp(imin, imax);
        }
        let integral = self.ki * self.state.integral;

        let derivative = if dt > 0.0 && self.total_updates > 0 {
            self.kd * (error - self.state.prev_error) / dt
        } else {
            0.0
        };

        let raw_output = proportional + integral + derivative;
        let (min, max) = self.output_limits;
        let output = raw_output.clamp(min, max);
        let saturated = raw_output.abs() > min.abs().max(max.abs());

        if saturated {
            self.saturation_count += 1;
            self.status = ControllerStatus::Saturated;
        } else {
            self.status = ControllerStatus::Running;
        }

        self.state.components = AxisComponents {
            proportional,
            integral,
            derivative,
            output,
            raw_output,
            saturated,
        };
        self.state.prev_error = error;
        self.state.prev_time = now;
        self.total_updates += 1;

        self.history.push(AxisSample {
            error,
            output,
            saturated,
            in_deadband,
        });

        output
    }

    pub fn set_parameters(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        info!("{} parameters updated: kp={}, ki={}, kd={}", self.name, kp, ki, kd);
    }

    pub fn set_output_limits(&mut self, min: f64, max: f64) -> Result<()> {
        check_limits(&self.name, "output", (min, max))?;
        self.output_limits = (min, max);
        Ok(())
    }

    pub fn set_integral_limits(&mut self, min: f64, max: f64) -> Result<()> {
        check_limits(&self.name, "integral", (min, max))?;
        self.integral_limits = (min, max);
        self.state.integral = self.state.integral.clamp(min, max);
        Ok(())
    }

    pub fn parameters(&self) -> PidParameters {
        PidParameters {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            output_limits: self.output_limits,
            integral_limits: self.integral_limits,
            sample_time_ms: self.sample_time.as_millis() as u64,
        }
    }

    pub fn components(&self) -> AxisComponents {
        self.state.components
    }

    /// Accumulated error-time product, always within the integral limits
    pub fn integral(&self) -> f64 {
        self.state.integral
    }

    pub fn output(&self) -> f64 {
        self.state.components.output
    }

    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    pub fn total_updates(&self) -> u64 {
        self.total_updates
    }

    pub fn saturation_count(&self) -> u64 {
        self.saturation_count
    }

    /// Lifetime saturation ratio
    pub fn saturation_rate(&self) -> f64 {
        self.saturation_count as f64 / self.total_updates.max(1) as f64
    }

    pub fn history(&self) -> &PerformanceWindow {
        &self.history
    }

    pub fn is_stable(&self, tolerance: f64, window: usize) -> bool {
        self.history.is_stable(tolerance, window)
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// Reset with `now` as the reference time for the next update
    pub fn reset_at(&mut self, now: Instant) {
        self.state = PidState::new(now);
        self.total_updates = 0;
        self.saturation_count = 0;
        self.history.clear();
        if self.status != ControllerStatus::Error {
            self.status = ControllerStatus::Ready;
        }
        debug!("{} reset", self.name);
    }

    pub fn cleanup(&mut self) {
        self.history.clear();
        self.status = ControllerStatus::Uninitialized;
    }
}

fn check_limits(name: &str, kind: &str, (min, max): (f64, f64)) -> Result<()> {
    if min >= max || min.is_nan() || max.is_nan() {
        return Err(Error::Configuration(format!(
            "{} {} limits invalid: min={} must be < max={}",
            name, kind, min, max
        )));
    }
    Ok(())
}

/// PID law over independent pan and tilt axes
///
/// The tilt axis is fed the negated pixel error so its sign convention
/// matches the proportional law.
pub struct PidLaw {
    name: String,
    pan: PidAxis,
    tilt: PidAxis,
    deadband: f64,
}

impl PidLaw {
    pub fn new(pan: PidAxis, tilt: PidAxis, deadband: f64) -> Result<Self> {
        if !(deadband >= 0.0) {
            return Err(Error::Configuration(format!(
                "deadband must be >= 0, got {}",
                deadband
            )));
        }
        Ok(Self {
            name: "PID".to_string(),
            pan,
            tilt,
            deadband,
        })
    }

    pub fn from_config(config: &ControlConfig) -> Result<Self> {
        let limits = (-config.max_correction, config.max_correction);
        let pid = &config.pid;
        let pan = PidAxis::new(
            "Pan_PID",
            pid.pan,
            limits,
            pid.integral_limits,
            pid.sample_time(),
            config.history_window,
        )?;
        let tilt = PidAxis::new(
            "Tilt_PID",
            pid.tilt,
            limits,
            pid.integral_limits,
            pid.sample_time(),
            config.history_window,
        )?;
        info!(
            "PID law: pan ({}, {}, {}), tilt ({}, {}, {}), max correction {:.1}°",
            pid.pan.kp,
            pid.pan.ki,
            pid.pan.kd,
            pid.tilt.kp,
            pid.tilt.ki,
            pid.tilt.kd,
            config.max_correction
        );
        Self::new(pan, tilt, config.deadband_px)
    }

    pub fn axis(&self, axis: Axis) -> &PidAxis {
        match axis {
            Axis::Pan => &self.pan,
            Axis::Tilt => &self.tilt,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut PidAxis {
        match axis {
            Axis::Pan => &mut self.pan,
            Axis::Tilt => &mut self.tilt,
        }
    }

    /// Apply the same output bound to both axes; on error neither changes
    pub fn set_output_limits(&mut self, min: f64, max: f64) -> Result<()> {
        check_limits(&self.name, "output", (min, max))?;
        self.pan.set_output_limits(min, max)?;
        self.tilt.set_output_limits(min, max)
    }

    pub fn set_integral_limits(&mut self, min: f64, max: f64) -> Result<()> {
        check_limits(&self.name, "integral", (min, max))?;
        self.pan.set_integral_limits(min, max)?;
        self.tilt.set_integral_limits(min, max)
    }

    pub fn deadband(&self) -> f64 {
        self.deadband
    }

    pub fn is_stable(&self, tolerance: f64, window: usize) -> bool {
        self.pan.is_stable(tolerance, window) && self.tilt.is_stable(tolerance, window)
    }

    pub fn reset_at(&mut self, now: Instant) {
        self.pan.reset_at(now);
        self.tilt.reset_at(now);
    }
}

impl ControlLaw for PidLaw {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute_at(&mut self, error: ControlError, now: Instant) -> Correction {
        let ex = apply_deadband(error.pan, self.deadband);
        let ey = apply_deadband(error.tilt, self.deadband);
        let pan = self.pan.step(ex, error.pan.abs() < self.deadband, now);
        let tilt = self.tilt.step(-ey, error.tilt.abs() < self.deadband, now);

        debug!(
            "{} error ({:.1}, {:.1}) -> correction ({:.3}, {:.3})",
            self.name, error.pan, error.tilt, pan, tilt
        );
        Correction::new(pan, tilt)
    }

    fn components(&self) -> Components {
        Components {
            pan: self.pan.components(),
            tilt: self.tilt.components(),
        }
    }

    fn statistics(&self) -> PerformanceStats {
        PerformanceStats {
            name: self.name.clone(),
            status: self.status(),
            total_updates: self.pan.total_updates(),
            pan: self.pan.history().stats(),
            tilt: self.tilt.history().stats(),
        }
    }

    fn status(&self) -> ControllerStatus {
        let statuses = [self.pan.status(), self.tilt.status()];
        [
            ControllerStatus::Error,
            ControllerStatus::Uninitialized,
            ControllerStatus::Saturated,
            ControllerStatus::Running,
        ]
        .into_iter()
        .find(|s| statuses.contains(s))
        .unwrap_or(ControllerStatus::Ready)
    }

    fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    fn cleanup(&mut self) {
        self.pan.cleanup();
        self.tilt.cleanup();
        info!("{} cleaned up", self.name);
    }
}
