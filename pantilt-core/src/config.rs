//! Configuration for the pan-tilt tracking rig
//!
//! Every component receives its section explicitly at construction; nothing
//! here is process-global.

use crate::error::{Error, Result};
use crate::types::PetClass;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which control law drives the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlLawKind {
    /// Pure proportional law with deadband
    Proportional,
    /// Per-axis PID with anti-windup
    Pid,
}

/// Camera capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture device index (0, 1, 2, etc.)
    pub camera_id: u32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Requested capture rate (frames per second)
    pub frame_rate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            camera_id: 0,
            width: 640,
            height: 480,
            frame_rate: 30,
        }
    }
}

/// PID gains for one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidAxisGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidAxisGains {
    fn default() -> Self {
        Self {
            kp: 0.8,
            ki: 0.1,
            kd: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    /// Accumulator clamp (anti-windup), min < max
    pub integral_limits: (f64, f64),
    /// Minimum interval between recomputations
    pub sample_time_ms: u64,
    pub pan: PidAxisGains,
    pub tilt: PidAxisGains,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            integral_limits: (-50.0, 50.0),
            sample_time_ms: 10,
            pan: PidAxisGains::default(),
            tilt: PidAxisGains::default(),
        }
    }
}

impl PidConfig {
    pub fn sample_time(&self) -> Duration {
        Duration::from_millis(self.sample_time_ms)
    }
}

/// Control law settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub law: ControlLawKind,
    /// Proportional gain on pan, degrees per pixel
    pub pan_gain: f64,
    /// Proportional gain on tilt, degrees per pixel
    pub tilt_gain: f64,
    /// Per-axis correction bound in degrees
    pub max_correction: f64,
    /// Errors below this many pixels are treated as zero
    pub deadband_px: f64,
    /// Number of updates kept for performance statistics
    pub history_window: usize,
    pub pid: PidConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            law: ControlLawKind::Proportional,
            pan_gain: 0.0156,  // 10 / 640
            tilt_gain: 0.0208, // 10 / 480
            max_correction: 15.0,
            deadband_px: 5.0,
            history_window: 100,
            pid: PidConfig::default(),
        }
    }
}

/// Servo driver and safety envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    /// Logical pan safety range in degrees
    pub pan_range: (f64, f64),
    /// Logical tilt safety range in degrees
    pub tilt_range: (f64, f64),
    /// Physical = logical + offset, pan axis
    pub pan_offset: f64,
    /// Physical = logical + offset, tilt axis
    pub tilt_offset: f64,
    /// Mechanical settle wait after every move
    pub settle_time_ms: u64,
    pub i2c_address: u8,
    pub pwm_frequency: u32,
    pub pan_channel: u8,
    pub tilt_channel: u8,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            pan_range: (-90.0, 90.0),
            tilt_range: (-45.0, 45.0),
            pan_offset: 90.0,
            tilt_offset: 90.0,
            settle_time_ms: 100,
            i2c_address: 0x40,
            pwm_frequency: 50,
            pan_channel: 0,
            tilt_channel: 1,
        }
    }
}

impl ServoConfig {
    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_time_ms)
    }
}

/// Sweep performed while searching for a target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Peak pan deflection in degrees
    pub amplitude_deg: f64,
    /// Sweep angular frequency in radians per second
    pub angular_rate: f64,
    /// Fixed tilt held during the sweep
    pub tilt_deg: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            amplitude_deg: 30.0,
            angular_rate: 0.1,
            tilt_deg: 0.0,
        }
    }
}

/// Coordinator cadence and target policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub detection_interval_ms: u64,
    pub lost_target_timeout_ms: u64,
    pub target_classes: Vec<PetClass>,
    pub confidence_threshold: f32,
    /// Bound on how long `stop` waits for the worker to exit
    pub shutdown_timeout_ms: u64,
    pub scan: ScanConfig,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            detection_interval_ms: 500,
            lost_target_timeout_ms: 5000,
            target_classes: vec![PetClass::Cat, PetClass::Dog],
            confidence_threshold: 0.5,
            shutdown_timeout_ms: 2000,
            scan: ScanConfig::default(),
        }
    }
}

impl TrackingConfig {
    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn lost_target_timeout(&self) -> Duration {
        Duration::from_millis(self.lost_target_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete rig configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub camera: CameraConfig,
    pub control: ControlConfig,
    pub servo: ServoConfig,
    pub tracking: TrackingConfig,
    pub logging: LoggingConfig,
}

impl TrackerConfig {
    /// Load configuration from a JSON, TOML or YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parse configuration text, trying JSON, then TOML, then YAML
    pub fn from_str(content: &str) -> Result<Self> {
        if let Ok(config) = serde_json::from_str::<TrackerConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = toml::from_str::<TrackerConfig>(content) {
            return Ok(config);
        }

        serde_yaml::from_str::<TrackerConfig>(content)
            .map_err(|e| Error::Serialization(format!("unrecognised config format: {}", e)))
    }

    /// Render as TOML, the format used for shipped config files
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Override selected fields from `PANTILT_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(level) = std::env::var("PANTILT_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(id) = std::env::var("PANTILT_CAMERA_ID") {
            if let Ok(id) = id.parse::<u32>() {
                self.camera.camera_id = id;
            }
        }

        if let Ok(ms) = std::env::var("PANTILT_DETECTION_INTERVAL_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.tracking.detection_interval_ms = ms;
            }
        }

        if let Ok(ms) = std::env::var("PANTILT_LOST_TARGET_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.tracking.lost_target_timeout_ms = ms;
            }
        }

        if let Ok(law) = std::env::var("PANTILT_CONTROL_LAW") {
            match law.to_lowercase().as_str() {
                "pid" => self.control.law = ControlLawKind::Pid,
                "proportional" | "p" => self.control.law = ControlLawKind::Proportional,
                _ => {
                    tracing::warn!("Ignoring unknown PANTILT_CONTROL_LAW value '{}'", law);
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::Configuration(msg));

        // Camera
        if self.camera.width == 0 || self.camera.height == 0 {
            return invalid("camera resolution must be non-zero".to_string());
        }
        if self.camera.width > 7680 || self.camera.height > 4320 {
            return invalid("camera resolution too large (max 8K)".to_string());
        }
        if self.camera.frame_rate == 0 || self.camera.frame_rate > 120 {
            return invalid("camera.frame_rate must be between 1 and 120".to_string());
        }

        // Control law
        let control = &self.control;
        if !(control.max_correction > 0.0) {
            return invalid("control.max_correction must be > 0".to_string());
        }
        if !(control.deadband_px >= 0.0) {
            return invalid("control.deadband_px must be >= 0".to_string());
        }
        if !control.pan_gain.is_finite() || !control.tilt_gain.is_finite() {
            return invalid("control gains must be finite".to_string());
        }
        if control.history_window == 0 {
            return invalid("control.history_window must be > 0".to_string());
        }
        let (imin, imax) = control.pid.integral_limits;
        if imin >= imax {
            return invalid(format!(
                "control.pid.integral_limits invalid: min={} >= max={}",
                imin, imax
            ));
        }

        // Servo envelope
        let servo = &self.servo;
        check_range("servo.pan_range", servo.pan_range, servo.pan_offset)?;
        check_range("servo.tilt_range", servo.tilt_range, servo.tilt_offset)?;
        if servo.pan_channel == servo.tilt_channel {
            return invalid("servo pan and tilt channels must differ".to_string());
        }
        if servo.pan_channel > 15 || servo.tilt_channel > 15 {
            return invalid("servo channels must be in 0..=15".to_string());
        }

        // Tracking
        let tracking = &self.tracking;
        if tracking.detection_interval_ms == 0 {
            return invalid("tracking.detection_interval_ms must be > 0".to_string());
        }
        if tracking.lost_target_timeout_ms == 0 {
            return invalid("tracking.lost_target_timeout_ms must be > 0".to_string());
        }
        if tracking.target_classes.is_empty() {
            return invalid("tracking.target_classes must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&tracking.confidence_threshold) {
            return invalid("tracking.confidence_threshold must be within [0, 1]".to_string());
        }
        if !(tracking.scan.amplitude_deg >= 0.0) || !tracking.scan.angular_rate.is_finite() {
            return invalid("tracking.scan amplitude must be >= 0 and rate finite".to_string());
        }

        Ok(())
    }
}

/// Logical range must be ordered, contain the centre, and map into [0, 180]
fn check_range(name: &str, range: (f64, f64), offset: f64) -> Result<()> {
    let (min, max) = range;
    if !(min < max) {
        return Err(Error::Configuration(format!(
            "{} invalid: min={} >= max={}",
            name, min, max
        )));
    }
    if min > 0.0 || max < 0.0 {
        return Err(Error::Configuration(format!(
            "{} must contain the centre position 0",
            name
        )));
    }
    if min + offset < 0.0 || max + offset > 180.0 {
        return Err(Error::Configuration(format!(
            "{} maps outside the physical 0..180 servo range with offset {}",
            name, offset
        )));
    }
    Ok(())
}
