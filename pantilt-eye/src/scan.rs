//! Sweep pattern used while scanning

use pantilt_core::config::ScanConfig;
use pantilt_core::PanTilt;
use std::time::Duration;

/// `pan = amplitude * sin(rate * t)`, tilt fixed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPattern {
    amplitude: f64,
    angular_rate: f64,
    tilt: f64,
}

impl ScanPattern {
    pub fn new(amplitude: f64, angular_rate: f64, tilt: f64) -> Self {
        Self {
            amplitude: amplitude.abs(),
            angular_rate,
            tilt,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.amplitude_deg, config.angular_rate, config.tilt_deg)
    }

    /// Target angle `elapsed` after the loop started
    pub fn angles_at(&self, elapsed: Duration) -> PanTilt {
        let t = elapsed.as_secs_f64();
        PanTilt::new(self.amplitude * (self.angular_rate * t).sin(), self.tilt)
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }
}

impl Default for ScanPattern {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}
