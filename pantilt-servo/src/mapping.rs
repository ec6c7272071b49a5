//! Logical-to-physical angle mapping

use pantilt_core::config::ServoConfig;
use pantilt_core::PanTilt;

/// Affine map: physical = logical * scale + offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapping {
    pub offset: f64,
    pub scale: f64,
}

impl AxisMapping {
    pub fn new(offset: f64, scale: f64) -> Self {
        Self { offset, scale }
    }

    pub fn with_offset(offset: f64) -> Self {
        Self::new(offset, 1.0)
    }

    pub fn to_physical(&self, logical: f64) -> f64 {
        logical * self.scale + self.offset
    }

    pub fn to_logical(&self, physical: f64) -> f64 {
        (physical - self.offset) / self.scale
    }
}

impl Default for AxisMapping {
    fn default() -> Self {
        Self::with_offset(90.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ServoMapping {
    pub pan: AxisMapping,
    pub tilt: AxisMapping,
}

impl ServoMapping {
    pub fn from_config(config: &ServoConfig) -> Self {
        Self {
            pan: AxisMapping::with_offset(config.pan_offset),
            tilt: AxisMapping::with_offset(config.tilt_offset),
        }
    }

    /// Physical (pan, tilt) servo degrees for a logical angle pair
    pub fn to_physical(&self, angles: PanTilt) -> (f64, f64) {
        (
            self.pan.to_physical(angles.pan),
            self.tilt.to_physical(angles.tilt),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let mapping = AxisMapping::default();
        assert_eq!(mapping.to_physical(-90.0), 0.0);
        assert_eq!(mapping.to_physical(0.0), 90.0);
        assert_eq!(mapping.to_physical(45.0), 135.0);
        assert_eq!(mapping.to_logical(135.0), 45.0);
    }

    #[test]
    fn test_scaled_mapping() {
        let mapping = AxisMapping::new(90.0, -1.0);
        assert_eq!(mapping.to_physical(30.0), 60.0);
        assert_eq!(mapping.to_logical(60.0), 30.0);
    }

    #[test]
    fn test_servo_mapping_from_config() {
        let mut config = ServoConfig::default();
        config.tilt_offset = 80.0;
        let mapping = ServoMapping::from_config(&config);
        assert_eq!(mapping.to_physical(PanTilt::CENTER), (90.0, 80.0));
    }
}
