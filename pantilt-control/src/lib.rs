//! pantilt-control: control laws turning pixel error into angular correction
//!
//! Two interchangeable laws implement [`ControlLaw`]:
//! - [`ProportionalLaw`]: correction = clip(error * gain) with a deadband
//! - [`PidLaw`]: one [`PidAxis`] per axis with anti-windup and a
//!   derivative term
//!
//! Both invert the tilt axis: image rows grow downward, a positive tilt
//! correction raises the camera.

pub mod law;
pub mod history;
pub mod proportional;
pub mod pid;

pub use law::{
    Axis, AxisComponents, AxisStats, Components, ControlLaw, ControllerStatus, PerformanceStats,
};
pub use history::{AxisSample, PerformanceWindow};
pub use proportional::{ProportionalLaw, ProportionalParameters, ProportionalState};
pub use pid::{PidAxis, PidLaw, PidParameters};

use pantilt_core::config::{ControlConfig, ControlLawKind};
use pantilt_core::Result;
use tracing::info;

/// Build the law selected by `config.law`
pub fn build_law(config: &ControlConfig) -> Result<Box<dyn ControlLaw>> {
    let law: Box<dyn ControlLaw> = match config.law {
        ControlLawKind::Proportional => Box::new(ProportionalLaw::from_config(config)?),
        ControlLawKind::Pid => Box::new(PidLaw::from_config(config)?),
    };
    info!("Control law '{}' selected", law.name());
    Ok(law)
}
