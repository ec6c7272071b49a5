//! pantilt-servo: safety envelope around the pan-tilt servo hardware
//!
//! Every command that reaches a [`ServoDriver`] goes through the
//! [`ActuatorGuard`], which enforces the logical angle ranges, maps logical
//! degrees to physical servo degrees, and keeps the last commanded angle.

pub mod driver;
pub mod mapping;
pub mod guard;

pub use driver::{ServoDriver, SimulatedServoDriver, SimulatedServoHandle};
pub use guard::{ActuatorGuard, EmergencyStop, GuardStats, ServoStatus};
pub use mapping::{AxisMapping, ServoMapping};
