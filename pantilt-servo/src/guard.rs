//! Actuator guard: the only path from a commanded angle to the servos

use crate::driver::ServoDriver;
use crate::mapping::ServoMapping;
use pantilt_core::config::ServoConfig;
use pantilt_core::{Error, PanTilt, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Servo lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServoStatus {
    Uninitialized,
    Initializing,
    Ready,
    Moving,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GuardStats {
    pub total_moves: u64,
    pub rejected_moves: u64,
    pub driver_failures: u64,
    pub emergency_stops: u64,
}

/// In-memory actuator state. Never locked across a driver call; when both
/// locks are needed the driver lock is taken first.
struct GuardState {
    current: PanTilt,
    status: ServoStatus,
    stats: GuardStats,
}

type SharedDriver = Arc<Mutex<Box<dyn ServoDriver>>>;

/// Bounded wait for the bus during an emergency stop
const EMERGENCY_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Enforces the logical safety ranges and tracks the last commanded angle.
///
/// A rejected or failed command leaves the tracked angle untouched. The
/// state lock covers only in-memory updates; bus writes hold the driver
/// lock alone, so readers never wait on the hardware.
pub struct ActuatorGuard {
    state: Arc<Mutex<GuardState>>,
    driver: SharedDriver,
    pan_range: (f64, f64),
    tilt_range: (f64, f64),
    mapping: ServoMapping,
    settle_time: Duration,
}

impl ActuatorGuard {
    pub fn new(config: &ServoConfig, driver: Box<dyn ServoDriver>) -> Self {
        Self {
            state: Arc::new(Mutex::new(GuardState {
                current: PanTilt::CENTER,
                status: ServoStatus::Uninitialized,
                stats: GuardStats::default(),
            })),
            driver: Arc::new(Mutex::new(driver)),
            pan_range: config.pan_range,
            tilt_range: config.tilt_range,
            mapping: ServoMapping::from_config(config),
            settle_time: config.settle_time(),
        }
    }

    /// Bring up the driver and move to centre
    pub fn initialize(&self) -> Result<()> {
        info!("Initializing servo driver...");
        self.state.lock().status = ServoStatus::Initializing;

        let (pan, tilt) = self.mapping.to_physical(PanTilt::CENTER);
        let written = {
            let mut driver = self.driver.lock();
            driver
                .initialize()
                .map_err(|e| Error::Initialization(format!("servo driver: {}", e)))
                .and_then(|()| {
                    driver
                        .set_angles(pan, tilt)
                        .map_err(|e| Error::Initialization(format!("servo centring: {}", e)))
                })
        };

        if let Err(e) = written {
            self.state.lock().status = ServoStatus::Error;
            error!("Servo bring-up failed: {}", e);
            return Err(e);
        }
        self.state.lock().current = PanTilt::CENTER;

        self.settle();

        let mut state = self.state.lock();
        if state.status == ServoStatus::Initializing {
            state.status = ServoStatus::Ready;
        }
        info!("Servo driver ready at centre");
        Ok(())
    }

    pub fn is_angle_safe(&self, pan: f64, tilt: f64) -> bool {
        in_range(pan, self.pan_range) && in_range(tilt, self.tilt_range)
    }

    /// Command a logical angle pair.
    ///
    /// Returns the applied angle; on any error the tracked angle is unchanged.
    pub fn apply(&self, pan: f64, tilt: f64) -> Result<PanTilt> {
        let target = PanTilt::new(pan, tilt);
        {
            let mut state = self.state.lock();
            if state.status != ServoStatus::Ready {
                warn!("Servo not ready: {:?}", state.status);
                return Err(Error::NotReady(format!("servo status is {:?}", state.status)));
            }

            if !self.is_angle_safe(pan, tilt) {
                state.stats.rejected_moves += 1;
                warn!("Angle outside safe range: pan={:.2}, tilt={:.2}", pan, tilt);
                return Err(Error::SafetyViolation { pan, tilt });
            }

            // Claims the bus: concurrent callers see Moving and back off
            state.status = ServoStatus::Moving;
        }

        let (pan_phys, tilt_phys) = self.mapping.to_physical(target);
        let written = {
            let mut driver = self.driver.lock();
            // An emergency stop or shutdown latched before we got the bus
            let status = self.state.lock().status;
            if status != ServoStatus::Moving {
                warn!("Move to {} abandoned ({:?})", target, status);
                return Err(Error::NotReady(format!("servo status is {:?}", status)));
            }
            driver.set_angles(pan_phys, tilt_phys)
        };

        {
            let mut state = self.state.lock();
            if let Err(e) = written {
                state.stats.driver_failures += 1;
                if state.status == ServoStatus::Moving {
                    state.status = ServoStatus::Error;
                }
                error!("Servo write failed: {}", e);
                return Err(match e {
                    Error::Servo(_) => e,
                    other => Error::Servo(other.to_string()),
                });
            }

            state.stats.total_moves += 1;
            if state.status != ServoStatus::Moving {
                // Emergency stop or shutdown took over during the write
                warn!("Move to {} superseded ({:?})", target, state.status);
                return Err(Error::NotReady(format!("servo status is {:?}", state.status)));
            }
            state.current = target;
            debug!(
                "Servo moved to {} (physical {:.1}°, {:.1}°)",
                target, pan_phys, tilt_phys
            );
        }

        self.settle();

        let mut state = self.state.lock();
        // An emergency stop during the settle wait wins
        if state.status == ServoStatus::Moving {
            state.status = ServoStatus::Ready;
        }
        Ok(target)
    }

    pub fn apply_pan(&self, pan: f64) -> Result<PanTilt> {
        let tilt = self.current_angles().tilt;
        self.apply(pan, tilt)
    }

    pub fn apply_tilt(&self, tilt: f64) -> Result<PanTilt> {
        let pan = self.current_angles().pan;
        self.apply(pan, tilt)
    }

    pub fn move_to_center(&self) -> Result<PanTilt> {
        debug!("Moving servos to centre");
        self.apply(0.0, 0.0)
    }

    /// Sweep each axis to half its range on both sides and back to centre
    pub fn self_test(&self, cycles: u32) -> Result<()> {
        info!("Servo self test starting ({} cycles)", cycles);
        let pan_steps = [self.pan_range.1 / 2.0, 0.0, self.pan_range.0 / 2.0, 0.0];
        let tilt_steps = [self.tilt_range.1 / 2.0, 0.0, self.tilt_range.0 / 2.0, 0.0];

        for cycle in 1..=cycles {
            debug!("Self test cycle {}/{}", cycle, cycles);
            for pan in pan_steps {
                self.apply_pan(pan)?;
            }
            for tilt in tilt_steps {
                self.apply_tilt(tilt)?;
            }
        }

        self.move_to_center()?;
        info!("Servo self test complete");
        Ok(())
    }

    pub fn current_angles(&self) -> PanTilt {
        self.state.lock().current
    }

    pub fn status(&self) -> ServoStatus {
        self.state.lock().status
    }

    pub fn stats(&self) -> GuardStats {
        self.state.lock().stats
    }

    pub fn pan_range(&self) -> (f64, f64) {
        self.pan_range
    }

    pub fn tilt_range(&self) -> (f64, f64) {
        self.tilt_range
    }

    /// Handle that can centre the servos from any thread
    pub fn emergency_handle(&self) -> EmergencyStop {
        EmergencyStop {
            state: self.state.clone(),
            driver: self.driver.clone(),
            mapping: self.mapping,
            lock_timeout: EMERGENCY_LOCK_TIMEOUT,
        }
    }

    pub fn emergency_stop(&self) -> bool {
        self.emergency_handle().trigger()
    }

    /// Centre (regardless of status), release the driver, and return to
    /// `Uninitialized`. Failures are logged.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if state.status == ServoStatus::Uninitialized {
                return;
            }
            // New commands are refused from here on
            state.status = ServoStatus::Uninitialized;
        }
        info!("Shutting down servo driver...");

        let (pan, tilt) = self.mapping.to_physical(PanTilt::CENTER);
        let written = self.driver.lock().set_angles(pan, tilt);
        match written {
            Ok(()) => self.state.lock().current = PanTilt::CENTER,
            Err(e) => warn!("Failed to centre servos during shutdown: {}", e),
        }

        self.settle();

        if let Err(e) = self.driver.lock().release() {
            error!("Failed to release servo driver: {}", e);
        }
        info!("Servo driver shut down");
    }

    fn settle(&self) {
        if !self.settle_time.is_zero() {
            std::thread::sleep(self.settle_time);
        }
    }
}

fn in_range(angle: f64, (min, max): (f64, f64)) -> bool {
    min <= angle && angle <= max
}

/// Cloneable emergency-stop trigger bound to one guard
#[derive(Clone)]
pub struct EmergencyStop {
    state: Arc<Mutex<GuardState>>,
    driver: SharedDriver,
    mapping: ServoMapping,
    lock_timeout: Duration,
}

impl EmergencyStop {
    /// Latch the guard in `Error`, then centre the servos bypassing
    /// readiness and range checks. Waits at most the lock timeout for an
    /// in-flight bus write. Never panics; returns whether centring succeeded.
    pub fn trigger(&self) -> bool {
        warn!("Emergency stop: centring servos");
        {
            let mut state = self.state.lock();
            state.status = ServoStatus::Error;
            state.stats.emergency_stops += 1;
        }

        let Some(mut driver) = self.driver.try_lock_for(self.lock_timeout) else {
            error!(
                "Emergency stop could not acquire the servo bus within {:?}",
                self.lock_timeout
            );
            return false;
        };
        let (pan, tilt) = self.mapping.to_physical(PanTilt::CENTER);
        let written = driver.set_angles(pan, tilt);
        drop(driver);

        match written {
            Ok(()) => {
                self.state.lock().current = PanTilt::CENTER;
                warn!("Emergency stop complete");
                true
            }
            Err(e) => {
                error!("Emergency stop failed to centre servos: {}", e);
                false
            }
        }
    }
}
