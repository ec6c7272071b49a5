//! Servo hardware boundary

use pantilt_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

/// Writes physical servo angles (degrees, 0 to 180) to the hardware
#[cfg_attr(test, mockall::automock)]
pub trait ServoDriver: Send {
    fn initialize(&mut self) -> Result<()>;

    fn set_angles(&mut self, pan: f64, tilt: f64) -> Result<()>;

    /// Stop driving the outputs
    fn release(&mut self) -> Result<()>;
}

const PHYSICAL_RANGE: (f64, f64) = (0.0, 180.0);

/// Recent physical commands kept by the simulator
const COMMAND_HISTORY: usize = 1024;

#[derive(Debug, Default)]
struct SimulatedServoState {
    initialized: bool,
    released: bool,
    commands: VecDeque<(f64, f64)>,
    total_commands: u64,
    fail_moves: bool,
    fail_initialize: bool,
}

/// Shared view into a [`SimulatedServoDriver`] after it has been moved
/// into a guard
#[derive(Debug, Clone)]
pub struct SimulatedServoHandle {
    state: Arc<Mutex<SimulatedServoState>>,
}

impl SimulatedServoHandle {
    /// Most recent physical angle pairs written, oldest first
    pub fn commands(&self) -> Vec<(f64, f64)> {
        self.state.lock().commands.iter().copied().collect()
    }

    pub fn last_command(&self) -> Option<(f64, f64)> {
        self.state.lock().commands.back().copied()
    }

    /// Writes accepted since creation, including those evicted from history
    pub fn total_commands(&self) -> u64 {
        self.state.lock().total_commands
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    pub fn fail_moves(&self, fail: bool) {
        self.state.lock().fail_moves = fail;
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.state.lock().fail_initialize = fail;
    }
}

/// In-memory servo driver for simulation and tests
#[derive(Debug, Default)]
pub struct SimulatedServoDriver {
    state: Arc<Mutex<SimulatedServoState>>,
}

impl SimulatedServoDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> SimulatedServoHandle {
        SimulatedServoHandle {
            state: self.state.clone(),
        }
    }
}

impl ServoDriver for SimulatedServoDriver {
    fn initialize(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_initialize {
            return Err(Error::Servo("simulated driver failed to initialize".to_string()));
        }
        state.initialized = true;
        state.released = false;
        info!("Simulated servo driver initialized");
        Ok(())
    }

    fn set_angles(&mut self, pan: f64, tilt: f64) -> Result<()> {
        let mut state = self.state.lock();
        if !state.initialized || state.released {
            return Err(Error::Servo("simulated driver not initialized".to_string()));
        }
        if state.fail_moves {
            return Err(Error::Servo("simulated PWM write failed".to_string()));
        }
        let (min, max) = PHYSICAL_RANGE;
        if !(min..=max).contains(&pan) || !(min..=max).contains(&tilt) {
            return Err(Error::Servo(format!(
                "physical angle out of servo travel: pan={:.1}, tilt={:.1}",
                pan, tilt
            )));
        }
        if state.commands.len() >= COMMAND_HISTORY {
            state.commands.pop_front();
        }
        state.commands.push_back((pan, tilt));
        state.total_commands += 1;
        debug!("Simulated servo -> pan {:.1}°, tilt {:.1}°", pan, tilt);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.released = true;
        state.initialized = false;
        info!("Simulated servo driver released");
        Ok(())
    }
}
