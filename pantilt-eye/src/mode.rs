//! STANDBY / SCANNING / TRACKING mode machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Before system initialization completes
    Standby,
    Scanning,
    Tracking,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackingMode::Standby => "STANDBY",
            TrackingMode::Scanning => "SCANNING",
            TrackingMode::Tracking => "TRACKING",
        };
        f.write_str(name)
    }
}

/// What the loop does on a cycle without a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissAction {
    /// Keep the current pointing
    Hold,
    /// Run one sweep step
    Scan,
}

/// Tracks the mode and the time of the last accepted detection.
///
/// The lost-target timeout is measured from the last detection, not from
/// the first miss.
#[derive(Debug, Clone)]
pub struct ModeMachine {
    mode: TrackingMode,
    last_detection: Option<Instant>,
    lost_timeout: Duration,
}

impl ModeMachine {
    pub fn new(lost_timeout: Duration) -> Self {
        Self {
            mode: TrackingMode::Standby,
            last_detection: None,
            lost_timeout,
        }
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn last_detection(&self) -> Option<Instant> {
        self.last_detection
    }

    pub fn lost_timeout(&self) -> Duration {
        self.lost_timeout
    }

    pub fn on_initialized(&mut self) {
        if self.mode == TrackingMode::Standby {
            self.mode = TrackingMode::Scanning;
            info!("System ready, scanning for targets");
        }
    }

    /// Returns false while in STANDBY, where detections are ignored
    pub fn on_detection(&mut self, now: Instant) -> bool {
        match self.mode {
            TrackingMode::Standby => false,
            TrackingMode::Scanning => {
                info!("Target acquired, tracking");
                self.mode = TrackingMode::Tracking;
                self.last_detection = Some(now);
                true
            }
            TrackingMode::Tracking => {
                self.last_detection = Some(now);
                true
            }
        }
    }

    pub fn on_miss(&mut self, now: Instant) -> MissAction {
        match self.mode {
            TrackingMode::Standby => MissAction::Hold,
            TrackingMode::Scanning => MissAction::Scan,
            TrackingMode::Tracking => {
                let lost = match self.last_detection {
                    Some(at) => now.saturating_duration_since(at) > self.lost_timeout,
                    None => true,
                };
                if lost {
                    info!(
                        "Target lost for more than {:?}, scanning",
                        self.lost_timeout
                    );
                    self.mode = TrackingMode::Scanning;
                    MissAction::Scan
                } else {
                    MissAction::Hold
                }
            }
        }
    }

    /// Back to STANDBY, forgetting the last detection
    pub fn reset(&mut self) {
        self.mode = TrackingMode::Standby;
        self.last_detection = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracking(timeout_secs: u64) -> (ModeMachine, Instant) {
        let mut machine = ModeMachine::new(Duration::from_secs(timeout_secs));
        machine.on_initialized();
        let t0 = Instant::now();
        assert!(machine.on_detection(t0));
        (machine, t0)
    }

    #[test]
    fn test_starts_in_standby() {
        let mut machine = ModeMachine::new(Duration::from_secs(5));
        assert_eq!(machine.mode(), TrackingMode::Standby);
        assert!(!machine.on_detection(Instant::now()));
        assert_eq!(machine.on_miss(Instant::now()), MissAction::Hold);
        assert_eq!(machine.mode(), TrackingMode::Standby);
    }

    #[test]
    fn test_initialization_enters_scanning() {
        let mut machine = ModeMachine::new(Duration::from_secs(5));
        machine.on_initialized();
        assert_eq!(machine.mode(), TrackingMode::Scanning);
        assert_eq!(machine.on_miss(Instant::now()), MissAction::Scan);
    }

    #[test]
    fn test_detection_enters_tracking() {
        let (machine, t0) = tracking(5);
        assert_eq!(machine.mode(), TrackingMode::Tracking);
        assert_eq!(machine.last_detection(), Some(t0));
    }

    #[test]
    fn test_single_miss_holds() {
        let (mut machine, t0) = tracking(5);
        assert_eq!(
            machine.on_miss(t0 + Duration::from_millis(500)),
            MissAction::Hold
        );
        assert_eq!(machine.mode(), TrackingMode::Tracking);
    }

    #[test]
    fn test_timeout_measured_from_last_detection() {
        let (mut machine, t0) = tracking(5);
        assert_eq!(machine.on_miss(t0 + Duration::from_secs(4)), MissAction::Hold);
        assert_eq!(machine.mode(), TrackingMode::Tracking);
        assert_eq!(machine.on_miss(t0 + Duration::from_secs(6)), MissAction::Scan);
        assert_eq!(machine.mode(), TrackingMode::Scanning);
    }

    #[test]
    fn test_detection_refreshes_timeout() {
        let (mut machine, t0) = tracking(5);
        machine.on_detection(t0 + Duration::from_secs(4));
        assert_eq!(machine.on_miss(t0 + Duration::from_secs(8)), MissAction::Hold);
        assert_eq!(machine.mode(), TrackingMode::Tracking);
    }

    #[test]
    fn test_exactly_at_timeout_holds() {
        let (mut machine, t0) = tracking(5);
        assert_eq!(machine.on_miss(t0 + Duration::from_secs(5)), MissAction::Hold);
    }

    #[test]
    fn test_reset() {
        let (mut machine, _) = tracking(5);
        machine.reset();
        assert_eq!(machine.mode(), TrackingMode::Standby);
        assert!(machine.last_detection().is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(TrackingMode::Scanning.to_string(), "SCANNING");
    }
}
