//! Tracking loop and the coordinator that runs it on one background worker

use crate::camera::FrameSource;
use crate::mode::{MissAction, ModeMachine, TrackingMode};
use crate::processing::{DetectionPipeline, DetectionStats, Detector};
use crate::scan::ScanPattern;
use crate::status::SystemStatus;
use chrono::Utc;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use pantilt_control::{build_law, ControlLaw, PerformanceStats};
use pantilt_core::config::TrackerConfig;
use pantilt_core::{ControlError, Correction, Detection, Error, PanTilt, PixelPoint, Result};
use pantilt_servo::{ActuatorGuard, EmergencyStop, GuardStats, ServoDriver};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Result of one tracking cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Frame read failed; nothing else ran
    FrameDropped,
    /// A target was seen; `applied` is `None` when the guard refused the move
    Tracked {
        correction: Correction,
        applied: Option<PanTilt>,
    },
    /// No target, still within the lost-target timeout
    Held,
    Scanned { applied: Option<PanTilt> },
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalStats {
    pub total_detections: u64,
    pub rejected_corrections: u64,
    pub dropped_frames: u64,
    pub run_time_secs: f64,
    pub average_detection_interval_secs: Option<f64>,
    pub detection: DetectionStats,
    pub controller: PerformanceStats,
    pub servo: GuardStats,
}

/// Everything one cycle touches. Owned by exactly one thread at a time.
pub struct TrackingLoop {
    camera: Box<dyn FrameSource>,
    pipeline: DetectionPipeline,
    law: Box<dyn ControlLaw>,
    guard: Arc<ActuatorGuard>,
    mode: ModeMachine,
    scan: ScanPattern,
    status: Arc<Mutex<SystemStatus>>,
    started: Instant,
}

impl TrackingLoop {
    pub fn new(
        config: &TrackerConfig,
        camera: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        driver: Box<dyn ServoDriver>,
    ) -> Result<Self> {
        Ok(Self {
            camera,
            pipeline: DetectionPipeline::new(detector, &config.tracking),
            law: build_law(&config.control)?,
            guard: Arc::new(ActuatorGuard::new(&config.servo, driver)),
            mode: ModeMachine::new(config.tracking.lost_target_timeout()),
            scan: ScanPattern::from_config(&config.tracking.scan),
            status: Arc::new(Mutex::new(SystemStatus::default())),
            started: Instant::now(),
        })
    }

    /// Replace the control law selected by the configuration
    pub fn with_law(mut self, law: Box<dyn ControlLaw>) -> Self {
        self.law = law;
        self
    }

    /// Bring up camera, then detector, then actuator. Nothing moves until
    /// the first two are ready; on failure everything acquired is released.
    pub fn initialize(&mut self) -> Result<()> {
        if let Err(e) = self.camera.open() {
            error!("Camera initialization failed: {}", e);
            return Err(Error::Initialization(format!("camera: {}", e)));
        }

        if let Err(e) = self.pipeline.load() {
            error!("Detector initialization failed: {}", e);
            self.camera.release();
            return Err(Error::Initialization(format!("detector: {}", e)));
        }

        if let Err(e) = self.guard.initialize() {
            self.pipeline.release();
            self.camera.release();
            return Err(e);
        }

        self.mode.on_initialized();
        self.started = Instant::now();
        let angles = self.guard.current_angles();

        let mut status = self.status.lock();
        status.mode = self.mode.mode();
        status.angles = angles;
        Ok(())
    }

    /// Reference instant for run time and the sweep phase
    pub fn restart_clock(&mut self, now: Instant) {
        self.started = now;
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode.mode()
    }

    pub fn guard(&self) -> &Arc<ActuatorGuard> {
        &self.guard
    }

    pub fn law(&self) -> &dyn ControlLaw {
        self.law.as_ref()
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    pub fn status(&self) -> SystemStatus {
        self.status.lock().clone()
    }

    pub fn cycle(&mut self) -> CycleOutcome {
        self.cycle_at(Instant::now())
    }

    /// Run one cycle as if at `now`
    pub fn cycle_at(&mut self, now: Instant) -> CycleOutcome {
        let frame = match self.camera.read() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to read frame: {}", e);
                let mut status = self.status.lock();
                status.dropped_frames += 1;
                return CycleOutcome::FrameDropped;
            }
        };

        match self.pipeline.best(&frame) {
            Some(detection) => self.track(detection, frame.center(), now),
            None => self.miss(now),
        }
    }

    fn track(&mut self, detection: Detection, image_center: PixelPoint, now: Instant) -> CycleOutcome {
        if !self.mode.on_detection(now) {
            debug!("Ignoring {} before initialization", detection.class());
            return CycleOutcome::Held;
        }

        let error = ControlError::from_center(detection.center(), image_center);
        let correction = self.law.compute_at(error, now);
        let target = self.guard.current_angles().offset_by(correction);
        debug!(
            "{} at ({:.0}, {:.0}), error ({:.1}, {:.1}), target {}",
            detection.class(),
            detection.center().x,
            detection.center().y,
            error.pan,
            error.tilt,
            target
        );

        let applied = match self.guard.apply(target.pan, target.tilt) {
            Ok(angles) => Some(angles),
            Err(Error::SafetyViolation { pan, tilt }) => {
                warn!(
                    "Correction rejected: ({:.2}, {:.2}) outside safe range",
                    pan, tilt
                );
                None
            }
            Err(e) => {
                warn!("Correction not applied: {}", e);
                None
            }
        };

        let detected_at = Utc::now();
        let elapsed = now.saturating_duration_since(self.started);
        let mut status = self.status.lock();
        status.mode = self.mode.mode();
        status.target_detected = true;
        status.target_class = Some(detection.class());
        status.target_confidence = Some(detection.confidence());
        status.last_detection_time = Some(detected_at);
        status.total_detections += 1;
        match applied {
            Some(angles) => {
                status.angles = angles;
                status.correction_applied = correction;
            }
            None => status.rejected_corrections += 1,
        }
        status.tracking_duration_secs = elapsed.as_secs_f64();

        CycleOutcome::Tracked {
            correction,
            applied,
        }
    }

    fn miss(&mut self, now: Instant) -> CycleOutcome {
        let elapsed = now.saturating_duration_since(self.started);
        let action = self.mode.on_miss(now);

        let applied = match action {
            MissAction::Hold => None,
            MissAction::Scan => {
                let target = self.scan.angles_at(elapsed);
                match self.guard.apply(target.pan, target.tilt) {
                    Ok(angles) => Some(angles),
                    Err(e) => {
                        debug!("Scan step not applied: {}", e);
                        None
                    }
                }
            }
        };

        let mut status = self.status.lock();
        status.mode = self.mode.mode();
        status.target_detected = false;
        status.target_class = None;
        status.target_confidence = None;
        if let Some(angles) = applied {
            status.angles = angles;
        }
        status.tracking_duration_secs = elapsed.as_secs_f64();

        match action {
            MissAction::Hold => CycleOutcome::Held,
            MissAction::Scan => CycleOutcome::Scanned { applied },
        }
    }

    /// Cycle at `interval` cadence until `running` clears. A message or
    /// disconnect on `wake` cuts the wait between cycles short.
    fn run(mut self, running: Arc<AtomicBool>, wake: Receiver<()>, interval: Duration) -> FinalStats {
        info!("Tracking loop started (interval {:?})", interval);
        while running.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();
            let outcome = self.cycle_at(cycle_start);
            debug!("Cycle outcome: {:?}", outcome);

            let remaining = interval.saturating_sub(cycle_start.elapsed());
            if !remaining.is_zero() && running.load(Ordering::SeqCst) {
                let _ = wake.recv_timeout(remaining);
            }
        }
        info!("Tracking loop stopping");
        self.shut_down()
    }

    /// Release camera and detector, retire the control law
    pub fn shut_down(&mut self) -> FinalStats {
        self.camera.release();
        self.pipeline.release();
        let stats = self.final_stats();
        self.law.cleanup();
        stats
    }

    pub fn final_stats(&self) -> FinalStats {
        let run_time = self.started.elapsed().as_secs_f64();
        let status = self.status.lock().clone();
        FinalStats {
            total_detections: status.total_detections,
            rejected_corrections: status.rejected_corrections,
            dropped_frames: status.dropped_frames,
            run_time_secs: run_time,
            average_detection_interval_secs: if status.total_detections > 0 {
                Some(run_time / status.total_detections as f64)
            } else {
                None
            },
            detection: self.pipeline.stats(),
            controller: self.law.statistics(),
            servo: self.guard.stats(),
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<FinalStats>,
    wake: Sender<()>,
}

/// Cloneable trigger that halts the loop and centres the servos
#[derive(Clone)]
pub struct EmergencyHandle {
    stop: EmergencyStop,
    running: Arc<AtomicBool>,
}

impl EmergencyHandle {
    pub fn trigger(&self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        self.stop.trigger()
    }
}

/// Read-only view of the status shared with the worker
#[derive(Clone)]
pub struct StatusHandle {
    status: Arc<Mutex<SystemStatus>>,
}

impl StatusHandle {
    pub fn get(&self) -> SystemStatus {
        self.status.lock().clone()
    }
}

/// Owns the tracking loop and its single background worker.
///
/// Only the worker writes the status; [`get_status`](Self::get_status)
/// hands out copies.
pub struct TrackingCoordinator {
    config: TrackerConfig,
    status: Arc<Mutex<SystemStatus>>,
    guard: Arc<ActuatorGuard>,
    running: Arc<AtomicBool>,
    tracking_loop: Option<TrackingLoop>,
    worker: Option<Worker>,
    initialized: bool,
    final_stats: Option<FinalStats>,
}

impl TrackingCoordinator {
    pub fn new(
        config: TrackerConfig,
        camera: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        driver: Box<dyn ServoDriver>,
    ) -> Result<Self> {
        config.validate()?;
        let tracking_loop = TrackingLoop::new(&config, camera, detector, driver)?;
        Ok(Self::from_loop(config, tracking_loop))
    }

    pub fn from_loop(config: TrackerConfig, tracking_loop: TrackingLoop) -> Self {
        Self {
            status: tracking_loop.status.clone(),
            guard: tracking_loop.guard.clone(),
            running: Arc::new(AtomicBool::new(false)),
            tracking_loop: Some(tracking_loop),
            worker: None,
            initialized: false,
            final_stats: None,
            config,
        }
    }

    /// Bring up camera, detector and actuator; on success the mode is
    /// SCANNING, on failure it stays STANDBY
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            warn!("Tracking system already initialized");
            return Ok(());
        }
        let Some(tracking_loop) = self.tracking_loop.as_mut() else {
            return Err(Error::NotReady(
                "tracking system has been shut down".to_string(),
            ));
        };

        info!("Initializing tracking system...");
        match tracking_loop.initialize() {
            Ok(()) => {
                self.initialized = true;
                info!("Tracking system initialized");
                Ok(())
            }
            Err(e) => {
                error!("Tracking system initialization failed: {}", e);
                Err(e)
            }
        }
    }

    /// Spawn the worker thread
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            warn!("Tracking already running");
            return Ok(());
        }
        if !self.initialized {
            return Err(Error::NotReady("tracking system not initialized".to_string()));
        }
        let Some(mut tracking_loop) = self.tracking_loop.take() else {
            return Err(Error::NotReady(
                "tracking system has been shut down".to_string(),
            ));
        };

        tracking_loop.restart_clock(Instant::now());
        let (wake_tx, wake_rx) = channel::bounded::<()>(1);
        let (done_tx, done_rx) = channel::bounded::<FinalStats>(1);
        let running = self.running.clone();
        let interval = self.config.tracking.detection_interval();

        self.running.store(true, Ordering::SeqCst);
        self.status.lock().is_running = true;

        let spawned = thread::Builder::new()
            .name("pantilt-tracker".to_string())
            .spawn(move || {
                let stats = tracking_loop.run(running, wake_rx, interval);
                let _ = done_tx.send(stats);
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    handle,
                    done: done_rx,
                    wake: wake_tx,
                });
                info!("Tracking started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.status.lock().is_running = false;
                self.initialized = false;
                error!("Failed to spawn tracking worker: {}", e);
                Err(Error::Io(e))
            }
        }
    }

    /// Stop the worker, waiting at most the configured shutdown timeout,
    /// then centre and release the servos regardless
    pub fn stop(&mut self) -> Option<FinalStats> {
        info!("Stopping tracking...");
        self.running.store(false, Ordering::SeqCst);

        let stats = match self.worker.take() {
            Some(worker) => self.join_worker(worker),
            None => match self.tracking_loop.take() {
                Some(mut tracking_loop) if self.initialized => Some(tracking_loop.shut_down()),
                Some(tracking_loop) => {
                    self.tracking_loop = Some(tracking_loop);
                    None
                }
                None => None,
            },
        };

        if self.initialized {
            self.guard.shutdown();
            self.initialized = false;
        }
        let angles = self.guard.current_angles();
        {
            let mut status = self.status.lock();
            status.is_running = false;
            status.angles = angles;
        }

        if let Some(stats) = &stats {
            info!(
                "Final statistics: {} detections over {:.1}s, {} rejected corrections, {} dropped frames",
                stats.total_detections,
                stats.run_time_secs,
                stats.rejected_corrections,
                stats.dropped_frames
            );
            if let Some(interval) = stats.average_detection_interval_secs {
                info!("Average detection interval: {:.2}s", interval);
            }
            self.final_stats = Some(stats.clone());
        }
        info!("Tracking stopped");
        stats
    }

    fn join_worker(&self, worker: Worker) -> Option<FinalStats> {
        let Worker { handle, done, wake } = worker;
        drop(wake);

        let timeout = self.config.tracking.shutdown_timeout();
        match done.recv_timeout(timeout) {
            Ok(stats) => {
                if handle.join().is_err() {
                    error!("Tracking worker panicked during shutdown");
                }
                Some(stats)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Tracking worker did not exit within {:?}, cleaning up anyway",
                    timeout
                );
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("Tracking worker exited without reporting");
                let _ = handle.join();
                None
            }
        }
    }

    pub fn get_status(&self) -> SystemStatus {
        self.status.lock().clone()
    }

    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle {
            status: self.status.clone(),
        }
    }

    pub fn mode(&self) -> TrackingMode {
        self.status.lock().mode
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn guard(&self) -> &Arc<ActuatorGuard> {
        &self.guard
    }

    /// Statistics reported by the last stop
    pub fn final_stats(&self) -> Option<&FinalStats> {
        self.final_stats.as_ref()
    }

    /// Halt the loop and centre the servos, latching the guard in error
    pub fn emergency_stop(&self) -> bool {
        self.emergency_handle().trigger()
    }

    pub fn emergency_handle(&self) -> EmergencyHandle {
        EmergencyHandle {
            stop: self.guard.emergency_handle(),
            running: self.running.clone(),
        }
    }
}

impl Drop for TrackingCoordinator {
    fn drop(&mut self) {
        if self.worker.is_some() || self.initialized {
            self.stop();
        }
    }
}
