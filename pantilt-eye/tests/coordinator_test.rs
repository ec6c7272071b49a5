//! Coordinator tests against the simulated rig

use pantilt_core::config::TrackerConfig;
use pantilt_core::{BoundingBox, Detection, Error, PanTilt, PetClass};
use pantilt_eye::{ScriptedDetector, SyntheticCamera, TrackingCoordinator, TrackingMode};
use pantilt_servo::{ServoStatus, SimulatedServoDriver, SimulatedServoHandle};
use std::thread;
use std::time::Duration;

fn fast_config() -> TrackerConfig {
    let mut config = TrackerConfig::default();
    config.servo.settle_time_ms = 0;
    config.tracking.detection_interval_ms = 5;
    config.tracking.shutdown_timeout_ms = 2000;
    config
}

fn dog_at(cx: f32, cy: f32) -> Detection {
    let bbox = BoundingBox::centered(cx, cy, 80.0, 60.0).unwrap();
    Detection::new(PetClass::Dog, 0.85, bbox).unwrap()
}

fn coordinator(
    config: TrackerConfig,
    camera: SyntheticCamera,
    detector: ScriptedDetector,
) -> (TrackingCoordinator, SimulatedServoHandle) {
    let driver = SimulatedServoDriver::new();
    let servo = driver.handle();
    let coordinator =
        TrackingCoordinator::new(config, Box::new(camera), Box::new(detector), Box::new(driver))
            .unwrap();
    (coordinator, servo)
}

#[test]
fn test_run_and_stop() {
    let config = fast_config();
    let camera = SyntheticCamera::new(&config.camera);
    let detector = ScriptedDetector::new(vec![vec![dog_at(360.0, 260.0)]]).looping();
    let (mut coordinator, servo) = coordinator(config, camera, detector);

    coordinator.initialize().unwrap();
    assert_eq!(coordinator.mode(), TrackingMode::Scanning);
    coordinator.start().unwrap();
    assert!(coordinator.is_running());

    thread::sleep(Duration::from_millis(200));
    let status = coordinator.get_status();
    assert!(status.is_running);
    assert_eq!(status.mode, TrackingMode::Tracking);
    assert!(status.total_detections > 0);
    assert_eq!(status.target_class, Some(PetClass::Dog));
    assert!(status.angles.pan > 0.0);
    assert!(status.angles.tilt < 0.0);

    let stats = coordinator.stop().expect("worker should report final stats");
    assert!(stats.total_detections > 0);
    assert_eq!(stats.detection.recent_detection_rate, 1.0);

    let status = coordinator.get_status();
    assert!(!status.is_running);
    assert_eq!(status.angles, PanTilt::CENTER);
    assert_eq!(coordinator.guard().status(), ServoStatus::Uninitialized);
    assert_eq!(servo.last_command(), Some((90.0, 90.0)));
    assert!(servo.is_released());
}

#[test]
fn test_scans_without_target() {
    let config = fast_config();
    let camera = SyntheticCamera::new(&config.camera);
    let (mut coordinator, servo) = coordinator(config, camera, ScriptedDetector::new(Vec::new()));

    coordinator.initialize().unwrap();
    coordinator.start().unwrap();
    thread::sleep(Duration::from_millis(100));
    let status = coordinator.get_status();
    coordinator.stop();

    assert_eq!(status.mode, TrackingMode::Scanning);
    assert!(!status.target_detected);
    assert_eq!(status.total_detections, 0);
    // Centring at init plus at least one sweep step
    assert!(servo.commands().len() > 1);
}

#[test]
fn test_camera_failure_blocks_startup() {
    let config = fast_config();
    let camera = SyntheticCamera::new(&config.camera).unavailable();
    let (mut coordinator, servo) = coordinator(config, camera, ScriptedDetector::new(Vec::new()));

    let result = coordinator.initialize();
    assert!(matches!(result, Err(Error::Initialization(_))));
    assert_eq!(coordinator.mode(), TrackingMode::Standby);
    assert!(!coordinator.is_initialized());
    assert!(servo.commands().is_empty());
    assert!(matches!(coordinator.start(), Err(Error::NotReady(_))));
}

#[test]
fn test_servo_failure_blocks_startup() {
    let config = fast_config();
    let camera = SyntheticCamera::new(&config.camera);
    let driver = SimulatedServoDriver::new();
    driver.handle().fail_initialize(true);
    let mut coordinator = TrackingCoordinator::new(
        config,
        Box::new(camera),
        Box::new(ScriptedDetector::new(Vec::new())),
        Box::new(driver),
    )
    .unwrap();

    assert!(matches!(coordinator.initialize(), Err(Error::Initialization(_))));
    assert_eq!(coordinator.mode(), TrackingMode::Standby);
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = fast_config();
    config.servo.pan_range = (10.0, -10.0);
    let result = TrackingCoordinator::new(
        config.clone(),
        Box::new(SyntheticCamera::new(&config.camera)),
        Box::new(ScriptedDetector::new(Vec::new())),
        Box::new(SimulatedServoDriver::new()),
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_emergency_stop_centres_and_halts() {
    let config = fast_config();
    let camera = SyntheticCamera::new(&config.camera);
    let detector = ScriptedDetector::new(vec![vec![dog_at(500.0, 100.0)]]).looping();
    let (mut coordinator, servo) = coordinator(config, camera, detector);

    coordinator.initialize().unwrap();
    coordinator.start().unwrap();
    thread::sleep(Duration::from_millis(50));

    let handle = coordinator.emergency_handle();
    assert!(thread::spawn(move || handle.trigger()).join().unwrap());
    assert!(!coordinator.is_running());
    assert_eq!(coordinator.guard().status(), ServoStatus::Error);
    assert_eq!(coordinator.guard().current_angles(), PanTilt::CENTER);

    assert!(coordinator.stop().is_some());
    assert_eq!(servo.last_command(), Some((90.0, 90.0)));
    assert!(servo.is_released());
}

#[test]
fn test_stop_without_start_releases_hardware() {
    let config = fast_config();
    let camera = SyntheticCamera::new(&config.camera);
    let (mut coordinator, servo) = coordinator(config, camera, ScriptedDetector::new(Vec::new()));

    coordinator.initialize().unwrap();
    let stats = coordinator.stop().unwrap();
    assert_eq!(stats.total_detections, 0);
    assert!(stats.average_detection_interval_secs.is_none());
    assert!(servo.is_released());
    assert!(coordinator.final_stats().is_some());
}

#[test]
fn test_status_is_a_snapshot() {
    let config = fast_config();
    let camera = SyntheticCamera::new(&config.camera);
    let (mut coordinator, _) = coordinator(config, camera, ScriptedDetector::new(Vec::new()));
    coordinator.initialize().unwrap();

    let mut snapshot = coordinator.get_status();
    snapshot.total_detections = 99;
    snapshot.mode = TrackingMode::Tracking;
    let fresh = coordinator.get_status();
    assert_eq!(fresh.total_detections, 0);
    assert_eq!(fresh.mode, TrackingMode::Scanning);
}
