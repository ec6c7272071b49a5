use pantilt_control::{build_law, ControlLaw, ControllerStatus, PidAxis, PidLaw, ProportionalLaw};
use pantilt_core::config::{ControlConfig, ControlLawKind, PidAxisGains, ServoConfig};
use pantilt_core::{BoundingBox, ControlError, Detection, Error, PanTilt, PetClass};
use pantilt_eye::{select_best, ScanPattern};
use pantilt_servo::{ActuatorGuard, AxisMapping, SimulatedServoDriver};
use proptest::prelude::*;
use std::time::{Duration, Instant};

fn proportional() -> ProportionalLaw {
    ProportionalLaw::from_config(&ControlConfig::default()).unwrap()
}

fn pid() -> PidLaw {
    PidLaw::from_config(&ControlConfig::default()).unwrap()
}

fn ready_guard() -> ActuatorGuard {
    let config = ServoConfig {
        settle_time_ms: 0,
        ..ServoConfig::default()
    };
    let guard = ActuatorGuard::new(&config, Box::new(SimulatedServoDriver::new()));
    guard.initialize().unwrap();
    guard
}

proptest! {
    #[test]
    fn test_deadband_property(ex in -4.99f64..4.99, ey in -4.99f64..4.99) {
        let error = ControlError::new(ex, ey);
        prop_assert!(proportional().compute(error).is_zero());

        let mut law = pid();
        let start = Instant::now();
        law.reset_at(start);
        prop_assert!(law.compute_at(error, start + Duration::from_millis(100)).is_zero());
    }

    #[test]
    fn test_proportional_bounded(ex in -10_000f64..10_000.0, ey in -10_000f64..10_000.0) {
        let correction = proportional().compute(ControlError::new(ex, ey));
        prop_assert!(correction.pan.abs() <= 15.0);
        prop_assert!(correction.tilt.abs() <= 15.0);
    }

    #[test]
    fn test_pid_bounded(errors in prop::collection::vec((-2000f64..2000.0, -2000f64..2000.0), 1..100)) {
        let mut law = pid();
        let start = Instant::now();
        law.reset_at(start);
        for (i, (ex, ey)) in errors.into_iter().enumerate() {
            let now = start + Duration::from_millis(20 * (i as u64 + 1));
            let correction = law.compute_at(ControlError::new(ex, ey), now);
            prop_assert!(correction.pan.abs() <= 15.0);
            prop_assert!(correction.tilt.abs() <= 15.0);
        }
    }

    #[test]
    fn test_reset_clears_components(
        errors in prop::collection::vec((-1000f64..1000.0, -1000f64..1000.0), 1..50),
        pid_law in any::<bool>(),
    ) {
        let config = ControlConfig {
            law: if pid_law { ControlLawKind::Pid } else { ControlLawKind::Proportional },
            ..ControlConfig::default()
        };
        let mut law = build_law(&config).unwrap();
        let start = Instant::now();
        for (i, (ex, ey)) in errors.into_iter().enumerate() {
            law.compute_at(ControlError::new(ex, ey), start + Duration::from_millis(20 * (i as u64 + 1)));
        }

        law.reset();
        prop_assert!(law.components().is_zero());
        prop_assert_eq!(law.statistics().total_updates, 0);
        prop_assert_eq!(law.status(), ControllerStatus::Ready);
        prop_assert!(law.compute(ControlError::new(0.0, 0.0)).is_zero());
    }

    #[test]
    fn test_tilt_sign_inverted(ey in 0.01f64..1000.0) {
        let mut law = ProportionalLaw::new(0.0156, 0.0208, 15.0, 0.0, 100).unwrap();
        prop_assert!(law.compute(ControlError::new(0.0, ey)).tilt < 0.0);
        prop_assert!(law.compute(ControlError::new(0.0, -ey)).tilt > 0.0);
    }

    #[test]
    fn test_anti_windup(
        error in prop_oneof![-1000f64..-0.1, 0.1f64..1000.0],
        updates in 1usize..500,
        ki in 0.01f64..5.0,
    ) {
        let mut axis = PidAxis::new(
            "Windup",
            PidAxisGains { kp: 0.0, ki, kd: 0.0 },
            (-15.0, 15.0),
            (-50.0, 50.0),
            Duration::from_millis(10),
            100,
        ).unwrap();
        let start = Instant::now();
        axis.reset_at(start);
        for i in 0..updates {
            axis.update_at(error, start + Duration::from_millis(100 * (i as u64 + 1)));
            prop_assert!(axis.integral() >= -50.0 && axis.integral() <= 50.0);
        }
    }

    #[test]
    fn test_guard_applies_only_safe_angles(pan in -200f64..200.0, tilt in -100f64..100.0) {
        let guard = ready_guard();
        guard.apply(12.5, -7.5).unwrap();
        let before = guard.current_angles();

        let safe = (-90.0..=90.0).contains(&pan) && (-45.0..=45.0).contains(&tilt);
        match guard.apply(pan, tilt) {
            Ok(applied) => {
                prop_assert!(safe);
                prop_assert_eq!(applied, PanTilt::new(pan, tilt));
                prop_assert_eq!(guard.current_angles(), applied);
            }
            Err(Error::SafetyViolation { .. }) => {
                prop_assert!(!safe);
                prop_assert_eq!(guard.current_angles(), before);
            }
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }

    #[test]
    fn test_mapping_stable(logical in -90f64..90.0) {
        let mapping = AxisMapping::default();
        let physical = mapping.to_physical(logical);
        prop_assert!((0.0..=180.0).contains(&physical));
        prop_assert!((mapping.to_logical(physical) - logical).abs() < 1e-9);
    }

    #[test]
    fn test_select_best_is_max(confidences in prop::collection::vec(0f32..=1.0, 1..20)) {
        let detections: Vec<Detection> = confidences
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let bbox = BoundingBox::centered(10.0 + i as f32, 10.0, 4.0, 4.0).unwrap();
                Detection::new(PetClass::Cat, c, bbox).unwrap()
            })
            .collect();
        let best = select_best(&detections).unwrap();
        let max = confidences.iter().cloned().fold(f32::MIN, f32::max);
        prop_assert_eq!(best.confidence(), max);
        // First occurrence of the maximum
        let first = confidences.iter().position(|&c| c == max).unwrap();
        prop_assert_eq!(best.center().x, 10.0 + first as f64);
    }

    #[test]
    fn test_scan_within_amplitude(millis in 0u64..10_000_000) {
        let angles = ScanPattern::default().angles_at(Duration::from_millis(millis));
        prop_assert!(angles.pan.abs() <= 30.0);
        prop_assert_eq!(angles.tilt, 0.0);
    }
}
