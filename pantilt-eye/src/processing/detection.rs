//! Detector boundary and target filtering

use pantilt_core::config::TrackingConfig;
use pantilt_core::{Detection, Error, Frame, PetClass, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Object detector run on every frame
pub trait Detector: Send {
    fn load(&mut self) -> Result<()>;

    /// Fails soft: internal errors are logged and yield no detections
    fn detect(&mut self, frame: &Frame) -> Vec<Detection>;

    fn release(&mut self) {}
}

const PROCESSING_WINDOW: usize = 100;
const DETECTION_HISTORY: usize = 1000;
const RECENT_FRAMES: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DetectionStats {
    pub frames_processed: u64,
    pub total_detections: u64,
    /// Fraction of the last 100 frames with at least one accepted detection
    pub recent_detection_rate: f64,
    pub average_processing_ms: f64,
}

/// Highest confidence wins; the first seen wins a tie
pub fn select_best(detections: &[Detection]) -> Option<&Detection> {
    let mut best: Option<&Detection> = None;
    for detection in detections {
        match best {
            Some(b) if b.confidence() >= detection.confidence() => {}
            _ => best = Some(detection),
        }
    }
    best
}

/// Wraps a [`Detector`] with class and confidence filtering plus statistics
pub struct DetectionPipeline {
    detector: Box<dyn Detector>,
    target_classes: Vec<PetClass>,
    confidence_threshold: f32,
    frames_processed: u64,
    total_detections: u64,
    detections_per_frame: VecDeque<usize>,
    processing_times: VecDeque<Duration>,
}

impl DetectionPipeline {
    pub fn new(detector: Box<dyn Detector>, config: &TrackingConfig) -> Self {
        Self {
            detector,
            target_classes: config.target_classes.clone(),
            confidence_threshold: config.confidence_threshold,
            frames_processed: 0,
            total_detections: 0,
            detections_per_frame: VecDeque::with_capacity(DETECTION_HISTORY),
            processing_times: VecDeque::with_capacity(PROCESSING_WINDOW),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        self.detector.load()?;
        info!(
            "Detector loaded (targets: {:?}, confidence >= {:.2})",
            self.target_classes, self.confidence_threshold
        );
        Ok(())
    }

    /// Accepted detections for `frame`, in detector order
    pub fn detect(&mut self, frame: &Frame) -> Vec<Detection> {
        let started = Instant::now();
        let accepted: Vec<Detection> = self
            .detector
            .detect(frame)
            .into_iter()
            .filter(|d| {
                self.target_classes.contains(&d.class())
                    && d.confidence() >= self.confidence_threshold
            })
            .collect();
        let elapsed = started.elapsed();

        self.frames_processed += 1;
        self.total_detections += accepted.len() as u64;

        if self.processing_times.len() >= PROCESSING_WINDOW {
            self.processing_times.pop_front();
        }
        self.processing_times.push_back(elapsed);

        if self.detections_per_frame.len() >= DETECTION_HISTORY {
            self.detections_per_frame.pop_front();
        }
        self.detections_per_frame.push_back(accepted.len());

        if !accepted.is_empty() {
            debug!(
                "Frame {}: {} target(s) in {:.1}ms",
                frame.sequence,
                accepted.len(),
                elapsed.as_secs_f64() * 1000.0
            );
        }
        accepted
    }

    /// Best accepted detection for `frame`
    pub fn best(&mut self, frame: &Frame) -> Option<Detection> {
        let detections = self.detect(frame);
        select_best(&detections).cloned()
    }

    pub fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Configuration(format!(
                "confidence threshold {} outside [0, 1]",
                threshold
            )));
        }
        self.confidence_threshold = threshold;
        info!("Confidence threshold set to {:.2}", threshold);
        Ok(())
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn stats(&self) -> DetectionStats {
        let recent: Vec<usize> = self
            .detections_per_frame
            .iter()
            .rev()
            .take(RECENT_FRAMES)
            .copied()
            .collect();
        let recent_hits = recent.iter().filter(|&&n| n > 0).count();
        let average_processing_ms = if self.processing_times.is_empty() {
            0.0
        } else {
            self.processing_times
                .iter()
                .map(|d| d.as_secs_f64() * 1000.0)
                .sum::<f64>()
                / self.processing_times.len() as f64
        };

        DetectionStats {
            frames_processed: self.frames_processed,
            total_detections: self.total_detections,
            recent_detection_rate: recent_hits as f64 / recent.len().max(1) as f64,
            average_processing_ms,
        }
    }

    pub fn release(&mut self) {
        self.detector.release();
        info!("Detector released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ScriptedDetector;
    use pantilt_core::BoundingBox;

    fn detection(class: PetClass, confidence: f32, cx: f32) -> Detection {
        let bbox = BoundingBox::centered(cx, 240.0, 40.0, 40.0).unwrap();
        Detection::new(class, confidence, bbox).unwrap()
    }

    #[test]
    fn test_select_best_max_confidence() {
        let detections = vec![
            detection(PetClass::Cat, 0.6, 100.0),
            detection(PetClass::Dog, 0.9, 200.0),
            detection(PetClass::Cat, 0.7, 300.0),
        ];
        let best = select_best(&detections).unwrap();
        assert_eq!(best.class(), PetClass::Dog);
    }

    #[test]
    fn test_select_best_tie_first_seen() {
        let detections = vec![
            detection(PetClass::Cat, 0.8, 100.0),
            detection(PetClass::Dog, 0.8, 200.0),
        ];
        let best = select_best(&detections).unwrap();
        assert_eq!(best.center().x, 100.0);
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn test_pipeline_filters_class_and_confidence() {
        let mut config = TrackingConfig::default();
        config.target_classes = vec![PetClass::Dog];
        config.confidence_threshold = 0.5;
        let script = vec![vec![
            detection(PetClass::Cat, 0.95, 100.0),
            detection(PetClass::Dog, 0.4, 200.0),
            detection(PetClass::Dog, 0.6, 300.0),
        ]];
        let mut pipeline = DetectionPipeline::new(Box::new(ScriptedDetector::new(script)), &config);
        pipeline.load().unwrap();

        let accepted = pipeline.detect(&Frame::blank(1, 640, 480));
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].center().x, 300.0);
    }

    #[test]
    fn test_pipeline_stats() {
        let config = TrackingConfig::default();
        let script = vec![
            vec![detection(PetClass::Cat, 0.9, 100.0)],
            vec![],
            vec![
                detection(PetClass::Dog, 0.9, 100.0),
                detection(PetClass::Cat, 0.8, 200.0),
            ],
            vec![],
        ];
        let mut pipeline = DetectionPipeline::new(Box::new(ScriptedDetector::new(script)), &config);
        pipeline.load().unwrap();
        for i in 0..4 {
            pipeline.best(&Frame::blank(i, 640, 480));
        }
        let stats = pipeline.stats();
        assert_eq!(stats.frames_processed, 4);
        assert_eq!(stats.total_detections, 3);
        assert_eq!(stats.recent_detection_rate, 0.5);
        assert!(stats.average_processing_ms >= 0.0);
    }

    #[test]
    fn test_confidence_threshold_validation() {
        let mut pipeline = DetectionPipeline::new(
            Box::new(ScriptedDetector::new(Vec::new())),
            &TrackingConfig::default(),
        );
        assert!(pipeline.set_confidence_threshold(1.5).is_err());
        assert_eq!(pipeline.confidence_threshold(), 0.5);
        pipeline.set_confidence_threshold(0.8).unwrap();
        assert_eq!(pipeline.confidence_threshold(), 0.8);
    }
}
