//! Value types exchanged between the detector, control law and actuator

use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Animal classes the rig can follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetClass {
    Cat,
    Dog,
}

impl PetClass {
    /// COCO class index used by YOLO-family detectors
    pub fn coco_id(&self) -> usize {
        match self {
            PetClass::Cat => 15,
            PetClass::Dog => 16,
        }
    }

    pub fn from_coco_id(id: usize) -> Option<Self> {
        match id {
            15 => Some(PetClass::Cat),
            16 => Some(PetClass::Dog),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PetClass::Cat => "Cat",
            PetClass::Dog => "Dog",
        }
    }
}

impl fmt::Display for PetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A point in image pixel coordinates (row index grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Geometric centre of a `width` x `height` image, halved on integers
    pub fn image_center(width: u32, height: u32) -> Self {
        Self {
            x: (width / 2) as f64,
            y: (height / 2) as f64,
        }
    }
}

/// Axis-aligned box in pixel coordinates, `x1 < x2` and `y1 < y2`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        if !(x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()) {
            return Err(Error::InvalidDetection(
                "bounding box coordinates must be finite".to_string(),
            ));
        }
        if x1 >= x2 || y1 >= y2 {
            return Err(Error::InvalidDetection(format!(
                "degenerate bounding box ({}, {}, {}, {})",
                x1, y1, x2, y2
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Box of the given size centred on (`cx`, `cy`)
    pub fn centered(cx: f32, cy: f32, width: f32, height: f32) -> Result<Self> {
        let hw = width / 2.0;
        let hh = height / 2.0;
        Self::new(cx - hw, cy - hh, cx + hw, cy + hh)
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn x2(&self) -> f32 {
        self.x2
    }

    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> PixelPoint {
        PixelPoint {
            x: (self.x1 as f64 + self.x2 as f64) / 2.0,
            y: (self.y1 as f64 + self.y2 as f64) / 2.0,
        }
    }
}

/// One recognised animal in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    class: PetClass,
    confidence: f32,
    bbox: BoundingBox,
    center: PixelPoint,
}

impl Detection {
    pub fn new(class: PetClass, confidence: f32, bbox: BoundingBox) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::InvalidDetection(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }
        Ok(Self {
            class,
            confidence,
            bbox,
            center: bbox.center(),
        })
    }

    pub fn class(&self) -> PetClass {
        self.class
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn center(&self) -> PixelPoint {
        self.center
    }
}

/// Pixel offset of a target from the image centre
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlError {
    pub pan: f64,
    pub tilt: f64,
}

impl ControlError {
    pub fn new(pan: f64, tilt: f64) -> Self {
        Self { pan, tilt }
    }

    pub fn from_center(target: PixelPoint, image_center: PixelPoint) -> Self {
        Self {
            pan: target.x - image_center.x,
            tilt: target.y - image_center.y,
        }
    }
}

/// Angular correction in degrees produced by a control law
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Correction {
    pub pan: f64,
    pub tilt: f64,
}

impl Correction {
    pub const ZERO: Correction = Correction { pan: 0.0, tilt: 0.0 };

    pub fn new(pan: f64, tilt: f64) -> Self {
        Self { pan, tilt }
    }

    pub fn is_zero(&self) -> bool {
        self.pan == 0.0 && self.tilt == 0.0
    }
}

/// Logical pan/tilt angle pair in degrees, (0, 0) is straight ahead
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PanTilt {
    pub pan: f64,
    pub tilt: f64,
}

impl PanTilt {
    pub const CENTER: PanTilt = PanTilt { pan: 0.0, tilt: 0.0 };

    pub fn new(pan: f64, tilt: f64) -> Self {
        Self { pan, tilt }
    }

    /// Corrections are rates: they accumulate onto the current pointing
    pub fn offset_by(&self, correction: Correction) -> Self {
        Self {
            pan: self.pan + correction.pan,
            tilt: self.tilt + correction.tilt,
        }
    }
}

impl fmt::Display for PanTilt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pan {:.1}°, Tilt {:.1}°", self.pan, self.tilt)
    }
}

/// A captured camera frame; pixel payload is opaque to the tracking core
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
    pub data: Bytes,
}

impl Frame {
    pub fn new(sequence: u64, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            sequence,
            width,
            height,
            captured_at: Utc::now(),
            data,
        }
    }

    /// Frame without pixel data, used by synthetic sources
    pub fn blank(sequence: u64, width: u32, height: u32) -> Self {
        Self::new(sequence, width, height, Bytes::new())
    }

    pub fn center(&self) -> PixelPoint {
        PixelPoint::image_center(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pet_class_coco_ids() {
        assert_eq!(PetClass::Cat.coco_id(), 15);
        assert_eq!(PetClass::Dog.coco_id(), 16);
        assert_eq!(PetClass::from_coco_id(16), Some(PetClass::Dog));
        assert_eq!(PetClass::from_coco_id(0), None);
    }

    #[test]
    fn test_pet_class_serialization() {
        let json = serde_json::to_string(&PetClass::Dog).unwrap();
        assert_eq!(json, "\"dog\"");
        let class: PetClass = serde_json::from_str("\"cat\"").unwrap();
        assert_eq!(class, PetClass::Cat);
    }

    #[test]
    fn test_bbox_rejects_degenerate() {
        assert!(BoundingBox::new(10.0, 10.0, 10.0, 20.0).is_err());
        assert!(BoundingBox::new(10.0, 30.0, 20.0, 20.0).is_err());
        assert!(BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_ok());
    }

    #[test]
    fn test_bbox_center() {
        let bbox = BoundingBox::new(380.0, 200.0, 460.0, 280.0).unwrap();
        let center = bbox.center();
        assert_eq!(center.x, 420.0);
        assert_eq!(center.y, 240.0);
        assert_eq!(bbox.width(), 80.0);
        assert_eq!(bbox.area(), 6400.0);
    }

    #[test]
    fn test_bbox_centered() {
        let bbox = BoundingBox::centered(320.0, 320.0, 40.0, 60.0).unwrap();
        assert_eq!(bbox.center(), PixelPoint::new(320.0, 320.0));
    }

    #[test]
    fn test_detection_confidence_bounds() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        assert!(Detection::new(PetClass::Cat, 1.2, bbox).is_err());
        assert!(Detection::new(PetClass::Cat, -0.1, bbox).is_err());
        let det = Detection::new(PetClass::Cat, 0.75, bbox).unwrap();
        assert_eq!(det.center(), PixelPoint::new(5.0, 5.0));
        assert_eq!(det.class(), PetClass::Cat);
    }

    #[test]
    fn test_image_center_integer_halving() {
        assert_eq!(PixelPoint::image_center(640, 480), PixelPoint::new(320.0, 240.0));
        assert_eq!(PixelPoint::image_center(641, 481), PixelPoint::new(320.0, 240.0));
    }

    #[test]
    fn test_control_error_from_center() {
        let err = ControlError::from_center(
            PixelPoint::new(420.0, 200.0),
            PixelPoint::new(320.0, 240.0),
        );
        assert_eq!(err.pan, 100.0);
        assert_eq!(err.tilt, -40.0);
    }

    #[test]
    fn test_pan_tilt_offset() {
        let current = PanTilt::new(10.0, -5.0);
        let next = current.offset_by(Correction::new(1.5, -0.5));
        assert_eq!(next, PanTilt::new(11.5, -5.5));
    }

    #[test]
    fn test_blank_frame() {
        let frame = Frame::blank(7, 640, 480);
        assert_eq!(frame.sequence, 7);
        assert!(frame.data.is_empty());
        assert_eq!(frame.center(), PixelPoint::new(320.0, 240.0));
    }
}
