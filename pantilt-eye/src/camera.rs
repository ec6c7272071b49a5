//! Frame acquisition boundary

use pantilt_core::config::CameraConfig;
use pantilt_core::{Error, Frame, Result};
use tracing::{debug, info, warn};

/// A camera or any other producer of frames
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<()>;

    /// Next frame; an error is a dropped frame, not a fatal condition
    fn read(&mut self) -> Result<Frame>;

    fn release(&mut self);
}

/// Produces blank frames at the configured resolution
pub struct SyntheticCamera {
    camera_id: u32,
    width: u32,
    height: u32,
    sequence: u64,
    opened: bool,
    fail_open: bool,
    drop_every: Option<u64>,
}

impl SyntheticCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            camera_id: config.camera_id,
            width: config.width,
            height: config.height,
            sequence: 0,
            opened: false,
            fail_open: false,
            drop_every: None,
        }
    }

    /// Every `n`th read fails
    pub fn with_dropped_frames(mut self, n: u64) -> Self {
        self.drop_every = if n == 0 { None } else { Some(n) };
        self
    }

    /// `open` fails, as with a missing device
    pub fn unavailable(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn frames_read(&self) -> u64 {
        self.sequence
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }
}

impl FrameSource for SyntheticCamera {
    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(Error::Camera(format!(
                "camera {} could not be opened",
                self.camera_id
            )));
        }
        self.opened = true;
        info!(
            "Synthetic camera {} opened at {}x{}",
            self.camera_id, self.width, self.height
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        if !self.opened {
            return Err(Error::Camera("camera not opened".to_string()));
        }
        self.sequence += 1;
        if let Some(n) = self.drop_every {
            if self.sequence % n == 0 {
                warn!("Synthetic camera dropped frame {}", self.sequence);
                return Err(Error::Camera(format!("frame {} dropped", self.sequence)));
            }
        }
        debug!("Synthetic frame {}", self.sequence);
        Ok(Frame::blank(self.sequence, self.width, self.height))
    }

    fn release(&mut self) {
        if self.opened {
            self.opened = false;
            info!("Synthetic camera {} released", self.camera_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_requires_open() {
        let mut camera = SyntheticCamera::new(&CameraConfig::default());
        assert!(camera.read().is_err());
        camera.open().unwrap();
        let frame = camera.read().unwrap();
        assert_eq!((frame.width, frame.height), (640, 480));
        assert_eq!(frame.sequence, 1);
    }

    #[test]
    fn test_dropped_frames() {
        let mut camera = SyntheticCamera::new(&CameraConfig::default()).with_dropped_frames(3);
        camera.open().unwrap();
        assert!(camera.read().is_ok());
        assert!(camera.read().is_ok());
        assert!(matches!(camera.read(), Err(Error::Camera(_))));
        assert!(camera.read().is_ok());
    }

    #[test]
    fn test_unavailable_camera() {
        let mut camera = SyntheticCamera::new(&CameraConfig::default()).unavailable();
        assert!(camera.open().is_err());
        assert!(!camera.is_open());
    }

    #[test]
    fn test_release() {
        let mut camera = SyntheticCamera::new(&CameraConfig::default());
        camera.open().unwrap();
        camera.release();
        assert!(!camera.is_open());
        assert!(camera.read().is_err());
    }
}
