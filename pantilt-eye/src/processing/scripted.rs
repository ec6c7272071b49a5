//! Replays a fixed detection script, one entry per frame

use super::detection::Detector;
use pantilt_core::{Detection, Error, Frame, Result};
use tracing::{info, warn};

pub struct ScriptedDetector {
    script: Vec<Vec<Detection>>,
    position: usize,
    looping: bool,
    loaded: bool,
    fail_load: bool,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script,
            position: 0,
            looping: false,
            loaded: false,
            fail_load: false,
        }
    }

    /// Restart from the first entry once the script is exhausted
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// `load` fails, as with a missing model file
    pub fn broken(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len().saturating_sub(self.position)
    }
}

impl Detector for ScriptedDetector {
    fn load(&mut self) -> Result<()> {
        if self.fail_load {
            return Err(Error::Detector("model could not be loaded".to_string()));
        }
        self.loaded = true;
        info!("Scripted detector loaded with {} frames", self.script.len());
        Ok(())
    }

    fn detect(&mut self, _frame: &Frame) -> Vec<Detection> {
        if !self.loaded {
            warn!("Scripted detector used before load");
            return Vec::new();
        }
        if self.position >= self.script.len() {
            if !self.looping || self.script.is_empty() {
                return Vec::new();
            }
            self.position = 0;
        }
        let detections = self.script[self.position].clone();
        self.position += 1;
        detections
    }

    fn release(&mut self) {
        self.loaded = false;
    }
}
