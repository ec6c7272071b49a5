//! Error types shared by every pantilt crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid detection: {0}")]
    InvalidDetection(String),

    #[error("Safety violation: pan={pan:.2}, tilt={tilt:.2} outside safe range")]
    SafetyViolation { pan: f64, tilt: f64 },

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Servo error: {0}")]
    Servo(String),

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Transient failures degrade a single cycle; the worker keeps running.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Servo(_) | Error::Camera(_) | Error::Detector(_) | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
