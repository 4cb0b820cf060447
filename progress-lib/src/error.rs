use std::fmt::{Display, Formatter};

/// Error type shared by the synthesis, playback and interception layers.
#[derive(Debug)]
pub enum ProgressError {
    Config(String),
    Device(String),
    Synthesis(String),
    Hook(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Display for ProgressError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid configuration: {}", err),
            Self::Device(err) => write!(f, "audio device error: {}", err),
            Self::Synthesis(err) => write!(f, "synthesis error: {}", err),
            Self::Hook(err) => write!(f, "tone hook error: {}", err),
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Json(err) => write!(f, "json error: {}", err),
        }
    }
}

impl std::error::Error for ProgressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProgressError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ProgressError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ProgressError>;
