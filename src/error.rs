//! Error types for the screen casting application

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker failure: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamOpen(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Screen capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No monitor available")]
    NoMonitor,

    #[error("Monitor enumeration failed: {0}")]
    Enumerate(String),

    #[error("Screen grab failed: {0}")]
    Grab(String),
}

/// Errors surfaced at the boundary to the WebRTC engine
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Engine error: {0}")]
    Engine(#[from] webrtc::Error),

    #[error("Local description missing after negotiation")]
    MissingLocalDescription,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
