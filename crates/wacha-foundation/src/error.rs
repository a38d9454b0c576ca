use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Input device not found: {name:?}")]
    InputDeviceNotFound { name: Option<String> },

    #[error("Output device not found: {name:?}")]
    OutputDeviceNotFound { name: Option<String> },

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("No audio data for {duration:?}")]
    NoDataTimeout { duration: Duration },

    #[error("Capture already in progress")]
    CaptureBusy,

    #[error("Failed to decode audio payload: {0}")]
    Decode(String),

    #[error("CPAL error: {0}")]
    Stream(#[from] cpal::StreamError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Pause stream error: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error("Supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

impl AudioError {
    /// Whether the error should abort the process rather than be retried.
    /// Calibration runs before anything else, so device-open failures there
    /// are always treated as fatal by the caller regardless of this.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AudioError::Fatal(_)
                | AudioError::InputDeviceNotFound { .. }
                | AudioError::OutputDeviceNotFound { .. }
        )
    }
}
