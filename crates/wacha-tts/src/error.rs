use thiserror::Error;

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Synthesis service error: {0}")]
    Service(String),

    #[error("Synthesis returned unusable audio: {0}")]
    BadAudio(String),

    #[error("Invalid text input: {0}")]
    InvalidInput(String),
}

pub type TtsResult<T> = Result<T, TtsError>;
