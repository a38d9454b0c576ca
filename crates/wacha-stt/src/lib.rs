//! Speech-recognition collaborator interface.
//!
//! The actual recognizer (cloud or local) lives outside this codebase; this
//! crate defines the boundary it is called through, the WAV payload helper,
//! and the keyword lexicon used for wake/stop/confirm matching.

use thiserror::Error;

pub mod keywords;
pub mod wav;

pub use keywords::{CommandKind, KeywordLexicon};

#[derive(Error, Debug)]
pub enum SttError {
    #[error("Recognition service error: {0}")]
    Service(String),

    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),
}

/// Speech-to-text boundary.
///
/// `Ok(None)` means the audio contained no usable speech; callers treat it
/// as a miss and keep looping, never as an error.
pub trait SpeechRecognizer: Send + Sync {
    fn recognize(&self, wav_bytes: &[u8], language: &str) -> Result<Option<String>, SttError>;
}
