//! Speech-synthesis collaborator interface.
//!
//! Synthesis itself happens in a remote service; this crate defines the
//! boundary and the SSML plumbing applied before text crosses it.

pub mod error;
pub mod ssml;

pub use error::{TtsError, TtsResult};

/// Remote synthesis boundary. Returns WAV bytes ready for the playback
/// coordinator.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str, is_ssml: bool) -> TtsResult<Vec<u8>>;
}
