//! Capture + recognition glued into one "listen" operation.
//!
//! Audio faults propagate so the controller can apologize out loud;
//! recognition misses and recognizer faults both collapse to `Ok(None)` and
//! the dialog just keeps going.

use std::sync::Arc;

use wacha_audio::{CaptureEngine, CaptureOptions};
use wacha_foundation::AudioError;
use wacha_stt::{wav, KeywordLexicon, SpeechRecognizer};

#[derive(Debug, Clone)]
pub struct ListenOptions {
    /// Discard anything that is not a known keyword. Used by the wake gate
    /// and the yes/no confirmation turn.
    pub keywords_only: bool,
    pub wait_for_playback: bool,
    pub silence_timeout_ms: Option<u64>,
    pub post_padding_ms: Option<u64>,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            keywords_only: false,
            wait_for_playback: true,
            silence_timeout_ms: None,
            post_padding_ms: None,
        }
    }
}

pub struct Listener {
    capture: Arc<CaptureEngine>,
    recognizer: Arc<dyn SpeechRecognizer>,
    lexicon: Arc<KeywordLexicon>,
    language: String,
}

impl Listener {
    pub fn new(
        capture: Arc<CaptureEngine>,
        recognizer: Arc<dyn SpeechRecognizer>,
        lexicon: Arc<KeywordLexicon>,
        language: String,
    ) -> Self {
        Self {
            capture,
            recognizer,
            lexicon,
            language,
        }
    }

    pub fn listen(&self, options: &ListenOptions) -> Result<Option<String>, AudioError> {
        let capture_options = CaptureOptions {
            wait_for_playback: options.wait_for_playback,
            silence_timeout_ms: options.silence_timeout_ms,
            post_padding_ms: options.post_padding_ms,
        };
        let utterance = match self.capture.capture(&capture_options)? {
            Some(utterance) => utterance,
            None => return Ok(None),
        };

        let wav_bytes = match wav::pcm_to_wav(&utterance.samples, utterance.sample_rate) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to encode utterance: {}", e);
                return Ok(None);
            }
        };

        let text = match self.recognizer.recognize(&wav_bytes, &self.language) {
            Ok(Some(text)) => text.trim().to_string(),
            Ok(None) => return Ok(None),
            Err(e) => {
                // Recognizer faults are recoverable misses, not dialog errors.
                tracing::warn!("Recognition failed: {}", e);
                return Ok(None);
            }
        };
        if text.is_empty() {
            return Ok(None);
        }
        tracing::info!(%text, "Recognized");

        if options.keywords_only {
            Ok(self.lexicon.filter_keywords(&text).map(str::to_string))
        } else {
            Ok(Some(text))
        }
    }
}
