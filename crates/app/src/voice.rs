//! The speaking path: SSML wrapping, remote synthesis, local playback.

use std::sync::Arc;

use wacha_audio::PlaybackCoordinator;
use wacha_foundation::AppError;
use wacha_tts::ssml;
use wacha_tts::SpeechSynthesizer;

pub struct Voice {
    synth: Arc<dyn SpeechSynthesizer>,
    playback: Arc<PlaybackCoordinator>,
    rate: String,
    pitch: String,
}

impl Voice {
    pub fn new(
        synth: Arc<dyn SpeechSynthesizer>,
        playback: Arc<PlaybackCoordinator>,
        rate: String,
        pitch: String,
    ) -> Self {
        Self {
            synth,
            playback,
            rate,
            pitch,
        }
    }

    /// Synthesize and start playback. Returns once audio is rolling; the
    /// playback thread owns the rest.
    pub fn say(&self, text: &str) -> Result<(), AppError> {
        let ssml = if ssml::looks_like_ssml(text) {
            text.to_string()
        } else {
            ssml::text_to_ssml(text, &self.rate, &self.pitch)
        };

        let wav_bytes = self
            .synth
            .synthesize(&ssml, true)
            .map_err(|e| AppError::Synthesis(e.to_string()))?;
        self.playback.play_wav(&wav_bytes)?;
        Ok(())
    }

    pub fn stop(&self) {
        self.playback.stop();
    }

    pub fn is_speaking(&self) -> bool {
        self.playback.is_playing()
    }
}
