use webrtc_vad::{SampleRate, Vad, VadMode};

/// Frame-level speech classifier.
///
/// Implementations judge a single fixed-size frame; the endpoint detector
/// combines the verdict with the energy fallback. Classifier failures must
/// never abort a capture, so errors are plain strings the detector
/// downgrades to "not speech".
pub trait FrameClassifier {
    fn classify(&mut self, frame: &[i16]) -> Result<bool, String>;

    fn required_frame_size(&self) -> usize;
}

/// WebRTC VAD behind the `FrameClassifier` seam.
pub struct WebRtcClassifier {
    vad: Vad,
    frame_size: usize,
}

impl WebRtcClassifier {
    pub fn new(sample_rate_hz: u32, mode: u8, frame_size: usize) -> Result<Self, String> {
        let rate = match sample_rate_hz {
            8_000 => SampleRate::Rate8kHz,
            16_000 => SampleRate::Rate16kHz,
            32_000 => SampleRate::Rate32kHz,
            48_000 => SampleRate::Rate48kHz,
            other => {
                return Err(format!(
                    "WebRTC VAD supports 8/16/32/48 kHz, got {} Hz",
                    other
                ))
            }
        };
        let vad_mode = match mode {
            0 => VadMode::Quality,
            1 => VadMode::LowBitrate,
            2 => VadMode::Aggressive,
            3 => VadMode::VeryAggressive,
            other => return Err(format!("VAD mode must be 0-3, got {}", other)),
        };

        let mut vad = Vad::new();
        vad.set_sample_rate(rate);
        vad.set_mode(vad_mode);

        Ok(Self { vad, frame_size })
    }
}

impl FrameClassifier for WebRtcClassifier {
    fn classify(&mut self, frame: &[i16]) -> Result<bool, String> {
        self.vad
            .is_voice_segment(frame)
            .map_err(|e| format!("VAD rejected frame: {:?}", e))
    }

    fn required_frame_size(&self) -> usize {
        self.frame_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};

    #[test]
    fn rejects_unsupported_rate() {
        assert!(WebRtcClassifier::new(44_100, 2, FRAME_SIZE_SAMPLES).is_err());
    }

    #[test]
    fn rejects_bad_mode() {
        assert!(WebRtcClassifier::new(SAMPLE_RATE_HZ, 7, FRAME_SIZE_SAMPLES).is_err());
    }

    #[test]
    fn classifies_silence_as_not_speech() {
        let mut classifier = WebRtcClassifier::new(SAMPLE_RATE_HZ, 3, FRAME_SIZE_SAMPLES)
            .expect("classifier");
        let silence = vec![0i16; FRAME_SIZE_SAMPLES];
        assert_eq!(classifier.classify(&silence), Ok(false));
    }
}
