use serde::{Deserialize, Serialize};

use super::constants::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};

/// Tuning for one capture's endpoint detection.
///
/// `threshold_dbfs` is normally the calibrated ambient floor plus the
/// configured margin; the default here only matters for captures that run
/// before calibration (tests, probes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub sample_rate_hz: u32,
    pub frame_size_samples: usize,
    /// Energy fallback threshold, dBFS.
    pub threshold_dbfs: f32,
    /// Silence span after the last voiced frame that ends the utterance.
    pub silence_timeout_ms: u64,
    /// Hard ceiling on a single capture.
    pub max_record_ms: u64,
    /// Trailing zero-sample padding appended once at the endpoint.
    pub post_padding_ms: u64,
    /// Consecutive voiced frames required before recording counts as started.
    pub voice_debounce_frames: u8,
    /// WebRTC VAD aggressiveness, 0 (permissive) to 3 (aggressive).
    pub vad_mode: u8,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            frame_size_samples: FRAME_SIZE_SAMPLES,
            threshold_dbfs: -40.0,
            silence_timeout_ms: 1_000,
            max_record_ms: 15_000,
            post_padding_ms: 300,
            voice_debounce_frames: 2,
            vad_mode: 2,
        }
    }
}

impl EndpointConfig {
    pub fn frame_duration_ms(&self) -> u64 {
        (self.frame_size_samples as u64 * 1000) / self.sample_rate_hz as u64
    }

    pub fn padding_samples(&self) -> usize {
        (self.post_padding_ms as usize * self.sample_rate_hz as usize) / 1000
    }
}
