//! Utterance endpointing: deciding per-frame whether speech is present and
//! when the utterance has finished.
//!
//! The per-frame decision is a hybrid: the frame classifier ORed with an
//! energy threshold. The energy fallback keeps the detector usable when the
//! classifier misses tonal or low-amplitude speech; the cost is more false
//! starts, which the explicit silence timeout absorbs.
//!
//! Time is derived from the frame count, not a wall clock, so endpoint
//! timing is exact to one frame and deterministic under test.

use crate::classifier::FrameClassifier;
use crate::config::EndpointConfig;
use crate::constants::DEBOUNCE_CEILING;
use crate::energy::EnergyMeter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointReason {
    /// Silence exceeded the timeout after speech had started.
    SilenceTimeout,
    /// Hard ceiling reached without a silence endpoint.
    MaxDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameVerdict {
    Continue { is_voice: bool },
    Endpoint { reason: EndpointReason },
}

pub struct EndpointDetector {
    config: EndpointConfig,
    energy: EnergyMeter,
    classifier: Box<dyn FrameClassifier>,
    debounce: u8,
    recording_started: bool,
    last_voice_ms: u64,
    frames_seen: u64,
}

impl EndpointDetector {
    pub fn new(config: EndpointConfig, classifier: Box<dyn FrameClassifier>) -> Self {
        Self {
            config,
            energy: EnergyMeter::new(),
            classifier,
            debounce: 0,
            recording_started: false,
            last_voice_ms: 0,
            frames_seen: 0,
        }
    }

    /// Feed one frame. Classifier failures and frame-size mismatches count
    /// as "not speech" for that frame; the energy fallback still applies.
    pub fn process(&mut self, frame: &[i16]) -> FrameVerdict {
        self.frames_seen += 1;
        let elapsed_ms = self.frames_seen * self.config.frame_duration_ms();

        let classified = if frame.len() == self.classifier.required_frame_size() {
            self.classifier.classify(frame).unwrap_or(false)
        } else {
            false
        };
        let energy_db = self.energy.dbfs(frame);
        let is_voice = classified || energy_db > self.config.threshold_dbfs;

        if is_voice {
            self.debounce = (self.debounce + 1).min(DEBOUNCE_CEILING);
            if !self.recording_started && self.debounce >= self.config.voice_debounce_frames {
                self.recording_started = true;
                tracing::debug!(elapsed_ms, energy_db, "speech onset");
            }
            self.last_voice_ms = elapsed_ms;
        } else {
            self.debounce = self.debounce.saturating_sub(1);
            if self.recording_started
                && elapsed_ms.saturating_sub(self.last_voice_ms) > self.config.silence_timeout_ms
            {
                tracing::debug!(elapsed_ms, "endpoint: silence timeout");
                return FrameVerdict::Endpoint {
                    reason: EndpointReason::SilenceTimeout,
                };
            }
        }

        if elapsed_ms >= self.config.max_record_ms {
            tracing::debug!(elapsed_ms, "endpoint: max record ceiling");
            return FrameVerdict::Endpoint {
                reason: EndpointReason::MaxDuration,
            };
        }

        FrameVerdict::Continue { is_voice }
    }

    pub fn recording_started(&self) -> bool {
        self.recording_started
    }

    pub fn debounce_level(&self) -> u8 {
        self.debounce
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.frames_seen * self.config.frame_duration_ms()
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }
}
