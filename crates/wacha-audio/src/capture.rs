//! Exclusive microphone capture with endpoint detection.
//!
//! Exactly one capture owns the microphone at a time: the listen lock is
//! held for the duration of a single `capture` call and the frame stream is
//! opened and dropped inside it, so the device is released on every exit
//! path. By default a capture issued while the speaker is active waits for
//! playback to end; barge-in callers opt out to catch "stop" over our own
//! voice.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use wacha_foundation::{ActivityStamp, AudioError, SharedClock};
use wacha_vad::endpoint::{EndpointDetector, EndpointReason, FrameVerdict};
use wacha_vad::{EndpointConfig, WebRtcClassifier};

use crate::playback::PlaybackState;
use crate::source::FrameSource;
use crate::Utterance;

#[derive(Debug, Clone)]
pub struct CaptureEngineConfig {
    pub endpoint: EndpointConfig,
    /// Captures with fewer voiced frames than this return no utterance.
    pub min_voiced_frames: usize,
    /// Poll interval while waiting out playback.
    pub playback_poll: Duration,
    /// Give up when the device produces nothing for this long.
    pub no_data_limit: Duration,
}

impl Default for CaptureEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            min_voiced_frames: 3,
            playback_poll: Duration::from_millis(50),
            no_data_limit: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Wait for the speaker to go quiet before accumulating frames. Off for
    /// barge-in listening.
    pub wait_for_playback: bool,
    pub silence_timeout_ms: Option<u64>,
    pub post_padding_ms: Option<u64>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            wait_for_playback: true,
            silence_timeout_ms: None,
            post_padding_ms: None,
        }
    }
}

pub struct CaptureEngine {
    source: Arc<dyn FrameSource>,
    listen_lock: Mutex<()>,
    config: RwLock<CaptureEngineConfig>,
    playback: Arc<PlaybackState>,
    activity: Arc<ActivityStamp>,
    clock: SharedClock,
}

impl CaptureEngine {
    pub fn new(
        source: Arc<dyn FrameSource>,
        playback: Arc<PlaybackState>,
        activity: Arc<ActivityStamp>,
        clock: SharedClock,
        config: CaptureEngineConfig,
    ) -> Self {
        Self {
            source,
            listen_lock: Mutex::new(()),
            config: RwLock::new(config),
            playback,
            activity,
            clock,
        }
    }

    /// Apply the calibrated voice-presence threshold.
    pub fn set_voice_threshold(&self, threshold_dbfs: f32) {
        self.config.write().endpoint.threshold_dbfs = threshold_dbfs;
        tracing::info!(threshold_dbfs, "Voice threshold updated");
    }

    /// Capture one utterance. `Ok(None)` means no usable speech.
    pub fn capture(&self, options: &CaptureOptions) -> Result<Option<Utterance>, AudioError> {
        let _mic = self.listen_lock.lock();

        let config = self.config.read().clone();
        if options.wait_for_playback {
            while self.playback.is_playing() {
                self.clock.sleep(config.playback_poll);
            }
        }

        let mut endpoint_cfg = config.endpoint.clone();
        if let Some(ms) = options.silence_timeout_ms {
            endpoint_cfg.silence_timeout_ms = ms;
        }
        if let Some(ms) = options.post_padding_ms {
            endpoint_cfg.post_padding_ms = ms;
        }

        let classifier = WebRtcClassifier::new(
            endpoint_cfg.sample_rate_hz,
            endpoint_cfg.vad_mode,
            endpoint_cfg.frame_size_samples,
        )
        .map_err(AudioError::Fatal)?;
        let mut detector = EndpointDetector::new(endpoint_cfg.clone(), Box::new(classifier));

        let mut stream = self.source.open()?;
        self.run_capture(&mut *stream, &mut detector, &config, &endpoint_cfg)
    }

    fn run_capture(
        &self,
        stream: &mut dyn crate::source::FrameStream,
        detector: &mut EndpointDetector,
        config: &CaptureEngineConfig,
        endpoint_cfg: &EndpointConfig,
    ) -> Result<Option<Utterance>, AudioError> {
        // Frames seen before the debounce confirms onset, replayed into the
        // utterance so the first syllable is not clipped.
        let lookback_cap = endpoint_cfg.voice_debounce_frames.max(1) as usize;
        let mut lookback: VecDeque<Vec<i16>> = VecDeque::with_capacity(lookback_cap);
        let mut samples: Vec<i16> = Vec::new();
        let mut voiced_frames = 0usize;
        let mut last_data = self.clock.now();

        let reason = loop {
            match stream.next_frame(Duration::from_millis(100))? {
                Some(frame) => {
                    last_data = self.clock.now();
                    let started_before = detector.recording_started();
                    match detector.process(&frame) {
                        FrameVerdict::Continue { is_voice } => {
                            if is_voice {
                                voiced_frames += 1;
                                self.activity.touch(self.clock.now());
                            }
                            if detector.recording_started() {
                                if !started_before {
                                    for held in lookback.drain(..) {
                                        samples.extend_from_slice(&held);
                                    }
                                }
                                samples.extend_from_slice(&frame);
                            } else {
                                if lookback.len() == lookback_cap {
                                    lookback.pop_front();
                                }
                                lookback.push_back(frame);
                            }
                        }
                        FrameVerdict::Endpoint { reason } => {
                            if detector.recording_started() {
                                samples.extend_from_slice(&frame);
                            }
                            break reason;
                        }
                    }
                }
                None => {
                    if self.clock.now().duration_since(last_data) > config.no_data_limit {
                        return Err(AudioError::NoDataTimeout {
                            duration: config.no_data_limit,
                        });
                    }
                }
            }
        };

        if reason == EndpointReason::SilenceTimeout && !samples.is_empty() {
            samples.extend(std::iter::repeat(0i16).take(endpoint_cfg.padding_samples()));
        }

        if voiced_frames < config.min_voiced_frames {
            tracing::debug!(voiced_frames, "Capture discarded: too little speech");
            return Ok(None);
        }

        tracing::debug!(
            samples = samples.len(),
            voiced_frames,
            ?reason,
            "Capture complete"
        );
        Ok(Some(Utterance {
            samples,
            sample_rate: endpoint_cfg.sample_rate_hz,
        }))
    }
}
