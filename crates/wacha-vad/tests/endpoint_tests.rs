//! Endpoint detector tests.
//!
//! Covers:
//! - debounce counter bounds and direction
//! - silence-timeout endpoint timing
//! - the hard recording ceiling
//! - classifier failure falling back to the energy threshold

use wacha_vad::config::EndpointConfig;
use wacha_vad::constants::{DEBOUNCE_CEILING, FRAME_SIZE_SAMPLES};
use wacha_vad::endpoint::{EndpointDetector, EndpointReason, FrameVerdict};
use wacha_vad::FrameClassifier;

/// Calls speech for any frame whose first sample is non-zero.
struct AmplitudeClassifier;

impl FrameClassifier for AmplitudeClassifier {
    fn classify(&mut self, frame: &[i16]) -> Result<bool, String> {
        Ok(frame.iter().any(|&s| s.unsigned_abs() > 1_000))
    }

    fn required_frame_size(&self) -> usize {
        FRAME_SIZE_SAMPLES
    }
}

/// Always fails, forcing the energy fallback to carry the decision.
struct BrokenClassifier;

impl FrameClassifier for BrokenClassifier {
    fn classify(&mut self, _frame: &[i16]) -> Result<bool, String> {
        Err("classifier offline".into())
    }

    fn required_frame_size(&self) -> usize {
        FRAME_SIZE_SAMPLES
    }
}

fn voice_frame() -> Vec<i16> {
    vec![8_000i16; FRAME_SIZE_SAMPLES]
}

fn silent_frame() -> Vec<i16> {
    vec![0i16; FRAME_SIZE_SAMPLES]
}

fn config() -> EndpointConfig {
    EndpointConfig {
        threshold_dbfs: -40.0,
        silence_timeout_ms: 600,
        max_record_ms: 10_000,
        post_padding_ms: 300,
        voice_debounce_frames: 2,
        ..Default::default()
    }
}

#[test]
fn debounce_stays_within_bounds() {
    let mut detector = EndpointDetector::new(config(), Box::new(AmplitudeClassifier));

    // Far more voice frames than the cap.
    for _ in 0..30 {
        detector.process(&voice_frame());
        assert!(detector.debounce_level() <= DEBOUNCE_CEILING);
    }
    assert_eq!(detector.debounce_level(), DEBOUNCE_CEILING);

    // Silent frames only ever decrease it, and it floors at zero.
    let mut prev = detector.debounce_level();
    for _ in 0..30 {
        detector.process(&silent_frame());
        let level = detector.debounce_level();
        assert!(level <= prev);
        prev = level;
    }
    assert_eq!(detector.debounce_level(), 0);
}

#[test]
fn debounce_gates_recording_onset() {
    let mut detector = EndpointDetector::new(config(), Box::new(AmplitudeClassifier));

    detector.process(&voice_frame());
    assert!(!detector.recording_started());

    detector.process(&voice_frame());
    assert!(detector.recording_started());
}

#[test]
fn endpoint_fires_one_silence_timeout_after_last_voice() {
    let cfg = config();
    let frame_ms = cfg.frame_duration_ms();
    let mut detector = EndpointDetector::new(cfg.clone(), Box::new(AmplitudeClassifier));

    // One second of speech.
    let speech_frames = 1_000 / frame_ms;
    for _ in 0..speech_frames {
        assert_eq!(
            detector.process(&voice_frame()),
            FrameVerdict::Continue { is_voice: true }
        );
    }
    let last_voice_ms = detector.elapsed_ms();

    // Silence until the endpoint fires.
    let mut endpoint_ms = None;
    for _ in 0..200 {
        match detector.process(&silent_frame()) {
            FrameVerdict::Endpoint { reason } => {
                assert_eq!(reason, EndpointReason::SilenceTimeout);
                endpoint_ms = Some(detector.elapsed_ms());
                break;
            }
            FrameVerdict::Continue { is_voice } => assert!(!is_voice),
        }
    }

    let endpoint_ms = endpoint_ms.expect("endpoint never fired");
    let expected = last_voice_ms + cfg.silence_timeout_ms;
    assert!(
        endpoint_ms > expected && endpoint_ms <= expected + frame_ms,
        "endpoint at {} ms, expected within one frame after {} ms",
        endpoint_ms,
        expected
    );
}

#[test]
fn hard_ceiling_stops_retriggering_speech() {
    let cfg = EndpointConfig {
        silence_timeout_ms: 600,
        max_record_ms: 3_000,
        ..config()
    };
    let frame_ms = cfg.frame_duration_ms();
    let mut detector = EndpointDetector::new(cfg.clone(), Box::new(AmplitudeClassifier));

    // Bursts of speech separated by silence runs just short of the timeout,
    // so the silence endpoint can never fire.
    let silence_run = (cfg.silence_timeout_ms / frame_ms).saturating_sub(1);
    let mut frames = 0u64;
    loop {
        let frame = if frames % (silence_run + 2) < 2 {
            voice_frame()
        } else {
            silent_frame()
        };
        frames += 1;
        match detector.process(&frame) {
            FrameVerdict::Endpoint { reason } => {
                assert_eq!(reason, EndpointReason::MaxDuration);
                break;
            }
            FrameVerdict::Continue { .. } => {
                assert!(
                    detector.elapsed_ms() < cfg.max_record_ms,
                    "capture ran past the ceiling"
                );
            }
        }
    }
    assert_eq!(detector.elapsed_ms(), cfg.max_record_ms);
}

#[test]
fn broken_classifier_falls_back_to_energy() {
    let mut detector = EndpointDetector::new(config(), Box::new(BrokenClassifier));

    // Loud frames pass the energy threshold even though the classifier errors.
    detector.process(&voice_frame());
    detector.process(&voice_frame());
    assert!(detector.recording_started());
}

#[test]
fn quiet_frames_with_broken_classifier_never_start() {
    let mut detector = EndpointDetector::new(config(), Box::new(BrokenClassifier));

    for _ in 0..100 {
        match detector.process(&silent_frame()) {
            FrameVerdict::Continue { is_voice } => assert!(!is_voice),
            FrameVerdict::Endpoint { .. } => panic!("endpoint without speech"),
        }
    }
    assert!(!detector.recording_started());
}

#[test]
fn wrong_size_frame_counts_as_silence_for_classifier() {
    let cfg = config();
    let mut detector = EndpointDetector::new(cfg, Box::new(AmplitudeClassifier));

    // Half-size loud frame: classifier is skipped, but energy still carries.
    let short = vec![8_000i16; FRAME_SIZE_SAMPLES / 2];
    detector.process(&short);
    detector.process(&short);
    assert!(detector.recording_started());
}
