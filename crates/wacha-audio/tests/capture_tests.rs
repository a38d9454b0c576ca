//! Capture engine tests over a scripted frame source.
//!
//! Covers microphone exclusivity, endpoint-driven utterance assembly with
//! trailing padding, the no-speech discard, and the playback/record
//! non-overlap rules.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use wacha_audio::{
    AudioSink, CaptureEngine, CaptureEngineConfig, CaptureOptions, FrameSource, FrameStream,
    PcmAudio, PlaybackCoordinator, PlaybackState,
};
use wacha_foundation::{real_clock, ActivityStamp, AudioError};
use wacha_vad::EndpointConfig;

const FRAME: usize = 480;

struct ScriptedSource {
    frames: Vec<Vec<i16>>,
    frame_delay: Duration,
    open_count: Arc<AtomicUsize>,
    max_concurrent: Arc<AtomicUsize>,
    playback: Option<Arc<PlaybackState>>,
    playing_at_open: Arc<Mutex<Vec<bool>>>,
}

impl ScriptedSource {
    fn new(frames: Vec<Vec<i16>>) -> Self {
        Self {
            frames,
            frame_delay: Duration::ZERO,
            open_count: Arc::new(AtomicUsize::new(0)),
            max_concurrent: Arc::new(AtomicUsize::new(0)),
            playback: None,
            playing_at_open: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    fn watching_playback(mut self, playback: Arc<PlaybackState>) -> Self {
        self.playback = Some(playback);
        self
    }
}

struct ScriptedStream {
    frames: std::collections::VecDeque<Vec<i16>>,
    frame_delay: Duration,
    open_count: Arc<AtomicUsize>,
}

impl FrameSource for ScriptedSource {
    fn open(&self) -> Result<Box<dyn FrameStream>, AudioError> {
        let concurrent = self.open_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(concurrent, Ordering::SeqCst);
        if let Some(playback) = &self.playback {
            self.playing_at_open.lock().push(playback.is_playing());
        }
        Ok(Box::new(ScriptedStream {
            frames: self.frames.clone().into(),
            frame_delay: self.frame_delay,
            open_count: self.open_count.clone(),
        }))
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn frame_size(&self) -> usize {
        FRAME
    }
}

impl FrameStream for ScriptedStream {
    fn next_frame(&mut self, _timeout: Duration) -> Result<Option<Vec<i16>>, AudioError> {
        if !self.frame_delay.is_zero() {
            std::thread::sleep(self.frame_delay);
        }
        // After the script runs out, the room is silent.
        Ok(Some(
            self.frames.pop_front().unwrap_or_else(|| vec![0i16; FRAME]),
        ))
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.open_count.fetch_sub(1, Ordering::SeqCst);
    }
}

fn endpoint_config() -> EndpointConfig {
    EndpointConfig {
        threshold_dbfs: -40.0,
        silence_timeout_ms: 600,
        max_record_ms: 6_000,
        post_padding_ms: 300,
        voice_debounce_frames: 2,
        vad_mode: 3,
        ..Default::default()
    }
}

fn engine(source: Arc<dyn FrameSource>, playback: Arc<PlaybackState>) -> CaptureEngine {
    CaptureEngine::new(
        source,
        playback,
        Arc::new(ActivityStamp::new(Instant::now())),
        real_clock(),
        CaptureEngineConfig {
            endpoint: endpoint_config(),
            ..Default::default()
        },
    )
}

fn speech_frames(count: usize) -> Vec<Vec<i16>> {
    (0..count).map(|_| vec![8_000i16; FRAME]).collect()
}

#[test]
fn utterance_carries_speech_and_exact_trailing_padding() {
    let source = Arc::new(ScriptedSource::new(speech_frames(20)));
    let engine = engine(source, Arc::new(PlaybackState::default()));

    let utterance = engine
        .capture(&CaptureOptions::default())
        .expect("capture")
        .expect("utterance");

    assert_eq!(utterance.sample_rate, 16_000);
    // 20 speech frames, 21 silence frames to pass the 600 ms timeout, then
    // exactly 300 ms of padding. Padding appended once, no more, no less.
    let expected = 20 * FRAME + 21 * FRAME + 4_800;
    assert_eq!(utterance.samples.len(), expected);
    let padding = &utterance.samples[utterance.samples.len() - 4_800..];
    assert!(padding.iter().all(|&s| s == 0));
}

#[test]
fn silence_only_capture_returns_none() {
    let config = EndpointConfig {
        max_record_ms: 1_500,
        ..endpoint_config()
    };
    let source = Arc::new(ScriptedSource::new(Vec::new()));
    let engine = CaptureEngine::new(
        source,
        Arc::new(PlaybackState::default()),
        Arc::new(ActivityStamp::new(Instant::now())),
        real_clock(),
        CaptureEngineConfig {
            endpoint: config,
            ..Default::default()
        },
    );

    let result = engine.capture(&CaptureOptions::default()).expect("capture");
    assert!(result.is_none());
}

#[test]
fn silence_timeout_override_shortens_the_endpoint() {
    let source = Arc::new(ScriptedSource::new(speech_frames(10)));
    let engine = engine(source, Arc::new(PlaybackState::default()));

    let short = engine
        .capture(&CaptureOptions {
            silence_timeout_ms: Some(300),
            ..Default::default()
        })
        .expect("capture")
        .expect("utterance");

    // 10 speech + 11 silence frames (300 ms timeout) + 300 ms padding.
    assert_eq!(short.samples.len(), 10 * FRAME + 11 * FRAME + 4_800);
}

#[test]
fn concurrent_captures_never_share_the_microphone() {
    let source = Arc::new(
        ScriptedSource::new(speech_frames(10)).with_delay(Duration::from_millis(1)),
    );
    let max_concurrent = source.max_concurrent.clone();
    let engine = Arc::new(engine(source, Arc::new(PlaybackState::default())));

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                engine.capture(&CaptureOptions::default()).expect("capture")
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("join");
    }

    assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
}

#[test]
fn calibration_derives_threshold_from_ambient_rms() {
    use wacha_audio::AmbientCalibrator;

    // Constant amplitude 3277 is one tenth of full scale, so the ambient
    // floor lands at 20*log10(0.1) = -20 dBFS.
    let frames: Vec<Vec<i16>> = (0..40).map(|_| vec![3_277i16; FRAME]).collect();
    let source = ScriptedSource::new(frames);
    let calibrator = AmbientCalibrator::new(10.0);

    let result = calibrator
        .calibrate(&source, Duration::from_secs(1))
        .expect("calibrate");

    assert!((result.ambient_dbfs - (-20.0)).abs() < 0.1);
    assert!((result.threshold_dbfs - (-10.0)).abs() < 0.1);
}

struct TimedSink {
    duration: Duration,
}

impl AudioSink for TimedSink {
    fn stream(
        &self,
        _audio: &PcmAudio,
        ctl: Arc<PlaybackState>,
        _activity: Arc<ActivityStamp>,
    ) -> Result<(), AudioError> {
        let deadline = Instant::now() + self.duration;
        while Instant::now() < deadline && !ctl.is_cancelled() {
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

fn tiny_wav() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..160 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[test]
fn default_capture_waits_for_playback_to_finish() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let activity = Arc::new(ActivityStamp::new(Instant::now()));
    let playback = PlaybackCoordinator::new(
        Arc::new(TimedSink {
            duration: Duration::from_millis(250),
        }),
        activity,
    )
    .with_artifact_dir(tmp.path().to_path_buf());

    let source = Arc::new(
        ScriptedSource::new(speech_frames(10)).watching_playback(playback.state()),
    );
    let playing_at_open = source.playing_at_open.clone();
    let engine = engine(source, playback.state());

    playback.play_wav(&tiny_wav()).expect("play");
    assert!(playback.is_playing());

    let utterance = engine
        .capture(&CaptureOptions::default())
        .expect("capture");
    assert!(utterance.is_some());
    // The microphone opened only after the speaker went quiet.
    assert_eq!(playing_at_open.lock().as_slice(), [false]);
}

#[test]
fn barge_in_capture_opens_while_playback_is_live() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let activity = Arc::new(ActivityStamp::new(Instant::now()));
    let playback = PlaybackCoordinator::new(
        Arc::new(TimedSink {
            duration: Duration::from_millis(500),
        }),
        activity,
    )
    .with_artifact_dir(tmp.path().to_path_buf());

    let source = Arc::new(
        ScriptedSource::new(speech_frames(10)).watching_playback(playback.state()),
    );
    let playing_at_open = source.playing_at_open.clone();
    let engine = engine(source, playback.state());

    playback.play_wav(&tiny_wav()).expect("play");
    let utterance = engine
        .capture(&CaptureOptions {
            wait_for_playback: false,
            ..Default::default()
        })
        .expect("capture");
    assert!(utterance.is_some());
    assert_eq!(playing_at_open.lock().as_slice(), [true]);

    playback.stop();
}
