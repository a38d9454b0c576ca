//! Speaker ownership and playback cancellation.
//!
//! One playback stream at a time: `play_wav` always stops and joins the
//! previous playback thread before starting a new one, so audio never
//! interleaves. Cancellation is a shared flag checked every output block,
//! which bounds stop latency by the block duration rather than the
//! remaining audio. Synthesized bytes are parked in a temp artifact while
//! they play and removed by a worker thread afterwards.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use wacha_foundation::{ActivityStamp, AudioError};

use crate::device;
use crate::{downmix_mono, resample_linear};

#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

pub fn decode_wav(bytes: &[u8]) -> Result<PcmAudio, AudioError> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| AudioError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioError::Decode(e.to_string()))?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * 32767.0).round() as i16))
            .collect::<Result<_, _>>()
            .map_err(|e| AudioError::Decode(e.to_string()))?,
        (format, bits) => {
            return Err(AudioError::Decode(format!(
                "unsupported WAV encoding: {:?}/{} bit",
                format, bits
            )))
        }
    };

    Ok(PcmAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Shared playback flags, visible to the capture path.
#[derive(Default)]
pub struct PlaybackState {
    playing: AtomicBool,
    cancelled: AtomicBool,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn begin(&self) {
        self.cancelled.store(false, Ordering::Release);
        self.playing.store(true, Ordering::Release);
    }

    fn finish(&self) {
        self.playing.store(false, Ordering::Release);
    }
}

/// Where decoded audio actually goes. The production sink drives cpal; tests
/// substitute a timed fake.
pub trait AudioSink: Send + Sync {
    fn stream(
        &self,
        audio: &PcmAudio,
        ctl: Arc<PlaybackState>,
        activity: Arc<ActivityStamp>,
    ) -> Result<(), AudioError>;
}

pub struct PlaybackCoordinator {
    sink: Arc<dyn AudioSink>,
    state: Arc<PlaybackState>,
    activity: Arc<ActivityStamp>,
    current: Mutex<Option<JoinHandle<()>>>,
    /// Serializes play_wav callers so two speak requests cannot interleave
    /// their stop-then-start sequences.
    speak_lock: Mutex<()>,
    artifact_dir: PathBuf,
    seq: AtomicU64,
}

impl PlaybackCoordinator {
    pub fn new(sink: Arc<dyn AudioSink>, activity: Arc<ActivityStamp>) -> Self {
        Self {
            sink,
            state: Arc::new(PlaybackState::default()),
            activity,
            current: Mutex::new(None),
            speak_lock: Mutex::new(()),
            artifact_dir: std::env::temp_dir(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn with_artifact_dir(mut self, dir: PathBuf) -> Self {
        self.artifact_dir = dir;
        self
    }

    /// Shared flags for the capture path's is-the-system-speaking checks.
    pub fn state(&self) -> Arc<PlaybackState> {
        self.state.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Decode and play WAV bytes, cancelling any in-flight playback first.
    pub fn play_wav(&self, wav_bytes: &[u8]) -> Result<(), AudioError> {
        let _speaking = self.speak_lock.lock();
        self.stop();

        let audio = decode_wav(wav_bytes)?;
        let artifact = self.artifact_dir.join(format!(
            "wacha-tts-{}-{}.wav",
            std::process::id(),
            self.seq.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(e) = std::fs::write(&artifact, wav_bytes) {
            tracing::warn!("Failed to write playback artifact {:?}: {}", artifact, e);
        }

        self.state.begin();
        let sink = self.sink.clone();
        let state = self.state.clone();
        let activity = self.activity.clone();
        let handle = thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                if let Err(e) = sink.stream(&audio, state.clone(), activity) {
                    tracing::error!("Playback failed: {}", e);
                }
                state.finish();
                cleanup_artifact(artifact);
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn playback thread: {}", e)))?;

        *self.current.lock() = Some(handle);
        Ok(())
    }

    /// Cancel in-flight playback and wait for the speaker to go quiet.
    /// Safe to call at any time, any number of times.
    pub fn stop(&self) {
        self.state.cancel();
        let handle = self.current.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Playback thread panicked");
                self.state.finish();
            }
        }
    }
}

fn cleanup_artifact(path: PathBuf) {
    let result = thread::Builder::new()
        .name("playback-cleanup".into())
        .spawn(move || match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed playback artifact {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove artifact {:?}: {}", path, e),
        });
    if let Err(e) = result {
        tracing::warn!("Failed to spawn cleanup thread: {}", e);
    }
}

/// cpal-backed sink. Opens the output device per playback and releases it
/// when the stream drops.
pub struct CpalSink {
    device_name: Option<String>,
}

impl CpalSink {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

impl AudioSink for CpalSink {
    fn stream(
        &self,
        audio: &PcmAudio,
        ctl: Arc<PlaybackState>,
        activity: Arc<ActivityStamp>,
    ) -> Result<(), AudioError> {
        let device = device::output_device(self.device_name.as_deref())?;
        let native = device
            .default_output_config()
            .map_err(|e| AudioError::FormatNotSupported {
                format: format!("no default output config: {}", e),
            })?;
        let out_rate = native.sample_rate().0;
        let out_channels = native.channels() as usize;

        let mono = downmix_mono(&audio.samples, audio.channels);
        let samples: Arc<Vec<i16>> = Arc::new(resample_linear(&mono, audio.sample_rate, out_rate));
        let position = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream_config = cpal::StreamConfig {
            channels: native.channels(),
            sample_rate: native.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let cb_samples = samples.clone();
        let cb_position = position.clone();
        let cb_finished = finished.clone();
        let cb_ctl = ctl.clone();
        let fill = move |data: &mut [f32]| {
            if cb_ctl.is_cancelled() {
                data.fill(0.0);
                cb_finished.store(true, Ordering::Release);
                return;
            }
            let mut pos = cb_position.load(Ordering::Relaxed) as usize;
            for frame in data.chunks_mut(out_channels) {
                let value = match cb_samples.get(pos) {
                    Some(&s) => s as f32 / 32768.0,
                    None => {
                        cb_finished.store(true, Ordering::Release);
                        0.0
                    }
                };
                frame.fill(value);
                pos += 1;
            }
            cb_position.store(pos as u64, Ordering::Relaxed);
        };

        let err_fn = |err: cpal::StreamError| {
            tracing::error!("Output stream error: {}", err);
        };
        let stream = match native.sample_format() {
            SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &_| fill(data),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => {
                let cb_samples = samples.clone();
                let cb_position = position.clone();
                let cb_finished = finished.clone();
                let cb_ctl = ctl.clone();
                device.build_output_stream(
                    &stream_config,
                    move |data: &mut [i16], _: &_| {
                        if cb_ctl.is_cancelled() {
                            data.fill(0);
                            cb_finished.store(true, Ordering::Release);
                            return;
                        }
                        let mut pos = cb_position.load(Ordering::Relaxed) as usize;
                        for frame in data.chunks_mut(out_channels) {
                            let value = match cb_samples.get(pos) {
                                Some(&s) => s,
                                None => {
                                    cb_finished.store(true, Ordering::Release);
                                    0
                                }
                            };
                            frame.fill(value);
                            pos += 1;
                        }
                        cb_position.store(pos as u64, Ordering::Relaxed);
                    },
                    err_fn,
                    None,
                )?
            }
            other => {
                return Err(AudioError::FormatNotSupported {
                    format: format!("{:?}", other),
                })
            }
        };
        stream.play()?;

        while !finished.load(Ordering::Acquire) && !ctl.is_cancelled() {
            activity.touch(Instant::now());
            thread::sleep(Duration::from_millis(20));
        }
        // Give the device one more block to drain before the stream drops.
        thread::sleep(Duration::from_millis(20));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decode_roundtrips_pcm16() {
        let bytes = wav_bytes(&[0, 500, -500, 32767], 22_050);
        let audio = decode_wav(&bytes).expect("decode");
        assert_eq!(audio.sample_rate, 22_050);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.samples, vec![0, 500, -500, 32767]);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_wav(b"not a wav").is_err());
    }

    #[test]
    fn playback_state_cancel_is_sticky_until_begin() {
        let state = PlaybackState::default();
        state.cancel();
        assert!(state.is_cancelled());
        state.begin();
        assert!(!state.is_cancelled());
        assert!(state.is_playing());
        state.finish();
        assert!(!state.is_playing());
    }
}
