//! Frame sources: fixed-size mono 16 kHz frames pulled from somewhere.
//!
//! The capture engine and calibrator only ever see this seam, so tests feed
//! scripted frames and production feeds the microphone. The cpal source
//! opens the device per stream and releases it when the stream drops, which
//! is what makes capture release deterministic on every exit path.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use wacha_foundation::AudioError;

use crate::device;
use crate::downmix_mono;
use crate::ring_buffer::{SampleReader, SampleRing};

pub trait FrameSource: Send + Sync {
    /// Open the underlying device. The stream owns it until dropped.
    fn open(&self) -> Result<Box<dyn FrameStream>, AudioError>;

    fn sample_rate(&self) -> u32;

    fn frame_size(&self) -> usize;
}

pub trait FrameStream {
    /// Next full frame, or `Ok(None)` if none arrived within `timeout`.
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Vec<i16>>, AudioError>;
}

/// Microphone-backed frame source.
pub struct CpalFrameSource {
    device_name: Option<String>,
    sample_rate: u32,
    frame_size: usize,
}

impl CpalFrameSource {
    pub fn new(device_name: Option<String>, sample_rate: u32, frame_size: usize) -> Self {
        Self {
            device_name,
            sample_rate,
            frame_size,
        }
    }
}

impl FrameSource for CpalFrameSource {
    fn open(&self) -> Result<Box<dyn FrameStream>, AudioError> {
        let device = device::input_device(self.device_name.as_deref())?;
        let native = device
            .default_input_config()
            .map_err(|e| AudioError::FormatNotSupported {
                format: format!("no default input config: {}", e),
            })?;

        let native_rate = native.sample_rate().0;
        let native_channels = native.channels();
        let stream_config = cpal::StreamConfig {
            channels: native_channels,
            sample_rate: native.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        // One second of native-rate audio; the capture loop drains much
        // faster than that.
        let ring = SampleRing::new((native_rate as usize * native_channels as usize).max(4_096));
        let (mut writer, reader) = ring.split();
        let fault: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let err_fault = fault.clone();
        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("Input stream error: {}", err);
            *err_fault.lock() = Some(err.to_string());
        };

        let stream = match native.sample_format() {
            SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &_| {
                    writer.push(data);
                },
                err_fn,
                None,
            )?,
            SampleFormat::F32 => {
                let mut convert: Vec<i16> = Vec::new();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &_| {
                        convert.clear();
                        convert.extend(
                            data.iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16),
                        );
                        writer.push(&convert);
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let mut convert: Vec<i16> = Vec::new();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _: &_| {
                        convert.clear();
                        convert.extend(data.iter().map(|&s| (s as i32 - 32768) as i16));
                        writer.push(&convert);
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

        Ok(Box::new(CpalFrameStream {
            _stream: stream,
            reader,
            fault,
            native_channels,
            converter: RateConverter::new(native_rate, self.sample_rate),
            raw_hold: Vec::new(),
            pending: VecDeque::new(),
            frame_size: self.frame_size,
        }))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }
}

struct CpalFrameStream {
    _stream: cpal::Stream,
    reader: SampleReader,
    fault: Arc<Mutex<Option<String>>>,
    native_channels: u16,
    converter: RateConverter,
    /// Raw interleaved samples not yet forming whole channel frames.
    raw_hold: Vec<i16>,
    pending: VecDeque<i16>,
    frame_size: usize,
}

impl FrameStream for CpalFrameStream {
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Vec<i16>>, AudioError> {
        let deadline = Instant::now() + timeout;
        let mut raw = [0i16; 4_096];

        loop {
            if let Some(msg) = self.fault.lock().take() {
                return Err(AudioError::Fatal(format!("input stream failed: {}", msg)));
            }

            let n = self.reader.pop(&mut raw);
            if n > 0 {
                self.raw_hold.extend_from_slice(&raw[..n]);
                let channels = self.native_channels as usize;
                let usable = self.raw_hold.len() - (self.raw_hold.len() % channels);
                if usable > 0 {
                    let mono = downmix_mono(&self.raw_hold[..usable], self.native_channels);
                    self.raw_hold.drain(..usable);
                    let mut converted = Vec::new();
                    self.converter.feed(&mono, &mut converted);
                    self.pending.extend(converted);
                }
            }

            if self.pending.len() >= self.frame_size {
                let frame: Vec<i16> = self.pending.drain(..self.frame_size).collect();
                return Ok(Some(frame));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Streaming linear resampler with fractional-position carry, so chunk
/// boundaries do not drift.
struct RateConverter {
    ratio: f64,
    pos: f64,
    hold: Vec<i16>,
    passthrough: bool,
}

impl RateConverter {
    fn new(from_hz: u32, to_hz: u32) -> Self {
        Self {
            ratio: from_hz as f64 / to_hz as f64,
            pos: 0.0,
            hold: Vec::new(),
            passthrough: from_hz == to_hz,
        }
    }

    fn feed(&mut self, input: &[i16], out: &mut Vec<i16>) {
        if self.passthrough {
            out.extend_from_slice(input);
            return;
        }
        self.hold.extend_from_slice(input);
        while (self.pos as usize) + 1 < self.hold.len() {
            let idx = self.pos as usize;
            let frac = self.pos - idx as f64;
            let a = self.hold[idx] as f64;
            let b = self.hold[idx + 1] as f64;
            out.push((a + (b - a) * frac).round() as i16);
            self.pos += self.ratio;
        }
        let consumed = self.pos as usize;
        if consumed > 0 {
            self.hold.drain(..consumed.min(self.hold.len()));
            self.pos -= consumed as f64;
        }
    }
}
