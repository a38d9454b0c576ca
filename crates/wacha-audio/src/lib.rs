pub mod calibrator;
pub mod capture;
pub mod device;
pub mod playback;
pub mod ring_buffer;
pub mod source;

pub use calibrator::{AmbientCalibrator, CalibrationResult};
pub use capture::{CaptureEngine, CaptureEngineConfig, CaptureOptions};
pub use playback::{decode_wav, AudioSink, CpalSink, PcmAudio, PlaybackCoordinator, PlaybackState};
pub use ring_buffer::SampleRing;
pub use source::{CpalFrameSource, FrameSource, FrameStream};

use std::time::Duration;

/// One captured utterance: mono PCM between speech onset and endpoint, with
/// trailing silence padding already appended.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl Utterance {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.samples.len() as u64 * 1000 / self.sample_rate as u64)
    }
}

/// Downmix interleaved multi-channel PCM to mono by averaging.
pub(crate) fn downmix_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear-interpolation resampler. Nothing fancy: endpointing and keyword
/// recognition tolerate far worse than the artifacts this introduces.
pub(crate) fn resample_linear(samples: &[i16], from_hz: u32, to_hz: u32) -> Vec<i16> {
    if from_hz == to_hz || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_hz as f64 / to_hz as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;
        let a = samples[idx] as f64;
        let b = samples[(idx + 1).min(samples.len() - 1)] as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channel_pairs() {
        let stereo = vec![100i16, 200, -100, 100];
        assert_eq!(downmix_mono(&stereo, 2), vec![150, 0]);
    }

    #[test]
    fn resample_preserves_duration_ratio() {
        let samples = vec![0i16; 48_000];
        let out = resample_linear(&samples, 48_000, 16_000);
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn resample_identity_when_rates_match() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(resample_linear(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn utterance_duration() {
        let u = Utterance {
            samples: vec![0; 16_000],
            sample_rate: 16_000,
        };
        assert_eq!(u.duration(), Duration::from_secs(1));
    }
}
