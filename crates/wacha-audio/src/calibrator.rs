//! Startup ambient-noise calibration.
//!
//! Samples the room while nothing else touches the microphone, converts the
//! observed RMS to dBFS, and derives the voice-presence threshold used by
//! the energy fallback in endpointing. Device failure here is fatal and
//! propagates; there is no point starting a listener that cannot hear.

use std::time::{Duration, Instant};

use wacha_foundation::AudioError;
use wacha_vad::EnergyMeter;

use crate::source::FrameSource;

/// How long the calibrator will wait for any audio at all before deciding
/// the device is dead.
const NO_DATA_LIMIT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
pub struct CalibrationResult {
    /// Measured ambient floor, dBFS.
    pub ambient_dbfs: f32,
    /// `ambient + margin`: anything louder counts as voice.
    pub threshold_dbfs: f32,
}

pub struct AmbientCalibrator {
    margin_db: f32,
}

impl AmbientCalibrator {
    pub fn new(margin_db: f32) -> Self {
        Self { margin_db }
    }

    pub fn calibrate(
        &self,
        source: &dyn FrameSource,
        duration: Duration,
    ) -> Result<CalibrationResult, AudioError> {
        tracing::info!(?duration, "Calibrating ambient noise, please stay quiet");

        let mut stream = source.open()?;
        let wanted = (source.sample_rate() as u128 * duration.as_millis() / 1000) as usize;
        let mut sum_squares: f64 = 0.0;
        let mut collected = 0usize;
        let mut last_data = Instant::now();

        while collected < wanted {
            match stream.next_frame(Duration::from_millis(200))? {
                Some(frame) => {
                    for &s in &frame {
                        let s = s as f64;
                        sum_squares += s * s;
                    }
                    collected += frame.len();
                    last_data = Instant::now();
                }
                None => {
                    if last_data.elapsed() > NO_DATA_LIMIT {
                        return Err(AudioError::NoDataTimeout {
                            duration: NO_DATA_LIMIT,
                        });
                    }
                }
            }
        }

        let rms = ((sum_squares / collected.max(1) as f64).sqrt() / 32768.0) as f32;
        let meter = EnergyMeter::new();
        let ambient_dbfs = meter.rms_to_dbfs(rms);
        let threshold_dbfs = ambient_dbfs + self.margin_db;
        tracing::info!(ambient_dbfs, threshold_dbfs, "Calibration complete");

        Ok(CalibrationResult {
            ambient_dbfs,
            threshold_dbfs,
        })
    }
}
