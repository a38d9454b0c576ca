use std::io::Cursor;

use crate::SttError;

/// Encode mono i16 PCM as a WAV payload for the recognizer.
pub fn pcm_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, SttError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| SttError::InvalidAudio(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| SttError::InvalidAudio(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| SttError::InvalidAudio(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
