//! Application configuration.
//!
//! Everything is optional over defaults so a bare `wacha` run works against
//! a local server with Thai phrases. The word lists feed the keyword
//! lexicon; timing values feed the capture engine and controller.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use wacha_foundation::AppError;
use wacha_stt::KeywordLexicon;
use wacha_vad::EndpointConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// BCP-47 language tag sent to the recognizer.
    pub language: String,
    pub wake_words: Vec<String>,
    pub stop_words: Vec<String>,
    pub exit_words: Vec<String>,
    pub confirm_words: Vec<String>,
    pub cancel_words: Vec<String>,
    pub phrases: Phrases,
    pub idle_timeout_secs: u64,
    pub audio: AudioSection,
    pub calibration: CalibrationSection,
    pub endpoint: EndpointSection,
    pub gate: GateSection,
    pub reminder: ReminderSection,
    pub tts: TtsSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Phrases {
    pub greeting: String,
    pub apology: String,
    pub command_done: String,
    pub command_cancelled: String,
    pub reminder_ack: String,
    pub confirm_reprompt: String,
}

impl Default for Phrases {
    fn default() -> Self {
        Self {
            greeting: "สวัสดีค่ะ มีอะไรให้ช่วยคะ".into(),
            apology: "ขอโทษค่ะ ตอนนี้ระบบขัดข้อง กรุณาลองใหม่อีกครั้งนะคะ".into(),
            command_done: "เรียบร้อยค่ะ".into(),
            command_cancelled: "ยกเลิกให้แล้วค่ะ".into(),
            reminder_ack: "ตั้งการแจ้งเตือนให้แล้วค่ะ".into(),
            confirm_reprompt: "กรุณาตอบว่า ใช่ หรือ ไม่ ค่ะ".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSection {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub sample_rate_hz: u32,
    /// Must be 10, 20, or 30, the window sizes the frame classifier takes.
    pub frame_ms: u32,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            sample_rate_hz: wacha_vad::SAMPLE_RATE_HZ,
            frame_ms: wacha_vad::FRAME_DURATION_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalibrationSection {
    pub duration_secs: u64,
    pub margin_db: f32,
}

impl Default for CalibrationSection {
    fn default() -> Self {
        Self {
            duration_secs: 3,
            margin_db: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointSection {
    pub silence_timeout_ms: u64,
    pub max_record_secs: u64,
    pub post_padding_ms: u64,
    pub voice_debounce_frames: u8,
    /// WebRTC VAD aggressiveness, 0-3.
    pub vad_mode: u8,
    pub min_voiced_frames: usize,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            silence_timeout_ms: 1_000,
            max_record_secs: 15,
            post_padding_ms: 300,
            voice_debounce_frames: 2,
            vad_mode: 2,
            min_voiced_frames: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateSection {
    /// Longer than the foreground timeout: wake phrases come out slowly.
    pub silence_timeout_ms: u64,
    pub post_padding_ms: u64,
    pub poll_ms: u64,
    pub retry_backoff_ms: u64,
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            silence_timeout_ms: 2_500,
            post_padding_ms: 60,
            poll_ms: 200,
            retry_backoff_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReminderSection {
    pub poll_secs: u64,
}

impl Default for ReminderSection {
    fn default() -> Self {
        Self { poll_secs: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsSection {
    pub rate: String,
    pub pitch: String,
}

impl Default for TtsSection {
    fn default() -> Self {
        Self {
            rate: "100%".into(),
            pitch: "+1st".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub base_url: String,
    pub recognize_path: String,
    pub ask_path: String,
    pub tts_path: String,
    pub execute_path: String,
    pub timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8321".into(),
            recognize_path: "/stt".into(),
            ask_path: "/ask".into(),
            tts_path: "/tts".into(),
            execute_path: "/execute".into(),
            timeout_secs: 15,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: "th-TH".into(),
            wake_words: vec!["สวัสดี".into(), "น้องวาจา".into()],
            stop_words: vec!["หยุด".into(), "หยุดพูด".into(), "เงียบ".into()],
            exit_words: vec!["ปิดโปรแกรม".into(), "จบการทำงาน".into()],
            confirm_words: vec!["ใช่".into(), "ตกลง".into(), "โอเค".into(), "ยืนยัน".into()],
            cancel_words: vec!["ไม่".into(), "ไม่ใช่".into(), "ยกเลิก".into()],
            phrases: Phrases::default(),
            idle_timeout_secs: 60,
            audio: AudioSection::default(),
            calibration: CalibrationSection::default(),
            endpoint: EndpointSection::default(),
            gate: GateSection::default(),
            reminder: ReminderSection::default(),
            tts: TtsSection::default(),
            server: ServerSection::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Config(format!("Cannot read {}: {}", path.display(), e))
                })?;
                toml::from_str(&raw)
                    .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !matches!(self.audio.frame_ms, 10 | 20 | 30) {
            return Err(AppError::Config(format!(
                "audio.frame_ms must be 10, 20, or 30 (got {})",
                self.audio.frame_ms
            )));
        }
        if self.endpoint.vad_mode > 3 {
            return Err(AppError::Config(format!(
                "endpoint.vad_mode must be 0-3 (got {})",
                self.endpoint.vad_mode
            )));
        }
        if self.wake_words.iter().all(|w| w.trim().is_empty()) {
            return Err(AppError::Config("wake_words must not be empty".into()));
        }
        Ok(())
    }

    pub fn frame_size_samples(&self) -> usize {
        (self.audio.sample_rate_hz as usize * self.audio.frame_ms as usize) / 1000
    }

    pub fn endpoint_config(&self) -> EndpointConfig {
        EndpointConfig {
            sample_rate_hz: self.audio.sample_rate_hz,
            frame_size_samples: self.frame_size_samples(),
            silence_timeout_ms: self.endpoint.silence_timeout_ms,
            max_record_ms: self.endpoint.max_record_secs * 1_000,
            post_padding_ms: self.endpoint.post_padding_ms,
            voice_debounce_frames: self.endpoint.voice_debounce_frames,
            vad_mode: self.endpoint.vad_mode,
            ..EndpointConfig::default()
        }
    }

    pub fn lexicon(&self) -> KeywordLexicon {
        KeywordLexicon::new(
            &self.wake_words,
            &self.stop_words,
            &self.exit_words,
            &self.confirm_words,
            &self.cancel_words,
        )
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
