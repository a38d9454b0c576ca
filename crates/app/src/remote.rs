//! HTTP implementations of the collaborator boundaries.
//!
//! The assistant server exposes speech recognition, reasoning, synthesis,
//! and command execution; everything here is a thin blocking client around
//! those endpoints. Wire shapes follow the server's JSON: a reply string
//! plus an optional tagged action object.

use chrono::{DateTime, Local};
use reqwest::blocking::{multipart, Client};
use serde::Deserialize;
use std::time::Duration;

use wacha_foundation::AppError;
use wacha_stt::{SpeechRecognizer, SttError};
use wacha_tts::{SpeechSynthesizer, TtsError, TtsResult};

use crate::config::ServerSection;
use crate::reasoning::{
    AssistantAction, BackendReply, CommandExecutor, DeviceCommand, ReasoningBackend,
    ReasoningError, ReminderRequest,
};

pub struct RemoteServices {
    client: Client,
    config: ServerSection,
}

impl RemoteServices {
    pub fn new(config: ServerSection) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize)]
struct WireRecognition {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireReply {
    reply: String,
    #[serde(default)]
    action: Option<WireAction>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireAction {
    HomeAssistantCommand {
        action: String,
        device: String,
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        entity_id: Option<String>,
        #[serde(default)]
        extra: Option<String>,
    },
    Reminder {
        reminder_text: String,
        reminder_time: String,
    },
}

pub(crate) fn reply_from_wire(wire: WireReply) -> BackendReply {
    let action = match wire.action {
        Some(WireAction::HomeAssistantCommand {
            action,
            device,
            location,
            entity_id,
            extra,
        }) => Some(AssistantAction::Device(DeviceCommand {
            action,
            device,
            location,
            entity_id,
            extra,
        })),
        Some(WireAction::Reminder {
            reminder_text,
            reminder_time,
        }) => match DateTime::parse_from_rfc3339(&reminder_time) {
            Ok(due) => Some(AssistantAction::Reminder(ReminderRequest {
                text: reminder_text,
                due: due.with_timezone(&Local),
            })),
            Err(e) => {
                tracing::warn!(%reminder_time, "Unparseable reminder time: {}", e);
                None
            }
        },
        None => None,
    };
    BackendReply {
        speech: wire.reply,
        action,
    }
}

impl SpeechRecognizer for RemoteServices {
    fn recognize(&self, wav_bytes: &[u8], language: &str) -> Result<Option<String>, SttError> {
        let part = multipart::Part::bytes(wav_bytes.to_vec())
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| SttError::InvalidAudio(e.to_string()))?;
        let form = multipart::Form::new()
            .text("language", language.to_string())
            .part("audio", part);

        let response = self
            .client
            .post(self.url(&self.config.recognize_path))
            .multipart(form)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| SttError::Service(e.to_string()))?;

        let body: WireRecognition = response
            .json()
            .map_err(|e| SttError::Service(e.to_string()))?;
        Ok(body.text.filter(|t| !t.trim().is_empty()))
    }
}

impl ReasoningBackend for RemoteServices {
    fn ask(&self, text: &str) -> Result<BackendReply, ReasoningError> {
        let response = self
            .client
            .post(self.url(&self.config.ask_path))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ReasoningError::Backend(e.to_string()))?;

        let wire: WireReply = response
            .json()
            .map_err(|e| ReasoningError::Backend(e.to_string()))?;
        Ok(reply_from_wire(wire))
    }
}

impl SpeechSynthesizer for RemoteServices {
    fn synthesize(&self, text: &str, is_ssml: bool) -> TtsResult<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(TtsError::InvalidInput("empty synthesis text".into()));
        }
        let response = self
            .client
            .post(self.url(&self.config.tts_path))
            .json(&serde_json::json!({ "text": text, "is_ssml": is_ssml }))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| TtsError::Service(e.to_string()))?;

        let bytes = response
            .bytes()
            .map_err(|e| TtsError::Service(e.to_string()))?
            .to_vec();
        // Anything shorter than a WAV header is not audio.
        if bytes.len() < 44 {
            return Err(TtsError::BadAudio(format!(
                "synthesis returned {} bytes",
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

impl CommandExecutor for RemoteServices {
    fn execute(&self, command: &DeviceCommand) -> Result<(), ReasoningError> {
        self.client
            .post(self.url(&self.config.execute_path))
            .json(command)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ReasoningError::Execution(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_reply_has_no_action() {
        let wire: WireReply =
            serde_json::from_str(r#"{"reply": "สบายดีค่ะ"}"#).expect("parse");
        let reply = reply_from_wire(wire);
        assert_eq!(reply.speech, "สบายดีค่ะ");
        assert!(reply.action.is_none());
    }

    #[test]
    fn device_action_parses_into_command() {
        let wire: WireReply = serde_json::from_str(
            r#"{
                "reply": "จะเปิดไฟให้นะคะ",
                "action": {
                    "type": "home_assistant_command",
                    "action": "เปิด",
                    "device": "ไฟ",
                    "location": "ห้องนั่งเล่น",
                    "entity_id": "light.living_room"
                }
            }"#,
        )
        .expect("parse");
        match reply_from_wire(wire).action {
            Some(AssistantAction::Device(cmd)) => {
                assert_eq!(cmd.action, "เปิด");
                assert_eq!(cmd.entity_id.as_deref(), Some("light.living_room"));
            }
            other => panic!("expected device action, got {:?}", other),
        }
    }

    #[test]
    fn reminder_action_parses_rfc3339_time() {
        let wire: WireReply = serde_json::from_str(
            r#"{
                "reply": "",
                "action": {
                    "type": "reminder",
                    "reminder_text": "กินยา",
                    "reminder_time": "2026-08-04T09:00:00+07:00"
                }
            }"#,
        )
        .expect("parse");
        match reply_from_wire(wire).action {
            Some(AssistantAction::Reminder(req)) => assert_eq!(req.text, "กินยา"),
            other => panic!("expected reminder, got {:?}", other),
        }
    }

    #[test]
    fn empty_synthesis_text_is_rejected_before_the_network() {
        let services = RemoteServices::new(ServerSection::default()).expect("client");
        assert!(matches!(
            services.synthesize("   ", true),
            Err(TtsError::InvalidInput(_))
        ));
    }

    #[test]
    fn bad_reminder_time_drops_action_keeps_speech() {
        let wire: WireReply = serde_json::from_str(
            r#"{
                "reply": "ตั้งเตือนแล้ว",
                "action": {
                    "type": "reminder",
                    "reminder_text": "ประชุม",
                    "reminder_time": "พรุ่งนี้เช้า"
                }
            }"#,
        )
        .expect("parse");
        let reply = reply_from_wire(wire);
        assert!(reply.action.is_none());
        assert_eq!(reply.speech, "ตั้งเตือนแล้ว");
    }
}
