//! Reasoning-backend boundary: intent-classified replies and the actions
//! they may carry. The backend does the language work elsewhere; this side
//! only routes its structured output through the dialog.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("Reasoning backend error: {0}")]
    Backend(String),

    #[error("Command execution failed: {0}")]
    Execution(String),
}

/// A device-control action awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub action: String,
    pub device: String,
    pub location: Option<String>,
    pub entity_id: Option<String>,
    pub extra: Option<String>,
}

impl DeviceCommand {
    /// Spoken summary used as the yes/no prompt.
    pub fn confirmation_prompt(&self) -> String {
        let mut prompt = format!("คุณต้องการ{}{}", self.action, self.device);
        if let Some(location) = &self.location {
            prompt.push_str(location);
        }
        if let Some(extra) = &self.extra {
            prompt.push(' ');
            prompt.push_str(extra);
        }
        prompt.push_str(" ใช่ไหมคะ");
        prompt
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub text: String,
    pub due: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssistantAction {
    Device(DeviceCommand),
    Reminder(ReminderRequest),
}

#[derive(Debug, Clone)]
pub struct BackendReply {
    /// What to say to the user.
    pub speech: String,
    pub action: Option<AssistantAction>,
}

pub trait ReasoningBackend: Send + Sync {
    fn ask(&self, text: &str) -> Result<BackendReply, ReasoningError>;
}

pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &DeviceCommand) -> Result<(), ReasoningError>;
}

/// Executor that only records what it would have done. Stands in until a
/// smart-home bridge is wired up.
pub struct LoggingExecutor;

impl CommandExecutor for LoggingExecutor {
    fn execute(&self, command: &DeviceCommand) -> Result<(), ReasoningError> {
        let payload = serde_json::to_string(command)
            .map_err(|e| ReasoningError::Execution(e.to_string()))?;
        tracing::info!(%payload, "Executing device command");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_prompt_includes_all_parts() {
        let cmd = DeviceCommand {
            action: "เปิด".into(),
            device: "แอร์".into(),
            location: Some("ห้องนอน".into()),
            entity_id: Some("climate.bedroom".into()),
            extra: Some("ที่ 25 องศา".into()),
        };
        let prompt = cmd.confirmation_prompt();
        assert!(prompt.contains("เปิดแอร์ห้องนอน"));
        assert!(prompt.contains("25 องศา"));
        assert!(prompt.ends_with("ใช่ไหมคะ"));
    }

    #[test]
    fn prompt_without_optionals_stays_well_formed() {
        let cmd = DeviceCommand {
            action: "ปิด".into(),
            device: "ไฟ".into(),
            location: None,
            entity_id: None,
            extra: None,
        };
        assert_eq!(cmd.confirmation_prompt(), "คุณต้องการปิดไฟ ใช่ไหมคะ");
    }
}
