//! Conversation session state.
//!
//! One struct owns every piece of mutable dialog state behind a single
//! lock; components receive it by `Arc` and go through methods that keep
//! the invariants: `conversation_active` implies a non-idle state, and a
//! pending command only exists while confirming.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use wacha_foundation::ActivityStamp;

use crate::reasoning::DeviceCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Idle,
    Listening,
    Confirming,
    Responding,
}

struct SessionInner {
    state: DialogState,
    conversation_active: bool,
    pending_command: Option<DeviceCommand>,
}

pub struct ConversationSession {
    inner: Mutex<SessionInner>,
    pub activity: Arc<ActivityStamp>,
}

impl ConversationSession {
    pub fn new(activity: Arc<ActivityStamp>) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                state: DialogState::Idle,
                conversation_active: false,
                pending_command: None,
            }),
            activity,
        }
    }

    pub fn state(&self) -> DialogState {
        self.inner.lock().state
    }

    pub fn conversation_active(&self) -> bool {
        self.inner.lock().conversation_active
    }

    /// Wake-word accepted: the dialog becomes active and starts listening.
    pub fn begin_conversation(&self) {
        let mut inner = self.inner.lock();
        inner.conversation_active = true;
        inner.state = DialogState::Listening;
    }

    /// Reset to idle, dropping any half-confirmed command.
    pub fn end_conversation(&self) {
        let mut inner = self.inner.lock();
        inner.conversation_active = false;
        inner.state = DialogState::Idle;
        inner.pending_command = None;
    }

    /// Move between the non-idle states. Going idle must use
    /// `end_conversation` so the active flag cannot contradict the state.
    pub fn set_state(&self, state: DialogState) {
        let mut inner = self.inner.lock();
        if state == DialogState::Idle {
            inner.conversation_active = false;
            inner.pending_command = None;
        }
        inner.state = state;
    }

    pub fn set_pending(&self, command: DeviceCommand) {
        self.inner.lock().pending_command = Some(command);
    }

    pub fn take_pending(&self) -> Option<DeviceCommand> {
        self.inner.lock().pending_command.take()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.lock().pending_command.is_some()
    }

    /// One-line state snapshot for the SIGUSR1 debug dump.
    pub fn snapshot(&self) -> String {
        let inner = self.inner.lock();
        format!(
            "state={:?} active={} pending={}",
            inner.state,
            inner.conversation_active,
            inner.pending_command.is_some()
        )
    }
}

/// Single-slot wake notification: the gate posts, the controller waits and
/// consumes. A second post while one is pending is coalesced.
pub struct WakeSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }

    /// Wait for a wake event, consuming it. Returns false on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.rx.recv_timeout(timeout).is_ok()
    }
}
