//! The conversation state machine.
//!
//! Idle → Listening → Confirming → Responding, driven by one loop on the
//! controller thread. Foreground captures disable the background gate for
//! exactly the capture's duration; between captures the gate listens again
//! so "stop" works while the assistant is speaking. Every failure path ends
//! in a spoken apology and a recoverable state, never a crash of the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wacha_foundation::{SharedClock, ShutdownToken};
use wacha_stt::{CommandKind, KeywordLexicon};

use crate::config::Phrases;
use crate::latency::LatencyTrace;
use crate::listener::{ListenOptions, Listener};
use crate::reasoning::{AssistantAction, CommandExecutor, ReasoningBackend};
use crate::reminder::ReminderStore;
use crate::session::{ConversationSession, DialogState, WakeSignal};
use crate::voice::Voice;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub idle_timeout: Duration,
    /// How long one idle iteration parks on the wake signal.
    pub wake_wait: Duration,
    /// Sleep while waiting out our own speech before listening again.
    pub speak_wait: Duration,
    /// Back-off after an audio fault.
    pub error_backoff: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            wake_wait: Duration::from_millis(500),
            speak_wait: Duration::from_millis(100),
            error_backoff: Duration::from_secs(1),
        }
    }
}

pub struct ControllerDeps {
    pub session: Arc<ConversationSession>,
    pub listener: Arc<Listener>,
    pub voice: Arc<Voice>,
    pub backend: Arc<dyn ReasoningBackend>,
    pub executor: Arc<dyn CommandExecutor>,
    pub reminders: ReminderStore,
    pub wake: Arc<WakeSignal>,
    pub lexicon: Arc<KeywordLexicon>,
    pub background_enabled: Arc<AtomicBool>,
    pub shutdown: ShutdownToken,
    pub clock: SharedClock,
}

pub struct ConversationController {
    deps: ControllerDeps,
    phrases: Phrases,
    config: ControllerConfig,
}

impl ConversationController {
    pub fn new(deps: ControllerDeps, phrases: Phrases, config: ControllerConfig) -> Self {
        Self {
            deps,
            phrases,
            config,
        }
    }

    pub fn run(&self) {
        tracing::info!("Assistant started, waiting for wake word");
        while !self.deps.shutdown.is_requested() {
            self.check_idle();
            self.step();
        }
        self.deps.voice.stop();
        tracing::info!("Assistant loop finished");
    }

    /// One iteration of the state machine. Public so the transition table
    /// is testable without threads.
    pub fn step(&self) {
        match self.deps.session.state() {
            DialogState::Idle => {
                if self.deps.wake.wait(self.config.wake_wait) {
                    if self.deps.shutdown.is_requested() {
                        return;
                    }
                    self.on_wake();
                }
            }
            DialogState::Listening => self.listening_turn(),
            DialogState::Confirming => self.confirming_turn(),
            DialogState::Responding => self.deps.session.set_state(DialogState::Listening),
        }
    }

    /// Idle timeout: force the conversation closed and hand the microphone
    /// back to the background gate.
    pub fn check_idle(&self) {
        let now = self.deps.clock.now();
        if self.deps.session.conversation_active()
            && self.deps.session.activity.idle_for(now) > self.config.idle_timeout
        {
            tracing::info!("Conversation idle timeout, returning to wake-word mode");
            self.deps.session.end_conversation();
            self.deps.background_enabled.store(true, Ordering::SeqCst);
        }
    }

    pub fn on_wake(&self) {
        self.deps.session.begin_conversation();
        self.speak(&self.phrases.greeting);
        self.deps.session.activity.touch(self.deps.clock.now());
    }

    fn listening_turn(&self) {
        if self.deps.voice.is_speaking() {
            self.deps.clock.sleep(self.config.speak_wait);
            return;
        }

        let result = self.foreground_listen(&ListenOptions::default());
        match result {
            Ok(Some(text)) => self.handle_utterance(&text),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Foreground capture failed: {}", e);
                self.speak(&self.phrases.apology);
                self.deps.clock.sleep(self.config.error_backoff);
            }
        }
    }

    fn confirming_turn(&self) {
        if self.deps.voice.is_speaking() {
            self.deps.clock.sleep(self.config.speak_wait);
            return;
        }

        let options = ListenOptions {
            keywords_only: true,
            ..Default::default()
        };
        match self.foreground_listen(&options) {
            Ok(Some(text)) => self.handle_confirmation(&text),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Confirmation capture failed: {}", e);
                self.speak(&self.phrases.apology);
                self.deps.clock.sleep(self.config.error_backoff);
            }
        }
    }

    /// Take the microphone from the gate for exactly one capture.
    fn foreground_listen(
        &self,
        options: &ListenOptions,
    ) -> Result<Option<String>, wacha_foundation::AudioError> {
        self.deps.background_enabled.store(false, Ordering::SeqCst);
        let result = self.deps.listener.listen(options);
        self.deps.background_enabled.store(true, Ordering::SeqCst);
        result
    }

    pub fn handle_utterance(&self, text: &str) {
        self.deps.session.activity.touch(self.deps.clock.now());

        // Control words win even when they arrive through a foreground turn.
        match self.deps.lexicon.match_kind(text) {
            Some(CommandKind::Exit) => {
                tracing::info!("Exit command in conversation");
                self.deps.shutdown.request();
                return;
            }
            Some(CommandKind::Stop) => {
                self.deps.voice.stop();
                return;
            }
            _ => {}
        }

        tracing::info!(%text, "User said");
        let mut trace = LatencyTrace::begin();
        trace.mark("user_said");

        let reply = match self.deps.backend.ask(text) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Reasoning backend failed: {}", e);
                self.speak(&self.phrases.apology);
                return;
            }
        };
        trace.mark("backend_replied");

        match reply.action {
            Some(AssistantAction::Device(command)) => {
                let prompt = command.confirmation_prompt();
                self.deps.session.set_pending(command);
                self.deps.session.set_state(DialogState::Confirming);
                self.speak(&prompt);
            }
            Some(AssistantAction::Reminder(request)) => {
                self.deps.reminders.add(request);
                let ack = if reply.speech.trim().is_empty() {
                    &self.phrases.reminder_ack
                } else {
                    &reply.speech
                };
                self.speak(ack);
                self.deps.session.set_state(DialogState::Responding);
            }
            None => {
                self.speak(&reply.speech);
                self.deps.session.set_state(DialogState::Responding);
            }
        }
        trace.mark("speaking_started");
        trace.report();
        self.deps.session.activity.touch(self.deps.clock.now());
    }

    pub fn handle_confirmation(&self, text: &str) {
        self.deps.session.activity.touch(self.deps.clock.now());

        if self.deps.lexicon.detect(text, CommandKind::Confirm) {
            if let Some(command) = self.deps.session.take_pending() {
                match self.deps.executor.execute(&command) {
                    Ok(()) => self.speak(&self.phrases.command_done),
                    Err(e) => {
                        tracing::error!("Command execution failed: {}", e);
                        self.speak(&self.phrases.apology);
                    }
                }
            }
            self.deps.session.set_state(DialogState::Listening);
        } else if self.deps.lexicon.detect(text, CommandKind::Cancel) {
            self.deps.session.take_pending();
            self.speak(&self.phrases.command_cancelled);
            self.deps.session.set_state(DialogState::Listening);
        } else {
            // Neither yes nor no: ask again, stay confirming.
            self.speak(&self.phrases.confirm_reprompt);
        }
    }

    fn speak(&self, text: &str) {
        if let Err(e) = self.deps.voice.say(text) {
            tracing::error!("Speech failed: {}", e);
        }
    }
}
