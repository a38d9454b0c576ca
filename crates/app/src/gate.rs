//! Background wake-word and command gate.
//!
//! Runs forever on its own thread, listening keywords-only with a long
//! silence timeout and minimal padding. It cooperates with foreground turns
//! through the `background_enabled` flag: the controller clears it for the
//! duration of each foreground capture, and the gate clears it itself when
//! it fires a wake event, staying off the microphone until the controller
//! hands it back. Captures run without waiting for playback so a spoken
//! "stop" lands while the assistant is still talking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wacha_foundation::{AppError, ShutdownToken};
use wacha_stt::{CommandKind, KeywordLexicon};

use crate::listener::{ListenOptions, Listener};
use crate::session::{ConversationSession, WakeSignal};
use crate::voice::Voice;

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub silence_timeout_ms: u64,
    pub post_padding_ms: u64,
    /// Sleep while suspended.
    pub poll: Duration,
    /// Back-off after an audio fault before touching the device again.
    pub retry_backoff: Duration,
}

pub struct WakeAndCommandGate {
    listener: Arc<Listener>,
    voice: Arc<Voice>,
    session: Arc<ConversationSession>,
    wake: Arc<WakeSignal>,
    lexicon: Arc<KeywordLexicon>,
    shutdown: ShutdownToken,
    background_enabled: Arc<AtomicBool>,
    config: GateConfig,
}

pub struct GateHandle {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl GateHandle {
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

impl WakeAndCommandGate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        listener: Arc<Listener>,
        voice: Arc<Voice>,
        session: Arc<ConversationSession>,
        wake: Arc<WakeSignal>,
        lexicon: Arc<KeywordLexicon>,
        shutdown: ShutdownToken,
        background_enabled: Arc<AtomicBool>,
        config: GateConfig,
    ) -> Self {
        Self {
            listener,
            voice,
            session,
            wake,
            lexicon,
            shutdown,
            background_enabled,
            config,
        }
    }

    pub fn start(self) -> Result<GateHandle, AppError> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name("wake-gate".into())
            .spawn(move || self.run(thread_running))
            .map_err(|e| AppError::Fatal(format!("Failed to spawn gate thread: {}", e)))?;
        Ok(GateHandle { running, handle })
    }

    fn run(self, running: Arc<AtomicBool>) {
        tracing::info!("Wake gate listening");
        while running.load(Ordering::SeqCst) && !self.shutdown.is_requested() {
            if !self.background_enabled.load(Ordering::SeqCst) {
                // A foreground turn owns the microphone; stay off the
                // capture lock entirely instead of contending for it.
                thread::sleep(self.config.poll);
                continue;
            }

            let options = ListenOptions {
                keywords_only: true,
                wait_for_playback: false,
                silence_timeout_ms: Some(self.config.silence_timeout_ms),
                post_padding_ms: Some(self.config.post_padding_ms),
            };
            match self.listener.listen(&options) {
                Ok(Some(text)) => self.on_keyword(&text),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Gate capture failed: {}", e);
                    thread::sleep(self.config.retry_backoff);
                }
            }
        }
        tracing::info!("Wake gate stopped");
    }

    /// Dispatch one recognized keywords-only text.
    pub fn on_keyword(&self, text: &str) {
        match self.lexicon.match_kind(text) {
            Some(CommandKind::Exit) => {
                tracing::info!("Exit command detected");
                self.voice.stop();
                self.shutdown.request();
                // Unblock the controller if it is parked on the wake wait.
                self.wake.notify();
            }
            Some(CommandKind::Stop) => {
                tracing::info!("Stop command detected");
                self.voice.stop();
            }
            Some(CommandKind::Wake) if !self.session.conversation_active() => {
                tracing::info!("Wake word detected");
                // Suspend ourselves before signalling so the foreground
                // capture never races us for the microphone.
                self.background_enabled.store(false, Ordering::SeqCst);
                self.wake.notify();
            }
            _ => {}
        }
    }
}
