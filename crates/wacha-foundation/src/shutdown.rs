//! Process exit flag and the debug signal surface.
//!
//! The same token is set by Ctrl-C, SIGTERM, and the spoken exit command, so
//! every loop in the process watches a single flag. SIGUSR1 requests a state
//! dump; the handler only flips an atomic and a monitor thread does the
//! actual logging, keeping the handler async-signal-safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::AppError;

#[derive(Clone, Default)]
pub struct ShutdownToken {
    requested: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            tracing::info!("Shutdown requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Route SIGINT/SIGTERM into the shutdown token.
pub fn install_signal_handlers(token: ShutdownToken) -> Result<(), AppError> {
    ctrlc::set_handler(move || {
        token.request();
    })
    .map_err(|e| AppError::Fatal(format!("Failed to install signal handler: {}", e)))
}

static DUMP_REQUESTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_sigusr1(_signum: libc::c_int) {
    DUMP_REQUESTED.store(true, Ordering::SeqCst);
}

/// Install the SIGUSR1 state-dump hook. No-op on non-unix platforms.
pub fn install_dump_signal() {
    #[cfg(unix)]
    unsafe {
        let handler: extern "C" fn(libc::c_int) = on_sigusr1;
        libc::signal(libc::SIGUSR1, handler as libc::sighandler_t);
    }
}

/// Consume a pending dump request, if any.
pub fn take_dump_request() -> bool {
    DUMP_REQUESTED.swap(false, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_clear_and_latches() {
        let token = ShutdownToken::new();
        assert!(!token.is_requested());
        token.request();
        token.request();
        assert!(token.is_requested());
    }

    #[test]
    fn dump_request_is_consumed_once() {
        DUMP_REQUESTED.store(true, Ordering::SeqCst);
        assert!(take_dump_request());
        assert!(!take_dump_request());
    }
}
