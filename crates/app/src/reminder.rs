//! Reminder persistence and the scheduler thread that speaks them.
//!
//! The store is a lock around a vector; due reminders are taken once and
//! marked spoken so a slow poll cannot announce twice. The scheduler has an
//! explicit start/stop lifecycle and joins cleanly.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::reasoning::ReminderRequest;

#[derive(Debug, Clone)]
struct Reminder {
    text: String,
    due: DateTime<Local>,
    spoken: bool,
}

#[derive(Clone, Default)]
pub struct ReminderStore {
    reminders: Arc<Mutex<Vec<Reminder>>>,
}

impl ReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, request: ReminderRequest) {
        tracing::info!(due = %request.due, text = %request.text, "Reminder added");
        self.reminders.lock().push(Reminder {
            text: request.text,
            due: request.due,
            spoken: false,
        });
    }

    /// Reminders due at `now`, each returned exactly once.
    pub fn take_due(&self, now: DateTime<Local>) -> Vec<String> {
        let mut reminders = self.reminders.lock();
        let mut due = Vec::new();
        for reminder in reminders.iter_mut() {
            if !reminder.spoken && reminder.due <= now {
                reminder.spoken = true;
                due.push(reminder.text.clone());
            }
        }
        due
    }

    pub fn pending(&self) -> Vec<(String, DateTime<Local>)> {
        self.reminders
            .lock()
            .iter()
            .filter(|r| !r.spoken)
            .map(|r| (r.text.clone(), r.due))
            .collect()
    }
}

pub struct ReminderScheduler {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ReminderScheduler {
    pub fn start(
        store: ReminderStore,
        poll: Duration,
        announce: Box<dyn Fn(&str) + Send>,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name("reminder-scheduler".into())
            .spawn(move || {
                while thread_running.load(Ordering::SeqCst) {
                    for text in store.take_due(Local::now()) {
                        tracing::info!(%text, "Reminder due");
                        announce(&text);
                    }
                    // Sleep in short slices so stop() does not wait a full
                    // poll interval.
                    let mut slept = Duration::ZERO;
                    while slept < poll && thread_running.load(Ordering::SeqCst) {
                        let step = Duration::from_millis(100).min(poll - slept);
                        thread::sleep(step);
                        slept += step;
                    }
                }
            })?;
        Ok(Self { running, handle })
    }

    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn request(text: &str, offset_secs: i64) -> ReminderRequest {
        ReminderRequest {
            text: text.into(),
            due: Local::now() + ChronoDuration::seconds(offset_secs),
        }
    }

    #[test]
    fn due_reminder_taken_exactly_once() {
        let store = ReminderStore::new();
        store.add(request("กินยา", -1));

        let now = Local::now();
        assert_eq!(store.take_due(now), vec!["กินยา".to_string()]);
        assert!(store.take_due(now).is_empty());
    }

    #[test]
    fn future_reminders_stay_pending() {
        let store = ReminderStore::new();
        store.add(request("ประชุม", 3_600));

        assert!(store.take_due(Local::now()).is_empty());
        assert_eq!(store.pending().len(), 1);
    }

    #[test]
    fn scheduler_announces_due_reminders() {
        let store = ReminderStore::new();
        store.add(request("ปิดเตาแก๊ส", -1));

        let spoken: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = spoken.clone();
        let scheduler = ReminderScheduler::start(
            store,
            Duration::from_millis(50),
            Box::new(move |text| sink.lock().push(text.to_string())),
        )
        .expect("spawn");

        std::thread::sleep(Duration::from_millis(300));
        scheduler.stop();

        assert_eq!(spoken.lock().as_slice(), ["ปิดเตาแก๊ส".to_string()]);
    }
}
