use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// A shared abort signal checked at cooperative points and wired into the
/// LLM client so an in-flight model call unwinds promptly (spec §5).
#[derive(Clone)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
    notify: Arc<Notify>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            reason: Arc::new(Mutex::new(None)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
        *self.reason.lock().unwrap() = None;
    }

    pub fn trigger(&self, reason: impl Into<String>) {
        *self.reason.lock().unwrap() = Some(reason.into());
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().unwrap().clone()
    }

    /// Races `fut` against the abort signal. Returns `None` if aborted
    /// before or during `fut`, wiring the LLM call (or any other
    /// suspension point) into abort promptly (spec §5).
    pub async fn race<T>(&self, fut: impl std::future::Future<Output = T>) -> Option<T> {
        if self.is_aborted() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.notify.notified() => None,
            out = fut => Some(out),
        }
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}
