use std::io::{self, Write};
use std::time::Instant;

use serde::Serialize;

/// Ephemeral pipeline notification. Consumed synchronously by the registered
/// observer at each emission point, never persisted; events for an operation
/// are observed strictly before the operation's result is returned.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    /// A pipeline stage is about to begin.
    Phase,
    /// Intermediate observation, including non-fatal warnings.
    Thought,
    /// One slot finished resolution; `data` carries the change.
    SlotFilled,
    /// Terminal success.
    Complete,
    /// Terminal failure.
    Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProgressEvent {
    pub fn phase(message: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Phase,
            message: message.into(),
            data: None,
        }
    }

    pub fn thought(message: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Thought,
            message: message.into(),
            data: None,
        }
    }

    pub fn slot_filled(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: ProgressKind::SlotFilled,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Complete,
            message: message.into(),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Error,
            message: message.into(),
            data: None,
        }
    }
}

/// Synchronous progress observer. Threaded through every stage as an explicit
/// parameter; a per-call override falls back to the filler's default.
pub type ProgressObserver = dyn Fn(&ProgressEvent) + Send + Sync;

/// Borrowed emission point. `None` observer means events are dropped.
#[derive(Clone, Copy)]
pub struct Emitter<'a> {
    observer: Option<&'a ProgressObserver>,
}

impl<'a> Emitter<'a> {
    pub fn new(observer: Option<&'a ProgressObserver>) -> Self {
        Self { observer }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(obs) = self.observer {
            obs(&event);
        }
    }

    pub fn phase(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::phase(message));
    }

    pub fn thought(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::thought(message));
    }
}

/// Stderr progress reporter with elapsed timestamps. The CLI installs this
/// as its default observer.
pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    pub fn observe(&self, event: &ProgressEvent) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {}", event.message);
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
