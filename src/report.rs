//! Progress reporting passed explicitly into pipeline components.

use std::sync::Mutex;

/// Severity of a reported event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
}

/// Receives progress messages from pipeline components.
pub trait Reporter: Sync {
    fn report(&self, level: Level, component: &str, message: &str);

    fn debug(&self, component: &str, message: &str) {
        self.report(Level::Debug, component, message);
    }

    fn info(&self, component: &str, message: &str) {
        self.report(Level::Info, component, message);
    }

    fn warn(&self, component: &str, message: &str) {
        self.report(Level::Warn, component, message);
    }
}

/// Forwards to `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, level: Level, component: &str, message: &str) {
        match level {
            Level::Debug => tracing::debug!(component, "{}", message),
            Level::Info => tracing::info!(component, "{}", message),
            Level::Warn => tracing::warn!(component, "{}", message),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _level: Level, _component: &str, _message: &str) {}
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<(Level, String, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded `(level, component, message)` events.
    pub fn events(&self) -> Vec<(Level, String, String)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn contains(&self, component: &str, needle: &str) -> bool {
        self.events()
            .iter()
            .any(|(_, c, m)| c == component && m.contains(needle))
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, level: Level, component: &str, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push((level, component.to_string(), message.to_string()));
        }
    }
}
