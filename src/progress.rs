// src/progress.rs
//! Time-ordered progress log. The pipeline appends; observers either pull
//! snapshots or subscribe for a live feed over an unbounded channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tokio::sync::mpsc;

/// Which component an event is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRole {
    Director,
    Parser,
    Continuity,
    Assets,
    Synthesis,
}

impl std::fmt::Display for EventRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventRole::Director => "director",
            EventRole::Parser => "parser",
            EventRole::Continuity => "continuity",
            EventRole::Assets => "assets",
            EventRole::Synthesis => "synthesis",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Immutable record appended to the run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub role: EventRole,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(role: EventRole, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            role,
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only event log with an optional live feed. Locks are never held
/// across awaits, so plain std locks suffice.
pub struct ProgressLog {
    events: RwLock<Vec<ProgressEvent>>,
    live: RwLock<Option<mpsc::UnboundedSender<ProgressEvent>>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            live: RwLock::new(None),
        }
    }

    /// Register a live feed. Replaces any prior subscriber; events recorded
    /// before the subscription are available via `snapshot`.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.live.write().expect("progress live lock poisoned") = Some(tx);
        rx
    }

    pub fn record(&self, event: ProgressEvent) {
        if let Some(sender) = self.live.read().expect("progress live lock poisoned").as_ref() {
            if sender.send(event.clone()).is_err() {
                tracing::debug!("live progress receiver dropped; event kept in log only");
            }
        }
        self.events
            .write()
            .expect("progress log lock poisoned")
            .push(event);
    }

    pub fn info(&self, role: EventRole, message: impl Into<String>) {
        self.record(ProgressEvent::new(role, Severity::Info, message));
    }

    pub fn warning(&self, role: EventRole, message: impl Into<String>) {
        self.record(ProgressEvent::new(role, Severity::Warning, message));
    }

    pub fn error(&self, role: EventRole, message: impl Into<String>) {
        self.record(ProgressEvent::new(role, Severity::Error, message));
    }

    pub fn snapshot(&self) -> Vec<ProgressEvent> {
        self.events
            .read()
            .expect("progress log lock poisoned")
            .clone()
    }

    /// A new run discards the prior log.
    pub fn clear(&self) {
        self.events
            .write()
            .expect("progress log lock poisoned")
            .clear();
    }
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::new()
    }
}
