//! Fire-and-forget event recording.
//!
//! Events are append-only, human-observable notifications. Recording
//! never blocks or fails reconciliation: a lost event costs
//! observability, never correctness.

use std::sync::Mutex;

use drift_api::{Object, ObjectMeta};
use tracing::{info, warn};
use uuid::Uuid;

/// Reference to the object an event is about.
///
/// Always built from the *original* fetched object, never the mutated
/// clone.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: Option<Uuid>,
}

impl ObjectRef {
    /// Reference to the given object.
    pub fn of<T: Object>(obj: &T) -> Self {
        Self::of_meta(T::KIND, obj.metadata())
    }

    fn of_meta(kind: &str, meta: &ObjectMeta) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
            uid: meta.uid,
        }
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
        }
    }
}

/// Append-only notification sink.
pub trait EventRecorder: Send + Sync {
    /// Record one event. Must not block and must not fail.
    fn record(&self, object: &ObjectRef, event_type: EventType, reason: &str, message: &str);
}

/// Recorder that emits events as structured log lines.
#[derive(Debug, Default, Clone)]
pub struct LogRecorder;

impl EventRecorder for LogRecorder {
    fn record(&self, object: &ObjectRef, event_type: EventType, reason: &str, message: &str) {
        match event_type {
            EventType::Normal => info!(
                kind = %object.kind,
                namespace = %object.namespace,
                name = %object.name,
                reason,
                message,
                "Event"
            ),
            EventType::Warning => warn!(
                kind = %object.kind,
                namespace = %object.namespace,
                name = %object.name,
                reason,
                message,
                "Event"
            ),
        }
    }
}

/// A recorded event, kept by [`MemoryRecorder`] for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub object: ObjectRef,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

/// In-memory recorder for tests.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events recorded with the given reason.
    pub fn with_reason(&self, reason: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.reason == reason)
            .collect()
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, object: &ObjectRef, event_type: EventType, reason: &str, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent {
                object: object.clone(),
                event_type,
                reason: reason.to_string(),
                message: message.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_api::{TaskRun, TaskRunSpec};

    #[test]
    fn test_memory_recorder_captures_events() {
        let recorder = MemoryRecorder::new();
        let task = TaskRun::new("default", "example-at", TaskRunSpec::default());
        let object = ObjectRef::of(&task);

        recorder.record(&object, EventType::Normal, "Synced", "TaskRun synced successfully");
        recorder.record(&object, EventType::Warning, "SyncFailed", "schedule parse failed");

        assert_eq!(recorder.events().len(), 2);
        assert_eq!(recorder.with_reason("Synced").len(), 1);
        assert_eq!(recorder.with_reason("Synced")[0].object.kind, "TaskRun");
    }
}
