//! The status event stream.
//!
//! Every vertex emits a `Started` and a `Finished` event per stage;
//! events for one vertex are totally ordered, events across vertices are
//! only ordered along dependency edges. The types serialize to a wire
//! format compatible with existing streaming clients; keep the field
//! order stable (id=1, stage=2, run=3, details=4).

use resource::TaskStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::mpsc::Sender;

/// Which phase of the run an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Plan,
    Apply,
}

/// Whether the vertex just started or just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Run {
    Started,
    Finished,
}

/// One observed change (original=1, current=2, changes=3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResponse {
    pub original: String,
    pub current: String,
    pub changes: bool,
}

/// Finished-event payload (messages=1, changes=2, hasChanges=3, error=4).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Details {
    pub messages: Vec<String>,
    pub changes: BTreeMap<String, DiffResponse>,
    #[serde(rename = "hasChanges")]
    pub has_changes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Details {
    /// Build details from a task status.
    pub fn from_status(status: &TaskStatus) -> Self {
        Details {
            messages: status.messages().to_vec(),
            changes: status
                .diffs()
                .iter()
                .map(|(key, diff)| {
                    (
                        key.clone(),
                        DiffResponse {
                            original: diff.original.clone(),
                            current: diff.current.clone(),
                            changes: diff.changes(),
                        },
                    )
                })
                .collect(),
            has_changes: status.has_changes(),
            error: None,
        }
    }

    /// Build details carrying only an error string.
    pub fn from_error(error: impl Into<String>) -> Self {
        Details {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// One lifecycle event for one vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub id: String,
    pub stage: Stage,
    pub run: Run,
    /// Present on `Finished` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}

impl StatusResponse {
    pub fn started(id: impl Into<String>, stage: Stage) -> Self {
        StatusResponse {
            id: id.into(),
            stage,
            run: Run::Started,
            details: None,
        }
    }

    pub fn finished(id: impl Into<String>, stage: Stage, details: Details) -> Self {
        StatusResponse {
            id: id.into(),
            stage,
            run: Run::Finished,
            details: Some(details),
        }
    }
}

/// Receives status events from the scheduler's worker pool.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: StatusResponse);
}

/// Discards all events.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: StatusResponse) {}
}

/// Forwards events into an mpsc channel, e.g. toward a streaming RPC
/// response.
pub struct ChannelSink(pub Sender<StatusResponse>);

impl EventSink for ChannelSink {
    fn emit(&self, event: StatusResponse) {
        // a closed receiver just means nobody is watching anymore
        let _ = self.0.send(event);
    }
}

/// Buffers events in memory. Used by tests to assert stream ordering.
#[derive(Default)]
pub struct VecSink {
    events: Mutex<Vec<StatusResponse>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events emitted so far, in order.
    pub fn events(&self) -> Vec<StatusResponse> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for VecSink {
    fn emit(&self, event: StatusResponse) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_from_status() {
        let status = TaskStatus::no_change()
            .with_diff("user", "absent", "user admin")
            .with_message("user does not exist");
        let details = Details::from_status(&status);
        assert!(details.has_changes);
        assert_eq!(details.changes["user"].original, "absent");
        assert!(details.changes["user"].changes);
        assert_eq!(details.messages, ["user does not exist"]);
        assert_eq!(details.error, None);
    }

    #[test]
    fn test_serialized_shape() {
        let event = StatusResponse::finished(
            "task.x",
            Stage::Plan,
            Details::from_error("boom"),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], "task.x");
        assert_eq!(json["stage"], "Plan");
        assert_eq!(json["run"], "Finished");
        assert_eq!(json["details"]["error"], "boom");
        assert_eq!(json["details"]["hasChanges"], false);
    }

    #[test]
    fn test_vec_sink_orders_events() {
        let sink = VecSink::new();
        sink.emit(StatusResponse::started("a", Stage::Plan));
        sink.emit(StatusResponse::finished("a", Stage::Plan, Details::default()));
        let events = sink.events();
        assert_eq!(events[0].run, Run::Started);
        assert_eq!(events[1].run, Run::Finished);
    }
}
