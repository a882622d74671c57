//! Dev-mode restart handoff.
//!
//! A restart marker file carries state, queued events, and config overrides
//! across a supervised process restart. The file is consumed on load
//! (unlinked whether or not it parses); absence means cold start, and a
//! corrupt marker degrades to empty payloads rather than failing startup.

use serde_json::Value;
use std::path::Path;
use vita_core::{Event, SelfState};

use crate::snapshot::state_from_document;

/// Payload recovered from a restart marker. Empty fields mean the previous
/// process could not serialize that part; start from defaults.
#[derive(Debug, Default)]
pub struct RestartPayload {
    pub state: Option<SelfState>,
    pub events: Vec<Event>,
    pub config: Option<Value>,
}

/// Load and consume a restart marker if one exists.
///
/// The file is always unlinked: a marker is a one-shot handoff, and a
/// corrupt one must not poison every subsequent startup.
pub fn take_restart_marker(path: &Path) -> Option<RestartPayload> {
    let bytes = std::fs::read(path).ok()?;
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(error = %e, "could not unlink restart marker");
    }

    let doc: Value = match serde_json::from_slice(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(error = %e, "corrupt restart marker, cold start");
            return None;
        }
    };
    if doc.get("restart_marker").and_then(Value::as_bool) != Some(true) {
        tracing::warn!("file is not a restart marker, cold start");
        return None;
    }

    let state = doc.get("self_state").and_then(|v| {
        let obj = v.as_object()?;
        if obj.is_empty() {
            return None;
        }
        if obj.contains_key("components") {
            state_from_document(v)
        } else {
            // Markers may also carry a flat serialized state
            serde_json::from_value(v.clone()).ok()
        }
    });

    let events = doc
        .get("event_queue")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    let config = doc.get("config").cloned();

    Some(RestartPayload {
        state,
        events,
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::state_document;
    use serde_json::json;
    use vita_core::EventType;

    #[test]
    fn test_missing_marker_is_cold_start() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(take_restart_marker(&dir.path().join("restart.json")).is_none());
    }

    #[test]
    fn test_marker_is_consumed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("restart.json");
        std::fs::write(
            &path,
            serde_json::to_vec(&json!({
                "restart_marker": true,
                "timestamp": 1.0,
                "self_state": {},
                "event_queue": [],
                "config": {},
            }))
            .expect("encode"),
        )
        .expect("write");

        let payload = take_restart_marker(&path).expect("marker consumed");
        assert!(payload.state.is_none(), "empty self_state degrades to none");
        assert!(payload.events.is_empty());
        assert!(!path.exists(), "marker must be unlinked");
    }

    #[test]
    fn test_marker_carries_state_and_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("restart.json");
        let mut state = SelfState::default();
        state.ticks = 12;

        std::fs::write(
            &path,
            serde_json::to_vec(&json!({
                "restart_marker": true,
                "timestamp": 2.0,
                "self_state": state_document(&state),
                "event_queue": [Event::new(EventType::Shock, 0.9, 3.0)],
                "config": {"tick_interval": 0.5},
            }))
            .expect("encode"),
        )
        .expect("write");

        let payload = take_restart_marker(&path).expect("marker");
        let restored = payload.state.expect("state restored");
        assert_eq!(restored.ticks, 12);
        assert_eq!(restored.life_id, state.life_id);
        assert_eq!(payload.events.len(), 1);
        assert_eq!(payload.config.expect("config")["tick_interval"], 0.5);
    }

    #[test]
    fn test_corrupt_marker_degrades_and_unlinks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("restart.json");
        std::fs::write(&path, b"}{ definitely not json").expect("write");
        assert!(take_restart_marker(&path).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_non_marker_file_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("restart.json");
        std::fs::write(&path, br#"{"something_else": true}"#).expect("write");
        assert!(take_restart_marker(&path).is_none());
        assert!(!path.exists());
    }
}
