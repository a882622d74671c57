//! Snapshot persistence: component-isolated JSON documents, written
//! atomically, loaded newest-first with fallback.
//!
//! A snapshot is best-effort. A sub-component that fails to serialize is
//! recorded inline as `{"error": …}` and listed in `metadata.warnings`;
//! the overall document is still produced. On load, a corrupt newest
//! snapshot falls back to the previous generation.

use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use vita_core::{wall_now, Event, MemoryEntry, SelfState};

use crate::queue::QueueSnapshot;

pub const SNAPSHOT_VERSION: &str = "2.0";

/// Soft ceiling on one snapshot write; exceeding it only logs a warning.
const SAVE_SOFT_CEILING_SECS: f64 = 10.0;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    keep: usize,
}

impl SnapshotStore {
    pub fn new<P: Into<PathBuf>>(dir: P, keep: usize) -> Self {
        Self {
            dir: dir.into(),
            keep: keep.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist state and queue for the current tick. Returns the state
    /// document path.
    pub fn save(
        &self,
        state: &SelfState,
        queue: &QueueSnapshot,
    ) -> Result<PathBuf, SnapshotError> {
        let started = Instant::now();
        std::fs::create_dir_all(&self.dir)?;

        let state_path = self.dir.join(format!("snapshot_{}.json", state.ticks));
        let queue_path = self.dir.join(format!("snapshot_{}_queue.json", state.ticks));

        let doc = state_document(state);
        write_atomic(&state_path, &doc)?;
        write_atomic(&queue_path, &queue_document(queue))?;

        self.prune();

        let elapsed = started.elapsed().as_secs_f64();
        if elapsed > SAVE_SOFT_CEILING_SECS {
            tracing::warn!(elapsed, "snapshot write exceeded soft ceiling");
        }
        Ok(state_path)
    }

    /// Load the newest parseable snapshot, together with its queue
    /// companion. Returns None on a cold start (no usable snapshot).
    pub fn load_latest(&self) -> Option<(SelfState, Vec<Event>)> {
        for (tick, state_path) in self.scan() {
            let state = match read_json(&state_path).and_then(|doc| state_from_document(&doc)) {
                Some(state) => state,
                None => {
                    tracing::warn!(path = %state_path.display(), "unreadable snapshot, falling back");
                    continue;
                }
            };
            let queue_path = self.dir.join(format!("snapshot_{tick}_queue.json"));
            let events = read_json(&queue_path)
                .map(|doc| queue_from_document(&doc))
                .unwrap_or_default();
            return Some((state, events));
        }
        None
    }

    /// Snapshot files present on disk, newest tick first.
    fn scan(&self) -> Vec<(u64, PathBuf)> {
        let mut found = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return found,
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(tick) = name
                .strip_prefix("snapshot_")
                .and_then(|s| s.strip_suffix(".json"))
                .filter(|s| !s.ends_with("_queue"))
                .and_then(|s| s.parse::<u64>().ok())
            {
                found.push((tick, entry.path()));
            }
        }
        found.sort_by(|a, b| b.0.cmp(&a.0));
        found
    }

    fn prune(&self) {
        for (tick, path) in self.scan().into_iter().skip(self.keep) {
            let _ = std::fs::remove_file(&path);
            let _ = std::fs::remove_file(self.dir.join(format!("snapshot_{tick}_queue.json")));
        }
    }
}

fn write_atomic(path: &Path, doc: &Value) -> Result<(), SnapshotError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json(path: &Path) -> Option<Value> {
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Serialize one sub-component; a failure becomes an inline error slot
/// plus a warning, never a failed snapshot.
fn component<T: Serialize>(name: &str, value: &T, warnings: &mut Vec<String>) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            warnings.push(format!("{name}: {e}"));
            json!({ "error": e.to_string() })
        }
    }
}

/// Build the component-isolated state document.
pub fn state_document(state: &SelfState) -> Value {
    let mut warnings: Vec<String> = Vec::new();

    let identity = json!({
        "life_id": state.life_id,
        "birth_timestamp": state.birth_timestamp,
    });
    let physical = json!({
        "energy": state.energy,
        "stability": state.stability,
        "integrity": state.integrity,
        "active": state.active,
    });
    let time = json!({
        "ticks": state.ticks,
        "age": state.age,
        "subjective_time": state.subjective_time,
        "base_rate": state.subjective_time_base_rate,
    });
    let memory = json!({
        "entries": component("memory.entries", &state.memory, &mut warnings),
        "archive": component("memory.archive", &state.memory_archive, &mut warnings),
        "counters": component("memory.counters", &state.memory_entries_by_type, &mut warnings),
    });
    let cognitive = json!({
        "learning_params": component("cognitive.learning_params", &state.learning_params, &mut warnings),
        "adaptation_params": component("cognitive.adaptation_params", &state.adaptation_params, &mut warnings),
        "clarity_state": state.clarity_state,
        "clarity_duration": state.clarity_duration,
        "clarity_modifier": state.clarity_modifier,
        "consciousness_level": state.consciousness_level,
    });
    let events = json!({
        "recent_events": component("events.recent_events", &state.recent_events, &mut warnings),
        "last_pattern": component("events.last_pattern", &state.last_pattern, &mut warnings),
        "last_significance": state.last_significance,
        "last_event_intensity": state.last_event_intensity,
        "activated_memory": component("events.activated_memory", &state.activated_memory, &mut warnings),
    });

    json!({
        "metadata": {
            "version": SNAPSHOT_VERSION,
            "component_type": "SelfState",
            "timestamp": wall_now(),
            "life_id": state.life_id,
            "warnings": warnings,
        },
        "components": {
            "identity": identity,
            "physical": physical,
            "time": time,
            "memory": memory,
            "cognitive": cognitive,
            "events": events,
        },
        "legacy_fields": {
            "subjective_time_base_rate": state.subjective_time_base_rate,
            "consciousness_level": state.consciousness_level,
        },
    })
}

/// Rebuild a state from a document; tolerant of missing or damaged
/// components — anything unreadable degrades to defaults.
pub fn state_from_document(doc: &Value) -> Option<SelfState> {
    let components = doc.get("components")?.as_object()?;
    let mut state = SelfState::default();

    if let Some(identity) = components.get("identity") {
        if let Some(id) = identity.get("life_id").and_then(Value::as_str) {
            state.life_id = id.to_string();
        }
        if let Some(birth) = identity.get("birth_timestamp").and_then(Value::as_f64) {
            state.birth_timestamp = birth;
        }
    }

    if let Some(physical) = components.get("physical") {
        if let Some(v) = physical.get("energy").and_then(Value::as_f64) {
            state.energy = v as f32;
        }
        if let Some(v) = physical.get("stability").and_then(Value::as_f64) {
            state.stability = v as f32;
        }
        if let Some(v) = physical.get("integrity").and_then(Value::as_f64) {
            state.integrity = v as f32;
        }
        if let Some(v) = physical.get("active").and_then(Value::as_bool) {
            state.active = v;
        }
    }

    if let Some(time) = components.get("time") {
        if let Some(v) = time.get("ticks").and_then(Value::as_u64) {
            state.ticks = v;
        }
        if let Some(v) = time.get("age").and_then(Value::as_f64) {
            state.age = v;
        }
        if let Some(v) = time.get("subjective_time").and_then(Value::as_f64) {
            state.subjective_time = v;
        }
        if let Some(v) = time.get("base_rate").and_then(Value::as_f64) {
            state.subjective_time_base_rate = v;
        }
    }

    if let Some(memory) = components.get("memory") {
        state.memory = from_slot(memory.get("entries"));
        state.memory_archive = from_slot(memory.get("archive"));
        state.memory_entries_by_type = memory
            .get("counters")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
    }

    if let Some(cognitive) = components.get("cognitive") {
        if let Some(v) = cognitive.get("learning_params") {
            if let Ok(p) = serde_json::from_value(v.clone()) {
                state.learning_params = p;
            }
        }
        if let Some(v) = cognitive.get("adaptation_params") {
            if let Ok(p) = serde_json::from_value(v.clone()) {
                state.adaptation_params = p;
            }
        }
        if let Some(v) = cognitive.get("clarity_state").and_then(Value::as_bool) {
            state.clarity_state = v;
        }
        if let Some(v) = cognitive.get("clarity_duration").and_then(Value::as_u64) {
            state.clarity_duration = v as u32;
        }
        if let Some(v) = cognitive.get("clarity_modifier").and_then(Value::as_f64) {
            state.clarity_modifier = v as f32;
        }
        if let Some(v) = cognitive.get("consciousness_level").and_then(Value::as_f64) {
            state.consciousness_level = v as f32;
        }
    }

    if let Some(events) = components.get("events") {
        let recent: Vec<vita_core::EventType> = events
            .get("recent_events")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        state.recent_events = recent.into_iter().collect();
        state.last_pattern = events
            .get("last_pattern")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or(None);
        if let Some(v) = events.get("last_significance").and_then(Value::as_f64) {
            state.last_significance = v as f32;
        }
        if let Some(v) = events.get("last_event_intensity").and_then(Value::as_f64) {
            state.last_event_intensity = v as f32;
        }
        state.activated_memory = from_slot(events.get("activated_memory"));
    }

    state.normalize();
    Some(state)
}

fn from_slot(slot: Option<&Value>) -> Vec<MemoryEntry> {
    slot.cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Build the queue document.
pub fn queue_document(queue: &QueueSnapshot) -> Value {
    let mut warnings: Vec<String> = Vec::new();
    let events = component("queue.events", &queue.events, &mut warnings);
    json!({
        "metadata": {
            "component_type": "EventQueue",
            "version": SNAPSHOT_VERSION,
            "timestamp": wall_now(),
            "event_count": queue.event_count,
            "dropped_events": queue.dropped_events,
            "warnings": warnings,
        },
        "data": { "events": events },
    })
}

pub fn queue_from_document(doc: &Value) -> Vec<Event> {
    doc.get("data")
        .and_then(|d| d.get("events"))
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vita_core::{EventType, Impact};

    fn sample_state() -> SelfState {
        let mut state = SelfState::default();
        state.ticks = 5;
        state.age = 5.1;
        state.apply_delta(&Impact::new(-20.0, -0.15, -0.1));
        state
            .memory
            .push(MemoryEntry::event(EventType::Shock, 0.8, 1.0, 1.0));
        state
            .memory
            .push(MemoryEntry::event(EventType::Recovery, 0.4, 2.0, 2.0));
        state.learning_params.set_sensitivity(EventType::Shock, 0.7);
        state
            .adaptation_params
            .set_threshold(EventType::Noise, 0.25);
        state.record_event(EventType::Shock);
        state
    }

    #[test]
    fn test_document_has_required_metadata() {
        let doc = state_document(&SelfState::default());
        let meta = doc.get("metadata").expect("metadata present");
        assert_eq!(meta["version"], SNAPSHOT_VERSION);
        assert_eq!(meta["component_type"], "SelfState");
        assert!(meta["timestamp"].is_number());
        assert!(meta["life_id"].is_string());
        assert!(meta["warnings"].is_array());
        let components = doc.get("components").expect("components present");
        for key in ["identity", "physical", "time", "memory", "cognitive", "events"] {
            assert!(components.get(key).is_some(), "missing component {key}");
        }
        assert!(doc.get("legacy_fields").is_some());
    }

    #[test]
    fn test_document_roundtrip_preserves_core_fields() {
        let state = sample_state();
        let doc = state_document(&state);
        let back = state_from_document(&doc).expect("parse back");

        assert_eq!(back.life_id, state.life_id);
        assert_eq!(back.birth_timestamp, state.birth_timestamp);
        assert_eq!(back.ticks, 5);
        assert!((back.energy - state.energy).abs() < 1e-6);
        assert!((back.stability - state.stability).abs() < 1e-6);
        assert!((back.integrity - state.integrity).abs() < 1e-6);
        assert_eq!(back.memory, state.memory);
        assert_eq!(back.learning_params, state.learning_params);
        assert_eq!(back.adaptation_params, state.adaptation_params);
        assert_eq!(back.recent_events, state.recent_events);
    }

    #[test]
    fn test_from_document_tolerates_damage() {
        let state = sample_state();
        let mut doc = state_document(&state);
        // Corrupt the memory component entirely
        doc["components"]["memory"] = json!("garbage");
        let back = state_from_document(&doc).expect("still parseable");
        assert!(back.memory.is_empty());
        assert_eq!(back.ticks, 5); // other components unaffected
    }

    #[test]
    fn test_from_document_rejects_non_document() {
        assert!(state_from_document(&json!({"random": true})).is_none());
        assert!(state_from_document(&json!(null)).is_none());
    }

    #[test]
    fn test_save_and_load_latest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path(), 5);
        let state = sample_state();
        let queue = QueueSnapshot {
            event_count: 1,
            dropped_events: 3,
            events: vec![Event::new(EventType::Noise, 0.2, 9.0)],
        };

        store.save(&state, &queue).expect("save");
        let (loaded, events) = store.load_latest().expect("load");
        assert_eq!(loaded.life_id, state.life_id);
        assert_eq!(loaded.ticks, state.ticks);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Noise);
    }

    #[test]
    fn test_load_latest_prefers_highest_tick() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path(), 5);
        let queue = QueueSnapshot {
            event_count: 0,
            dropped_events: 0,
            events: vec![],
        };
        let mut early = sample_state();
        early.ticks = 5;
        let mut late = early.clone();
        late.ticks = 20;
        store.save(&early, &queue).expect("save 5");
        store.save(&late, &queue).expect("save 20");

        let (loaded, _) = store.load_latest().expect("load");
        assert_eq!(loaded.ticks, 20);
    }

    #[test]
    fn test_corrupt_latest_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path(), 5);
        let queue = QueueSnapshot {
            event_count: 0,
            dropped_events: 0,
            events: vec![],
        };
        let mut good = sample_state();
        good.ticks = 5;
        store.save(&good, &queue).expect("save");
        // A newer but corrupt snapshot
        std::fs::write(dir.path().join("snapshot_9.json"), b"{ not json").expect("write");

        let (loaded, _) = store.load_latest().expect("fallback to tick 5");
        assert_eq!(loaded.ticks, 5);
    }

    #[test]
    fn test_load_latest_cold_start() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path().join("missing"), 5);
        assert!(store.load_latest().is_none());
    }

    #[test]
    fn test_prune_keeps_latest_generations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path(), 2);
        let queue = QueueSnapshot {
            event_count: 0,
            dropped_events: 0,
            events: vec![],
        };
        for tick in [1u64, 2, 3, 4] {
            let mut s = SelfState::default();
            s.ticks = tick;
            store.save(&s, &queue).expect("save");
        }
        let remaining = store.scan();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].0, 4);
        assert_eq!(remaining[1].0, 3);
    }

    #[test]
    fn test_queue_document_shape() {
        let queue = QueueSnapshot {
            event_count: 2,
            dropped_events: 7,
            events: vec![
                Event::new(EventType::Shock, 1.0, 1.0),
                Event::new(EventType::Idle, 0.0, 2.0),
            ],
        };
        let doc = queue_document(&queue);
        assert_eq!(doc["metadata"]["component_type"], "EventQueue");
        assert_eq!(doc["metadata"]["event_count"], 2);
        assert_eq!(doc["metadata"]["dropped_events"], 7);
        let back = queue_from_document(&doc);
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].event_type, EventType::Shock);
    }
}
