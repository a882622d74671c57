//! Action execution: apply the interpreted impact and mint an action id.

use vita_core::{Event, Meaning, MemoryEntry, SelfState};
use vita_memory::MemoryStore;

/// Applies the selected pattern's effects to the state.
///
/// Mutates self-state and memory only; no I/O. The caller snapshots the
/// scalars beforehand so the feedback tracker can compute a delta later.
pub struct ActionExecutor;

impl ActionExecutor {
    /// Apply `meaning.impact` (already pattern-scaled), remember the
    /// episode, and return a unique action id of the form
    /// `action_<tick>_<pattern>_<ms>`.
    pub fn execute(
        store: &MemoryStore,
        state: &mut SelfState,
        event: &Event,
        meaning: &Meaning,
        now: f64,
    ) -> String {
        state.apply_delta(&meaning.impact);

        store.append(
            state,
            MemoryEntry::event(
                event.event_type,
                meaning.significance,
                now,
                state.subjective_time,
            ),
        );

        format!(
            "action_{}_{}_{}",
            state.ticks,
            meaning.pattern.as_str(),
            (now * 1000.0) as i64
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vita_core::{EventType, Impact, MeaningEngine, ResponsePattern};

    #[test]
    fn test_execute_applies_impact_and_remembers() {
        let store = MemoryStore::default();
        let mut state = SelfState::default();
        state.ticks = 7;
        let event = Event::new(EventType::Shock, 1.0, 50.0);
        let meaning = Meaning {
            event_id: event.id,
            significance: 0.9,
            impact: Impact::new(-1.5, -0.1, -0.05),
            pattern: ResponsePattern::Absorb,
        };

        let action_id = ActionExecutor::execute(&store, &mut state, &event, &meaning, 50.0);

        assert!(state.energy < 100.0);
        assert_eq!(state.memory.len(), 1);
        assert_eq!(state.memory[0].event_type, EventType::Shock);
        assert!((state.memory[0].meaning_significance - 0.9).abs() < 1e-6);
        assert!(action_id.starts_with("action_7_absorb_"));
    }

    #[test]
    fn test_action_ids_encode_tick_and_pattern() {
        let store = MemoryStore::default();
        let mut state = SelfState::default();
        state.ticks = 3;
        let event = Event::new(EventType::Recovery, 0.5, 10.0);
        let engine = MeaningEngine::new();
        let meaning = engine.process(&event, &state);

        let id = ActionExecutor::execute(&store, &mut state, &event, &meaning, 12.345);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts[0], "action");
        assert_eq!(parts[1], "3");
        assert_eq!(parts[2], meaning.pattern.as_str());
        assert_eq!(parts[3], "12345");
    }

    #[test]
    fn test_execute_clamps_through_state() {
        let store = MemoryStore::default();
        let mut state = SelfState::default();
        state.energy = 0.5;
        let event = Event::new(EventType::Shock, 1.0, 1.0);
        let meaning = Meaning {
            event_id: event.id,
            significance: 1.0,
            impact: Impact::new(-50.0, -5.0, -5.0),
            pattern: ResponsePattern::Amplify,
        };
        ActionExecutor::execute(&store, &mut state, &event, &meaning, 1.0);
        assert_eq!(state.energy, 0.0);
        assert_eq!(state.stability, 0.0);
        assert_eq!(state.integrity, 0.0);
        assert!(state.active);
    }
}
