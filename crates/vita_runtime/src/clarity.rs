//! Clarity moments: short windows of heightened receptivity.
//!
//! When the agent is both stable and energized, a `clarity_moment` event is
//! pushed onto the queue. The detector itself never writes `SelfState`;
//! activation happens inside the tick core when the event is drained, and
//! the window counts down one tick at a time until it expires.

use serde_json::json;
use vita_core::{Event, EventMetadata, EventType, SelfState};

pub const CLARITY_STABILITY_THRESHOLD: f32 = 0.8;
/// On the [0, 100] energy scale.
pub const CLARITY_ENERGY_THRESHOLD: f32 = 70.0;
pub const CLARITY_DURATION_TICKS: u32 = 50;
pub const CLARITY_CHECK_INTERVAL_TICKS: u64 = 10;
pub const CLARITY_SIGNIFICANCE_BOOST: f32 = 1.5;

#[derive(Debug)]
pub struct ClarityMoments {
    last_check_tick: Option<u64>,
    events_emitted: u64,
}

impl Default for ClarityMoments {
    fn default() -> Self {
        Self::new()
    }
}

impl ClarityMoments {
    pub fn new() -> Self {
        Self {
            last_check_tick: None,
            events_emitted: 0,
        }
    }

    pub fn events_emitted(&self) -> u64 {
        self.events_emitted
    }

    /// Check activation conditions at the configured tick cadence.
    /// Returns a `clarity_moment` event to enqueue when they hold.
    pub fn check(&mut self, state: &SelfState, now: f64) -> Option<Event> {
        if let Some(last) = self.last_check_tick {
            if state.ticks.saturating_sub(last) < CLARITY_CHECK_INTERVAL_TICKS {
                return None;
            }
        }
        self.last_check_tick = Some(state.ticks);

        if state.clarity_state {
            return None;
        }
        if state.stability < CLARITY_STABILITY_THRESHOLD
            || state.energy < CLARITY_ENERGY_THRESHOLD
        {
            return None;
        }

        self.events_emitted += 1;
        let mut metadata = EventMetadata::new();
        metadata.insert("clarity_id", json!(self.events_emitted));
        metadata.insert("duration_ticks", json!(CLARITY_DURATION_TICKS));
        metadata.insert("significance_boost", json!(CLARITY_SIGNIFICANCE_BOOST));
        metadata.insert(
            "trigger_conditions",
            json!({
                "stability": state.stability,
                "energy": state.energy,
                "tick": state.ticks,
            }),
        );

        tracing::debug!(
            clarity_id = self.events_emitted,
            stability = state.stability,
            energy = state.energy,
            "clarity moment triggered"
        );
        Some(Event::new(EventType::ClarityMoment, 0.0, now).with_metadata(metadata))
    }

    /// Consume a drained `clarity_moment` event inside the tick core.
    /// This is the only place clarity fields are written.
    pub fn apply(event: &Event, state: &mut SelfState) {
        let duration = event
            .metadata
            .get("duration_ticks")
            .and_then(serde_json::Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(CLARITY_DURATION_TICKS);
        let boost = event
            .metadata
            .get("significance_boost")
            .and_then(serde_json::Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(CLARITY_SIGNIFICANCE_BOOST);
        state.activate_clarity(duration, boost);
        tracing::debug!(
            clarity_id = event.metadata.clarity_id(),
            duration,
            boost,
            "clarity moment activated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_state() -> SelfState {
        // Defaults are stability 1.0, energy 100.0 — both above threshold
        SelfState::default()
    }

    #[test]
    fn test_emits_when_conditions_hold() {
        let mut clarity = ClarityMoments::new();
        let state = ready_state();
        let event = clarity.check(&state, 1.0).expect("clarity event");
        assert_eq!(event.event_type, EventType::ClarityMoment);
        assert_eq!(event.metadata.clarity_id(), Some(1));
    }

    #[test]
    fn test_respects_check_cadence() {
        let mut clarity = ClarityMoments::new();
        let mut state = ready_state();
        assert!(clarity.check(&state, 1.0).is_some());
        state.ticks = 5; // within the 10-tick cadence
        assert!(clarity.check(&state, 2.0).is_none());
        state.ticks = 11;
        assert!(clarity.check(&state, 3.0).is_some());
    }

    #[test]
    fn test_no_emission_below_thresholds() {
        let mut clarity = ClarityMoments::new();
        let mut weak = ready_state();
        weak.energy = 30.0;
        assert!(clarity.check(&weak, 1.0).is_none());

        let mut unstable = ready_state();
        unstable.ticks = 20;
        unstable.stability = 0.5;
        assert!(clarity.check(&unstable, 2.0).is_none());
    }

    #[test]
    fn test_no_emission_while_active() {
        let mut clarity = ClarityMoments::new();
        let mut state = ready_state();
        state.activate_clarity(CLARITY_DURATION_TICKS, CLARITY_SIGNIFICANCE_BOOST);
        assert!(clarity.check(&state, 1.0).is_none());
    }

    #[test]
    fn test_apply_activates_state() {
        let mut clarity = ClarityMoments::new();
        let mut state = ready_state();
        let event = clarity.check(&state, 1.0).expect("event");
        assert!(!state.clarity_state);

        ClarityMoments::apply(&event, &mut state);
        assert!(state.clarity_state);
        assert_eq!(state.clarity_duration, CLARITY_DURATION_TICKS);
        assert_eq!(state.clarity_modifier, CLARITY_SIGNIFICANCE_BOOST);
    }

    #[test]
    fn test_apply_with_bare_event_uses_defaults() {
        let mut state = ready_state();
        let event = Event::new(EventType::ClarityMoment, 0.0, 1.0);
        ClarityMoments::apply(&event, &mut state);
        assert!(state.clarity_state);
        assert_eq!(state.clarity_duration, CLARITY_DURATION_TICKS);
    }

    #[test]
    fn test_ids_increase() {
        let mut clarity = ClarityMoments::new();
        let mut state = ready_state();
        let first = clarity.check(&state, 1.0).expect("first");
        state.ticks = 20;
        let second = clarity.check(&state, 2.0).expect("second");
        assert_eq!(first.metadata.clarity_id(), Some(1));
        assert_eq!(second.metadata.clarity_id(), Some(2));
    }
}
