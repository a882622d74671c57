//! Delayed feedback: pending actions and their observed consequences.
//!
//! Every executed action registers a `PendingAction` with the scalar values
//! it saw before the delta. A few ticks later the tracker computes what
//! actually changed, associates the memory entries that landed in between,
//! and emits a `FeedbackRecord` for the memory log.

use serde::{Deserialize, Serialize};
use vita_core::config::FeedbackConfig;
use vita_core::{
    EventType, FeedbackData, Impact, MemoryEntry, ResponsePattern, Scalars, SelfState,
};

/// An executed action awaiting observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub action_id: String,
    pub pattern: ResponsePattern,
    pub state_before: Scalars,
    pub register_tick: u64,
    pub register_time: f64,
}

/// Observed consequence of a prior action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub action_id: String,
    pub action_pattern: ResponsePattern,
    pub state_delta: Impact,
    pub delay_ticks: u64,
    pub associated_events: Vec<EventType>,
    pub timestamp: f64,
}

#[derive(Debug, Clone)]
pub struct FeedbackTracker {
    pub observation_delay_ticks: u64,
    pub max_wait_ticks: u64,
    pub max_pending_actions: usize,
}

impl Default for FeedbackTracker {
    fn default() -> Self {
        Self::from_config(&FeedbackConfig::default())
    }
}

impl FeedbackTracker {
    pub fn from_config(cfg: &FeedbackConfig) -> Self {
        Self {
            observation_delay_ticks: cfg.observation_delay_ticks,
            max_wait_ticks: cfg.max_wait_ticks.max(cfg.observation_delay_ticks),
            max_pending_actions: cfg.max_pending_actions.max(1),
        }
    }

    /// Register a freshly executed action. When the list is at capacity the
    /// oldest pending entry is dropped to make room.
    pub fn register(&self, pending: &mut Vec<PendingAction>, action: PendingAction) {
        if pending.len() >= self.max_pending_actions {
            let dropped = pending.remove(0);
            tracing::warn!(action_id = %dropped.action_id, "pending action list full, dropping oldest");
        }
        pending.push(action);
    }

    /// Observe consequences for every pending action that is old enough.
    /// Stale actions past `max_wait_ticks` are dropped with a warning.
    pub fn observe(
        &self,
        state: &SelfState,
        pending: &mut Vec<PendingAction>,
        now: f64,
    ) -> Vec<FeedbackRecord> {
        let current = state.scalars();
        let current_tick = state.ticks;
        let mut records = Vec::new();

        pending.retain(|action| {
            let age = current_tick.saturating_sub(action.register_tick);
            if age > self.max_wait_ticks {
                tracing::warn!(action_id = %action.action_id, age, "pending action expired unobserved");
                return false;
            }
            if age < self.observation_delay_ticks {
                return true;
            }
            let associated = associated_events(state, action.register_time, now);
            records.push(FeedbackRecord {
                action_id: action.action_id.clone(),
                action_pattern: action.pattern,
                state_delta: current.delta_since(&action.state_before),
                delay_ticks: age,
                associated_events: associated,
                timestamp: now,
            });
            false
        });

        records
    }

    /// Wrap a record as a memory entry (`event_type = feedback`,
    /// zero significance).
    pub fn feedback_entry(record: &FeedbackRecord, subjective_time: f64) -> MemoryEntry {
        MemoryEntry {
            event_type: EventType::Feedback,
            meaning_significance: 0.0,
            timestamp: record.timestamp,
            weight: 0.3,
            subjective_timestamp: subjective_time,
            feedback_data: Some(FeedbackData {
                action_id: record.action_id.clone(),
                action_pattern: record.action_pattern,
                state_delta: record.state_delta,
                delay_ticks: record.delay_ticks,
                associated_events: record.associated_events.clone(),
            }),
        }
    }
}

/// Event types remembered inside the `[register_time, now]` window.
fn associated_events(state: &SelfState, from: f64, to: f64) -> Vec<EventType> {
    state
        .memory
        .iter()
        .rev()
        .take_while(|e| e.timestamp >= from)
        .filter(|e| e.timestamp <= to && !e.is_feedback())
        .map(|e| e.event_type)
        .collect()
}
