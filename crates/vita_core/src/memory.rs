//! Memory entry types. The append-only log itself lives on `SelfState`;
//! retention and activation policy is applied by `vita_memory`.

use crate::event::EventType;
use crate::meaning::{Impact, ResponsePattern};
use serde::{Deserialize, Serialize};

/// One remembered episode: either a processed event or a feedback
/// observation (`event_type == Feedback`, carrying `feedback_data`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub event_type: EventType,
    /// Significance the meaning engine assigned at the time, [0, 1].
    pub meaning_significance: f32,
    pub timestamp: f64,
    /// Retention weight, [0, 1]. Low-weight entries are archived first.
    pub weight: f32,
    pub subjective_timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_data: Option<FeedbackData>,
}

impl MemoryEntry {
    pub fn event(
        event_type: EventType,
        significance: f32,
        timestamp: f64,
        subjective_timestamp: f64,
    ) -> Self {
        let significance = significance.clamp(0.0, 1.0);
        Self {
            event_type,
            meaning_significance: significance,
            timestamp,
            // Significant episodes are worth keeping longer
            weight: significance,
            subjective_timestamp,
            feedback_data: None,
        }
    }

    pub fn is_feedback(&self) -> bool {
        self.feedback_data.is_some()
    }
}

/// Delayed observation attached to a feedback memory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackData {
    pub action_id: String,
    pub action_pattern: ResponsePattern,
    pub state_delta: Impact,
    pub delay_ticks: u64,
    pub associated_events: Vec<EventType>,
}
