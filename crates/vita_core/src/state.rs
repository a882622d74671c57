//! The canonical mutable state of the agent.
//!
//! All scalar fields clamp on every write, NaN/Inf are sanitized both at
//! mutation time and at the serde boundary, and identity fields never
//! change after construction. The `active` flag is an operator switch, not
//! a derived health status: the agent stays in its run state even when
//! every health scalar is zero.

use crate::event::EventType;
use crate::meaning::{Impact, ResponsePattern};
use crate::memory::MemoryEntry;
use crate::params::{AdaptationParams, LearningParams};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Upper bound of the energy scalar; stability and integrity live in [0, 1].
pub const ENERGY_MAX: f32 = 100.0;

/// Ring size for the recent-events window used in pattern detection.
pub const RECENT_EVENTS_CAP: usize = 32;

/// Guard against NaN and Infinity in state values.
/// If the value is NaN or Inf, replace with the provided fallback.
#[inline]
fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in state, resetting to fallback {}", fallback);
        fallback
    }
}

/// Serde deserializer that sanitizes NaN/Inf → 0.0 at the boundary.
pub(crate) fn deserialize_safe_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let v = f32::deserialize(deserializer)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Ok(0.0)
    }
}

fn default_true() -> bool {
    true
}

fn default_base_rate() -> f64 {
    1.0
}

fn default_clarity_modifier() -> f32 {
    1.0
}

/// Wall-clock seconds with sub-second resolution.
pub fn wall_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Point-in-time view of the three health scalars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scalars {
    pub energy: f32,
    pub stability: f32,
    pub integrity: f32,
}

impl Scalars {
    /// Delta from `before` to `self` (current − before).
    pub fn delta_since(&self, before: &Scalars) -> Impact {
        Impact {
            energy: self.energy - before.energy,
            stability: self.stability - before.stability,
            integrity: self.integrity - before.integrity,
        }
    }
}

/// Canonical mutable state. Owned by the tick core; every other thread
/// reads through snapshot views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfState {
    // Identity — never written after construction
    pub life_id: String,
    pub birth_timestamp: f64,

    // Time accounting
    pub ticks: u64,
    pub age: f64,
    pub subjective_time: f64,
    #[serde(default = "default_base_rate")]
    pub subjective_time_base_rate: f64,

    // Health scalars
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub energy: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub stability: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub integrity: f32,

    /// Operator switch. Health never flips this.
    #[serde(default = "default_true")]
    pub active: bool,

    // Memory log (append-only within a run, bounded by archival policy)
    pub memory: Vec<MemoryEntry>,
    pub memory_archive: Vec<MemoryEntry>,
    pub memory_entries_by_type: HashMap<EventType, u64>,
    /// Entries surfaced by activation retrieval for the event in flight.
    pub activated_memory: Vec<MemoryEntry>,

    // Interpretation parameters
    pub learning_params: LearningParams,
    pub adaptation_params: AdaptationParams,

    // Recent context
    pub recent_events: VecDeque<EventType>,
    pub last_pattern: Option<ResponsePattern>,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub last_significance: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub last_event_intensity: f32,

    // Clarity (mutated only by the tick core, via clarity_moment events)
    pub clarity_state: bool,
    pub clarity_duration: u32,
    #[serde(default = "default_clarity_modifier", deserialize_with = "deserialize_safe_f32")]
    pub clarity_modifier: f32,

    /// Opaque ancillary scalar, [0, 1]; persisted but never interpreted here.
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub consciousness_level: f32,
}

impl Default for SelfState {
    fn default() -> Self {
        Self {
            life_id: Uuid::new_v4().to_string(),
            birth_timestamp: wall_now(),
            ticks: 0,
            age: 0.0,
            subjective_time: 0.0,
            subjective_time_base_rate: 1.0,
            energy: ENERGY_MAX,
            stability: 1.0,
            integrity: 1.0,
            active: true,
            memory: Vec::new(),
            memory_archive: Vec::new(),
            memory_entries_by_type: HashMap::new(),
            activated_memory: Vec::new(),
            learning_params: LearningParams::default(),
            adaptation_params: AdaptationParams::default(),
            recent_events: VecDeque::with_capacity(RECENT_EVENTS_CAP),
            last_pattern: None,
            last_significance: 0.0,
            last_event_intensity: 0.0,
            clarity_state: false,
            clarity_duration: 0,
            clarity_modifier: 1.0,
            consciousness_level: 0.0,
        }
    }
}

impl SelfState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance time accounting by one tick of `dt` wall seconds.
    pub fn advance(&mut self, dt: f64) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.ticks += 1;
        self.age += dt;
        self.subjective_time += self.subjective_time_base_rate * dt;
    }

    /// Apply a scalar delta, clamping every field into its bounds.
    pub fn apply_delta(&mut self, delta: &Impact) {
        self.energy = sanitize_f32(self.energy + delta.energy, 0.0).clamp(0.0, ENERGY_MAX);
        self.stability = sanitize_f32(self.stability + delta.stability, 0.0).clamp(0.0, 1.0);
        self.integrity = sanitize_f32(self.integrity + delta.integrity, 0.0).clamp(0.0, 1.0);
    }

    /// Re-clamp every bounded field. Cheap; called after bulk mutation
    /// and after deserialization from untrusted snapshots.
    pub fn normalize(&mut self) {
        self.energy = sanitize_f32(self.energy, 0.0).clamp(0.0, ENERGY_MAX);
        self.stability = sanitize_f32(self.stability, 0.0).clamp(0.0, 1.0);
        self.integrity = sanitize_f32(self.integrity, 0.0).clamp(0.0, 1.0);
        self.last_significance = sanitize_f32(self.last_significance, 0.0).clamp(0.0, 1.0);
        self.last_event_intensity =
            sanitize_f32(self.last_event_intensity, 0.0).clamp(-1.0, 1.0);
        self.clarity_modifier = sanitize_f32(self.clarity_modifier, 1.0).max(1.0);
        self.consciousness_level =
            sanitize_f32(self.consciousness_level, 0.0).clamp(0.0, 1.0);
        if !self.age.is_finite() || self.age < 0.0 {
            self.age = 0.0;
        }
        if !self.subjective_time.is_finite() || self.subjective_time < 0.0 {
            self.subjective_time = 0.0;
        }
        while self.recent_events.len() > RECENT_EVENTS_CAP {
            self.recent_events.pop_front();
        }
        self.learning_params.normalize();
        self.adaptation_params.normalize();
    }

    /// Operator-only switch. This is the one sanctioned way to change
    /// `active`; nothing in the pipeline calls it.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn scalars(&self) -> Scalars {
        Scalars {
            energy: self.energy,
            stability: self.stability,
            integrity: self.integrity,
        }
    }

    /// Push a processed event type into the bounded recent-events ring.
    pub fn record_event(&mut self, ty: EventType) {
        if self.recent_events.len() >= RECENT_EVENTS_CAP {
            self.recent_events.pop_front();
        }
        self.recent_events.push_back(ty);
    }

    /// Enter a clarity window. Only the tick core calls this, in response
    /// to a `clarity_moment` event it drained from the queue.
    pub fn activate_clarity(&mut self, duration_ticks: u32, modifier: f32) {
        self.clarity_state = true;
        self.clarity_duration = duration_ticks;
        self.clarity_modifier = sanitize_f32(modifier, 1.0).max(1.0);
    }

    /// Count down the clarity window; returns true on the tick it expires.
    pub fn tick_clarity(&mut self) -> bool {
        if !self.clarity_state {
            return false;
        }
        self.clarity_duration = self.clarity_duration.saturating_sub(1);
        if self.clarity_duration == 0 {
            self.clarity_state = false;
            self.clarity_modifier = 1.0;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = SelfState::default();
        assert_eq!(state.energy, ENERGY_MAX);
        assert_eq!(state.stability, 1.0);
        assert_eq!(state.integrity, 1.0);
        assert!(state.active);
        assert_eq!(state.ticks, 0);
        assert!(state.memory.is_empty());
        assert!(!state.life_id.is_empty());
    }

    #[test]
    fn test_apply_delta_clamps_low() {
        let mut state = SelfState::default();
        state.apply_delta(&Impact::new(-500.0, -5.0, -5.0));
        assert_eq!(state.energy, 0.0);
        assert_eq!(state.stability, 0.0);
        assert_eq!(state.integrity, 0.0);
    }

    #[test]
    fn test_apply_delta_clamps_high() {
        let mut state = SelfState::default();
        state.apply_delta(&Impact::new(500.0, 5.0, 5.0));
        assert_eq!(state.energy, ENERGY_MAX);
        assert_eq!(state.stability, 1.0);
        assert_eq!(state.integrity, 1.0);
    }

    #[test]
    fn test_apply_delta_sanitizes_nan() {
        let mut state = SelfState::default();
        state.apply_delta(&Impact::new(f32::NAN, f32::INFINITY, f32::NEG_INFINITY));
        assert!(state.energy.is_finite());
        assert!(state.stability.is_finite());
        assert!(state.integrity.is_finite());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut state = SelfState::default();
        state.advance(0.5);
        state.advance(1.5);
        assert_eq!(state.ticks, 2);
        assert!((state.age - 2.0).abs() < 1e-9);
        assert!((state.subjective_time - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_advance_rejects_negative_dt() {
        let mut state = SelfState::default();
        state.advance(-5.0);
        assert_eq!(state.ticks, 1);
        assert_eq!(state.age, 0.0);
    }

    #[test]
    fn test_active_survives_zero_health() {
        let mut state = SelfState::default();
        state.apply_delta(&Impact::new(-500.0, -5.0, -5.0));
        assert_eq!(state.energy, 0.0);
        assert!(state.active, "health must never flip the operator switch");
        state.set_active(false);
        assert!(!state.active);
    }

    #[test]
    fn test_recent_events_ring_is_bounded() {
        let mut state = SelfState::default();
        for _ in 0..(RECENT_EVENTS_CAP + 10) {
            state.record_event(EventType::Noise);
        }
        assert_eq!(state.recent_events.len(), RECENT_EVENTS_CAP);
    }

    #[test]
    fn test_clarity_window_lifecycle() {
        let mut state = SelfState::default();
        state.activate_clarity(3, 1.5);
        assert!(state.clarity_state);
        assert_eq!(state.clarity_modifier, 1.5);

        assert!(!state.tick_clarity());
        assert!(!state.tick_clarity());
        assert!(state.tick_clarity(), "third tick should expire the window");
        assert!(!state.clarity_state);
        assert_eq!(state.clarity_modifier, 1.0);
        // Ticking while inactive is a no-op
        assert!(!state.tick_clarity());
    }

    #[test]
    fn test_clarity_modifier_floor() {
        let mut state = SelfState::default();
        state.activate_clarity(10, 0.2);
        assert_eq!(state.clarity_modifier, 1.0);
    }

    #[test]
    fn test_normalize_repairs_corruption() {
        let mut state = SelfState::default();
        state.energy = f32::NAN;
        state.stability = 7.0;
        state.integrity = -3.0;
        state.age = f64::NAN;
        state.normalize();
        assert_eq!(state.energy, 0.0);
        assert_eq!(state.stability, 1.0);
        assert_eq!(state.integrity, 0.0);
        assert_eq!(state.age, 0.0);
    }

    #[test]
    fn test_json_roundtrip_preserves_identity() {
        let mut state = SelfState::default();
        state.advance(1.0);
        state.apply_delta(&Impact::new(-20.0, -0.1, -0.05));
        let json = serde_json::to_string(&state).unwrap();
        let back: SelfState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.life_id, state.life_id);
        assert_eq!(back.birth_timestamp, state.birth_timestamp);
        assert_eq!(back.ticks, state.ticks);
        assert!((back.energy - state.energy).abs() < 1e-6);
    }

    #[test]
    fn test_json_rejects_null_scalar() {
        let json = r#"{"life_id":"x","birth_timestamp":0.0,"energy":null}"#;
        // null is not a float; this should fail cleanly rather than panic
        assert!(serde_json::from_str::<SelfState>(json).is_err());
    }

    #[test]
    fn test_deserialize_safe_f32_passes_normal_values() {
        #[derive(serde::Deserialize)]
        struct W {
            #[serde(deserialize_with = "super::deserialize_safe_f32")]
            v: f32,
        }
        let w: W = serde_json::from_str(r#"{"v": 1.5}"#).unwrap();
        assert!((w.v - 1.5).abs() < 1e-6);
        let w: W = serde_json::from_str(r#"{"v": -0.7}"#).unwrap();
        assert!((w.v - (-0.7)).abs() < 1e-6);
    }

    #[test]
    fn test_scalars_delta() {
        let before = Scalars {
            energy: 100.0,
            stability: 1.0,
            integrity: 1.0,
        };
        let after = Scalars {
            energy: 98.5,
            stability: 0.9,
            integrity: 0.95,
        };
        let delta = after.delta_since(&before);
        assert!((delta.energy - (-1.5)).abs() < 1e-6);
        assert!((delta.stability - (-0.1)).abs() < 1e-6);
    }
}
