//! Bounded, passive learning over memory statistics.
//!
//! The learning engine reads a trailing window of the memory log and nudges
//! interpretation parameters toward what the window suggests. Every nudge
//! is bounded: no parameter moves by more than `max_parameter_delta` per
//! invocation, moves below `min_parameter_delta` are skipped, and scalars
//! (energy/stability/integrity) are never touched.

use std::collections::HashMap;
use vita_core::config::LearningConfig;
use vita_core::{EventType, ResponsePattern, SelfState, DEFAULT_SIGNIFICANCE_THRESHOLD};

/// Per-type aggregate over the statistics window.
#[derive(Debug, Clone, Default)]
pub struct TypeStats {
    pub count: usize,
    pub mean_significance: f32,
}

/// Windowed statistics over the tail of the memory log.
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    pub per_type: HashMap<EventType, TypeStats>,
    pub pattern_counts: HashMap<ResponsePattern, usize>,
    pub window_len: usize,
}

impl MemoryStats {
    /// Aggregate the last `window` memory entries. Event entries feed the
    /// per-type table; feedback entries feed the pattern distribution.
    pub fn collect(state: &SelfState, window: usize) -> Self {
        let mut per_type: HashMap<EventType, (usize, f32)> = HashMap::new();
        let mut pattern_counts: HashMap<ResponsePattern, usize> = HashMap::new();
        let mut window_len = 0usize;

        for entry in state.memory.iter().rev().take(window) {
            window_len += 1;
            if let Some(data) = &entry.feedback_data {
                *pattern_counts.entry(data.action_pattern).or_insert(0) += 1;
            } else {
                let slot = per_type.entry(entry.event_type).or_insert((0, 0.0));
                slot.0 += 1;
                slot.1 += entry.meaning_significance;
            }
        }

        let per_type = per_type
            .into_iter()
            .map(|(ty, (count, sum))| {
                (
                    ty,
                    TypeStats {
                        count,
                        mean_significance: if count > 0 { sum / count as f32 } else { 0.0 },
                    },
                )
            })
            .collect();

        Self {
            per_type,
            pattern_counts,
            window_len,
        }
    }
}

/// Clamp a desired move into the bounded-delta contract.
/// Returns None when the move is below the thrash floor.
pub(crate) fn bounded_step(current: f32, desired: f32, max_delta: f32, min_delta: f32) -> Option<f32> {
    let diff = desired - current;
    if diff.abs() < min_delta {
        return None;
    }
    Some(current + diff.clamp(-max_delta, max_delta))
}

#[derive(Debug, Clone)]
pub struct LearningEngine {
    pub max_parameter_delta: f32,
    pub min_parameter_delta: f32,
    pub history_window: usize,
}

impl Default for LearningEngine {
    fn default() -> Self {
        Self::from_config(&LearningConfig::default())
    }
}

impl LearningEngine {
    pub fn from_config(cfg: &LearningConfig) -> Self {
        Self {
            max_parameter_delta: cfg.max_parameter_delta,
            min_parameter_delta: cfg.min_parameter_delta,
            history_window: cfg.history_window,
        }
    }

    /// One learning invocation. Sensitivity drifts toward the observed mean
    /// significance of each tag; thresholds drift up for chatty tags
    /// (habituation) and back toward the base for quiet ones.
    pub fn run(&self, state: &mut SelfState) {
        let stats = MemoryStats::collect(state, self.history_window);
        if stats.window_len == 0 {
            return;
        }

        for (&ty, ts) in &stats.per_type {
            if ty.is_internal() {
                continue;
            }

            let current = state.learning_params.sensitivity_or_default(ty);
            if let Some(next) = bounded_step(
                current,
                ts.mean_significance,
                self.max_parameter_delta,
                self.min_parameter_delta,
            ) {
                state.learning_params.set_sensitivity(ty, next);
            }

            let frequency = ts.count as f32 / stats.window_len as f32;
            let desired_threshold =
                (DEFAULT_SIGNIFICANCE_THRESHOLD + frequency * 0.2).clamp(0.0, 0.5);
            let current_threshold = state.learning_params.threshold_or_default(ty);
            if let Some(next) = bounded_step(
                current_threshold,
                desired_threshold,
                self.max_parameter_delta,
                self.min_parameter_delta,
            ) {
                state.learning_params.set_threshold(ty, next);
            }
        }

        tracing::debug!(
            window = stats.window_len,
            types = stats.per_type.len(),
            "learning pass complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vita_core::MemoryEntry;

    fn engine() -> LearningEngine {
        LearningEngine {
            max_parameter_delta: 0.01,
            min_parameter_delta: 0.001,
            history_window: 100,
        }
    }

    fn fill_memory(state: &mut SelfState, ty: EventType, sig: f32, n: usize) {
        for i in 0..n {
            state
                .memory
                .push(MemoryEntry::event(ty, sig, i as f64, i as f64));
        }
    }

    #[test]
    fn test_empty_memory_is_noop() {
        let engine = engine();
        let mut state = SelfState::default();
        let before = state.learning_params.clone();
        engine.run(&mut state);
        assert_eq!(state.learning_params, before);
    }

    #[test]
    fn test_sensitivity_moves_toward_mean_significance() {
        let engine = engine();
        let mut state = SelfState::default();
        fill_memory(&mut state, EventType::Shock, 0.9, 20);

        let before = state.learning_params.sensitivity_or_default(EventType::Shock);
        engine.run(&mut state);
        let after = state.learning_params.sensitivity_or_default(EventType::Shock);
        assert!(after > before, "sensitivity should rise toward 0.9");
    }

    #[test]
    fn test_delta_is_bounded_per_invocation() {
        let engine = engine();
        let mut state = SelfState::default();
        fill_memory(&mut state, EventType::Shock, 1.0, 50);

        for _ in 0..10 {
            let before_sens = state.learning_params.sensitivity_or_default(EventType::Shock);
            let before_thr = state.learning_params.threshold_or_default(EventType::Shock);
            engine.run(&mut state);
            let after_sens = state.learning_params.sensitivity_or_default(EventType::Shock);
            let after_thr = state.learning_params.threshold_or_default(EventType::Shock);
            assert!(
                (after_sens - before_sens).abs() <= engine.max_parameter_delta + 1e-6,
                "sensitivity moved {} in one invocation",
                (after_sens - before_sens).abs()
            );
            assert!((after_thr - before_thr).abs() <= engine.max_parameter_delta + 1e-6);
        }
    }

    #[test]
    fn test_values_stay_in_declared_bounds() {
        let engine = engine();
        let mut state = SelfState::default();
        fill_memory(&mut state, EventType::Shock, 1.0, 100);
        for _ in 0..200 {
            engine.run(&mut state);
        }
        let s = state.learning_params.sensitivity_or_default(EventType::Shock);
        let t = state.learning_params.threshold_or_default(EventType::Shock);
        assert!((0.0..=1.0).contains(&s));
        assert!((0.0..=1.0).contains(&t));
    }

    #[test]
    fn test_learning_never_touches_scalars() {
        let engine = engine();
        let mut state = SelfState::default();
        state.energy = 42.0;
        state.stability = 0.42;
        state.integrity = 0.42;
        fill_memory(&mut state, EventType::Decay, 0.6, 30);

        engine.run(&mut state);
        assert_eq!(state.energy, 42.0);
        assert_eq!(state.stability, 0.42);
        assert_eq!(state.integrity, 0.42);
    }

    #[test]
    fn test_small_moves_are_skipped() {
        // Current exactly at desired: no write, no map entry
        let engine = engine();
        let mut state = SelfState::default();
        // mean significance 0.5 == DEFAULT_SENSITIVITY → diff 0 → skip
        fill_memory(&mut state, EventType::Calm, 0.5, 10);
        engine.run(&mut state);
        assert!(!state
            .learning_params
            .event_type_sensitivity
            .contains_key(&EventType::Calm));
    }

    #[test]
    fn test_internal_tags_excluded() {
        let engine = engine();
        let mut state = SelfState::default();
        fill_memory(&mut state, EventType::ClarityMoment, 1.0, 30);
        engine.run(&mut state);
        assert!(!state
            .learning_params
            .event_type_sensitivity
            .contains_key(&EventType::ClarityMoment));
    }

    #[test]
    fn test_bounded_step_contract() {
        assert_eq!(bounded_step(0.5, 0.5, 0.01, 0.001), None);
        assert_eq!(bounded_step(0.5, 0.5005, 0.01, 0.001), None);
        let up = bounded_step(0.5, 1.0, 0.01, 0.001).unwrap();
        assert!((up - 0.51).abs() < 1e-6);
        let down = bounded_step(0.5, 0.0, 0.01, 0.001).unwrap();
        assert!((down - 0.49).abs() < 1e-6);
    }
}
