//! Bounded behavior adaptation.
//!
//! Where learning watches what events *meant*, adaptation watches what the
//! agent *did*: the distribution of chosen response patterns (from feedback
//! records) and the distribution of recently seen event types. Parameters
//! drift to reflect that behavior; there is no target distribution being
//! sought. Deltas obey the same bounded-step contract as learning.

use crate::learning::{bounded_step, MemoryStats};
use vita_core::config::AdaptationConfig;
use vita_core::{ResponsePattern, ResponseCoefficients, SelfState, DEFAULT_SIGNIFICANCE_THRESHOLD};

#[derive(Debug, Clone)]
pub struct AdaptationManager {
    pub max_adaptation_delta: f32,
    pub min_adaptation_delta: f32,
    pub history_window: usize,
}

impl Default for AdaptationManager {
    fn default() -> Self {
        Self::from_config(&AdaptationConfig::default())
    }
}

impl AdaptationManager {
    pub fn from_config(cfg: &AdaptationConfig) -> Self {
        Self {
            max_adaptation_delta: cfg.max_adaptation_delta,
            min_adaptation_delta: cfg.min_adaptation_delta,
            history_window: cfg.history_window,
        }
    }

    /// One adaptation invocation.
    ///
    /// - `behavior_sensitivity` drifts toward each tag's share of the
    ///   recent-events window (frequently seen tags register as familiar).
    /// - `behavior_thresholds` drift up for tags that dominate the window.
    /// - `behavior_coefficients` drift toward the patterns actually chosen:
    ///   a heavily used pattern edges above its default, an unused one
    ///   settles slightly below it.
    pub fn run(&self, state: &mut SelfState) {
        self.adapt_to_recent_events(state);
        self.adapt_coefficients(state);
    }

    fn adapt_to_recent_events(&self, state: &mut SelfState) {
        let total = state.recent_events.len();
        if total == 0 {
            return;
        }

        let mut counts: std::collections::HashMap<vita_core::EventType, usize> =
            std::collections::HashMap::new();
        for &ty in &state.recent_events {
            *counts.entry(ty).or_insert(0) += 1;
        }

        for (ty, count) in counts {
            if ty.is_internal() {
                continue;
            }
            let share = count as f32 / total as f32;

            let current = state.adaptation_params.sensitivity_or_default(ty);
            // Familiar tags drift toward mid-sensitivity plus their share
            let desired = (0.4 + share * 0.4).clamp(0.0, 1.0);
            if let Some(next) = bounded_step(
                current,
                desired,
                self.max_adaptation_delta,
                self.min_adaptation_delta,
            ) {
                state.adaptation_params.set_sensitivity(ty, next);
            }

            let current_t = state
                .adaptation_params
                .threshold(ty, &state.learning_params);
            let desired_t =
                (DEFAULT_SIGNIFICANCE_THRESHOLD * (1.0 + share)).clamp(0.0, 0.5);
            if let Some(next) = bounded_step(
                current_t,
                desired_t,
                self.max_adaptation_delta,
                self.min_adaptation_delta,
            ) {
                state.adaptation_params.set_threshold(ty, next);
            }
        }
    }

    fn adapt_coefficients(&self, state: &mut SelfState) {
        let stats = MemoryStats::collect(state, self.history_window);
        let total: usize = stats.pattern_counts.values().sum();
        if total == 0 {
            return;
        }

        let defaults = ResponseCoefficients::default();
        for pattern in [
            ResponsePattern::Dampen,
            ResponsePattern::Absorb,
            ResponsePattern::Amplify,
        ] {
            let share = stats
                .pattern_counts
                .get(&pattern)
                .copied()
                .unwrap_or(0) as f32
                / total as f32;
            let current = state
                .adaptation_params
                .behavior_coefficients
                .for_pattern(pattern);
            // Share 1/3 is neutral; above it the coefficient edges up,
            // below it settles toward 0.9x of the default.
            let desired =
                (defaults.for_pattern(pattern) * (0.9 + share * 0.3)).clamp(0.0, 2.0);
            if let Some(next) = bounded_step(
                current,
                desired,
                self.max_adaptation_delta,
                self.min_adaptation_delta,
            ) {
                state
                    .adaptation_params
                    .behavior_coefficients
                    .set(pattern, next);
            }
        }

        tracing::debug!(observed_actions = total, "adaptation pass complete");
    }
}
