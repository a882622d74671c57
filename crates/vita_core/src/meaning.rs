//! The meaning engine: `(Event, SelfState) → Meaning`.
//!
//! Three stages run in order: appraisal (how much does this matter),
//! impact model (what would it do to the scalars), response pattern
//! (ignore / absorb / dampen / amplify). The whole pipeline is a pure
//! function of its inputs: no clock, no randomness, no hidden state.

use crate::event::{Event, EventType};
use crate::state::SelfState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reaction pattern chosen by the decision stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePattern {
    Ignore,
    Absorb,
    Dampen,
    Amplify,
}

impl ResponsePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Absorb => "absorb",
            Self::Dampen => "dampen",
            Self::Amplify => "amplify",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "ignore" => Some(Self::Ignore),
            "absorb" => Some(Self::Absorb),
            "dampen" => Some(Self::Dampen),
            "amplify" => Some(Self::Amplify),
            _ => None,
        }
    }
}

/// Scalar delta over (energy, stability, integrity).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Impact {
    pub energy: f32,
    pub stability: f32,
    pub integrity: f32,
}

impl Impact {
    pub const ZERO: Impact = Impact {
        energy: 0.0,
        stability: 0.0,
        integrity: 0.0,
    };

    pub fn new(energy: f32, stability: f32, integrity: f32) -> Self {
        Self {
            energy,
            stability,
            integrity,
        }
    }

    pub fn scale(&self, factor: f32) -> Self {
        Self {
            energy: self.energy * factor,
            stability: self.stability * factor,
            integrity: self.integrity * factor,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.energy == 0.0 && self.stability == 0.0 && self.integrity == 0.0
    }
}

/// Interpreted event, ready for the decision/action stages.
///
/// Invariant: `pattern == Ignore` implies `impact.is_zero()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meaning {
    pub event_id: Uuid,
    pub significance: f32,
    pub impact: Impact,
    pub pattern: ResponsePattern,
}

/// Event interpretation engine.
///
/// Appraisal folds the tag weight, learned/adapted sensitivity, and the
/// current state context into a significance in [0, 1]; the impact model
/// scales per-tag base deltas; the pattern stage thresholds significance
/// and keys on stability.
#[derive(Debug, Clone)]
pub struct MeaningEngine {
    pub base_significance_threshold: f32,
}

impl MeaningEngine {
    /// Linear interpolation of sensitivity [0,1] into a modifier [0.5, 1.0].
    pub const SENSITIVITY_INTERPOLATION_BASE: f32 = 0.5;
    pub const SENSITIVITY_INTERPOLATION_RANGE: f32 = 0.5;

    /// Ceiling on the combined sensitivity modifier.
    pub const MAX_SIGNIFICANCE_MODIFIER: f32 = 1.5;

    /// Below this integrity, even small events register harder.
    pub const LOW_INTEGRITY_THRESHOLD: f32 = 0.3;
    pub const LOW_INTEGRITY_MULTIPLIER: f32 = 1.5;

    /// Below this stability, events are felt more strongly.
    pub const LOW_STABILITY_THRESHOLD: f32 = 0.5;
    pub const LOW_STABILITY_MULTIPLIER: f32 = 1.2;

    /// Stability bands for the pattern decision.
    pub const DAMPEN_STABILITY_THRESHOLD: f32 = 0.8;
    pub const AMPLIFY_STABILITY_THRESHOLD: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            base_significance_threshold: 0.1,
        }
    }

    /// Stage A: how important is this event right now?
    pub fn appraisal(&self, event: &Event, state: &SelfState) -> f32 {
        let base = event.intensity.abs() * event.event_type.type_weight();

        let learning_modifier = Self::SENSITIVITY_INTERPOLATION_BASE
            + state
                .learning_params
                .sensitivity_or_default(event.event_type)
                * Self::SENSITIVITY_INTERPOLATION_RANGE;
        let adaptation_modifier = Self::SENSITIVITY_INTERPOLATION_BASE
            + state
                .adaptation_params
                .sensitivity_or_default(event.event_type)
                * Self::SENSITIVITY_INTERPOLATION_RANGE;

        // Mean of the two modifiers, not their product: a doubly-tuned tag
        // must not drift quadratically in a single appraisal.
        let combined = ((learning_modifier + adaptation_modifier) / 2.0)
            .min(Self::MAX_SIGNIFICANCE_MODIFIER);

        let mut significance = base * combined;

        if state.integrity < Self::LOW_INTEGRITY_THRESHOLD {
            significance *= Self::LOW_INTEGRITY_MULTIPLIER;
        }
        if state.stability < Self::LOW_STABILITY_THRESHOLD {
            significance *= Self::LOW_STABILITY_MULTIPLIER;
        }
        if state.clarity_state {
            significance *= state.clarity_modifier;
        }

        significance.clamp(0.0, 1.0)
    }

    /// Stage B: base per-tag deltas, scaled by intensity and significance.
    /// Tags with no physical profile produce zero impact.
    pub fn impact_model(&self, event: &Event, significance: f32) -> Impact {
        let base = match event.event_type {
            EventType::Shock => Impact::new(-1.5, -0.10, -0.05),
            EventType::Noise => Impact::new(-0.3, -0.02, 0.0),
            EventType::Recovery => Impact::new(1.0, 0.05, 0.02),
            EventType::Decay => Impact::new(-0.5, -0.01, -0.01),
            EventType::Idle => Impact::new(-0.1, 0.0, 0.0),
            _ => Impact::ZERO,
        };
        base.scale(event.intensity.abs() * significance)
    }

    /// Stage C: pick the response pattern from the effective threshold and
    /// the current stability band. The threshold chain is adapted value →
    /// learned value → engine base.
    pub fn response_pattern(&self, event: &Event, state: &SelfState, significance: f32) -> ResponsePattern {
        let threshold = state
            .adaptation_params
            .behavior_thresholds
            .get(&event.event_type)
            .or_else(|| {
                state
                    .learning_params
                    .significance_thresholds
                    .get(&event.event_type)
            })
            .copied()
            .unwrap_or(self.base_significance_threshold);

        if significance < threshold {
            return ResponsePattern::Ignore;
        }
        if state.stability > Self::DAMPEN_STABILITY_THRESHOLD {
            return ResponsePattern::Dampen;
        }
        if state.stability < Self::AMPLIFY_STABILITY_THRESHOLD {
            return ResponsePattern::Amplify;
        }
        ResponsePattern::Absorb
    }

    /// Full pipeline. Deterministic for identical `(event, state)` inputs.
    pub fn process(&self, event: &Event, state: &SelfState) -> Meaning {
        let significance = self.appraisal(event, state);
        let base_impact = self.impact_model(event, significance);
        let pattern = self.response_pattern(event, state, significance);

        let impact = match pattern {
            ResponsePattern::Ignore => Impact::ZERO,
            _ => base_impact.scale(
                state
                    .adaptation_params
                    .behavior_coefficients
                    .for_pattern(pattern),
            ),
        };

        Meaning {
            event_id: event.id,
            significance,
            impact,
            pattern,
        }
    }
}

impl Default for MeaningEngine {
    fn default() -> Self {
        Self::new()
    }
}
