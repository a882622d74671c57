//! Learning and adaptation parameter records.
//!
//! These are the slow-drifting knobs of the interpretation stage. Both
//! structures are fixed-shape: the per-type maps return a default when a tag
//! has never been tuned, and every write clamps into the declared bounds.

use crate::event::EventType;
use crate::meaning::ResponsePattern;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sensitivity assumed for a tag that has never been tuned.
pub const DEFAULT_SENSITIVITY: f32 = 0.5;
/// Significance threshold assumed for a tag that has never been tuned.
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f32 = 0.1;

/// Per-pattern post-scale coefficients, bounded to [0, 2].
/// `ignore` is pinned at zero: an ignored event never moves a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseCoefficients {
    pub ignore: f32,
    pub dampen: f32,
    pub absorb: f32,
    pub amplify: f32,
}

impl Default for ResponseCoefficients {
    fn default() -> Self {
        Self {
            ignore: 0.0,
            dampen: 0.5,
            absorb: 1.0,
            amplify: 1.5,
        }
    }
}

impl ResponseCoefficients {
    pub fn for_pattern(&self, pattern: ResponsePattern) -> f32 {
        match pattern {
            ResponsePattern::Ignore => 0.0,
            ResponsePattern::Dampen => self.dampen,
            ResponsePattern::Absorb => self.absorb,
            ResponsePattern::Amplify => self.amplify,
        }
    }

    /// Clamp every coefficient into [0, 2] and re-pin `ignore` to zero.
    pub fn clamp_all(&mut self) {
        self.ignore = 0.0;
        self.dampen = self.dampen.clamp(0.0, 2.0);
        self.absorb = self.absorb.clamp(0.0, 2.0);
        self.amplify = self.amplify.clamp(0.0, 2.0);
    }

    pub fn set(&mut self, pattern: ResponsePattern, value: f32) {
        match pattern {
            ResponsePattern::Ignore => {}
            ResponsePattern::Dampen => self.dampen = value.clamp(0.0, 2.0),
            ResponsePattern::Absorb => self.absorb = value.clamp(0.0, 2.0),
            ResponsePattern::Amplify => self.amplify = value.clamp(0.0, 2.0),
        }
    }
}

/// Parameters retuned by the learning engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningParams {
    /// How strongly each tag registers during appraisal, [0, 1].
    pub event_type_sensitivity: HashMap<EventType, f32>,
    /// Per-tag significance floor below which events are ignored, [0, 1].
    pub significance_thresholds: HashMap<EventType, f32>,
    pub response_coefficients: ResponseCoefficients,
}

impl LearningParams {
    pub fn sensitivity_or_default(&self, ty: EventType) -> f32 {
        self.event_type_sensitivity
            .get(&ty)
            .copied()
            .unwrap_or(DEFAULT_SENSITIVITY)
    }

    pub fn set_sensitivity(&mut self, ty: EventType, value: f32) {
        self.event_type_sensitivity
            .insert(ty, value.clamp(0.0, 1.0));
    }

    pub fn threshold_or_default(&self, ty: EventType) -> f32 {
        self.significance_thresholds
            .get(&ty)
            .copied()
            .unwrap_or(DEFAULT_SIGNIFICANCE_THRESHOLD)
    }

    pub fn set_threshold(&mut self, ty: EventType, value: f32) {
        self.significance_thresholds
            .insert(ty, value.clamp(0.0, 1.0));
    }

    /// Re-clamp every stored value (serde boundary guard).
    pub fn normalize(&mut self) {
        for v in self.event_type_sensitivity.values_mut() {
            *v = v.clamp(0.0, 1.0);
        }
        for v in self.significance_thresholds.values_mut() {
            *v = v.clamp(0.0, 1.0);
        }
        self.response_coefficients.clamp_all();
    }
}

/// Parameters retuned by the adaptation manager. Structurally parallel to
/// `LearningParams` but tuned from behavior statistics rather than memory
/// significance trends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationParams {
    pub behavior_sensitivity: HashMap<EventType, f32>,
    pub behavior_thresholds: HashMap<EventType, f32>,
    pub behavior_coefficients: ResponseCoefficients,
}

impl AdaptationParams {
    pub fn sensitivity_or_default(&self, ty: EventType) -> f32 {
        self.behavior_sensitivity
            .get(&ty)
            .copied()
            .unwrap_or(DEFAULT_SENSITIVITY)
    }

    pub fn set_sensitivity(&mut self, ty: EventType, value: f32) {
        self.behavior_sensitivity.insert(ty, value.clamp(0.0, 1.0));
    }

    /// Effective decision threshold for a tag: the adapted value when
    /// present, otherwise the learned one, otherwise the fixed default.
    pub fn threshold(&self, ty: EventType, learning: &LearningParams) -> f32 {
        self.behavior_thresholds
            .get(&ty)
            .copied()
            .unwrap_or_else(|| learning.threshold_or_default(ty))
    }

    pub fn set_threshold(&mut self, ty: EventType, value: f32) {
        self.behavior_thresholds.insert(ty, value.clamp(0.0, 1.0));
    }

    pub fn normalize(&mut self) {
        for v in self.behavior_sensitivity.values_mut() {
            *v = v.clamp(0.0, 1.0);
        }
        for v in self.behavior_thresholds.values_mut() {
            *v = v.clamp(0.0, 1.0);
        }
        self.behavior_coefficients.clamp_all();
    }
}
