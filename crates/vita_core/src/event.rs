//! Event vocabulary and the `Event` envelope.
//!
//! The event type set is closed at startup: every tag the environment can
//! emit is a variant here, and anything else falls into the `Unknown` bucket
//! with neutral defaults. Per-tag weight and intensity tables are const
//! lookups, not runtime configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Closed vocabulary of event tags.
///
/// Physical, social, cognitive and existential tags come from the external
/// generator; `Silence` is produced by the silence detector;
/// `ClarityMoment` and `Feedback` are internal tags minted by the runtime
/// itself and never expected from producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Physical
    Noise,
    Decay,
    Recovery,
    Shock,
    Idle,
    Silence,
    MemoryEcho,
    // Social
    SocialPresence,
    SocialConflict,
    SocialHarmony,
    // Cognitive
    CognitiveDoubt,
    CognitiveClarity,
    CognitiveConfusion,
    // Existential
    ExistentialVoid,
    ExistentialPurpose,
    ExistentialFinitude,
    // Free-standing
    Connection,
    Isolation,
    Insight,
    Confusion,
    Curiosity,
    MeaningFound,
    Void,
    Acceptance,
    Joy,
    Sadness,
    Fear,
    Calm,
    Comfort,
    Discomfort,
    Fatigue,
    Inspiration,
    Anticipation,
    Boredom,
    CreativeDissonance,
    // Internal
    ClarityMoment,
    Feedback,
    /// Fallback bucket for tags not known at startup.
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noise => "noise",
            Self::Decay => "decay",
            Self::Recovery => "recovery",
            Self::Shock => "shock",
            Self::Idle => "idle",
            Self::Silence => "silence",
            Self::MemoryEcho => "memory_echo",
            Self::SocialPresence => "social_presence",
            Self::SocialConflict => "social_conflict",
            Self::SocialHarmony => "social_harmony",
            Self::CognitiveDoubt => "cognitive_doubt",
            Self::CognitiveClarity => "cognitive_clarity",
            Self::CognitiveConfusion => "cognitive_confusion",
            Self::ExistentialVoid => "existential_void",
            Self::ExistentialPurpose => "existential_purpose",
            Self::ExistentialFinitude => "existential_finitude",
            Self::Connection => "connection",
            Self::Isolation => "isolation",
            Self::Insight => "insight",
            Self::Confusion => "confusion",
            Self::Curiosity => "curiosity",
            Self::MeaningFound => "meaning_found",
            Self::Void => "void",
            Self::Acceptance => "acceptance",
            Self::Joy => "joy",
            Self::Sadness => "sadness",
            Self::Fear => "fear",
            Self::Calm => "calm",
            Self::Comfort => "comfort",
            Self::Discomfort => "discomfort",
            Self::Fatigue => "fatigue",
            Self::Inspiration => "inspiration",
            Self::Anticipation => "anticipation",
            Self::Boredom => "boredom",
            Self::CreativeDissonance => "creative_dissonance",
            Self::ClarityMoment => "clarity_moment",
            Self::Feedback => "feedback",
            Self::Unknown => "unknown",
        }
    }

    /// Parse from the wire tag (case-sensitive, snake_case).
    /// Unrecognized tags land in `Unknown`.
    pub fn parse_str(s: &str) -> Self {
        match s {
            "noise" => Self::Noise,
            "decay" => Self::Decay,
            "recovery" => Self::Recovery,
            "shock" => Self::Shock,
            "idle" => Self::Idle,
            "silence" => Self::Silence,
            "memory_echo" => Self::MemoryEcho,
            "social_presence" => Self::SocialPresence,
            "social_conflict" => Self::SocialConflict,
            "social_harmony" => Self::SocialHarmony,
            "cognitive_doubt" => Self::CognitiveDoubt,
            "cognitive_clarity" => Self::CognitiveClarity,
            "cognitive_confusion" => Self::CognitiveConfusion,
            "existential_void" => Self::ExistentialVoid,
            "existential_purpose" => Self::ExistentialPurpose,
            "existential_finitude" => Self::ExistentialFinitude,
            "connection" => Self::Connection,
            "isolation" => Self::Isolation,
            "insight" => Self::Insight,
            "confusion" => Self::Confusion,
            "curiosity" => Self::Curiosity,
            "meaning_found" => Self::MeaningFound,
            "void" => Self::Void,
            "acceptance" => Self::Acceptance,
            "joy" => Self::Joy,
            "sadness" => Self::Sadness,
            "fear" => Self::Fear,
            "calm" => Self::Calm,
            "comfort" => Self::Comfort,
            "discomfort" => Self::Discomfort,
            "fatigue" => Self::Fatigue,
            "inspiration" => Self::Inspiration,
            "anticipation" => Self::Anticipation,
            "boredom" => Self::Boredom,
            "creative_dissonance" => Self::CreativeDissonance,
            "clarity_moment" => Self::ClarityMoment,
            "feedback" => Self::Feedback,
            _ => Self::Unknown,
        }
    }

    /// Appraisal weight per tag. Shocks always matter, noise rarely does,
    /// existential tags sit above the neutral 1.0.
    pub fn type_weight(&self) -> f32 {
        match self {
            Self::Shock => 1.5,
            Self::Noise => 0.5,
            Self::Idle => 0.2,
            Self::Recovery => 1.0,
            Self::Decay => 1.0,
            Self::Silence => 0.8,
            Self::SocialPresence => 0.9,
            Self::SocialConflict => 1.2,
            Self::SocialHarmony => 1.1,
            Self::CognitiveDoubt => 1.1,
            Self::CognitiveClarity => 1.0,
            Self::CognitiveConfusion => 1.1,
            Self::ExistentialVoid => 1.3,
            Self::ExistentialPurpose => 1.4,
            Self::ExistentialFinitude => 1.1,
            Self::Connection => 1.1,
            Self::Isolation => 1.0,
            Self::Insight => 1.2,
            Self::MeaningFound => 1.4,
            Self::Void => 1.3,
            Self::Acceptance => 0.9,
            _ => 1.0,
        }
    }

    /// Default intensity range `(min, max)` used by producers. The core
    /// clamps to [-1, 1] regardless of what producers send.
    pub fn intensity_range(&self) -> (f32, f32) {
        match self {
            Self::Noise => (-0.3, 0.3),
            Self::Decay => (-0.5, 0.0),
            Self::Recovery => (0.0, 0.5),
            Self::Shock => (-1.0, 1.0),
            Self::Idle => (0.0, 0.0),
            Self::Silence => (-0.4, 0.6),
            Self::SocialPresence => (-0.4, 0.4),
            Self::SocialConflict => (-0.6, 0.0),
            Self::SocialHarmony => (0.0, 0.6),
            Self::CognitiveDoubt => (-0.5, 0.0),
            Self::CognitiveClarity => (0.0, 0.5),
            Self::CognitiveConfusion => (-0.4, 0.0),
            Self::ExistentialVoid => (-0.7, 0.0),
            Self::ExistentialPurpose => (0.0, 0.7),
            Self::ExistentialFinitude => (-0.6, 0.0),
            Self::Connection => (0.0, 0.8),
            Self::Isolation => (-0.7, 0.0),
            Self::Insight => (0.0, 0.6),
            Self::Confusion => (-0.5, 0.0),
            Self::Curiosity => (-0.3, 0.4),
            Self::MeaningFound => (0.0, 0.9),
            Self::Void => (-0.8, 0.0),
            Self::Acceptance => (0.0, 0.5),
            _ => (-1.0, 1.0),
        }
    }

    /// Internal tags are minted by the runtime and never interpreted by the
    /// meaning pipeline the way environment tags are.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::ClarityMoment | Self::Feedback)
    }
}

/// Opaque key→value metadata attached to an event.
///
/// The core never inspects keys except the four accessors below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMetadata(pub Map<String, Value>);

impl EventMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set by synthetic producers such as the silence detector.
    pub fn detector_generated(&self) -> bool {
        self.0
            .get("detector_generated")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn is_comfortable(&self) -> Option<bool> {
        self.0.get("is_comfortable").and_then(Value::as_bool)
    }

    pub fn silence_duration(&self) -> Option<f64> {
        self.0.get("silence_duration").and_then(Value::as_f64)
    }

    pub fn clarity_id(&self) -> Option<u64> {
        self.0.get("clarity_id").and_then(Value::as_u64)
    }
}

/// An externally produced signal. Immutable after construction; consumed
/// once by the pipeline and referenced in memory by value copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub intensity: f32,
    pub timestamp: f64,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl Event {
    /// Build an event; intensity is clamped to [-1, 1] at the boundary.
    pub fn new(event_type: EventType, intensity: f32, timestamp: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            intensity: intensity.clamp(-1.0, 1.0),
            timestamp,
            metadata: EventMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}
