pub mod config;
pub mod event;
pub mod meaning;
pub mod memory;
pub mod params;
pub mod state;

pub use config::VitaConfig;
pub use event::{Event, EventMetadata, EventType};
pub use meaning::{Impact, Meaning, MeaningEngine, ResponsePattern};
pub use memory::{FeedbackData, MemoryEntry};
pub use params::{
    AdaptationParams, LearningParams, ResponseCoefficients, DEFAULT_SENSITIVITY,
    DEFAULT_SIGNIFICANCE_THRESHOLD,
};
pub use state::{wall_now, Scalars, SelfState, ENERGY_MAX, RECENT_EVENTS_CAP};
