pub mod adaptation;
pub mod feedback;
pub mod learning;
pub mod store;

pub use adaptation::AdaptationManager;
pub use feedback::{FeedbackRecord, FeedbackTracker, PendingAction};
pub use learning::{LearningEngine, MemoryStats, TypeStats};
pub use store::MemoryStore;
