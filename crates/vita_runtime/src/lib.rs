pub mod action;
pub mod clarity;
pub mod queue;
pub mod restart;
pub mod runtime;
pub mod silence;
pub mod snapshot;

pub use action::ActionExecutor;
pub use clarity::ClarityMoments;
pub use queue::{EventQueue, QueueSnapshot, DEFAULT_QUEUE_CAPACITY};
pub use restart::{take_restart_marker, RestartPayload};
pub use runtime::{
    EventOutcome, Monitor, StopHandle, TickRuntime, CRASH_INTEGRITY_PENALTY, WEAKNESS_PENALTY_RATE,
    WEAKNESS_THRESHOLD,
};
pub use silence::{SilenceDetector, SilenceStatus};
pub use snapshot::{SnapshotError, SnapshotStore};
