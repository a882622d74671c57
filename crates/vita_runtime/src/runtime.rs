//! The tick loop.
//!
//! One runtime owns the self-state and is its only mutator. Per tick it
//! accounts time, observes pending feedback, drains the queue through the
//! meaning pipeline, applies the weakness penalty, runs the cadenced
//! subsystems, invokes the monitor, and snapshots — then sleeps whatever is
//! left of the interval. The loop never exits on an internal failure; a
//! failed tick body costs integrity and the loop carries on. Only the stop
//! handle ends it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

use vita_core::{
    wall_now, Event, EventType, Impact, MeaningEngine, ResponsePattern, SelfState, VitaConfig,
};
use vita_memory::{
    AdaptationManager, FeedbackTracker, LearningEngine, MemoryStore, PendingAction,
};

use crate::action::ActionExecutor;
use crate::clarity::ClarityMoments;
use crate::queue::EventQueue;
use crate::snapshot::SnapshotStore;

/// Health floor below which the weakness penalty engages.
pub const WEAKNESS_THRESHOLD: f32 = 0.05;
/// Energy drain per second while weak; stability/integrity drain at twice
/// this rate.
pub const WEAKNESS_PENALTY_RATE: f32 = 0.02;
/// Integrity cost of a tick-body failure.
pub const CRASH_INTEGRITY_PENALTY: f32 = 0.05;

/// Opaque observer invoked once per tick with a read view of the state.
/// Must treat the state as read-only; panics are swallowed.
pub type Monitor = Box<dyn FnMut(&SelfState) + Send>;

/// What happened to one drained event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Zero significance or an ignore decision; nothing applied.
    Ignored,
    /// Impact applied and an action registered for feedback.
    Applied {
        pattern: ResponsePattern,
        action_id: String,
    },
    /// Clarity window activated.
    Clarity { clarity_id: Option<u64> },
    /// The pipeline failed on this event; integrity penalty applies.
    Errored { detail: String },
}

/// Cooperative stop switch. Checked once per tick, so stop latency is at
/// most one tick interval.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct TickRuntime {
    config: VitaConfig,
    state: Arc<RwLock<SelfState>>,
    queue: Arc<EventQueue>,
    engine: MeaningEngine,
    store: MemoryStore,
    tracker: FeedbackTracker,
    learning: LearningEngine,
    adaptation: AdaptationManager,
    snapshots: SnapshotStore,
    clarity: ClarityMoments,
    pending: Vec<PendingAction>,
    monitor: Option<Monitor>,
    stop: Arc<AtomicBool>,
    last_time: Option<f64>,
}

impl TickRuntime {
    pub fn new(mut config: VitaConfig, state: SelfState, queue: Arc<EventQueue>) -> Self {
        // Degenerate cadences would stall or panic the loop; floor them.
        config.runtime.snapshot_period = config.runtime.snapshot_period.max(1);
        config.runtime.learning_period = config.runtime.learning_period.max(1);
        config.runtime.adaptation_period = config.runtime.adaptation_period.max(1);
        if !config.runtime.tick_interval_secs.is_finite()
            || config.runtime.tick_interval_secs < 0.0
        {
            config.runtime.tick_interval_secs = 0.0;
        }
        let snapshots = SnapshotStore::new(config.snapshots.dir.clone(), config.snapshots.keep);
        Self {
            store: MemoryStore::from_config(&config.memory),
            tracker: FeedbackTracker::from_config(&config.feedback),
            learning: LearningEngine::from_config(&config.learning),
            adaptation: AdaptationManager::from_config(&config.adaptation),
            snapshots,
            config,
            state: Arc::new(RwLock::new(state)),
            queue,
            engine: MeaningEngine::new(),
            clarity: ClarityMoments::new(),
            pending: Vec::new(),
            monitor: None,
            stop: Arc::new(AtomicBool::new(false)),
            last_time: None,
        }
    }

    /// Shared read handle for observers. External readers must treat the
    /// state as read-only; all writes go through the tick core.
    pub fn state_handle(&self) -> Arc<RwLock<SelfState>> {
        Arc::clone(&self.state)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    pub fn queue(&self) -> Arc<EventQueue> {
        Arc::clone(&self.queue)
    }

    pub fn set_monitor(&mut self, monitor: impl FnMut(&SelfState) + Send + 'static) {
        self.monitor = Some(Box::new(monitor));
    }

    pub fn pending_action_count(&self) -> usize {
        self.pending.len()
    }

    /// The stable external read contract: a structurally consistent state
    /// document (see the snapshot format) readable from any thread.
    /// Writes from outside the tick core are forbidden; observers get this
    /// view plus `EventQueue::snapshot()` and nothing else.
    pub fn status_document(&self) -> serde_json::Value {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        crate::snapshot::state_document(&state)
    }

    /// Run until the stop handle fires. The sleep compensates for
    /// processing time to hold the mean inter-tick interval; under
    /// overload ticks slip with no catch-up burst.
    pub async fn run(mut self) -> Arc<RwLock<SelfState>> {
        tracing::info!(
            tick_interval = self.config.runtime.tick_interval_secs,
            snapshot_period = self.config.runtime.snapshot_period,
            "tick loop starting"
        );
        while !self.stop.load(Ordering::SeqCst) {
            let tick_started = Instant::now();
            self.tick_once();

            let interval = Duration::from_secs_f64(self.config.runtime.tick_interval_secs);
            let elapsed = tick_started.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        tracing::info!("tick loop stopped");
        self.state
    }

    /// Execute exactly one tick through the crash boundary. Public so
    /// operators and tests can drive the loop manually.
    pub fn tick_once(&mut self) {
        let now = wall_now();
        let dt = match self.last_time.replace(now) {
            Some(prev) => (now - prev).max(0.0),
            None => 0.0,
        };

        match catch_unwind(AssertUnwindSafe(|| self.tick_body(now, dt))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.penalize_crash(&format!("{e:#}")),
            Err(payload) => self.penalize_crash(&panic_message(&payload)),
        }
    }

    fn lock_state(&self) -> RwLockWriteGuard<'_, SelfState> {
        // A poisoned lock means a previous tick panicked mid-write; the
        // state is clamped on every mutation, so recover and continue.
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn tick_body(&mut self, now: f64, dt: f64) -> anyhow::Result<()> {
        let state_arc = Arc::clone(&self.state);
        let mut guard = state_arc.write().unwrap_or_else(|e| e.into_inner());
        let state = &mut *guard;

        // S0: time accounting
        state.advance(dt);

        // S1: observe consequences of past actions
        let records = self.tracker.observe(state, &mut self.pending, now);
        for record in &records {
            let entry = FeedbackTracker::feedback_entry(record, state.subjective_time);
            self.store.append(state, entry);
        }

        // S2: drain the queue, FIFO
        let batch = self.queue.pop_all();
        for event in batch {
            let outcome =
                catch_unwind(AssertUnwindSafe(|| self.process_event(state, &event, now)))
                    .unwrap_or_else(|payload| EventOutcome::Errored {
                        detail: panic_message(&payload),
                    });
            match outcome {
                EventOutcome::Errored { detail } => {
                    tracing::error!(event_type = event.event_type.as_str(), %detail, "event pipeline failed");
                    state.apply_delta(&Impact::new(0.0, 0.0, -CRASH_INTEGRITY_PENALTY));
                }
                EventOutcome::Applied { pattern, ref action_id } => {
                    tracing::trace!(
                        event_type = event.event_type.as_str(),
                        pattern = pattern.as_str(),
                        action_id = %action_id,
                        "event applied"
                    );
                }
                EventOutcome::Clarity { clarity_id } => {
                    tracing::debug!(?clarity_id, "clarity window opened");
                }
                EventOutcome::Ignored => {}
            }
        }

        // Clarity bookkeeping: count the window down, and check whether a
        // new moment should be announced (as a queue event, handled next
        // drain — the detector never mutates state directly).
        state.tick_clarity();
        if let Some(event) = self.clarity.check(state, now) {
            self.queue.push(event);
        }

        // S3: weakness penalty — staying alive at the floor still costs
        if !self.config.runtime.disable_weakness_penalty
            && (state.energy <= WEAKNESS_THRESHOLD
                || state.integrity <= WEAKNESS_THRESHOLD
                || state.stability <= WEAKNESS_THRESHOLD)
        {
            let penalty = WEAKNESS_PENALTY_RATE * dt as f32;
            state.apply_delta(&Impact::new(-penalty, -2.0 * penalty, -2.0 * penalty));
            tracing::trace!(penalty, energy = state.energy, "weakness penalty applied");
        }

        // S4: cadenced subsystems
        if !self.config.runtime.disable_learning
            && state.ticks % self.config.runtime.learning_period == 0
        {
            self.learning.run(state);
        }
        if !self.config.runtime.disable_adaptation
            && state.ticks % self.config.runtime.adaptation_period == 0
        {
            self.adaptation.run(state);
        }

        self.store.enforce_retention(state, now);

        // S5: monitor — read-only, failures swallowed
        if let Some(monitor) = self.monitor.as_mut() {
            let state_view = &*state;
            if catch_unwind(AssertUnwindSafe(|| monitor(state_view))).is_err() {
                tracing::warn!("monitor callback failed; ignoring");
            }
        }

        // S6: best-effort snapshot
        if state.ticks % self.config.runtime.snapshot_period == 0 {
            let queue_view = self.queue.snapshot();
            if let Err(e) = self.snapshots.save(state, &queue_view) {
                tracing::warn!(error = %e, "snapshot save failed; will retry next period");
            }
        }

        Ok(())
    }

    /// The per-event pipeline: meaning → activation → decision → action →
    /// feedback registration.
    fn process_event(&mut self, state: &mut SelfState, event: &Event, now: f64) -> EventOutcome {
        if event.event_type == EventType::ClarityMoment {
            ClarityMoments::apply(event, state);
            return EventOutcome::Clarity {
                clarity_id: event.metadata.clarity_id(),
            };
        }

        let meaning = self.engine.process(event, state);
        if meaning.significance <= 0.0 {
            return EventOutcome::Ignored;
        }

        state.activated_memory = self.store.activate(state, event.event_type);
        state.last_pattern = Some(meaning.pattern);
        if meaning.pattern == ResponsePattern::Ignore {
            return EventOutcome::Ignored;
        }

        let state_before = state.scalars();
        let action_id = ActionExecutor::execute(&self.store, state, event, &meaning, now);
        self.tracker.register(
            &mut self.pending,
            PendingAction {
                action_id: action_id.clone(),
                pattern: meaning.pattern,
                state_before,
                register_tick: state.ticks,
                register_time: now,
            },
        );
        state.record_event(event.event_type);
        state.last_significance = meaning.significance;
        state.last_event_intensity = event.intensity;

        EventOutcome::Applied {
            pattern: meaning.pattern,
            action_id,
        }
    }

    fn penalize_crash(&mut self, detail: &str) {
        tracing::error!(%detail, "tick body failed; applying integrity penalty");
        let mut state = self.lock_state();
        state.apply_delta(&Impact::new(0.0, 0.0, -CRASH_INTEGRITY_PENALTY));
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
