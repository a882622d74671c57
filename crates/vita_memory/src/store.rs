//! Memory log policy: append, activation retrieval, bounded retention.
//!
//! The log itself lives on `SelfState`; this module owns the policy around
//! it. Retention is a passive single pass with a per-call work cap, never a
//! full garbage collection, so a tick's cost stays flat even when the log
//! is at capacity.

use vita_core::config::MemoryConfig;
use vita_core::{EventType, MemoryEntry, SelfState};

#[derive(Debug, Clone)]
pub struct MemoryStore {
    pub max_entries: usize,
    pub archive_after_secs: f64,
    pub activation_limit: usize,
    pub retention_work_cap: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}

impl MemoryStore {
    pub fn from_config(cfg: &MemoryConfig) -> Self {
        Self {
            max_entries: cfg.max_entries.max(1),
            archive_after_secs: cfg.archive_after_secs,
            activation_limit: cfg.activation_limit,
            retention_work_cap: cfg.retention_work_cap.max(1),
        }
    }

    /// Append an entry and bump the per-type counter.
    pub fn append(&self, state: &mut SelfState, entry: MemoryEntry) {
        *state
            .memory_entries_by_type
            .entry(entry.event_type)
            .or_insert(0) += 1;
        state.memory.push(entry);
    }

    /// Activation retrieval: a small set of recent entries of the given
    /// type, ranked by weight (ties keep recency order).
    pub fn activate(&self, state: &SelfState, ty: EventType) -> Vec<MemoryEntry> {
        let mut matches: Vec<MemoryEntry> = state
            .memory
            .iter()
            .rev()
            .filter(|e| e.event_type == ty && !e.is_feedback())
            .take(self.activation_limit * 4)
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(self.activation_limit);
        matches
    }

    /// One bounded retention pass. When the log exceeds its cap, entries
    /// older than the archive age move to the archive first, then the
    /// lowest-weight entries, at most `retention_work_cap` moves per call.
    pub fn enforce_retention(&self, state: &mut SelfState, now: f64) {
        if state.memory.len() <= self.max_entries {
            return;
        }

        let mut moved = 0usize;
        while state.memory.len() > self.max_entries && moved < self.retention_work_cap {
            let idx = self
                .pick_archival_candidate(state, now)
                .unwrap_or(0);
            let entry = state.memory.remove(idx);
            state.memory_archive.push(entry);
            moved += 1;
        }

        // The archive is itself bounded: beyond the cap, oldest entries
        // are discarded outright.
        if state.memory_archive.len() > self.max_entries {
            let excess = state.memory_archive.len() - self.max_entries;
            state.memory_archive.drain(0..excess);
        }

        if moved > 0 {
            tracing::debug!(moved, remaining = state.memory.len(), "memory retention pass");
        }
    }

    /// Oldest over-age entry if any, else the global lowest-weight entry.
    fn pick_archival_candidate(&self, state: &SelfState, now: f64) -> Option<usize> {
        if let Some((idx, _)) = state
            .memory
            .iter()
            .enumerate()
            .find(|(_, e)| now - e.timestamp > self.archive_after_secs)
        {
            return Some(idx);
        }
        state
            .memory
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.weight
                    .partial_cmp(&b.weight)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, _)| idx)
    }
}
