//! Runtime configuration, loaded from TOML with env-var overrides.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VitaConfig {
    pub runtime: RuntimeConfig,
    pub queue: QueueConfig,
    pub feedback: FeedbackConfig,
    pub memory: MemoryConfig,
    pub learning: LearningConfig,
    pub adaptation: AdaptationConfig,
    pub silence: SilenceConfig,
    pub snapshots: SnapshotConfig,
}

impl VitaConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields. After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: VitaConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist or is invalid,
    /// return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VITA_TICK_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.runtime.tick_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("VITA_SNAPSHOT_PERIOD") {
            if let Ok(n) = v.parse() {
                self.runtime.snapshot_period = n;
            }
        }
        if let Ok(v) = std::env::var("VITA_SNAPSHOT_DIR") {
            self.snapshots.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VITA_QUEUE_CAPACITY") {
            if let Ok(n) = v.parse() {
                self.queue.capacity = n;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Target mean inter-tick interval, seconds.
    pub tick_interval_secs: f64,
    /// Snapshot every N ticks.
    pub snapshot_period: u64,
    /// Learning engine cadence, ticks.
    pub learning_period: u64,
    /// Adaptation manager cadence, ticks.
    pub adaptation_period: u64,
    pub disable_learning: bool,
    pub disable_adaptation: bool,
    pub disable_weakness_penalty: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 1.0,
            snapshot_period: 10,
            learning_period: 50,
            adaptation_period: 50,
            disable_learning: false,
            disable_adaptation: false,
            disable_weakness_penalty: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Ticks to wait before observing an action's consequences.
    pub observation_delay_ticks: u64,
    /// Pending actions older than this are dropped unobserved.
    pub max_wait_ticks: u64,
    pub max_pending_actions: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            observation_delay_ticks: 3,
            max_wait_ticks: 10,
            max_pending_actions: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub max_entries: usize,
    /// Entries older than this many seconds are archived first.
    pub archive_after_secs: f64,
    /// How many entries activation retrieval returns.
    pub activation_limit: usize,
    /// Per-invocation cap on archival moves, to keep ticks flat.
    pub retention_work_cap: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            archive_after_secs: 7.0 * 86_400.0,
            activation_limit: 5,
            retention_work_cap: 128,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Hard bound on any single parameter move per invocation.
    pub max_parameter_delta: f32,
    /// Moves smaller than this are skipped to avoid thrashing.
    pub min_parameter_delta: f32,
    /// How many trailing memory entries statistics are drawn from.
    pub history_window: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            max_parameter_delta: 0.01,
            min_parameter_delta: 0.001,
            history_window: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    pub max_adaptation_delta: f32,
    pub min_adaptation_delta: f32,
    pub history_window: usize,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            max_adaptation_delta: 0.01,
            min_adaptation_delta: 0.001,
            history_window: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SilenceConfig {
    pub enabled: bool,
    /// Seconds without events before silence registers.
    pub threshold_secs: f64,
    pub max_events_per_hour: u32,
    pub check_interval_secs: f64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_secs: 30.0,
            max_events_per_hour: 12,
            check_interval_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub dir: PathBuf,
    /// Snapshot generations retained on disk.
    pub keep: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/snapshots"),
            keep: 5,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = VitaConfig::default();
        assert_eq!(cfg.runtime.tick_interval_secs, 1.0);
        assert_eq!(cfg.runtime.snapshot_period, 10);
        assert_eq!(cfg.queue.capacity, 100);
        assert_eq!(cfg.feedback.observation_delay_ticks, 3);
        assert_eq!(cfg.memory.max_entries, 10_000);
        assert_eq!(cfg.learning.max_parameter_delta, 0.01);
        assert!(cfg.silence.enabled);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[runtime]
tick_interval_secs = 0.25
"#;
        let cfg: VitaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.runtime.tick_interval_secs, 0.25);
        // Defaults for unspecified fields
        assert_eq!(cfg.runtime.snapshot_period, 10);
        assert_eq!(cfg.queue.capacity, 100);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[runtime]
tick_interval_secs = 0.5
snapshot_period = 20
learning_period = 100
adaptation_period = 100
disable_learning = true
disable_weakness_penalty = true

[queue]
capacity = 512

[feedback]
observation_delay_ticks = 5
max_wait_ticks = 20
max_pending_actions = 64

[memory]
max_entries = 500
archive_after_secs = 3600.0
activation_limit = 3

[learning]
max_parameter_delta = 0.02
history_window = 50

[silence]
enabled = false
threshold_secs = 10.0

[snapshots]
dir = "tmp/snaps"
keep = 2
"#;
        let cfg: VitaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.runtime.snapshot_period, 20);
        assert!(cfg.runtime.disable_learning);
        assert!(!cfg.runtime.disable_adaptation);
        assert_eq!(cfg.queue.capacity, 512);
        assert_eq!(cfg.feedback.max_pending_actions, 64);
        assert_eq!(cfg.memory.max_entries, 500);
        assert_eq!(cfg.learning.max_parameter_delta, 0.02);
        assert!(!cfg.silence.enabled);
        assert_eq!(cfg.snapshots.dir, PathBuf::from("tmp/snaps"));
        assert_eq!(cfg.snapshots.keep, 2);
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("VITA_TICK_INTERVAL", "0.05");
        std::env::set_var("VITA_QUEUE_CAPACITY", "7");

        let mut cfg = VitaConfig::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.runtime.tick_interval_secs, 0.05);
        assert_eq!(cfg.queue.capacity, 7);

        std::env::remove_var("VITA_TICK_INTERVAL");
        std::env::remove_var("VITA_QUEUE_CAPACITY");

        // Nonexistent path returns defaults
        let cfg = VitaConfig::load_or_default("/nonexistent/vita.toml");
        assert_eq!(cfg.runtime.tick_interval_secs, 1.0);
    }
}
