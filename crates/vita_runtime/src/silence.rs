//! Silence awareness: synthetic `silence` events after quiet stretches.
//!
//! The detector tracks the last real event, and once the quiet stretch
//! crosses the threshold it emits a rate-limited `silence` event. Longer
//! silences skew comfortable (positive intensity); short ones skew
//! disturbing. Detector events are marked `detector_generated` and do not
//! themselves end the silence.

use rand::Rng;
use serde::Serialize;
use vita_core::config::SilenceConfig;
use vita_core::{Event, EventMetadata, EventType};

/// Intensity band for comfortable silence.
const COMFORTABLE_SILENCE_MIN: f32 = 0.1;
const COMFORTABLE_SILENCE_MAX: f32 = 0.6;
/// Intensity band for disturbing silence.
const DISTURBING_SILENCE_MIN: f32 = -0.4;
const DISTURBING_SILENCE_MAX: f32 = -0.05;

/// Observable status of the detector.
#[derive(Debug, Clone, Serialize)]
pub struct SilenceStatus {
    pub last_event_timestamp: f64,
    pub current_silence_duration: f64,
    pub silence_events_generated: u64,
    pub total_silence_duration: f64,
    pub is_silence_active: bool,
    pub threshold_reached: bool,
}

#[derive(Debug)]
pub struct SilenceDetector {
    threshold_secs: f64,
    min_event_interval_secs: f64,
    check_interval_secs: f64,

    last_event_timestamp: f64,
    silence_start_timestamp: Option<f64>,
    silence_events_generated: u64,
    total_silence_duration: f64,
    last_check_timestamp: f64,
    /// None until the first silence event; rate limiting starts there.
    last_silence_event_timestamp: Option<f64>,
}

impl SilenceDetector {
    pub fn new(config: &SilenceConfig, now: f64) -> Self {
        Self {
            threshold_secs: config.threshold_secs,
            min_event_interval_secs: 3600.0 / f64::from(config.max_events_per_hour.max(1)),
            check_interval_secs: config.check_interval_secs,
            last_event_timestamp: now,
            silence_start_timestamp: None,
            silence_events_generated: 0,
            total_silence_duration: 0.0,
            last_check_timestamp: now,
            last_silence_event_timestamp: None,
        }
    }

    pub fn check_interval_secs(&self) -> f64 {
        self.check_interval_secs
    }

    /// Record a real event, ending any silence period in progress.
    pub fn update_last_event_time(&mut self, event_timestamp: f64) {
        self.last_event_timestamp = event_timestamp;
        if let Some(start) = self.silence_start_timestamp.take() {
            let duration = (event_timestamp - start).max(0.0);
            self.total_silence_duration += duration;
            tracing::debug!(duration, "silence period ended");
        }
    }

    /// Poll for a silence period worth announcing. Returns a `silence`
    /// event at most once per rate-limit window.
    pub fn check_silence_period(&mut self, now: f64) -> Option<Event> {
        if now - self.last_check_timestamp < self.check_interval_secs {
            return None;
        }
        self.last_check_timestamp = now;

        if let Some(last) = self.last_silence_event_timestamp {
            if now - last < self.min_event_interval_secs {
                return None;
            }
        }

        let quiet_for = now - self.last_event_timestamp;
        if quiet_for < self.threshold_secs {
            return None;
        }

        if self.silence_start_timestamp.is_none() {
            self.silence_start_timestamp = Some(self.last_event_timestamp + self.threshold_secs);
        }

        let event = self.generate_silence_event(quiet_for, now);
        self.last_silence_event_timestamp = Some(now);
        self.silence_events_generated += 1;
        tracing::debug!(
            silence_duration = quiet_for,
            intensity = event.intensity,
            total = self.silence_events_generated,
            "silence event generated"
        );
        Some(event)
    }

    /// Longer silences are more often comfortable: the agent settles into
    /// quiet rather than dreading it.
    fn generate_silence_event(&self, silence_duration: f64, now: f64) -> Event {
        let comfort_probability = (silence_duration / 300.0).min(0.7);
        let mut rng = rand::rng();
        let is_comfortable = rng.random::<f64>() < comfort_probability;

        let intensity = if is_comfortable {
            rng.random_range(COMFORTABLE_SILENCE_MIN..=COMFORTABLE_SILENCE_MAX)
        } else {
            rng.random_range(DISTURBING_SILENCE_MIN..=DISTURBING_SILENCE_MAX)
        };

        let mut metadata = EventMetadata::new();
        metadata.insert("silence_duration", serde_json::json!(silence_duration));
        metadata.insert("is_comfortable", serde_json::json!(is_comfortable));
        metadata.insert(
            "comfort_probability",
            serde_json::json!(comfort_probability),
        );
        metadata.insert("detector_generated", serde_json::json!(true));
        metadata.insert("source", serde_json::json!("silence_detector"));

        Event::new(EventType::Silence, intensity, now).with_metadata(metadata)
    }

    pub fn status(&self, now: f64) -> SilenceStatus {
        let current_silence_duration = match self.silence_start_timestamp {
            Some(start) => (now - start).max(0.0),
            None if now - self.last_event_timestamp >= self.threshold_secs => {
                now - self.last_event_timestamp
            }
            None => 0.0,
        };
        SilenceStatus {
            last_event_timestamp: self.last_event_timestamp,
            current_silence_duration,
            silence_events_generated: self.silence_events_generated,
            total_silence_duration: self.total_silence_duration,
            is_silence_active: current_silence_duration > 0.0,
            threshold_reached: current_silence_duration >= self.threshold_secs,
        }
    }

    pub fn reset(&mut self, now: f64) {
        self.last_event_timestamp = now;
        self.silence_start_timestamp = None;
        self.last_check_timestamp = now;
        self.last_silence_event_timestamp = None;
        tracing::debug!("silence detector reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SilenceConfig {
        SilenceConfig {
            enabled: true,
            threshold_secs: 30.0,
            max_events_per_hour: 12,
            check_interval_secs: 5.0,
        }
    }

    #[test]
    fn test_no_event_before_threshold() {
        let mut det = SilenceDetector::new(&config(), 0.0);
        assert!(det.check_silence_period(10.0).is_none());
        assert!(det.check_silence_period(29.0).is_none());
    }

    #[test]
    fn test_event_after_threshold() {
        let mut det = SilenceDetector::new(&config(), 0.0);
        let event = det.check_silence_period(31.0).expect("silence event");
        assert_eq!(event.event_type, EventType::Silence);
        assert!(event.metadata.detector_generated());
        assert!(event.metadata.silence_duration().expect("duration") >= 30.0);
        assert!(event.metadata.is_comfortable().is_some());
        assert!(event.intensity >= -0.4 && event.intensity <= 0.6);
        assert!(event.intensity != 0.0);
    }

    #[test]
    fn test_rate_limit_between_events() {
        let mut det = SilenceDetector::new(&config(), 0.0);
        assert!(det.check_silence_period(31.0).is_some());
        // 12/hour → one every 300 s; 200 s later is still limited
        assert!(det.check_silence_period(231.0).is_none());
        assert!(det.check_silence_period(332.0).is_some());
    }

    #[test]
    fn test_check_interval_gates_polling() {
        let mut det = SilenceDetector::new(&config(), 0.0);
        assert!(det.check_silence_period(31.0).is_some());
        // A poll 1 s after the previous one is skipped outright
        assert!(det.check_silence_period(32.0).is_none());
    }

    #[test]
    fn test_real_event_resets_silence() {
        let mut det = SilenceDetector::new(&config(), 0.0);
        assert!(det.check_silence_period(31.0).is_some());
        det.update_last_event_time(330.0);
        // Only 10 s of quiet since the real event
        assert!(det.check_silence_period(340.0).is_none());
        let status = det.status(340.0);
        assert!(status.total_silence_duration > 0.0);
    }

    #[test]
    fn test_status_reports_active_silence() {
        let mut det = SilenceDetector::new(&config(), 0.0);
        let early = det.status(10.0);
        assert!(!early.is_silence_active);
        det.check_silence_period(40.0);
        let later = det.status(70.0);
        assert!(later.is_silence_active);
        assert!(later.threshold_reached);
        assert_eq!(later.silence_events_generated, 1);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut det = SilenceDetector::new(&config(), 0.0);
        det.check_silence_period(31.0);
        det.reset(100.0);
        let status = det.status(100.0);
        assert!(!status.is_silence_active);
        // Rate limit is cleared too; next threshold crossing fires
        assert!(det.check_silence_period(140.0).is_some());
    }
}
