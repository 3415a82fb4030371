//! Live meditation monitoring
//!
//! This module ties the components together for a single active session:
//! samples (simulated or from a sensor adapter) → rolling window →
//! classifier → breathing guidance.

use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

use crate::classifier::StateClassifier;
use crate::config::CalmConfig;
use crate::guidance::guidance_for;
use crate::types::{
    BiometricReading, BreathingGuidance, HeartRateSample, MeditationState, MeditationStateResult,
};

/// Classification and guidance after one sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorUpdate {
    pub result: MeditationStateResult,
    pub guidance: BreathingGuidance,
    /// True when the state differs from the previous update
    pub state_changed: bool,
}

/// Stateful monitor owning the rolling sample window.
pub struct MeditationMonitor {
    classifier: StateClassifier,
    window: VecDeque<HeartRateSample>,
    window_size: usize,
    last_state: Option<MeditationState>,
}

impl Default for MeditationMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MeditationMonitor {
    /// Create a monitor with default settings
    pub fn new() -> Self {
        Self::with_config(&CalmConfig::default())
    }

    pub fn with_config(config: &CalmConfig) -> Self {
        Self {
            classifier: StateClassifier::new(config.classifier.clone()),
            window: VecDeque::with_capacity(config.window_size),
            window_size: config.window_size,
            last_state: None,
        }
    }

    /// Add a sample and reclassify
    pub fn push_sample(&mut self, sample: HeartRateSample) -> MonitorUpdate {
        self.window.push_back(sample);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }

        let result = self.classifier.classify(self.window.make_contiguous());
        let state_changed = self.last_state != Some(result.state);
        if state_changed {
            debug!(
                from = self.last_state.map(|s| s.as_str()).unwrap_or("none"),
                to = result.state.as_str(),
                confidence = result.confidence,
                "Meditation state changed"
            );
        }
        self.last_state = Some(result.state);

        MonitorUpdate {
            result,
            guidance: guidance_for(result.state),
            state_changed,
        }
    }

    /// Add a reading. Readings without a heart rate leave the window untouched.
    pub fn push_reading(&mut self, reading: &BiometricReading) -> Option<MonitorUpdate> {
        HeartRateSample::from_reading(reading).map(|sample| self.push_sample(sample))
    }

    /// Classification of the current window without adding a sample
    pub fn current(&self) -> MeditationStateResult {
        let samples: Vec<HeartRateSample> = self.window.iter().copied().collect();
        self.classifier.classify(&samples)
    }

    pub fn samples(&self) -> impl Iterator<Item = &HeartRateSample> {
        self.window.iter()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Drop all samples, e.g. when a new session starts
    pub fn reset(&mut self) {
        self.window.clear();
        self.last_state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReadingRanges;
    use crate::generator::ReadingSource;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_warms_up_before_ten_samples() {
        let mut monitor = MeditationMonitor::new();
        for i in 0..9 {
            let update = monitor.push_sample(HeartRateSample::new(70.0, i * 2000));
            assert_eq!(update.result.state, MeditationState::WarmingUp);
            assert_eq!(update.result.confidence, 0.0);
        }
        let update = monitor.push_sample(HeartRateSample::new(70.0, 18_000));
        assert_eq!(update.result.state, MeditationState::Focused);
        assert!(update.state_changed);
    }

    #[test]
    fn test_end_to_end_deep_meditation() {
        // Mean 60 bpm, successive-difference variability ~52, flat trend
        let pattern = [92.0, 28.0, 92.0, 28.0, 60.0];
        let mut monitor = MeditationMonitor::new();
        let mut last = None;
        for (i, hr) in pattern.iter().cycle().take(40).enumerate() {
            last = Some(monitor.push_sample(HeartRateSample::new(*hr, i as i64 * 2000)));
        }
        let update = last.unwrap();

        assert_eq!(update.result.state, MeditationState::DeepMeditation);
        assert_eq!(update.result.confidence, 85.0);
        assert_eq!(
            (
                update.guidance.inhale_seconds,
                update.guidance.hold_seconds,
                update.guidance.exhale_seconds
            ),
            (4, 7, 8)
        );
        assert_eq!(monitor.len(), 30);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut monitor = MeditationMonitor::new();
        for i in 0..100 {
            monitor.push_sample(HeartRateSample::new(95.0, i));
        }
        assert_eq!(monitor.len(), 30);
        assert_eq!(monitor.samples().next().unwrap().timestamp, 70);
        assert_eq!(monitor.current().state, MeditationState::Active);
    }

    #[test]
    fn test_state_changed_only_on_transitions() {
        let mut monitor = MeditationMonitor::new();
        let mut changes = 0;
        for i in 0..20 {
            if monitor.push_sample(HeartRateSample::new(72.0, i)).state_changed {
                changes += 1;
            }
        }
        // none -> warming-up, warming-up -> focused
        assert_eq!(changes, 2);
    }

    #[test]
    fn test_readings_without_heart_rate_are_ignored() {
        let mut monitor = MeditationMonitor::new();
        assert!(monitor.push_reading(&BiometricReading::at(Utc::now())).is_none());
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_simulated_readings_feed_classifier() {
        let mut source = ReadingSource::with_seed(ReadingRanges::default(), 3);
        let mut monitor = MeditationMonitor::new();

        let mut update = None;
        for _ in 0..30 {
            update = monitor.push_reading(&source.next_reading(Utc::now()));
        }
        let update = update.unwrap();
        assert!((60.0..=80.0).contains(&update.result.average_heart_rate));
        assert_eq!(update.guidance, guidance_for(update.result.state));
    }

    #[test]
    fn test_reset() {
        let mut monitor = MeditationMonitor::new();
        for i in 0..15 {
            monitor.push_sample(HeartRateSample::new(72.0, i));
        }
        monitor.reset();
        assert!(monitor.is_empty());
        assert_eq!(monitor.current(), MeditationStateResult::warming_up());
        assert!(monitor.push_sample(HeartRateSample::new(72.0, 0)).state_changed);
    }
}
