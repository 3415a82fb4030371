//! Meditation state classification
//!
//! This module classifies a window of heart-rate samples into a discrete
//! physiological state:
//! - Window statistics (mean heart rate, successive-difference variability, trend)
//! - Rule evaluation in priority order (first match wins)
//!
//! Classification is pure. The caller owns the rolling window.

use crate::config::ClassifierThresholds;
use crate::error::CalmError;
use crate::types::{HeartRateSample, MeditationState, MeditationStateResult};

/// Stateless classifier parameterized by its thresholds
#[derive(Debug, Clone, Default)]
pub struct StateClassifier {
    thresholds: ClassifierThresholds,
}

impl StateClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    /// Classify a window of samples, oldest first.
    pub fn classify(&self, window: &[HeartRateSample]) -> MeditationStateResult {
        let t = &self.thresholds;

        if window.len() < t.min_samples {
            return MeditationStateResult::warming_up();
        }

        let recent = trailing(window, t.analysis_window);
        let heart_rates: Vec<f64> = recent.iter().map(|s| s.heart_rate).collect();

        let average_heart_rate = mean(&heart_rates);
        let heart_rate_variability = mean_abs_successive_difference(&heart_rates);
        let trend = compute_trend(&heart_rates, t.trend_block);

        let (state, confidence) = if average_heart_rate < t.deep_max_heart_rate
            && heart_rate_variability > t.deep_min_variability
            && trend.abs() < t.deep_max_abs_trend
        {
            (MeditationState::DeepMeditation, t.deep_confidence)
        } else if average_heart_rate < t.relaxed_max_heart_rate
            && heart_rate_variability > t.relaxed_min_variability
            && trend < 0.0
        {
            (MeditationState::Relaxed, t.relaxed_confidence)
        } else if average_heart_rate >= t.focused_min_heart_rate
            && average_heart_rate <= t.focused_max_heart_rate
            && trend.abs() < t.focused_max_abs_trend
        {
            (MeditationState::Focused, t.focused_confidence)
        } else if average_heart_rate > t.active_min_heart_rate || trend > t.active_min_trend {
            (MeditationState::Active, t.active_confidence)
        } else {
            (MeditationState::WarmingUp, 0.0)
        };

        MeditationStateResult {
            state,
            confidence,
            average_heart_rate,
            heart_rate_variability,
            trend,
        }
    }
}

/// Classify with the default thresholds
pub fn classify(window: &[HeartRateSample]) -> MeditationStateResult {
    StateClassifier::default().classify(window)
}

/// Classify a JSON array of samples and return the result as JSON.
///
/// # Example
/// ```ignore
/// let result = classify_json(r#"[{"heartRate": 62.0, "timestamp": 0}]"#)?;
/// ```
pub fn classify_json(window_json: &str) -> Result<String, CalmError> {
    let window: Vec<HeartRateSample> = serde_json::from_str(window_json)?;
    Ok(serde_json::to_string(&classify(&window))?)
}

fn trailing<T>(values: &[T], n: usize) -> &[T] {
    &values[values.len().saturating_sub(n)..]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean absolute difference between consecutive values
fn mean_abs_successive_difference(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let total: f64 = values.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    total / (values.len() - 1) as f64
}

/// Mean of the last `block` values minus the mean of the `block` values before them
fn compute_trend(values: &[f64], block: usize) -> f64 {
    let last = trailing(values, block * 2);
    if last.len() < block * 2 {
        return 0.0;
    }
    let (previous, latest) = last.split_at(block);
    mean(latest) - mean(previous)
}
