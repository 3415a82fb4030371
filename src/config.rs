//! Engine configuration
//!
//! The classifier thresholds are heuristics rather than clinically derived
//! values, so every one of them is a tunable parameter. All structs accept
//! partial JSON; missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CalmError;

/// Samples required before the classifier leaves warm-up
pub const DEFAULT_MIN_SAMPLES: usize = 10;

/// Trailing samples the classifier analyses
pub const DEFAULT_ANALYSIS_WINDOW: usize = 30;

/// Default simulator tick interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 2000;

/// Storage key for session progress records
pub const PROGRESS_STORAGE_KEY: &str = "meditation_progress";

/// Thresholds and confidences used by the state classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Fewer samples than this yields warming-up with zero confidence
    pub min_samples: usize,
    /// Number of trailing samples analysed
    pub analysis_window: usize,
    /// Readings per trend block (trend compares the last two blocks)
    pub trend_block: usize,

    pub deep_max_heart_rate: f64,
    pub deep_min_variability: f64,
    pub deep_max_abs_trend: f64,
    pub deep_confidence: f64,

    pub relaxed_max_heart_rate: f64,
    pub relaxed_min_variability: f64,
    pub relaxed_confidence: f64,

    pub focused_min_heart_rate: f64,
    pub focused_max_heart_rate: f64,
    pub focused_max_abs_trend: f64,
    pub focused_confidence: f64,

    pub active_min_heart_rate: f64,
    pub active_min_trend: f64,
    pub active_confidence: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_SAMPLES,
            analysis_window: DEFAULT_ANALYSIS_WINDOW,
            trend_block: 5,
            deep_max_heart_rate: 65.0,
            deep_min_variability: 50.0,
            deep_max_abs_trend: 0.5,
            deep_confidence: 85.0,
            relaxed_max_heart_rate: 75.0,
            relaxed_min_variability: 40.0,
            relaxed_confidence: 75.0,
            focused_min_heart_rate: 65.0,
            focused_max_heart_rate: 80.0,
            focused_max_abs_trend: 1.0,
            focused_confidence: 70.0,
            active_min_heart_rate: 80.0,
            active_min_trend: 1.0,
            active_confidence: 65.0,
        }
    }
}

impl ClassifierThresholds {
    pub fn validate(&self) -> Result<(), CalmError> {
        if self.trend_block == 0 {
            return Err(CalmError::InvalidConfig(
                "trend_block must be greater than zero".to_string(),
            ));
        }
        if self.min_samples < self.trend_block * 2 {
            return Err(CalmError::InvalidConfig(format!(
                "min_samples ({}) must cover two trend blocks ({})",
                self.min_samples,
                self.trend_block * 2
            )));
        }
        if self.analysis_window < self.min_samples {
            return Err(CalmError::InvalidConfig(format!(
                "analysis_window ({}) must be at least min_samples ({})",
                self.analysis_window, self.min_samples
            )));
        }
        let confidences = [
            self.deep_confidence,
            self.relaxed_confidence,
            self.focused_confidence,
            self.active_confidence,
        ];
        if confidences.iter().any(|c| !(0.0..=100.0).contains(c)) {
            return Err(CalmError::InvalidConfig(
                "confidences must lie within 0-100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rules governing when a saved session is offered for resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressPolicy {
    /// Positions below this are not worth resuming
    pub min_resume_seconds: f64,
    /// Sessions played beyond this fraction are treated as finished
    pub max_resume_ratio: f64,
    /// Records untouched for longer than this are purged
    pub retention_days: i64,
    pub storage_key: String,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            min_resume_seconds: 30.0,
            max_resume_ratio: 0.90,
            retention_days: 30,
            storage_key: PROGRESS_STORAGE_KEY.to_string(),
        }
    }
}

impl ProgressPolicy {
    pub fn validate(&self) -> Result<(), CalmError> {
        if !(0.0..=1.0).contains(&self.max_resume_ratio) {
            return Err(CalmError::InvalidConfig(
                "max_resume_ratio must lie within 0-1".to_string(),
            ));
        }
        if self.min_resume_seconds <= 0.0 {
            return Err(CalmError::InvalidConfig(
                "min_resume_seconds must be positive".to_string(),
            ));
        }
        if self.retention_days <= 0 {
            return Err(CalmError::InvalidConfig(
                "retention_days must be positive".to_string(),
            ));
        }
        if self.storage_key.is_empty() {
            return Err(CalmError::InvalidConfig("storage_key is empty".to_string()));
        }
        Ok(())
    }
}

/// Closed interval used when randomizing a metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Physiologically plausible ranges for simulated readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingRanges {
    pub heart_rate: Range,
    pub hrv: Range,
    pub breath_rate: Range,
    pub stress_level: Range,
    pub focus_score: Range,
    pub delta: Range,
    pub theta: Range,
    pub alpha: Range,
    pub beta: Range,
    pub gamma: Range,
}

impl Default for ReadingRanges {
    fn default() -> Self {
        Self {
            heart_rate: Range::new(60.0, 80.0),
            hrv: Range::new(30.0, 70.0),
            breath_rate: Range::new(8.0, 16.0),
            stress_level: Range::new(10.0, 50.0),
            focus_score: Range::new(50.0, 90.0),
            delta: Range::new(10.0, 30.0),
            theta: Range::new(15.0, 35.0),
            alpha: Range::new(20.0, 40.0),
            beta: Range::new(10.0, 25.0),
            gamma: Range::new(5.0, 15.0),
        }
    }
}

impl ReadingRanges {
    fn all(&self) -> [(&'static str, Range); 10] {
        [
            ("heart_rate", self.heart_rate),
            ("hrv", self.hrv),
            ("breath_rate", self.breath_rate),
            ("stress_level", self.stress_level),
            ("focus_score", self.focus_score),
            ("delta", self.delta),
            ("theta", self.theta),
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("gamma", self.gamma),
        ]
    }

    pub fn validate(&self) -> Result<(), CalmError> {
        for (name, range) in self.all() {
            if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
                return Err(CalmError::InvalidConfig(format!(
                    "range for {name} is invalid ({} - {})",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

/// Simulator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub interval_ms: u64,
    pub ranges: ReadingRanges,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            ranges: ReadingRanges::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), CalmError> {
        if self.interval_ms == 0 {
            return Err(CalmError::InvalidConfig(
                "generator interval_ms must be greater than zero".to_string(),
            ));
        }
        self.ranges.validate()
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalmConfig {
    pub classifier: ClassifierThresholds,
    /// Samples retained by the rolling monitor
    pub window_size: usize,
    pub progress: ProgressPolicy,
    pub generator: GeneratorConfig,
}

impl Default for CalmConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierThresholds::default(),
            window_size: DEFAULT_ANALYSIS_WINDOW,
            progress: ProgressPolicy::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl CalmConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, CalmError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, CalmError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a JSON configuration file
    pub fn load(path: &Path) -> Result<Self, CalmError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CalmError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), CalmError> {
        self.classifier.validate()?;
        self.progress.validate()?;
        self.generator.validate()?;
        if self.window_size < self.classifier.min_samples {
            return Err(CalmError::InvalidConfig(format!(
                "window_size ({}) must be at least min_samples ({})",
                self.window_size, self.classifier.min_samples
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = CalmConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_size, 30);
        assert_eq!(config.progress.storage_key, "meditation_progress");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            CalmConfig::from_json(r#"{"classifier": {"deep_max_heart_rate": 62.0}}"#).unwrap();

        assert_eq!(config.classifier.deep_max_heart_rate, 62.0);
        assert_eq!(config.classifier.deep_min_variability, 50.0);
        assert_eq!(config.progress, ProgressPolicy::default());
    }

    #[test]
    fn test_json_round_trip() {
        let config = CalmConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(CalmConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_inconsistent_windows() {
        let result = CalmConfig::from_json(r#"{"classifier": {"min_samples": 4}}"#);
        assert!(matches!(result, Err(CalmError::InvalidConfig(_))));

        let result = CalmConfig::from_json(r#"{"window_size": 5}"#);
        assert!(matches!(result, Err(CalmError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_ranges_and_policy() {
        let result = CalmConfig::from_json(
            r#"{"generator": {"ranges": {"heart_rate": {"min": 90.0, "max": 60.0}}}}"#,
        );
        assert!(matches!(result, Err(CalmError::InvalidConfig(_))));

        let result = CalmConfig::from_json(r#"{"progress": {"max_resume_ratio": 1.5}}"#);
        assert!(matches!(result, Err(CalmError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = CalmConfig::load(Path::new("/nonexistent/calm.json"));
        assert!(matches!(result, Err(CalmError::InvalidConfig(_))));
    }
}
