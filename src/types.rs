//! Core types for the Synheart Calm engine
//!
//! This module defines the data that flows between the components: raw
//! biometric readings, heart-rate samples, classification results, breathing
//! guidance, and the persisted per-session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CalmError;

/// A single heart-rate observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateSample {
    /// Heart rate (beats per minute)
    pub heart_rate: f64,
    /// Milliseconds since the Unix epoch or a monotonic clock
    pub timestamp: i64,
}

impl HeartRateSample {
    pub fn new(heart_rate: f64, timestamp: i64) -> Self {
        Self {
            heart_rate,
            timestamp,
        }
    }

    /// Extract a sample from a reading. Readings without a heart rate yield `None`.
    pub fn from_reading(reading: &BiometricReading) -> Option<Self> {
        reading.heart_rate.map(|heart_rate| Self {
            heart_rate,
            timestamp: reading.timestamp.timestamp_millis(),
        })
    }
}

/// Relative power per EEG band (percent of total).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BrainwaveBands {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Biometric reading as produced by a sensor adapter or the simulator.
///
/// Every metric is optional: real devices rarely report all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricReading {
    pub timestamp: DateTime<Utc>,
    /// Heart rate (bpm)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    /// Heart rate variability (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hrv: Option<f64>,
    /// Breaths per minute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breath_rate: Option<f64>,
    /// Stress score (0-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress_level: Option<f64>,
    /// Focus score (0-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brainwaves: Option<BrainwaveBands>,
}

impl BiometricReading {
    /// An empty reading observed at `timestamp`.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            heart_rate: None,
            hrv: None,
            breath_rate: None,
            stress_level: None,
            focus_score: None,
            brainwaves: None,
        }
    }
}

/// Discrete physiological state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeditationState {
    DeepMeditation,
    Relaxed,
    Focused,
    Active,
    #[default]
    WarmingUp,
}

impl MeditationState {
    pub const ALL: [MeditationState; 5] = [
        MeditationState::DeepMeditation,
        MeditationState::Relaxed,
        MeditationState::Focused,
        MeditationState::Active,
        MeditationState::WarmingUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeditationState::DeepMeditation => "deep-meditation",
            MeditationState::Relaxed => "relaxed",
            MeditationState::Focused => "focused",
            MeditationState::Active => "active",
            MeditationState::WarmingUp => "warming-up",
        }
    }
}

impl fmt::Display for MeditationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeditationState {
    type Err = CalmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        MeditationState::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| CalmError::ParseError(format!("unknown meditation state '{s}'")))
    }
}

/// Classification over a sample window. Never mutated once returned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeditationStateResult {
    pub state: MeditationState,
    /// Confidence (0-100)
    pub confidence: f64,
    /// Mean heart rate over the window (bpm)
    pub average_heart_rate: f64,
    /// Mean absolute successive difference of heart rate
    pub heart_rate_variability: f64,
    /// Mean of the last 5 readings minus mean of the 5 before; negative means falling
    pub trend: f64,
}

impl MeditationStateResult {
    /// Result reported while not enough samples have been collected.
    pub fn warming_up() -> Self {
        Self {
            state: MeditationState::WarmingUp,
            confidence: 0.0,
            average_heart_rate: 0.0,
            heart_rate_variability: 0.0,
            trend: 0.0,
        }
    }
}

/// Breathing cadence and coaching message for a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreathingGuidance {
    pub inhale_seconds: u32,
    pub hold_seconds: u32,
    pub exhale_seconds: u32,
    pub message: &'static str,
}

impl BreathingGuidance {
    /// Length of one full breath cycle in seconds
    pub fn cycle_seconds(&self) -> u32 {
        self.inhale_seconds + self.hold_seconds + self.exhale_seconds
    }
}

/// Saved playback position for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub session_id: String,
    pub current_position_seconds: f64,
    pub total_duration_seconds: f64,
    pub last_played_at: DateTime<Utc>,
    pub completed: bool,
}

impl SessionProgress {
    /// Fraction of the session already played (0.0 - 1.0)
    pub fn fraction_played(&self) -> f64 {
        if self.total_duration_seconds > 0.0 {
            (self.current_position_seconds / self.total_duration_seconds).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Lifecycle of a session's playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
    Abandoned,
}

/// Catalogue entry for a playable session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A session the user marked as favorite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEntry {
    pub session_id: String,
    pub added_at: DateTime<Utc>,
}

/// A user's rating of a session. One per session; resubmitting replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFeedback {
    pub id: Uuid,
    pub session_id: String,
    /// Rating from 1 to 5
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_state_labels_round_trip_through_from_str() {
        for state in MeditationState::ALL {
            assert_eq!(state.as_str().parse::<MeditationState>().unwrap(), state);
        }
        assert_eq!(
            "Deep_Meditation".parse::<MeditationState>().unwrap(),
            MeditationState::DeepMeditation
        );
        assert!("sleepy".parse::<MeditationState>().is_err());
    }

    #[test]
    fn test_state_serializes_kebab_case() {
        let json = serde_json::to_string(&MeditationState::DeepMeditation).unwrap();
        assert_eq!(json, "\"deep-meditation\"");
    }

    #[test]
    fn test_sample_from_reading() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let mut reading = BiometricReading::at(ts);
        assert!(HeartRateSample::from_reading(&reading).is_none());

        reading.heart_rate = Some(64.0);
        let sample = HeartRateSample::from_reading(&reading).unwrap();
        assert_eq!(sample.heart_rate, 64.0);
        assert_eq!(sample.timestamp, ts.timestamp_millis());
    }

    #[test]
    fn test_progress_serializes_iso_timestamp() {
        let progress = SessionProgress {
            session_id: "s1".to_string(),
            current_position_seconds: 35.0,
            total_duration_seconds: 600.0,
            last_played_at: Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap(),
            completed: false,
        };

        let value = serde_json::to_value(&progress).unwrap();
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["lastPlayedAt"], "2024-01-15T08:00:00Z");
    }
}
