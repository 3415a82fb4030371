//! Session progress tracking
//!
//! Records the playback position of each session so an interrupted session
//! can be resumed instead of restarting from zero.
//!
//! Per session the lifecycle is `NotStarted → InProgress → {Completed | Abandoned}`:
//! the first save creates the record, `mark_completed` is terminal for resume
//! purposes, and records idle past the retention period are purged by
//! [`ProgressTracker::cleanup_old_progress`].
//!
//! No operation here fails: missing ids read as "no progress" and storage
//! problems are logged by the underlying repository.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::ProgressPolicy;
use crate::repository::KeyedRepository;
use crate::storage::KeyValueStore;
use crate::types::{ProgressStatus, Session, SessionProgress};

/// Per-session playback progress backed by a key-value store
pub struct ProgressTracker<S> {
    records: KeyedRepository<SessionProgress, S>,
    policy: ProgressPolicy,
}

impl<S: KeyValueStore> ProgressTracker<S> {
    /// Create a tracker with the default resume policy
    pub fn new(store: S) -> Self {
        Self::with_policy(store, ProgressPolicy::default())
    }

    pub fn with_policy(store: S, policy: ProgressPolicy) -> Self {
        let records = KeyedRepository::open(store, policy.storage_key.clone());
        Self { records, policy }
    }

    /// Open the tracker at app startup, purging stale records first
    pub fn open(store: S, policy: ProgressPolicy) -> Self {
        let mut tracker = Self::with_policy(store, policy);
        tracker.cleanup_old_progress();
        tracker
    }

    pub fn policy(&self) -> &ProgressPolicy {
        &self.policy
    }

    /// Record the current playback position
    pub fn save_progress(
        &mut self,
        session_id: &str,
        current_time: f64,
        total_duration: f64,
        completed: bool,
    ) {
        self.save_progress_at(session_id, current_time, total_duration, completed, Utc::now());
    }

    /// Record the current playback position as of `now`.
    ///
    /// The position is clamped into `[0, total_duration]`. A session that was
    /// completed stays completed when saved again (e.g. on replay).
    pub fn save_progress_at(
        &mut self,
        session_id: &str,
        current_time: f64,
        total_duration: f64,
        completed: bool,
        now: DateTime<Utc>,
    ) {
        let total = sanitize(total_duration);
        let position = sanitize(current_time).min(total);
        let was_completed = self
            .records
            .get(session_id)
            .map(|p| p.completed)
            .unwrap_or(false);

        debug!(
            session_id,
            position,
            total,
            completed = completed || was_completed,
            "Saving session progress"
        );

        self.records.upsert(SessionProgress {
            session_id: session_id.to_string(),
            current_position_seconds: position,
            total_duration_seconds: total,
            last_played_at: now,
            completed: completed || was_completed,
        });
    }

    /// Saved progress for a session, if any
    pub fn get_progress(&self, session_id: &str) -> Option<SessionProgress> {
        self.records.get(session_id).cloned()
    }

    /// Position to resume from, or 0 when the session should start over
    pub fn get_resume_time(&self, session_id: &str) -> f64 {
        match self.records.get(session_id) {
            Some(progress) if self.is_resumable(progress) => progress.current_position_seconds,
            _ => 0.0,
        }
    }

    pub fn can_resume(&self, session_id: &str) -> bool {
        self.get_resume_time(session_id) > 0.0
    }

    /// Whether a record is far enough in to resume but not nearly finished
    pub fn is_resumable(&self, progress: &SessionProgress) -> bool {
        !progress.completed
            && progress.total_duration_seconds > 0.0
            && progress.current_position_seconds >= self.policy.min_resume_seconds
            && progress.current_position_seconds / progress.total_duration_seconds
                <= self.policy.max_resume_ratio
    }

    /// Mark a session as finished. Returns false if it has no saved progress.
    pub fn mark_completed(&mut self, session_id: &str) -> bool {
        self.mark_completed_at(session_id, Utc::now())
    }

    pub fn mark_completed_at(&mut self, session_id: &str, now: DateTime<Utc>) -> bool {
        let updated = self.records.update(session_id, |progress| {
            progress.current_position_seconds = progress.total_duration_seconds;
            progress.completed = true;
            progress.last_played_at = now;
        });
        if updated {
            info!(session_id, "Session completed");
        } else {
            debug!(session_id, "No progress to mark completed");
        }
        updated
    }

    /// Forget a session's progress. Absent ids are ignored.
    pub fn clear_progress(&mut self, session_id: &str) {
        if self.records.remove(session_id).is_some() {
            debug!(session_id, "Cleared session progress");
        }
    }

    /// Purge records not played within the retention period
    pub fn cleanup_old_progress(&mut self) -> usize {
        self.cleanup_old_progress_at(Utc::now())
    }

    pub fn cleanup_old_progress_at(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = self.retention_cutoff(now);
        let removed = self.records.retain(|p| p.last_played_at >= cutoff);
        if removed > 0 {
            info!(removed, remaining = self.records.len(), "Purged stale session progress");
        }
        removed
    }

    /// Lifecycle state of a session as of `now`
    pub fn status(&self, session_id: &str, now: DateTime<Utc>) -> ProgressStatus {
        match self.records.get(session_id) {
            None => ProgressStatus::NotStarted,
            Some(p) if p.completed => ProgressStatus::Completed,
            Some(p) if p.last_played_at < self.retention_cutoff(now) => ProgressStatus::Abandoned,
            Some(_) => ProgressStatus::InProgress,
        }
    }

    /// Sessions from `sessions` that have resumable, uncompleted progress
    pub fn get_incomplete_sessions<'a>(&self, sessions: &'a [Session]) -> Vec<&'a Session> {
        sessions
            .iter()
            .filter(|session| self.can_resume(&session.id))
            .collect()
    }

    /// Snapshot of every saved record, ordered by session id
    pub fn all_progress(&self) -> Vec<SessionProgress> {
        self.records.values().cloned().collect()
    }

    /// Percentage played (0-100), 0 when there is no record
    pub fn progress_percent(&self, session_id: &str) -> f64 {
        self.records
            .get(session_id)
            .map(|p| p.fraction_played() * 100.0)
            .unwrap_or(0.0)
    }

    fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.policy.retention_days)
    }
}

fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}
