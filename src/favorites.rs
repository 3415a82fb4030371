//! Favorites and feedback stores
//!
//! Both are thin wrappers around [`KeyedRepository`] keyed by session id.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::CalmError;
use crate::repository::KeyedRepository;
use crate::storage::KeyValueStore;
use crate::types::{FavoriteEntry, SessionFeedback};

pub const FAVORITES_STORAGE_KEY: &str = "meditation_favorites";
pub const FEEDBACK_STORAGE_KEY: &str = "meditation_feedback";

/// Sessions the user has starred
pub struct FavoritesStore<S> {
    entries: KeyedRepository<FavoriteEntry, S>,
}

impl<S: KeyValueStore> FavoritesStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            entries: KeyedRepository::open(store, FAVORITES_STORAGE_KEY),
        }
    }

    pub fn is_favorite(&self, session_id: &str) -> bool {
        self.entries.contains(session_id)
    }

    pub fn add_favorite(&mut self, session_id: &str) {
        self.add_favorite_at(session_id, Utc::now());
    }

    /// Star a session. Re-adding keeps the original timestamp.
    pub fn add_favorite_at(&mut self, session_id: &str, now: DateTime<Utc>) {
        if self.entries.contains(session_id) {
            return;
        }
        self.entries.upsert(FavoriteEntry {
            session_id: session_id.to_string(),
            added_at: now,
        });
    }

    pub fn remove_favorite(&mut self, session_id: &str) -> bool {
        self.entries.remove(session_id).is_some()
    }

    /// Flip the favorite flag; returns the new state
    pub fn toggle_favorite(&mut self, session_id: &str) -> bool {
        if self.remove_favorite(session_id) {
            debug!(session_id, "Removed favorite");
            false
        } else {
            self.add_favorite(session_id);
            debug!(session_id, "Added favorite");
            true
        }
    }

    /// Favorites, most recently added first
    pub fn favorites(&self) -> Vec<FavoriteEntry> {
        let mut favorites: Vec<FavoriteEntry> = self.entries.values().cloned().collect();
        favorites.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        favorites
    }
}

/// Per-session ratings
pub struct FeedbackStore<S> {
    entries: KeyedRepository<SessionFeedback, S>,
}

impl<S: KeyValueStore> FeedbackStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            entries: KeyedRepository::open(store, FEEDBACK_STORAGE_KEY),
        }
    }

    /// Record a 1-5 rating, replacing any earlier one for the session
    pub fn submit_feedback(
        &mut self,
        session_id: &str,
        rating: u8,
        comment: Option<String>,
    ) -> Result<SessionFeedback, CalmError> {
        self.submit_feedback_at(session_id, rating, comment, Utc::now())
    }

    pub fn submit_feedback_at(
        &mut self,
        session_id: &str,
        rating: u8,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SessionFeedback, CalmError> {
        if !(1..=5).contains(&rating) {
            return Err(CalmError::InvalidRating(rating));
        }
        let feedback = SessionFeedback {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            rating,
            comment: comment.filter(|c| !c.trim().is_empty()),
            submitted_at: now,
        };
        self.entries.upsert(feedback.clone());
        Ok(feedback)
    }

    pub fn feedback_for(&self, session_id: &str) -> Option<&SessionFeedback> {
        self.entries.get(session_id)
    }

    /// Mean rating across the given sessions that have feedback
    pub fn average_rating<'a, I>(&self, session_ids: I) -> Option<f64>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ratings: Vec<f64> = session_ids
            .into_iter()
            .filter_map(|id| self.entries.get(id))
            .map(|f| f64::from(f.rating))
            .collect();
        if ratings.is_empty() {
            return None;
        }
        Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
    }

    pub fn clear_feedback(&mut self, session_id: &str) {
        self.entries.remove(session_id);
    }

    pub fn all_feedback(&self) -> Vec<SessionFeedback> {
        self.entries.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_toggle_favorite() {
        let store = MemoryStore::new();
        let mut favorites = FavoritesStore::new(&store);

        assert!(favorites.toggle_favorite("s1"));
        assert!(favorites.is_favorite("s1"));
        assert!(!favorites.toggle_favorite("s1"));
        assert!(!favorites.is_favorite("s1"));
    }

    #[test]
    fn test_favorites_most_recent_first() {
        let store = MemoryStore::new();
        let mut favorites = FavoritesStore::new(&store);
        let base = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        favorites.add_favorite_at("a", base);
        favorites.add_favorite_at("b", base + Duration::hours(1));
        favorites.add_favorite_at("a", base + Duration::hours(2));

        let ids: Vec<String> = favorites.favorites().into_iter().map(|f| f.session_id).collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_favorites_persist() {
        let store = MemoryStore::new();
        FavoritesStore::new(&store).add_favorite("s9");
        assert!(FavoritesStore::new(&store).is_favorite("s9"));
    }

    #[test]
    fn test_feedback_rating_bounds() {
        let store = MemoryStore::new();
        let mut feedback = FeedbackStore::new(&store);

        assert!(matches!(
            feedback.submit_feedback("s1", 0, None),
            Err(CalmError::InvalidRating(0))
        ));
        assert!(matches!(
            feedback.submit_feedback("s1", 6, None),
            Err(CalmError::InvalidRating(6))
        ));
        assert!(feedback.feedback_for("s1").is_none());
    }

    #[test]
    fn test_feedback_replaces_and_averages() {
        let store = MemoryStore::new();
        let mut feedback = FeedbackStore::new(&store);

        feedback.submit_feedback("s1", 2, Some("  ".to_string())).unwrap();
        feedback.submit_feedback("s1", 5, Some("Lovely".to_string())).unwrap();
        feedback.submit_feedback("s2", 4, None).unwrap();

        let s1 = feedback.feedback_for("s1").unwrap();
        assert_eq!(s1.rating, 5);
        assert_eq!(s1.comment.as_deref(), Some("Lovely"));
        assert_eq!(feedback.average_rating(["s1", "s2", "s3"]), Some(4.5));
        assert_eq!(feedback.average_rating(["s3"]), None);

        feedback.clear_feedback("s1");
        assert_eq!(feedback.all_feedback().len(), 1);
    }

    #[test]
    fn test_stores_share_backend_without_collision() {
        let store = MemoryStore::new();
        let mut favorites = FavoritesStore::new(&store);
        let mut feedback = FeedbackStore::new(&store);

        favorites.add_favorite("s1");
        feedback.submit_feedback("s1", 3, None).unwrap();

        assert_eq!(store.len(), 2);
        assert!(FavoritesStore::new(&store).is_favorite("s1"));
        assert_eq!(FeedbackStore::new(&store).feedback_for("s1").unwrap().rating, 3);
    }
}
