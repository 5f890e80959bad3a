use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::LessonId;

/// Per-learner completion record.
///
/// The completed set only ever grows; there is no operation that removes a
/// lesson from it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressState {
    completed: BTreeSet<LessonId>,
    updated_at: Option<DateTime<Utc>>,
}

impl ProgressState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate progress from persisted storage.
    #[must_use]
    pub fn from_persisted(
        completed: impl IntoIterator<Item = LessonId>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            completed: completed.into_iter().collect(),
            updated_at,
        }
    }

    /// Record a completed lesson.
    ///
    /// Returns `false` (and leaves the state untouched, timestamp included)
    /// when the lesson was already completed.
    pub fn mark_complete(&mut self, lesson_id: LessonId, at: DateTime<Utc>) -> bool {
        if self.completed.insert(lesson_id) {
            self.updated_at = Some(at);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn is_completed(&self, lesson_id: &LessonId) -> bool {
        self.completed.contains(lesson_id)
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<LessonId> {
        &self.completed
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn marking_twice_equals_marking_once() {
        let id = LessonId::new("l1").unwrap();
        let mut once = ProgressState::new();
        assert!(once.mark_complete(id.clone(), fixed_now()));

        let mut twice = once.clone();
        assert!(!twice.mark_complete(id, fixed_now() + chrono::Duration::hours(1)));

        assert_eq!(once, twice);
    }

    #[test]
    fn serializes_as_sorted_set() {
        let state = ProgressState::from_persisted(
            [LessonId::new("b").unwrap(), LessonId::new("a").unwrap()],
            None,
        );
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"completed":["a","b"],"updated_at":null}"#);
        let back: ProgressState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
