use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use learn_core::Clock;
use learn_core::model::{Curriculum, Lesson, LessonId, LessonKind, ModuleId, ProgressState};
use learn_core::progression::{CurriculumProgress, ModuleStatus, ProgressionTracker};
use storage::repository::{ContentProvider, ProgressKey, ProgressRepository};

use crate::error::ProgressError;

/// One row of the curriculum overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOverview {
    pub id: ModuleId,
    pub title: String,
    pub status: ModuleStatus,
    pub completed_lessons: usize,
    pub total_lessons: usize,
}

/// Owns a learner's progression and writes it through to persistence.
pub struct ProgressionService {
    clock: Clock,
    repo: Arc<dyn ProgressRepository>,
    key: ProgressKey,
    tracker: Mutex<ProgressionTracker>,
}

impl ProgressionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        repo: Arc<dyn ProgressRepository>,
        key: ProgressKey,
        tracker: ProgressionTracker,
    ) -> Self {
        Self {
            clock,
            repo,
            key,
            tracker: Mutex::new(tracker),
        }
    }

    /// Load the curriculum and the learner's stored progress.
    ///
    /// Never fails: unreadable content yields an empty curriculum, and
    /// missing or unreadable progress yields an empty completed set. Both
    /// are logged.
    pub async fn load(
        clock: Clock,
        repo: Arc<dyn ProgressRepository>,
        content: &dyn ContentProvider,
        key: ProgressKey,
    ) -> Self {
        let curriculum = match content.modules().await {
            Ok(modules) => Curriculum::new(modules).unwrap_or_else(|err| {
                tracing::error!(error = %err, "curriculum is invalid; starting empty");
                Curriculum::empty()
            }),
            Err(err) => {
                tracing::error!(error = %err, "failed to load curriculum; starting empty");
                Curriculum::empty()
            }
        };

        let progress = match repo.load_progress(&key).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::info!(learner = %key, "no stored progress; starting fresh");
                ProgressState::new()
            }
            Err(err) => {
                tracing::warn!(
                    learner = %key,
                    error = %err,
                    "failed to load progress; starting fresh"
                );
                ProgressState::new()
            }
        };

        tracing::debug!(
            learner = %key,
            modules = curriculum.modules().len(),
            completed = progress.completed_count(),
            "progression loaded"
        );
        Self::new(clock, repo, key, ProgressionTracker::new(curriculum, progress))
    }

    fn tracker(&self) -> MutexGuard<'_, ProgressionTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn key(&self) -> &ProgressKey {
        &self.key
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn lesson(&self, lesson_id: &LessonId) -> Option<Lesson> {
        self.tracker().curriculum().lesson(lesson_id).cloned()
    }

    #[must_use]
    pub fn is_lesson_unlocked(&self, lesson_id: &LessonId) -> bool {
        self.tracker().is_lesson_unlocked(lesson_id)
    }

    #[must_use]
    pub fn is_completed(&self, lesson_id: &LessonId) -> bool {
        self.tracker().is_completed(lesson_id)
    }

    #[must_use]
    pub fn module_statuses(&self) -> Vec<ModuleStatus> {
        self.tracker().module_statuses()
    }

    #[must_use]
    pub fn overview(&self) -> Vec<ModuleOverview> {
        let tracker = self.tracker();
        tracker
            .curriculum()
            .modules()
            .iter()
            .zip(tracker.module_statuses())
            .map(|(module, status)| ModuleOverview {
                id: module.id.clone(),
                title: module.title.clone(),
                status,
                completed_lessons: module
                    .lesson_ids()
                    .filter(|id| tracker.is_completed(id))
                    .count(),
                total_lessons: module.lessons.len(),
            })
            .collect()
    }

    #[must_use]
    pub fn progress(&self) -> CurriculumProgress {
        self.tracker().progress()
    }

    #[must_use]
    pub fn next_lesson(&self) -> Option<Lesson> {
        self.tracker().next_lesson().cloned()
    }

    /// Open a lesson, making its module the active one.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownLesson` or `ProgressError::LessonLocked`.
    pub fn open_lesson(&self, lesson_id: &LessonId) -> Result<Lesson, ProgressError> {
        self.open(lesson_id, None)
    }

    /// Open a lesson that must be of the given kind.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressionService::open_lesson`], plus
    /// `ProgressError::WrongKind`.
    pub fn open_lesson_of_kind(
        &self,
        lesson_id: &LessonId,
        expected: LessonKind,
    ) -> Result<Lesson, ProgressError> {
        self.open(lesson_id, Some(expected))
    }

    fn open(
        &self,
        lesson_id: &LessonId,
        expected: Option<LessonKind>,
    ) -> Result<Lesson, ProgressError> {
        let mut tracker = self.tracker();
        let lesson = tracker
            .curriculum()
            .lesson(lesson_id)
            .cloned()
            .ok_or_else(|| ProgressError::UnknownLesson(lesson_id.clone()))?;
        if !tracker.is_lesson_unlocked(lesson_id) {
            return Err(ProgressError::LessonLocked(lesson_id.clone()));
        }
        if let Some(expected) = expected.filter(|kind| *kind != lesson.kind()) {
            return Err(ProgressError::WrongKind {
                lesson: lesson_id.clone(),
                expected,
                actual: lesson.kind(),
            });
        }
        tracker.set_active_lesson(Some(lesson_id.clone()));
        tracing::debug!(lesson = %lesson_id, "lesson opened");
        Ok(lesson)
    }

    pub fn close_lesson(&self) {
        self.tracker().set_active_lesson(None);
    }

    /// Mark a lesson complete and persist if anything changed.
    ///
    /// Returns whether the completed set grew. The in-memory state keeps the
    /// change even when saving fails; [`ProgressionService::persist`] retries.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownLesson` for lessons outside the
    /// curriculum and `ProgressError::Storage` when the save fails.
    pub async fn mark_complete(&self, lesson_id: &LessonId) -> Result<bool, ProgressError> {
        let state = {
            let mut tracker = self.tracker();
            if tracker.curriculum().lesson(lesson_id).is_none() {
                return Err(ProgressError::UnknownLesson(lesson_id.clone()));
            }
            if !tracker.mark_complete(lesson_id.clone(), self.clock.now()) {
                return Ok(false);
            }
            tracker.progress_state().clone()
        };

        tracing::info!(learner = %self.key, lesson = %lesson_id, "lesson completed");
        self.save(&state).await?;
        Ok(true)
    }

    /// Write the current state to persistence.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` when the save fails.
    pub async fn persist(&self) -> Result<(), ProgressError> {
        let state = self.tracker().progress_state().clone();
        self.save(&state).await
    }

    async fn save(&self, state: &ProgressState) -> Result<(), ProgressError> {
        self.repo.save_progress(&self.key, state).await.map_err(|err| {
            tracing::warn!(learner = %self.key, error = %err, "failed to save progress");
            ProgressError::from(err)
        })
    }
}
