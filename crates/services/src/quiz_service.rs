use std::sync::Arc;

use learn_core::Clock;
use learn_core::model::{AssessmentSettings, LessonId, LessonKind, Quiz};
use learn_core::quiz::{QuizEvent, QuizMode, QuizResult, QuizSession, QuizStep, ReviewItem};

use crate::error::{ProgressError, QuizServiceError};
use crate::progression_service::ProgressionService;

/// Drives quiz sessions with the service clock and reports finished quizzes
/// to the progression.
///
/// Sessions are owned by the caller; the service holds no per-quiz state.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    settings: AssessmentSettings,
    progression: Arc<ProgressionService>,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: AssessmentSettings,
        progression: Arc<ProgressionService>,
    ) -> Self {
        Self {
            clock,
            settings,
            progression,
        }
    }

    #[must_use]
    pub fn hint_delay(&self) -> std::time::Duration {
        self.settings.hint_dismiss_delay()
    }

    /// Open a quiz lesson. A quiz without questions is complete on open and
    /// its lesson is reported complete right away.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Progress` if the lesson is unknown, locked,
    /// or not a quiz, or if saving an immediate completion fails.
    pub async fn start(
        &self,
        lesson_id: &LessonId,
        mode: QuizMode,
    ) -> Result<QuizSession, QuizServiceError> {
        let lesson = self
            .progression
            .open_lesson_of_kind(lesson_id, LessonKind::Quiz)?;
        let empty = Quiz::default();
        let quiz = lesson.quiz().unwrap_or(&empty);
        let session = QuizSession::new(lesson.id.clone(), quiz, mode, &self.settings);
        tracing::debug!(
            lesson = %lesson_id,
            session = %session.id(),
            ?mode,
            questions = session.total_questions(),
            "quiz started"
        );
        if let Some(result) = session.result() {
            self.report_completion(&session, result).await?;
        }
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` when the selection is not accepted.
    pub fn select(
        &self,
        session: &mut QuizSession,
        option: impl Into<String>,
    ) -> Result<QuizStep, QuizServiceError> {
        self.apply(session, QuizEvent::Select(option.into()))
    }

    /// # Errors
    ///
    /// Never fails in practice; kept fallible for symmetry with other events.
    pub fn dismiss_hint(&self, session: &mut QuizSession) -> Result<QuizStep, QuizServiceError> {
        self.apply(session, QuizEvent::DismissHint)
    }

    /// Move past the answered question. When this finishes the quiz, the
    /// lesson is reported complete for a study quiz or a passed test quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` when the current question is not
    /// answered yet or the quiz is already complete. Returns
    /// `QuizServiceError::Progress` when the completion cannot be saved; the
    /// session is finished regardless and
    /// [`ProgressionService::persist`] retries the save.
    pub async fn advance(
        &self,
        session: &mut QuizSession,
    ) -> Result<QuizStep, QuizServiceError> {
        let step = self.apply(session, QuizEvent::Advance)?;
        if let QuizStep::Completed(result) = &step {
            self.report_completion(session, *result).await?;
        }
        Ok(step)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` unless a failed test-mode quiz is
    /// on its completion screen.
    pub fn restart(&self, session: &mut QuizSession) -> Result<QuizStep, QuizServiceError> {
        self.apply(session, QuizEvent::Restart)
    }

    #[must_use]
    pub fn review(&self, session: &QuizSession) -> Option<Vec<ReviewItem>> {
        session.review()
    }

    fn apply(
        &self,
        session: &mut QuizSession,
        event: QuizEvent,
    ) -> Result<QuizStep, QuizServiceError> {
        let label = event_label(&event);
        match session.apply(event, self.clock.now()) {
            Ok(step) => {
                tracing::debug!(
                    session = %session.id(),
                    question = session.current_index(),
                    event = label,
                    ?step,
                    "quiz transition"
                );
                Ok(step)
            }
            Err(err) => {
                tracing::debug!(
                    session = %session.id(),
                    event = label,
                    error = %err,
                    "quiz event rejected"
                );
                Err(err.into())
            }
        }
    }

    async fn report_completion(
        &self,
        session: &QuizSession,
        result: QuizResult,
    ) -> Result<(), ProgressError> {
        tracing::info!(
            lesson = %session.lesson_id(),
            mode = ?session.mode(),
            score = result.score,
            total = result.total,
            passed = result.passed,
            "quiz completed"
        );
        // A quiz with no questions has nothing to pass.
        let completes_lesson = match session.mode() {
            QuizMode::Study => true,
            QuizMode::Test => result.passed || result.total == 0,
        };
        if completes_lesson {
            self.progression.mark_complete(session.lesson_id()).await?;
        }
        Ok(())
    }
}

fn event_label(event: &QuizEvent) -> &'static str {
    match event {
        QuizEvent::Select(_) => "select",
        QuizEvent::DismissHint => "dismiss_hint",
        QuizEvent::Advance => "advance",
        QuizEvent::Restart => "restart",
    }
}
