use std::sync::Arc;

use learn_core::Clock;
use learn_core::exercise::{EvaluationTicket, ExerciseError, ExerciseSession, ExerciseStep};
use learn_core::model::{AssessmentOutcome, AssessmentSettings, LessonId, LessonKind};

use crate::ai::Tutor;
use crate::assessment::AssessmentMapper;
use crate::error::{AssessmentBusy, ExerciseServiceError, ProgressError};
use crate::progression_service::ProgressionService;

/// Verdict for one ticket, ready to be folded back into its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationReceipt {
    pub ticket: EvaluationTicket,
    pub outcome: AssessmentOutcome,
}

/// Runs the submit, evaluate, apply loop for exercise lessons.
///
/// The session is only borrowed around the synchronous steps, so a host can
/// reset or drop it while an evaluation is in flight; the late receipt is
/// then rejected as stale.
#[derive(Clone)]
pub struct ExerciseLoopService {
    clock: Clock,
    settings: AssessmentSettings,
    mapper: Arc<AssessmentMapper>,
    tutor: Arc<dyn Tutor>,
    progression: Arc<ProgressionService>,
}

impl ExerciseLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: AssessmentSettings,
        mapper: Arc<AssessmentMapper>,
        tutor: Arc<dyn Tutor>,
        progression: Arc<ProgressionService>,
    ) -> Self {
        Self {
            clock,
            settings,
            mapper,
            tutor,
            progression,
        }
    }

    /// Open an exercise lesson.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseServiceError::Progress` if the lesson is unknown,
    /// locked, or not an exercise.
    pub fn start(&self, lesson_id: &LessonId) -> Result<ExerciseSession, ExerciseServiceError> {
        let lesson = self
            .progression
            .open_lesson_of_kind(lesson_id, LessonKind::Exercise)?;
        let Some(spec) = lesson.exercise() else {
            return Err(ProgressError::WrongKind {
                lesson: lesson.id.clone(),
                expected: LessonKind::Exercise,
                actual: lesson.kind(),
            }
            .into());
        };
        let session = ExerciseSession::new(lesson.id.clone(), spec, &self.settings);
        tracing::debug!(
            lesson = %lesson_id,
            session = %session.id(),
            max_attempts = session.max_attempts(),
            "exercise started"
        );
        Ok(session)
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.mapper.is_configured()
    }

    /// Whether the submit affordance is enabled. A missing evaluator
    /// disables it without touching the attempt count.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseServiceError::ConfigurationMissing` or the session's
    /// `SubmitRejected` reason.
    pub fn submission_gate(&self, session: &ExerciseSession) -> Result<(), ExerciseServiceError> {
        if !self.is_configured() {
            return Err(ExerciseServiceError::ConfigurationMissing);
        }
        session.can_submit()?;
        Ok(())
    }

    /// Move the session to pending and hand out its ticket.
    ///
    /// # Errors
    ///
    /// Same as [`ExerciseLoopService::submission_gate`].
    pub fn begin(
        &self,
        session: &mut ExerciseSession,
    ) -> Result<EvaluationTicket, ExerciseServiceError> {
        self.submission_gate(session)?;
        let ticket = session.begin_submission(self.clock.now())?;
        tracing::debug!(
            session = %ticket.session_id,
            generation = ticket.generation,
            attempt = session.attempt_count() + 1,
            "exercise submitted"
        );
        Ok(ticket)
    }

    /// Ask the evaluator about a ticket. Evaluator failures come back as the
    /// fallback outcome.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentBusy` if the ticket's session already has an
    /// evaluation in flight.
    pub async fn evaluate(
        &self,
        ticket: EvaluationTicket,
    ) -> Result<EvaluationReceipt, AssessmentBusy> {
        let outcome = self
            .mapper
            .evaluate(ticket.session_id, &ticket.goal, &ticket.input)
            .await?;
        Ok(EvaluationReceipt { ticket, outcome })
    }

    /// Fold a receipt into its session. Stale receipts are logged and
    /// rejected without touching the session.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseServiceError::Exercise` for stale or duplicate receipts.
    pub fn apply(
        &self,
        session: &mut ExerciseSession,
        receipt: EvaluationReceipt,
    ) -> Result<ExerciseStep, ExerciseServiceError> {
        match session.apply_outcome(&receipt.ticket, receipt.outcome) {
            Ok(step) => {
                tracing::info!(
                    lesson = %session.lesson_id(),
                    session = %session.id(),
                    attempt = session.attempt_count(),
                    resolved = session.is_resolved(),
                    revealed = session.is_revealed(),
                    "exercise evaluated"
                );
                Ok(step)
            }
            Err(ExerciseError::StaleResult) => {
                tracing::debug!(
                    session = %receipt.ticket.session_id,
                    generation = receipt.ticket.generation,
                    "dropping stale evaluation result"
                );
                Err(ExerciseError::StaleResult.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Submit the current draft and wait for the verdict.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseServiceError` when submission is disabled or the
    /// session is busy.
    pub async fn submit(
        &self,
        session: &mut ExerciseSession,
    ) -> Result<ExerciseStep, ExerciseServiceError> {
        let ticket = self.begin(session)?;
        match self.evaluate(ticket.clone()).await {
            Ok(receipt) => self.apply(session, receipt),
            Err(busy) => {
                session.cancel_submission(&ticket)?;
                Err(busy.into())
            }
        }
    }

    pub fn reset(&self, session: &mut ExerciseSession) {
        session.reset();
        tracing::debug!(
            session = %session.id(),
            generation = session.generation(),
            "exercise reset"
        );
    }

    /// Escalate a revealed exercise to the conversational tutor.
    ///
    /// With no `query` the seed's opening question is sent.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseServiceError::Exercise` unless the exercise is revealed
    /// and unsolved, and `ExerciseServiceError::Tutor` when the tutor fails.
    pub async fn escalate(
        &self,
        session: &ExerciseSession,
        query: Option<&str>,
    ) -> Result<String, ExerciseServiceError> {
        let seed = session
            .tutor_seed()
            .ok_or(ExerciseServiceError::Exercise(ExerciseError::ExitUnavailable))?;
        let query = query.unwrap_or(&seed.opening_query);
        tracing::info!(
            lesson = %session.lesson_id(),
            turns = seed.history.len(),
            "escalating to tutor"
        );
        self.tutor
            .respond(&seed.lesson_context, &seed.history, query)
            .await
            .map_err(|err| {
                tracing::warn!(lesson = %session.lesson_id(), error = %err, "tutor request failed");
                ExerciseServiceError::Tutor(err)
            })
    }

    /// Leave through the completion exit and mark the lesson complete.
    /// Returns whether the exercise was actually solved.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseServiceError::Exercise` unless the exercise is solved
    /// or revealed, and `ExerciseServiceError::Progress` if saving fails.
    pub async fn finish(
        &self,
        session: &mut ExerciseSession,
    ) -> Result<bool, ExerciseServiceError> {
        let solved = session.accept_completion()?;
        self.progression.mark_complete(session.lesson_id()).await?;
        Ok(solved)
    }
}
