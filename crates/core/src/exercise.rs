//! Free-form exercise loop judged by an external evaluator.
//!
//! The session never talks to the evaluator itself. `begin_submission` hands
//! out an [`EvaluationTicket`], the services layer resolves it, and
//! `apply_outcome` folds the verdict back in. Tickets carry the session id and
//! a generation counter so a verdict that arrives after a reset, or for a
//! session that has since been replaced, is detected and dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{
    AssessmentOutcome, AssessmentSettings, ChatTurn, ExerciseSpec, LessonId, SessionId,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Why the submit affordance is disabled.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmitRejected {
    #[error("an evaluation is already pending")]
    Pending,

    #[error("exercise already solved")]
    Resolved,

    #[error("attempts exhausted; reset to try again")]
    Revealed,

    #[error("draft is empty")]
    EmptyDraft,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExerciseError {
    #[error(transparent)]
    Rejected(#[from] SubmitRejected),

    #[error("result belongs to a discarded session or an earlier generation")]
    StaleResult,

    #[error("no evaluation is pending")]
    NothingPending,

    #[error("exit is only available once the exercise is solved or revealed")]
    ExitUnavailable,
}

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseStatus {
    Drafting,
    Pending,
    Evaluated,
}

/// One incorrect submission and the feedback it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub input: String,
    pub feedback: String,
    pub submitted_at: DateTime<Utc>,
}

/// Claim on exactly one evaluator verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationTicket {
    pub session_id: SessionId,
    pub generation: u64,
    pub goal: String,
    pub input: String,
    pub submitted_at: DateTime<Utc>,
}

/// Static guidance shown once attempts are exhausted. Independent of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealGuidance {
    pub approach: &'static [&'static str],
    pub hint: &'static str,
}

pub const REVEAL_GUIDANCE: RevealGuidance = RevealGuidance {
    approach: &[
        "Restate the goal in your own words.",
        "Break it into the smallest steps you can check one at a time.",
        "Write the simplest version that works, then refine it.",
        "Compare your result against every requirement in the goal.",
    ],
    hint: "Re-read the feedback on your attempts: it usually points at the one requirement that is still missing.",
};

/// Exits offered after the guided reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealExit {
    Reset,
    AskTutor,
    AcceptCompletion,
}

/// Context handed to the conversational tutor on escalation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorSeed {
    pub lesson_context: String,
    pub history: Vec<ChatTurn>,
    pub opening_query: String,
}

#[derive(Debug, Clone)]
pub enum ExerciseEvent {
    EditDraft(String),
    Submit { now: DateTime<Utc> },
    Evaluated {
        ticket: EvaluationTicket,
        outcome: AssessmentOutcome,
    },
    Reset,
    AcceptCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExerciseStep {
    DraftUpdated,
    Submitted(EvaluationTicket),
    Resolved { feedback: String },
    Retry { attempt: u32, feedback: String },
    Revealed { feedback: String },
    Reset,
    Completed { solved: bool },
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Transient run of one exercise lesson.
#[derive(Debug, Clone)]
pub struct ExerciseSession {
    id: SessionId,
    lesson_id: LessonId,
    goal: String,
    max_attempts: u32,
    draft: String,
    attempt_count: u32,
    history: Vec<AttemptRecord>,
    revealed: bool,
    resolved: bool,
    finished: bool,
    status: ExerciseStatus,
    generation: u64,
    pending: Option<EvaluationTicket>,
    last_feedback: Option<String>,
}

impl ExerciseSession {
    #[must_use]
    pub fn new(lesson_id: LessonId, spec: &ExerciseSpec, settings: &AssessmentSettings) -> Self {
        Self {
            id: SessionId::random(),
            lesson_id,
            goal: spec.goal.clone(),
            max_attempts: spec
                .max_attempts
                .filter(|limit| *limit > 0)
                .unwrap_or(settings.exercise_max_attempts()),
            draft: String::new(),
            attempt_count: 0,
            history: Vec::new(),
            revealed: false,
            resolved: false,
            finished: false,
            status: ExerciseStatus::Drafting,
            generation: 0,
            pending: None,
            last_feedback: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn lesson_id(&self) -> &LessonId {
        &self.lesson_id
    }

    #[must_use]
    pub fn goal(&self) -> &str {
        &self.goal
    }

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    #[must_use]
    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    /// Collapsible transcript; only offered once there is more than one attempt.
    #[must_use]
    pub fn transcript(&self) -> Option<&[AttemptRecord]> {
        (self.history.len() > 1).then_some(self.history.as_slice())
    }

    #[must_use]
    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// True once the learner left through a completion exit.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn status(&self) -> ExerciseStatus {
        self.status
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn last_feedback(&self) -> Option<&str> {
        self.last_feedback.as_deref()
    }

    /// Guidance block, once attempts are exhausted without a solution.
    #[must_use]
    pub fn guidance(&self) -> Option<&'static RevealGuidance> {
        (self.revealed && !self.resolved).then_some(&REVEAL_GUIDANCE)
    }

    #[must_use]
    pub fn available_exits(&self) -> &'static [RevealExit] {
        if self.revealed && !self.resolved {
            &[
                RevealExit::Reset,
                RevealExit::AskTutor,
                RevealExit::AcceptCompletion,
            ]
        } else {
            &[]
        }
    }

    /// Whether the submit affordance is enabled, and why not.
    ///
    /// # Errors
    ///
    /// Returns the `SubmitRejected` reason when submission is disabled.
    pub fn can_submit(&self) -> Result<(), SubmitRejected> {
        if self.pending.is_some() {
            return Err(SubmitRejected::Pending);
        }
        if self.resolved {
            return Err(SubmitRejected::Resolved);
        }
        if self.revealed {
            return Err(SubmitRejected::Revealed);
        }
        if self.draft.trim().is_empty() {
            return Err(SubmitRejected::EmptyDraft);
        }
        Ok(())
    }

    /// Replace the draft text. Edits are allowed at any time.
    pub fn edit_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Move to `Pending` and hand out the ticket for this submission.
    ///
    /// # Errors
    ///
    /// Returns `SubmitRejected` when submission is disabled.
    pub fn begin_submission(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<EvaluationTicket, SubmitRejected> {
        self.can_submit()?;

        let ticket = EvaluationTicket {
            session_id: self.id,
            generation: self.generation,
            goal: self.goal.clone(),
            input: self.draft.clone(),
            submitted_at: now,
        };
        self.pending = Some(ticket.clone());
        self.status = ExerciseStatus::Pending;
        Ok(ticket)
    }

    /// Fold an evaluator verdict into the session.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::StaleResult` if the ticket was issued by another
    /// session or before a reset, and `ExerciseError::NothingPending` if the
    /// verdict for this ticket was already applied.
    pub fn apply_outcome(
        &mut self,
        ticket: &EvaluationTicket,
        outcome: AssessmentOutcome,
    ) -> Result<ExerciseStep, ExerciseError> {
        if ticket.session_id != self.id || ticket.generation != self.generation {
            return Err(ExerciseError::StaleResult);
        }
        match &self.pending {
            Some(pending) if pending == ticket => {}
            _ => return Err(ExerciseError::NothingPending),
        }

        self.pending = None;
        self.status = ExerciseStatus::Evaluated;
        self.last_feedback = Some(outcome.feedback.clone());

        if outcome.is_correct {
            self.resolved = true;
            return Ok(ExerciseStep::Resolved {
                feedback: outcome.feedback,
            });
        }

        self.attempt_count += 1;
        self.history.push(AttemptRecord {
            attempt: self.attempt_count,
            input: ticket.input.clone(),
            feedback: outcome.feedback.clone(),
            submitted_at: ticket.submitted_at,
        });
        self.status = ExerciseStatus::Drafting;

        if self.attempt_count >= self.max_attempts {
            self.revealed = true;
            Ok(ExerciseStep::Revealed {
                feedback: outcome.feedback,
            })
        } else {
            Ok(ExerciseStep::Retry {
                attempt: self.attempt_count,
                feedback: outcome.feedback,
            })
        }
    }

    /// Withdraw a pending submission without counting an attempt.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::StaleResult` for a foreign or outdated ticket
    /// and `ExerciseError::NothingPending` if the ticket is not pending.
    pub fn cancel_submission(&mut self, ticket: &EvaluationTicket) -> Result<(), ExerciseError> {
        if ticket.session_id != self.id || ticket.generation != self.generation {
            return Err(ExerciseError::StaleResult);
        }
        if self.pending.as_ref() != Some(ticket) {
            return Err(ExerciseError::NothingPending);
        }
        self.pending = None;
        self.status = ExerciseStatus::Drafting;
        Ok(())
    }

    /// Start over with a clean slate. Any pending verdict becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.draft.clear();
        self.attempt_count = 0;
        self.history.clear();
        self.revealed = false;
        self.resolved = false;
        self.finished = false;
        self.status = ExerciseStatus::Drafting;
        self.pending = None;
        self.last_feedback = None;
    }

    /// Leave the exercise through a completion exit.
    ///
    /// Returns whether the exercise was actually solved.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::ExitUnavailable` unless the exercise is solved
    /// or its guidance has been revealed.
    pub fn accept_completion(&mut self) -> Result<bool, ExerciseError> {
        if !self.resolved && !self.revealed {
            return Err(ExerciseError::ExitUnavailable);
        }
        self.finished = true;
        Ok(self.resolved)
    }

    /// Context for escalating to the tutor after the reveal.
    #[must_use]
    pub fn tutor_seed(&self) -> Option<TutorSeed> {
        if !self.revealed || self.resolved {
            return None;
        }

        let mut history = Vec::with_capacity(self.history.len() * 2);
        for record in &self.history {
            history.push(ChatTurn::user(record.input.clone()));
            history.push(ChatTurn::assistant(record.feedback.clone()));
        }

        Some(TutorSeed {
            lesson_context: format!("Exercise goal: {}", self.goal),
            history,
            opening_query: format!(
                "I used all {} attempts on this exercise without solving it. \
                 Can you walk me through how to approach it?",
                self.max_attempts
            ),
        })
    }

    /// Apply one event in place.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError` when the event is not valid in the current state.
    pub fn apply(&mut self, event: ExerciseEvent) -> Result<ExerciseStep, ExerciseError> {
        match event {
            ExerciseEvent::EditDraft(text) => {
                self.edit_draft(text);
                Ok(ExerciseStep::DraftUpdated)
            }
            ExerciseEvent::Submit { now } => {
                Ok(ExerciseStep::Submitted(self.begin_submission(now)?))
            }
            ExerciseEvent::Evaluated { ticket, outcome } => self.apply_outcome(&ticket, outcome),
            ExerciseEvent::Reset => {
                self.reset();
                Ok(ExerciseStep::Reset)
            }
            ExerciseEvent::AcceptCompletion => {
                let solved = self.accept_completion()?;
                Ok(ExerciseStep::Completed { solved })
            }
        }
    }
}

/// Pure transition over an owned session.
#[must_use]
pub fn transition(
    mut state: ExerciseSession,
    event: ExerciseEvent,
) -> (ExerciseSession, Result<ExerciseStep, ExerciseError>) {
    let step = state.apply(event);
    (state, step)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
