//! Multiple-choice quiz engine.
//!
//! A [`QuizSession`] is an explicit state struct driven by [`QuizEvent`]s,
//! either in place through [`QuizSession::apply`] or functionally through
//! [`transition`]. Everything here is synchronous and local.

mod hint;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AssessmentSettings, LessonId, Quiz, QuizQuestion, SessionId};
use crate::progression::rounded_percent;

pub use hint::{Hint, HintTier};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz already completed")]
    Completed,

    #[error("question is already answered")]
    QuestionLocked,

    #[error("a hint is still showing")]
    HintShowing,

    #[error("option {0:?} is not part of the question")]
    UnknownOption(String),

    #[error("option {0:?} was already rejected for this question")]
    AlreadyRejected(String),

    #[error("current question has not been answered yet")]
    NotAnswered,

    #[error("restart is only offered after failing a test-mode quiz")]
    RestartUnavailable,
}

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    /// Bounded retries with escalating hints.
    Study,
    /// One attempt per question.
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionState {
    Unanswered,
    Answered { selected: String, is_correct: bool },
}

/// Terminal answer recorded for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: usize,
    pub selected: String,
    pub correct: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub enum QuizEvent {
    Select(String),
    DismissHint,
    Advance,
    Restart,
}

/// What a successful event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizStep {
    /// The question is answered and locked.
    Answered { is_correct: bool },
    /// Study mode: wrong answer rejected; retry once the hint is dismissed.
    Retry { hint: Hint },
    /// Study mode: attempts exhausted; the correct answer is revealed.
    Locked { correct_answer: String, message: String },
    HintDismissed,
    Advanced { index: usize },
    Completed(QuizResult),
    Restarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: u32,
    pub total: u32,
    pub percent: u8,
    pub passed: bool,
}

/// Follow-up the host offers on the completion screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOffer {
    Continue,
    Restart,
    Review,
}

/// One line of the study-mode answer review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub question_index: usize,
    pub prompt: String,
    pub selected: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Transient run of one quiz, owned by the lesson view that opened it.
#[derive(Debug, Clone)]
pub struct QuizSession {
    id: SessionId,
    lesson_id: LessonId,
    mode: QuizMode,
    questions: Vec<QuizQuestion>,
    default_max_attempts: u32,
    pass_percent: u8,
    hint_delay: Duration,
    excerpt_chars: usize,
    current_index: usize,
    attempt_count: u32,
    wrong_answers: BTreeMap<usize, BTreeSet<String>>,
    score: u32,
    answer_log: Vec<AnswerRecord>,
    question_state: QuestionState,
    hint: Option<Hint>,
}

impl QuizSession {
    /// Open a session over the quiz's questions. An empty quiz starts completed.
    #[must_use]
    pub fn new(
        lesson_id: LessonId,
        quiz: &Quiz,
        mode: QuizMode,
        settings: &AssessmentSettings,
    ) -> Self {
        Self {
            id: SessionId::random(),
            lesson_id,
            mode,
            questions: quiz.questions.clone(),
            default_max_attempts: settings.quiz_max_attempts(),
            pass_percent: settings.quiz_pass_percent(),
            hint_delay: Duration::from_std(settings.hint_dismiss_delay())
                .unwrap_or_else(|_| Duration::zero()),
            excerpt_chars: settings.hint_excerpt_chars(),
            current_index: 0,
            attempt_count: 0,
            wrong_answers: BTreeMap::new(),
            score: 0,
            answer_log: Vec::new(),
            question_state: QuestionState::Unanswered,
            hint: None,
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
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current_index)
    }

    #[must_use]
    pub fn question_state(&self) -> &QuestionState {
        &self.question_state
    }

    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn answer_log(&self) -> &[AnswerRecord] {
        &self.answer_log
    }

    /// Options rejected so far on the given question.
    #[must_use]
    pub fn wrong_answers(&self, question_index: usize) -> Option<&BTreeSet<String>> {
        self.wrong_answers.get(&question_index)
    }

    /// Attempt limit for the current question in study mode.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.current_question()
            .and_then(|question| question.max_attempts)
            .unwrap_or(self.default_max_attempts)
    }

    /// The hint, if one is still on screen at `now`.
    #[must_use]
    pub fn active_hint(&self, now: DateTime<Utc>) -> Option<&Hint> {
        self.hint.as_ref().filter(|hint| hint.is_showing(now))
    }

    /// Correct answer of the current question, once it is answered.
    #[must_use]
    pub fn revealed_answer(&self) -> Option<&str> {
        match self.question_state {
            QuestionState::Answered { .. } => self
                .current_question()
                .map(|question| question.correct_answer.as_str()),
            QuestionState::Unanswered => None,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_index >= self.questions.len()
    }

    /// Final score once the last question has been passed.
    #[must_use]
    pub fn result(&self) -> Option<QuizResult> {
        if !self.is_complete() {
            return None;
        }
        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let percent = rounded_percent(self.score as usize, self.questions.len());
        Some(QuizResult {
            score: self.score,
            total,
            percent,
            passed: total > 0 && percent >= self.pass_percent,
        })
    }

    #[must_use]
    pub fn completion_offer(&self) -> Option<CompletionOffer> {
        let result = self.result()?;
        Some(match self.mode {
            QuizMode::Study => CompletionOffer::Review,
            QuizMode::Test if result.passed => CompletionOffer::Continue,
            QuizMode::Test => CompletionOffer::Restart,
        })
    }

    /// Answer-by-answer review of a finished study-mode quiz.
    #[must_use]
    pub fn review(&self) -> Option<Vec<ReviewItem>> {
        if self.mode != QuizMode::Study || !self.is_complete() {
            return None;
        }
        let items = self
            .answer_log
            .iter()
            .filter_map(|record| {
                let question = self.questions.get(record.question_index)?;
                Some(ReviewItem {
                    question_index: record.question_index,
                    prompt: question.prompt.clone(),
                    selected: record.selected.clone(),
                    correct_answer: record.correct.clone(),
                    is_correct: record.is_correct,
                    explanation: question.explanation().map(str::to_string),
                })
            })
            .collect();
        Some(items)
    }

    /// Apply one event in place.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` when the event is not valid in the current state;
    /// the session is left untouched in that case.
    pub fn apply(&mut self, event: QuizEvent, now: DateTime<Utc>) -> Result<QuizStep, QuizError> {
        match event {
            QuizEvent::Select(option) => self.select(option, now),
            QuizEvent::DismissHint => {
                self.hint = None;
                Ok(QuizStep::HintDismissed)
            }
            QuizEvent::Advance => self.advance(),
            QuizEvent::Restart => self.restart(),
        }
    }

    fn select(&mut self, option: String, now: DateTime<Utc>) -> Result<QuizStep, QuizError> {
        let Some(question) = self.questions.get(self.current_index) else {
            return Err(QuizError::Completed);
        };
        if matches!(self.question_state, QuestionState::Answered { .. }) {
            return Err(QuizError::QuestionLocked);
        }
        if self.hint.as_ref().is_some_and(|hint| hint.is_showing(now)) {
            return Err(QuizError::HintShowing);
        }
        if !question.options.contains(&option) {
            return Err(QuizError::UnknownOption(option));
        }
        if self
            .wrong_answers
            .get(&self.current_index)
            .is_some_and(|rejected| rejected.contains(&option))
        {
            return Err(QuizError::AlreadyRejected(option));
        }

        self.hint = None;
        self.attempt_count += 1;
        let is_correct = question.is_correct(&option);
        let max_attempts = question.max_attempts.unwrap_or(self.default_max_attempts);

        if is_correct {
            self.score += 1;
            self.lock(option, true);
            return Ok(QuizStep::Answered { is_correct: true });
        }

        self.wrong_answers
            .entry(self.current_index)
            .or_default()
            .insert(option.clone());

        match self.mode {
            QuizMode::Test => {
                self.lock(option, false);
                Ok(QuizStep::Answered { is_correct: false })
            }
            QuizMode::Study if self.attempt_count >= max_attempts => {
                let correct_answer = question.correct_answer.clone();
                let message = hint::redirect_message(question);
                self.lock(option, false);
                Ok(QuizStep::Locked {
                    correct_answer,
                    message,
                })
            }
            QuizMode::Study => {
                let hint = hint::build_hint(
                    self.attempt_count,
                    question,
                    self.excerpt_chars,
                    now + self.hint_delay,
                );
                self.hint = Some(hint.clone());
                Ok(QuizStep::Retry { hint })
            }
        }
    }

    fn lock(&mut self, selected: String, is_correct: bool) {
        let correct = self
            .current_question()
            .map(|question| question.correct_answer.clone())
            .unwrap_or_default();
        self.answer_log.push(AnswerRecord {
            question_index: self.current_index,
            selected: selected.clone(),
            correct,
            is_correct,
        });
        self.question_state = QuestionState::Answered {
            selected,
            is_correct,
        };
    }

    fn advance(&mut self) -> Result<QuizStep, QuizError> {
        if self.is_complete() {
            return Err(QuizError::Completed);
        }
        if matches!(self.question_state, QuestionState::Unanswered) {
            return Err(QuizError::NotAnswered);
        }

        self.current_index += 1;
        self.attempt_count = 0;
        self.wrong_answers.clear();
        self.hint = None;
        self.question_state = QuestionState::Unanswered;

        match self.result() {
            Some(result) => Ok(QuizStep::Completed(result)),
            None => Ok(QuizStep::Advanced {
                index: self.current_index,
            }),
        }
    }

    fn restart(&mut self) -> Result<QuizStep, QuizError> {
        if self.completion_offer() != Some(CompletionOffer::Restart) {
            return Err(QuizError::RestartUnavailable);
        }

        self.current_index = 0;
        self.attempt_count = 0;
        self.wrong_answers.clear();
        self.score = 0;
        self.answer_log.clear();
        self.question_state = QuestionState::Unanswered;
        self.hint = None;
        Ok(QuizStep::Restarted)
    }
}

/// Pure transition: consumes the state and hands back the next one together
/// with the step (or the rejection, in which case the state is unchanged).
#[must_use]
pub fn transition(
    mut state: QuizSession,
    event: QuizEvent,
    now: DateTime<Utc>,
) -> (QuizSession, Result<QuizStep, QuizError>) {
    let step = state.apply(event, now);
    (state, step)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn question(
        correct: &str,
        explanation: Option<&str>,
        max_attempts: Option<u32>,
    ) -> QuizQuestion {
        QuizQuestion {
            prompt: format!("Pick {correct}"),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: correct.into(),
            explanation: explanation.map(str::to_string),
            max_attempts,
        }
    }

    fn session(questions: Vec<QuizQuestion>, mode: QuizMode) -> QuizSession {
        QuizSession::new(
            LessonId::new("quiz-1").unwrap(),
            &Quiz::new(questions),
            mode,
            &AssessmentSettings::default(),
        )
    }

    fn select(session: &mut QuizSession, option: &str) -> Result<QuizStep, QuizError> {
        session.apply(QuizEvent::Select(option.into()), fixed_now())
    }

    fn later(session: &QuizSession) -> DateTime<Utc> {
        session
            .hint
            .as_ref()
            .map_or_else(fixed_now, |hint| hint.dismiss_at)
    }

    #[test]
    fn test_mode_all_correct_passes() {
        let mut quiz = session(
            vec![question("A", None, None), question("A", None, None)],
            QuizMode::Test,
        );

        assert_eq!(select(&mut quiz, "A").unwrap(), QuizStep::Answered { is_correct: true });
        assert_eq!(
            quiz.apply(QuizEvent::Advance, fixed_now()).unwrap(),
            QuizStep::Advanced { index: 1 }
        );
        select(&mut quiz, "A").unwrap();
        let step = quiz.apply(QuizEvent::Advance, fixed_now()).unwrap();

        let expected = QuizResult {
            score: 2,
            total: 2,
            percent: 100,
            passed: true,
        };
        assert_eq!(step, QuizStep::Completed(expected));
        assert_eq!(quiz.result(), Some(expected));
        assert_eq!(quiz.completion_offer(), Some(CompletionOffer::Continue));
    }

    #[test]
    fn test_mode_first_selection_is_terminal() {
        let mut quiz = session(vec![question("A", None, None)], QuizMode::Test);

        assert_eq!(select(&mut quiz, "B").unwrap(), QuizStep::Answered { is_correct: false });
        assert_eq!(select(&mut quiz, "A").unwrap_err(), QuizError::QuestionLocked);
        assert_eq!(quiz.score(), 0);
        assert_eq!(quiz.revealed_answer(), Some("A"));
    }

    #[test]
    fn study_mode_locks_after_max_attempts_without_scoring() {
        let mut quiz = session(vec![question("A", None, Some(3))], QuizMode::Study);

        assert!(matches!(select(&mut quiz, "B").unwrap(), QuizStep::Retry { .. }));
        let now = later(&quiz);
        assert!(matches!(
            quiz.apply(QuizEvent::Select("C".into()), now).unwrap(),
            QuizStep::Retry { .. }
        ));
        let now = later(&quiz);
        let step = quiz.apply(QuizEvent::Select("D".into()), now).unwrap();

        assert!(matches!(
            step,
            QuizStep::Locked { ref correct_answer, .. } if correct_answer == "A"
        ));
        assert_eq!(quiz.score(), 0);
        assert_eq!(quiz.revealed_answer(), Some("A"));
        assert_eq!(
            quiz.apply(QuizEvent::Select("A".into()), now).unwrap_err(),
            QuizError::QuestionLocked
        );
    }

    #[test]
    fn study_mode_correct_on_second_attempt_scores_once() {
        let mut quiz = session(vec![question("A", None, None)], QuizMode::Study);

        select(&mut quiz, "B").unwrap();
        let now = later(&quiz);
        let step = quiz.apply(QuizEvent::Select("A".into()), now).unwrap();

        assert_eq!(step, QuizStep::Answered { is_correct: true });
        assert_eq!(quiz.score(), 1);
        assert_eq!(quiz.attempt_count(), 2);
        assert_eq!(quiz.answer_log().len(), 1);
    }

    #[test]
    fn study_hints_escalate_by_attempt() {
        let mut quiz = session(
            vec![question("A", Some("Because A is first."), Some(4))],
            QuizMode::Study,
        );

        let QuizStep::Retry { hint } = select(&mut quiz, "B").unwrap() else {
            panic!("expected retry");
        };
        assert_eq!(hint.tier, HintTier::Encouragement);

        let now = later(&quiz);
        let QuizStep::Retry { hint } = quiz.apply(QuizEvent::Select("C".into()), now).unwrap()
        else {
            panic!("expected retry");
        };
        assert_eq!(hint.tier, HintTier::Excerpt);
        assert!(hint.message.contains("Because A is first."));

        let now = later(&quiz);
        let QuizStep::Retry { hint } = quiz.apply(QuizEvent::Select("D".into()), now).unwrap()
        else {
            panic!("expected retry");
        };
        assert_eq!(hint.tier, HintTier::RevealRedirect);
    }

    #[test]
    fn selection_is_rejected_while_hint_is_showing() {
        let mut quiz = session(vec![question("A", None, None)], QuizMode::Study);
        select(&mut quiz, "B").unwrap();

        assert_eq!(select(&mut quiz, "A").unwrap_err(), QuizError::HintShowing);
        assert!(quiz.active_hint(fixed_now()).is_some());

        quiz.apply(QuizEvent::DismissHint, fixed_now()).unwrap();
        assert!(quiz.active_hint(fixed_now()).is_none());
        assert_eq!(select(&mut quiz, "A").unwrap(), QuizStep::Answered { is_correct: true });
    }

    #[test]
    fn rejected_options_cannot_be_picked_again() {
        let mut quiz = session(vec![question("A", None, None)], QuizMode::Study);
        select(&mut quiz, "B").unwrap();
        let now = later(&quiz);

        assert_eq!(
            quiz.apply(QuizEvent::Select("B".into()), now).unwrap_err(),
            QuizError::AlreadyRejected("B".into())
        );
        assert_eq!(quiz.attempt_count(), 1);
        assert_eq!(quiz.wrong_answers(0).map(BTreeSet::len), Some(1));
    }

    #[test]
    fn advancing_resets_per_question_state() {
        let mut quiz = session(
            vec![question("A", None, None), question("B", None, None)],
            QuizMode::Study,
        );
        select(&mut quiz, "C").unwrap();
        let now = later(&quiz);
        quiz.apply(QuizEvent::Select("A".into()), now).unwrap();
        quiz.apply(QuizEvent::Advance, now).unwrap();

        assert_eq!(quiz.attempt_count(), 0);
        assert!(quiz.wrong_answers(0).is_none());
        assert_eq!(quiz.question_state(), &QuestionState::Unanswered);
    }

    #[test]
    fn cannot_advance_an_unanswered_question() {
        let mut quiz = session(vec![question("A", None, None)], QuizMode::Test);
        assert_eq!(
            quiz.apply(QuizEvent::Advance, fixed_now()).unwrap_err(),
            QuizError::NotAnswered
        );
    }

    #[test]
    fn failed_test_can_restart_from_scratch() {
        let mut quiz = session(
            vec![question("A", None, None), question("A", None, None)],
            QuizMode::Test,
        );
        select(&mut quiz, "A").unwrap();
        quiz.apply(QuizEvent::Advance, fixed_now()).unwrap();
        select(&mut quiz, "B").unwrap();
        let QuizStep::Completed(result) = quiz.apply(QuizEvent::Advance, fixed_now()).unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(result.percent, 50);
        assert!(!result.passed);
        assert_eq!(quiz.completion_offer(), Some(CompletionOffer::Restart));

        assert_eq!(
            quiz.apply(QuizEvent::Restart, fixed_now()).unwrap(),
            QuizStep::Restarted
        );
        assert_eq!(quiz.score(), 0);
        assert_eq!(quiz.current_index(), 0);
        assert!(quiz.answer_log().is_empty());
        assert!(!quiz.is_complete());
    }

    #[test]
    fn restart_is_not_offered_mid_quiz() {
        let mut quiz = session(vec![question("A", None, None)], QuizMode::Test);
        assert_eq!(
            quiz.apply(QuizEvent::Restart, fixed_now()).unwrap_err(),
            QuizError::RestartUnavailable
        );
    }

    #[test]
    fn study_review_lists_answers_with_explanations() {
        let mut quiz = session(
            vec![
                question("A", Some("A is right."), Some(1)),
                question("B", None, None),
            ],
            QuizMode::Study,
        );
        assert!(matches!(select(&mut quiz, "C").unwrap(), QuizStep::Locked { .. }));
        quiz.apply(QuizEvent::Advance, fixed_now()).unwrap();
        select(&mut quiz, "B").unwrap();
        quiz.apply(QuizEvent::Advance, fixed_now()).unwrap();

        let review = quiz.review().unwrap();
        assert_eq!(review.len(), 2);
        assert!(!review[0].is_correct);
        assert_eq!(review[0].selected, "C");
        assert_eq!(review[0].explanation.as_deref(), Some("A is right."));
        assert!(review[1].is_correct);
        assert_eq!(quiz.completion_offer(), Some(CompletionOffer::Review));
    }

    #[test]
    fn empty_quiz_completes_immediately() {
        let quiz = session(Vec::new(), QuizMode::Test);
        assert!(quiz.is_complete());
        assert_eq!(
            quiz.result(),
            Some(QuizResult {
                score: 0,
                total: 0,
                percent: 0,
                passed: false,
            })
        );
    }

    #[test]
    fn transition_returns_unchanged_state_on_rejection() {
        let quiz = session(vec![question("A", None, None)], QuizMode::Test);
        let (quiz, step) = transition(quiz, QuizEvent::Select("Z".into()), fixed_now());
        assert_eq!(step.unwrap_err(), QuizError::UnknownOption("Z".into()));
        assert_eq!(quiz.attempt_count(), 0);

        let (quiz, step) = transition(quiz, QuizEvent::Select("A".into()), fixed_now());
        assert!(step.is_ok());
        assert_eq!(quiz.score(), 1);
    }
}
