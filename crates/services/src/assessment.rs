//! Collapses evaluator replies into an [`AssessmentOutcome`].
//!
//! Whatever goes wrong on the way to a verdict (missing configuration,
//! transport errors, timeouts, unparseable text) ends up as
//! [`AssessmentOutcome::fallback`]. Nothing is retried here.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use learn_core::model::{AssessmentFailure, AssessmentOutcome, SessionId};
use serde::Deserialize;

use crate::ai::Evaluator;
use crate::error::{AiError, AssessmentBusy};

const DEFAULT_FEEDBACK_CORRECT: &str = "Nice work, that meets the goal.";
const DEFAULT_FEEDBACK_INCORRECT: &str = "Not quite there yet. Check your work against the goal.";

pub struct AssessmentMapper {
    evaluator: Arc<dyn Evaluator>,
    timeout: Duration,
    in_flight: Mutex<HashSet<SessionId>>,
}

impl AssessmentMapper {
    #[must_use]
    pub fn new(evaluator: Arc<dyn Evaluator>, timeout: Duration) -> Self {
        Self {
            evaluator,
            timeout,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.evaluator.is_configured()
    }

    /// Whether an evaluation is currently running for `session_id`.
    #[must_use]
    pub fn is_busy(&self, session_id: SessionId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&session_id)
    }

    /// Evaluate one submission. Always yields an outcome unless the session
    /// already has a call in flight.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentBusy` if `session_id` has an evaluation in flight.
    pub async fn evaluate(
        &self,
        session_id: SessionId,
        goal: &str,
        submission: &str,
    ) -> Result<AssessmentOutcome, AssessmentBusy> {
        let _guard = InFlightGuard::acquire(&self.in_flight, session_id)?;

        match self.try_evaluate(goal, submission).await {
            Ok(outcome) => {
                tracing::debug!(
                    %session_id,
                    is_correct = outcome.is_correct,
                    "evaluation received"
                );
                Ok(outcome)
            }
            Err(failure) => {
                tracing::warn!(%session_id, error = %failure, "evaluation failed; using fallback");
                Ok(AssessmentOutcome::fallback())
            }
        }
    }

    async fn try_evaluate(
        &self,
        goal: &str,
        submission: &str,
    ) -> Result<AssessmentOutcome, AssessmentFailure> {
        if !self.evaluator.is_configured() {
            return Err(AssessmentFailure::ConfigurationMissing);
        }
        let raw = tokio::time::timeout(self.timeout, self.evaluator.evaluate(goal, submission))
            .await
            .map_err(|_| {
                AssessmentFailure::EvaluationFailure(format!(
                    "timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(classify)?;
        parse_outcome(&raw)
    }
}

fn classify(err: AiError) -> AssessmentFailure {
    match err {
        AiError::Disabled => AssessmentFailure::ConfigurationMissing,
        AiError::EmptyResponse => AssessmentFailure::MalformedResponse(err.to_string()),
        other => AssessmentFailure::EvaluationFailure(other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(rename = "isCorrect", alias = "is_correct")]
    is_correct: Option<bool>,
    feedback: Option<String>,
}

/// Interpret the evaluator's text as `{"isCorrect": bool, "feedback": string}`.
///
/// Markdown code fences and prose around the JSON object are tolerated.
///
/// # Errors
///
/// Returns `AssessmentFailure::MalformedResponse` when no verdict can be read.
pub fn parse_outcome(raw: &str) -> Result<AssessmentOutcome, AssessmentFailure> {
    let body = json_object(raw)
        .ok_or_else(|| AssessmentFailure::MalformedResponse("no JSON object found".into()))?;
    let verdict: RawVerdict = serde_json::from_str(body)
        .map_err(|e| AssessmentFailure::MalformedResponse(e.to_string()))?;
    let is_correct = verdict
        .is_correct
        .ok_or_else(|| AssessmentFailure::MalformedResponse("missing isCorrect".into()))?;

    let feedback = verdict
        .feedback
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| {
            if is_correct {
                DEFAULT_FEEDBACK_CORRECT.to_string()
            } else {
                DEFAULT_FEEDBACK_INCORRECT.to_string()
            }
        });

    Ok(AssessmentOutcome {
        is_correct,
        feedback,
    })
}

fn json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Holds a session's in-flight slot and frees it on drop, including when the
/// evaluating future is cancelled.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<SessionId>>,
    session_id: SessionId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(
        set: &'a Mutex<HashSet<SessionId>>,
        session_id: SessionId,
    ) -> Result<Self, AssessmentBusy> {
        let mut guard = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.insert(session_id) {
            return Err(AssessmentBusy);
        }
        Ok(Self { set, session_id })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}
