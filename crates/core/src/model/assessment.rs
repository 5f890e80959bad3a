use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Feedback shown whenever the evaluator could not produce a usable verdict.
pub const GENERIC_RETRY_FEEDBACK: &str =
    "We couldn't check your answer this time. Review your work and try submitting again.";

/// Normalized verdict for one exercise submission. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    pub is_correct: bool,
    pub feedback: String,
}

impl AssessmentOutcome {
    #[must_use]
    pub fn correct(feedback: impl Into<String>) -> Self {
        Self {
            is_correct: true,
            feedback: feedback.into(),
        }
    }

    #[must_use]
    pub fn incorrect(feedback: impl Into<String>) -> Self {
        Self {
            is_correct: false,
            feedback: feedback.into(),
        }
    }

    /// Outcome substituted for any evaluator failure. Counts as an attempt.
    #[must_use]
    pub fn fallback() -> Self {
        Self::incorrect(GENERIC_RETRY_FEEDBACK)
    }
}

/// Ways an evaluation can fail before a verdict exists.
///
/// These never reach the engines; they collapse into
/// [`AssessmentOutcome::fallback`] at the mapping boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentFailure {
    #[error("evaluation failed: {0}")]
    EvaluationFailure(String),

    #[error("evaluator returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("no evaluator is configured")]
    ConfigurationMissing,
}

/// Speaker of one turn in a tutor conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
