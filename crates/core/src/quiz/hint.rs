use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::QuizQuestion;

/// Escalation level of a study-mode hint, picked by attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintTier {
    /// First miss: plain encouragement.
    Encouragement,
    /// Second miss: excerpt of the explanation, or a conceptual nudge.
    Excerpt,
    /// Third miss onwards: point at the correct answer.
    RevealRedirect,
}

impl HintTier {
    #[must_use]
    pub fn for_attempt(attempt: u32) -> Self {
        match attempt {
            0 | 1 => Self::Encouragement,
            2 => Self::Excerpt,
            _ => Self::RevealRedirect,
        }
    }
}

/// Transient hint shown after a rejected study-mode answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub tier: HintTier,
    pub message: String,
    /// When the hint goes away and the question accepts another try.
    pub dismiss_at: DateTime<Utc>,
}

impl Hint {
    #[must_use]
    pub fn is_showing(&self, now: DateTime<Utc>) -> bool {
        now < self.dismiss_at
    }
}

const ENCOURAGEMENT: &str = "Not quite. Take another look at the options and try again.";
const CONCEPT_NUDGE: &str =
    "Think about the core idea behind the question before choosing again.";

pub(crate) fn build_hint(
    attempt: u32,
    question: &QuizQuestion,
    excerpt_chars: usize,
    dismiss_at: DateTime<Utc>,
) -> Hint {
    let tier = HintTier::for_attempt(attempt);
    let message = match tier {
        HintTier::Encouragement => ENCOURAGEMENT.to_string(),
        HintTier::Excerpt => question.explanation().map_or_else(
            || CONCEPT_NUDGE.to_string(),
            |text| format!("Hint: {}", excerpt(text, excerpt_chars)),
        ),
        HintTier::RevealRedirect => redirect_message(question),
    };

    Hint {
        tier,
        message,
        dismiss_at,
    }
}

pub(crate) fn redirect_message(question: &QuizQuestion) -> String {
    format!(
        "The correct answer is \"{}\". Read the explanation to see why.",
        question.correct_answer
    )
}

/// First `max_chars` characters of `text`, cut at a char boundary.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
    }
}
