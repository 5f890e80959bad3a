use std::time::Duration;

use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("quiz pass threshold must be between 1 and 100 percent")]
    InvalidPassPercent,

    #[error("quiz max attempts must be > 0")]
    InvalidQuizMaxAttempts,

    #[error("exercise max attempts must be > 0")]
    InvalidExerciseMaxAttempts,

    #[error("hint dismiss delay must be between 100 and 60000 ms")]
    InvalidHintDismissDelay,

    #[error("hint excerpt length must be > 0")]
    InvalidHintExcerptLength,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Knobs shared by the quiz and exercise engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentSettings {
    quiz_pass_percent: u8,
    quiz_max_attempts: u32,
    exercise_max_attempts: u32,
    hint_dismiss_ms: u32,
    hint_excerpt_chars: usize,
}

impl AssessmentSettings {
    pub const DEFAULT_PASS_PERCENT: u8 = 75;
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_HINT_DISMISS_MS: u32 = 2_500;
    pub const DEFAULT_HINT_EXCERPT_CHARS: usize = 120;

    /// Creates custom settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any value is out of range.
    pub fn new(
        quiz_pass_percent: u8,
        quiz_max_attempts: u32,
        exercise_max_attempts: u32,
        hint_dismiss_ms: u32,
        hint_excerpt_chars: usize,
    ) -> Result<Self, SettingsError> {
        if !(1..=100).contains(&quiz_pass_percent) {
            return Err(SettingsError::InvalidPassPercent);
        }
        if quiz_max_attempts == 0 {
            return Err(SettingsError::InvalidQuizMaxAttempts);
        }
        if exercise_max_attempts == 0 {
            return Err(SettingsError::InvalidExerciseMaxAttempts);
        }
        if !(100..=60_000).contains(&hint_dismiss_ms) {
            return Err(SettingsError::InvalidHintDismissDelay);
        }
        if hint_excerpt_chars == 0 {
            return Err(SettingsError::InvalidHintExcerptLength);
        }

        Ok(Self {
            quiz_pass_percent,
            quiz_max_attempts,
            exercise_max_attempts,
            hint_dismiss_ms,
            hint_excerpt_chars,
        })
    }

    #[must_use]
    pub fn quiz_pass_percent(&self) -> u8 {
        self.quiz_pass_percent
    }

    /// Study-mode attempts per question unless the question overrides it.
    #[must_use]
    pub fn quiz_max_attempts(&self) -> u32 {
        self.quiz_max_attempts
    }

    #[must_use]
    pub fn exercise_max_attempts(&self) -> u32 {
        self.exercise_max_attempts
    }

    #[must_use]
    pub fn hint_dismiss_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.hint_dismiss_ms))
    }

    #[must_use]
    pub fn hint_excerpt_chars(&self) -> usize {
        self.hint_excerpt_chars
    }
}

impl Default for AssessmentSettings {
    fn default() -> Self {
        Self {
            quiz_pass_percent: Self::DEFAULT_PASS_PERCENT,
            quiz_max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            exercise_max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            hint_dismiss_ms: Self::DEFAULT_HINT_DISMISS_MS,
            hint_excerpt_chars: Self::DEFAULT_HINT_EXCERPT_CHARS,
        }
    }
}
