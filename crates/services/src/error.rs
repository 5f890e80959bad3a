//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::exercise::{ExerciseError, SubmitRejected};
use learn_core::model::{LessonId, LessonKind, SettingsError};
use learn_core::quiz::QuizError;
use storage::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the evaluator and tutor HTTP clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AiError {
    #[error("AI endpoint is not configured")]
    Disabled,
    #[error("AI endpoint returned an empty response")]
    EmptyResponse,
    #[error("AI request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("AI request failed: {0}")]
    Failed(String),
}

/// Errors emitted while reading configuration from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {raw:?}")]
    InvalidNumber { var: &'static str, raw: String },
    #[error("{var} is not a valid URL: {raw:?}")]
    InvalidUrl { var: &'static str, raw: String },
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Errors emitted by `ProgressionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("lesson {0} is not part of the curriculum")]
    UnknownLesson(LessonId),
    #[error("lesson {0} is locked")]
    LessonLocked(LessonId),
    #[error("lesson {lesson} is a {actual:?} lesson, expected {expected:?}")]
    WrongKind {
        lesson: LessonId,
        expected: LessonKind,
        actual: LessonKind,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

/// Returned when a second evaluation is requested for a session that already
/// has one in flight.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("an evaluation is already in flight for this session")]
pub struct AssessmentBusy;

/// Errors emitted by `ExerciseLoopService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExerciseServiceError {
    #[error("exercise evaluation is not configured")]
    ConfigurationMissing,
    #[error(transparent)]
    Rejected(#[from] SubmitRejected),
    #[error(transparent)]
    Exercise(#[from] ExerciseError),
    #[error(transparent)]
    Busy(#[from] AssessmentBusy),
    #[error("tutor is unavailable: {0}")]
    Tutor(#[source] AiError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
