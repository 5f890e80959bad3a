use thiserror::Error;

use crate::exercise::ExerciseError;
use crate::model::{CurriculumError, IdError, SettingsError};
use crate::quiz::QuizError;

/// Umbrella error for callers that do not care which engine rejected them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Curriculum(#[from] CurriculumError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Exercise(#[from] ExerciseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LessonId;

    #[test]
    fn engine_errors_convert_into_umbrella() {
        let id_err = LessonId::new("  ").unwrap_err();
        assert!(matches!(Error::from(id_err), Error::Id(_)));

        let quiz = Error::from(QuizError::HintShowing);
        assert_eq!(quiz.to_string(), "a hint is still showing");

        let exercise = Error::from(ExerciseError::StaleResult);
        assert!(matches!(exercise, Error::Exercise(ExerciseError::StaleResult)));
    }
}
