mod assessment;
mod curriculum;
mod ids;
mod progress;
mod settings;

pub use assessment::{
    AssessmentFailure, AssessmentOutcome, ChatRole, ChatTurn, GENERIC_RETRY_FEEDBACK,
};
pub use curriculum::{
    Curriculum, CurriculumError, ExerciseSpec, Lesson, LessonActivity, LessonKind, Module, Quiz,
    QuizQuestion,
};
pub use ids::{IdError, LessonId, ModuleId, SessionId};
pub use progress::ProgressState;
pub use settings::{AssessmentSettings, SettingsError};
