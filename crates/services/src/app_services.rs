use std::sync::Arc;

use storage::repository::{ContentProvider, ProgressKey, ProgressRepository, Storage};

use crate::Clock;
use crate::ai::{Evaluator, HttpEvaluator, HttpTutor, Tutor};
use crate::assessment::AssessmentMapper;
use crate::config::EngineConfig;
use crate::error::AppServicesError;
use crate::exercise_service::ExerciseLoopService;
use crate::progression_service::ProgressionService;
use crate::quiz_service::QuizService;

/// External collaborators the engine is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub progress: Arc<dyn ProgressRepository>,
    pub evaluator: Arc<dyn Evaluator>,
    pub tutor: Arc<dyn Tutor>,
}

/// Assembles app-facing services for one learner.
#[derive(Clone)]
pub struct AppServices {
    config: EngineConfig,
    progression: Arc<ProgressionService>,
    quizzes: Arc<QuizService>,
    exercises: Arc<ExerciseLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP evaluator/tutor.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        content: &dyn ContentProvider,
        learner: ProgressKey,
        config: EngineConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        if config.ai.is_none() {
            tracing::warn!("LEARN_AI_API_KEY is not set; exercise submission is disabled");
        }
        let collaborators = Collaborators {
            progress: Arc::clone(&storage.progress),
            evaluator: Arc::new(HttpEvaluator::new(config.ai.clone())),
            tutor: Arc::new(HttpTutor::new(config.ai.clone())),
        };
        Ok(Self::with_collaborators(collaborators, content, learner, config, clock).await)
    }

    /// Build services over arbitrary collaborators.
    pub async fn with_collaborators(
        collaborators: Collaborators,
        content: &dyn ContentProvider,
        learner: ProgressKey,
        config: EngineConfig,
        clock: Clock,
    ) -> Self {
        let progression = Arc::new(
            ProgressionService::load(clock, collaborators.progress, content, learner).await,
        );
        let quizzes = Arc::new(QuizService::new(
            clock,
            config.settings.clone(),
            Arc::clone(&progression),
        ));
        let mapper = Arc::new(AssessmentMapper::new(
            collaborators.evaluator,
            config.evaluator_timeout,
        ));
        let exercises = Arc::new(ExerciseLoopService::new(
            clock,
            config.settings.clone(),
            mapper,
            collaborators.tutor,
            Arc::clone(&progression),
        ));

        Self {
            config,
            progression,
            quizzes,
            exercises,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn progression(&self) -> Arc<ProgressionService> {
        Arc::clone(&self.progression)
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizService> {
        Arc::clone(&self.quizzes)
    }

    #[must_use]
    pub fn exercises(&self) -> Arc<ExerciseLoopService> {
        Arc::clone(&self.exercises)
    }
}
