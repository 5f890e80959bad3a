#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use learn_core::model::{
    ChatTurn, ExerciseSpec, Lesson, LessonActivity, LessonId, Module, ModuleId, ProgressState,
    Quiz, QuizQuestion,
};
use learn_core::time::fixed_clock;
use services::{AiError, AppServices, Collaborators, EngineConfig, Evaluator, Tutor};
use storage::repository::{InMemoryRepository, ProgressKey, ProgressRepository, StorageError};
use storage::StaticCurriculum;

pub enum Reply {
    Text(&'static str),
    Fail,
}

/// Evaluator fake that plays back scripted replies and counts calls.
#[derive(Default)]
pub struct ScriptedEvaluator {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<usize>,
    unconfigured: bool,
}

impl ScriptedEvaluator {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            unconfigured: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    fn is_configured(&self) -> bool {
        !self.unconfigured
    }

    async fn evaluate(&self, _goal: &str, _submission: &str) -> Result<String, AiError> {
        *self.calls.lock().unwrap() += 1;
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Text(text)) => Ok(text.to_string()),
            Some(Reply::Fail) | None => Err(AiError::Failed("connection reset".into())),
        }
    }
}

/// Tutor fake that remembers what it was asked.
#[derive(Default)]
pub struct RecordingTutor {
    pub seen: Mutex<Vec<(String, Vec<ChatTurn>, String)>>,
}

#[async_trait]
impl Tutor for RecordingTutor {
    async fn respond(
        &self,
        lesson_context: &str,
        history: &[ChatTurn],
        query: &str,
    ) -> Result<String, AiError> {
        self.seen.lock().unwrap().push((
            lesson_context.to_string(),
            history.to_vec(),
            query.to_string(),
        ));
        Ok("Let's break the goal into steps.".into())
    }
}

pub fn id(raw: &str) -> LessonId {
    LessonId::new(raw).unwrap()
}

fn question(prompt: &str, correct: &str) -> QuizQuestion {
    QuizQuestion {
        prompt: prompt.into(),
        options: vec!["a".into(), "b".into(), "c".into()],
        correct_answer: correct.into(),
        explanation: Some(format!("The answer is {correct} because it is.")),
        max_attempts: None,
    }
}

/// Module `basics` holds an intro, a two-question quiz and an exercise;
/// module `loops` is gated behind it.
pub fn curriculum() -> StaticCurriculum {
    StaticCurriculum::new(vec![
        Module {
            id: ModuleId::new("basics").unwrap(),
            title: "Basics".into(),
            lessons: vec![
                Lesson {
                    id: id("intro"),
                    title: "Intro".into(),
                    estimated_minutes: 3,
                    activity: LessonActivity::Content,
                },
                Lesson {
                    id: id("check"),
                    title: "Check".into(),
                    estimated_minutes: 5,
                    activity: LessonActivity::Quiz(Quiz::new(vec![
                        question("First?", "b"),
                        question("Second?", "a"),
                    ])),
                },
                Lesson {
                    id: id("reverse"),
                    title: "Reverse a string".into(),
                    estimated_minutes: 10,
                    activity: LessonActivity::Exercise(ExerciseSpec {
                        goal: "Reverse a string".into(),
                        max_attempts: None,
                    }),
                },
            ],
        },
        Module {
            id: ModuleId::new("loops").unwrap(),
            title: "Loops".into(),
            lessons: vec![Lesson {
                id: id("for-loops"),
                title: "For loops".into(),
                estimated_minutes: 4,
                activity: LessonActivity::Content,
            }],
        },
    ])
}

pub struct Harness {
    pub app: AppServices,
    pub repo: InMemoryRepository,
    pub evaluator: Arc<ScriptedEvaluator>,
    pub tutor: Arc<RecordingTutor>,
}

pub async fn harness(evaluator: ScriptedEvaluator) -> Harness {
    harness_with_repo(evaluator, InMemoryRepository::new()).await
}

pub async fn harness_with_repo(
    evaluator: ScriptedEvaluator,
    repo: InMemoryRepository,
) -> Harness {
    let evaluator = Arc::new(evaluator);
    let tutor = Arc::new(RecordingTutor::default());
    let app = build(
        Arc::new(repo.clone()),
        Arc::clone(&evaluator) as Arc<dyn Evaluator>,
        Arc::clone(&tutor) as Arc<dyn Tutor>,
        &curriculum(),
    )
    .await;

    Harness {
        app,
        repo,
        evaluator,
        tutor,
    }
}

/// App services over arbitrary progress storage and content, with an
/// evaluator that is never expected to be called.
pub async fn app_with(
    progress: Arc<dyn ProgressRepository>,
    content: &StaticCurriculum,
) -> AppServices {
    build(
        progress,
        Arc::new(ScriptedEvaluator::default()),
        Arc::new(RecordingTutor::default()),
        content,
    )
    .await
}

async fn build(
    progress: Arc<dyn ProgressRepository>,
    evaluator: Arc<dyn Evaluator>,
    tutor: Arc<dyn Tutor>,
    content: &StaticCurriculum,
) -> AppServices {
    let collaborators = Collaborators {
        progress,
        evaluator,
        tutor,
    };
    let config = EngineConfig {
        evaluator_timeout: Duration::from_secs(5),
        ..EngineConfig::default()
    };
    AppServices::with_collaborators(
        collaborators,
        content,
        ProgressKey::new("learner-1").unwrap(),
        config,
        fixed_clock(),
    )
    .await
}

/// Loads nothing and refuses every save.
pub struct OfflineRepository;

#[async_trait]
impl ProgressRepository for OfflineRepository {
    async fn load_progress(
        &self,
        _key: &ProgressKey,
    ) -> Result<Option<ProgressState>, StorageError> {
        Ok(None)
    }

    async fn save_progress(
        &self,
        _key: &ProgressKey,
        _state: &ProgressState,
    ) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

/// Module `warmup` holds only a quiz with no questions; module `loops` is
/// gated behind it.
pub fn curriculum_with_empty_quiz() -> StaticCurriculum {
    StaticCurriculum::new(vec![
        Module {
            id: ModuleId::new("warmup").unwrap(),
            title: "Warm-up".into(),
            lessons: vec![Lesson {
                id: id("placeholder"),
                title: "Placeholder quiz".into(),
                estimated_minutes: 1,
                activity: LessonActivity::Quiz(Quiz::new(vec![])),
            }],
        },
        Module {
            id: ModuleId::new("loops").unwrap(),
            title: "Loops".into(),
            lessons: vec![Lesson {
                id: id("for-loops"),
                title: "For loops".into(),
                estimated_minutes: 4,
                activity: LessonActivity::Content,
            }],
        },
    ])
}

pub const WRONG: &str = r#"{"isCorrect": false, "feedback": "Close, but the order is unchanged."}"#;
pub const RIGHT: &str = "```json\n{\"isCorrect\": true, \"feedback\": \"Well done.\"}\n```";
