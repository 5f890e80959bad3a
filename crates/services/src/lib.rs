#![forbid(unsafe_code)]

pub mod ai;
pub mod app_services;
pub mod assessment;
pub mod config;
pub mod error;
pub mod exercise_service;
pub mod progression_service;
pub mod quiz_service;

pub use learn_core::Clock;

pub use ai::{ChatClient, Evaluator, HttpEvaluator, HttpTutor, Tutor};
pub use app_services::{AppServices, Collaborators};
pub use assessment::{AssessmentMapper, parse_outcome};
pub use config::{AiEndpointConfig, EngineConfig};
pub use error::{
    AiError, AppServicesError, AssessmentBusy, ConfigError, ExerciseServiceError, ProgressError,
    QuizServiceError,
};
pub use exercise_service::{EvaluationReceipt, ExerciseLoopService};
pub use progression_service::{ModuleOverview, ProgressionService};
pub use quiz_service::QuizService;
