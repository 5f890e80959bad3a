use async_trait::async_trait;

use super::client::{ChatClient, ChatMessage};
use crate::config::AiEndpointConfig;
use crate::error::AiError;

/// Judges a free-form exercise submission against its goal.
///
/// Implementations return the raw model text; interpreting it is the
/// assessment mapper's job.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Whether the evaluator can be called at all.
    fn is_configured(&self) -> bool {
        true
    }

    /// # Errors
    ///
    /// Returns `AiError` when the evaluation could not be obtained.
    async fn evaluate(&self, goal: &str, submission: &str) -> Result<String, AiError>;
}

const EVALUATOR_INSTRUCTIONS: &str = "You are grading a learner's exercise submission. \
Decide whether the submission fully meets the goal. \
Reply with JSON only, in the form {\"isCorrect\": true|false, \"feedback\": \"...\"}. \
Keep the feedback to two sentences, encouraging, and never give away the full solution.";

#[derive(Clone)]
pub struct HttpEvaluator {
    client: ChatClient,
}

impl HttpEvaluator {
    #[must_use]
    pub fn new(config: Option<AiEndpointConfig>) -> Self {
        Self {
            client: ChatClient::new(config),
        }
    }
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    fn is_configured(&self) -> bool {
        self.client.enabled()
    }

    async fn evaluate(&self, goal: &str, submission: &str) -> Result<String, AiError> {
        let messages = vec![
            ChatMessage::system(EVALUATOR_INSTRUCTIONS),
            ChatMessage::user(format!("Goal:\n{goal}\n\nSubmission:\n{submission}")),
        ];
        self.client.complete(messages, 0.0).await
    }
}
