use async_trait::async_trait;
use learn_core::model::{ChatRole, ChatTurn};

use super::client::{ChatClient, ChatMessage};
use crate::config::AiEndpointConfig;
use crate::error::AiError;

/// Conversational tutor the exercise loop escalates to after a reveal.
#[async_trait]
pub trait Tutor: Send + Sync {
    /// # Errors
    ///
    /// Returns `AiError` when no reply could be obtained.
    async fn respond(
        &self,
        lesson_context: &str,
        history: &[ChatTurn],
        query: &str,
    ) -> Result<String, AiError>;
}

#[derive(Clone)]
pub struct HttpTutor {
    client: ChatClient,
}

impl HttpTutor {
    #[must_use]
    pub fn new(config: Option<AiEndpointConfig>) -> Self {
        Self {
            client: ChatClient::new(config),
        }
    }
}

#[async_trait]
impl Tutor for HttpTutor {
    async fn respond(
        &self,
        lesson_context: &str,
        history: &[ChatTurn],
        query: &str,
    ) -> Result<String, AiError> {
        self.client
            .complete(conversation(lesson_context, history, query), 0.4)
            .await
    }
}

fn conversation(lesson_context: &str, history: &[ChatTurn], query: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(format!(
        "You are a patient tutor. Guide the learner toward the answer with questions \
         and small steps rather than handing over a solution.\n\n{lesson_context}"
    )));
    messages.extend(history.iter().map(|turn| match turn.role {
        ChatRole::User => ChatMessage::user(turn.content.clone()),
        ChatRole::Assistant => ChatMessage::assistant(turn.content.clone()),
    }));
    messages.push(ChatMessage::user(query));
    messages
}
