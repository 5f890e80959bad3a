//! Evaluator and tutor collaborators backed by an OpenAI-compatible endpoint.

mod client;
mod evaluator;
mod tutor;

pub use client::{ChatClient, ChatMessage};
pub use evaluator::{Evaluator, HttpEvaluator};
pub use tutor::{HttpTutor, Tutor};
