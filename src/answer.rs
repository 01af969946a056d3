//! Retrieval-augmented question answering over a session.

use crate::config::Prompts;
use crate::error::{Result, VidragError};
use crate::llm::{ChatMessage, TextGenerator};
use crate::session::ChatTurn;
use crate::vector_store::{RetrievedChunk, Retriever};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// An answer together with the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
}

/// Answers questions from a session's retriever and chat history.
pub struct Answerer {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn TextGenerator>,
    prompts: Prompts,
}

impl Answerer {
    pub fn new(retriever: Arc<dyn Retriever>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            retriever,
            generator,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Answer `question`, taking earlier turns of the conversation into account.
    #[instrument(skip(self, history), fields(turns = history.len()))]
    pub async fn answer(&self, question: &str, history: &[ChatTurn]) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(VidragError::InvalidInput("question is empty".into()));
        }
        info!("Answering question: {}", question);

        let sources = self.retriever.retrieve(question).await?;
        let messages = self.build_messages(question, history, &sources);

        let answer = self
            .generator
            .chat(&messages)
            .await
            .map_err(|e| VidragError::Answer(e.to_string()))?;

        debug!("Answered with {} source chunks", sources.len());
        Ok(Answer { answer, sources })
    }

    fn build_messages(
        &self,
        question: &str,
        history: &[ChatTurn],
        sources: &[RetrievedChunk],
    ) -> Vec<ChatMessage> {
        let context = sources
            .iter()
            .map(|s| s.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut vars = HashMap::new();
        vars.insert("context".to_string(), context);
        let system = self.prompts.render_with_custom(&self.prompts.answer.system, &vars);

        let mut messages = vec![ChatMessage::System(system)];
        for turn in history {
            // "System" turns carry a notice in the answer slot only.
            if !turn.question.is_empty() && !turn.question.eq_ignore_ascii_case("system") {
                messages.push(ChatMessage::User(turn.question.clone()));
            }
            if !turn.answer.is_empty() {
                messages.push(ChatMessage::Assistant(turn.answer.clone()));
            }
        }
        messages.push(ChatMessage::User(question.to_string()));
        messages
    }
}
