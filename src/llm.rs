//! Text generation capability backed by OpenAI chat completions.

use crate::config::ModelSettings;
use crate::error::{Result, VidragError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// One message of a chat-style generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant(String),
}

/// Generates text from prompts.
///
/// Errors are returned unchanged so callers can pick their own fallback.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply to a conversation.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Generate a reply to a single user prompt.
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(&[ChatMessage::User(prompt.to_string())]).await
    }
}

/// OpenAI chat-completions generator.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_completion_tokens: u32,
}

impl OpenAIGenerator {
    pub fn new(model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
            temperature: 1.0,
            max_completion_tokens: 2048,
        })
    }

    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        Ok(Self::new(&settings.model_name)?
            .with_temperature(settings.temperature)
            .with_max_completion_tokens(settings.max_completion_tokens))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_completion_tokens(mut self, max_completion_tokens: u32) -> Self {
        self.max_completion_tokens = max_completion_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
        let built: std::result::Result<ChatCompletionRequestMessage, _> = match message {
            ChatMessage::System(content) => ChatCompletionRequestSystemMessageArgs::default()
                .content(content.clone())
                .build()
                .map(Into::into),
            ChatMessage::User(content) => ChatCompletionRequestUserMessageArgs::default()
                .content(content.clone())
                .build()
                .map(Into::into),
            ChatMessage::Assistant(content) => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content.clone())
                .build()
                .map(Into::into),
        };
        built.map_err(|e| VidragError::Generation(e.to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    #[instrument(skip(self, messages), fields(model = %self.model, messages = messages.len()))]
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request_messages = messages
            .iter()
            .map(Self::to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(request_messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_completion_tokens)
            .build()
            .map_err(|e| VidragError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| VidragError::OpenAI(format!("Failed to generate response: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| VidragError::Generation("Empty response from model".to_string()))?
            .clone();

        debug!("Generated {} characters", content.chars().count());
        Ok(content)
    }
}
