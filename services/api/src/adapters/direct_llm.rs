//! services/api/src/adapters/direct_llm.rs
//!
//! This module contains the adapter that calls an OpenAI-compatible chat endpoint
//! directly with a locally configured key. Pointing the client's base URL at a
//! provider's OpenAI-compatible gateway lets the same adapter serve other models.
//! It implements the `ContentGenerator` port from the `core` crate.

use crate::adapters::{payload::parse_passage, prompt::render_prompt};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use rc_practice_core::{
    domain::{GenerationRequest, Passage},
    ports::{ContentGenerator, PortError, PortResult},
};

const SYSTEM_INSTRUCTIONS: &str = "You write reading-comprehension practice sets. Reply with a single JSON object and nothing else: no prose, no markdown.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentGenerator` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGeneratorAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGeneratorAdapter {
    /// Creates a new `OpenAiGeneratorAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Builds the client from a key and an optional OpenAI-compatible base URL.
    pub fn from_key(api_key: &str, api_base: Option<&str>, model: String) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }
        Self::new(Client::with_config(config), model)
    }
}

//=========================================================================================
// `ContentGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentGenerator for OpenAiGeneratorAdapter {
    fn name(&self) -> &str {
        "direct"
    }

    /// Generates a passage and its question set in one completion.
    async fn generate_passage(&self, request: &GenerationRequest) -> PortResult<Passage> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(render_prompt(request))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Map the error manually, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unavailable(e.to_string()))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Malformed("generation LLM returned no text content".to_string())
            })?;

        parse_passage(&text)
    }
}
