//! services/api/src/adapters/backend_llm.rs
//!
//! This module contains the adapter for the hosted generation backend: a small
//! HTTP endpoint that holds the model key and relays `{ "prompt": ... }` to the model.
//! It implements the `ContentGenerator` port from the `core` crate.

use crate::adapters::{payload::parse_passage, prompt::render_prompt};
use async_trait::async_trait;
use rc_practice_core::{
    domain::{GenerationRequest, Passage},
    ports::{ContentGenerator, PortError, PortResult},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

//=========================================================================================
// Wire Structs
//=========================================================================================

#[derive(Serialize)]
struct GenerateRequestBody<'a> {
    prompt: &'a str,
}

/// The backend either relays the model response as-is or wraps it in `result`.
#[derive(Deserialize, Default)]
struct GenerateResponseBody {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    result: Option<Box<GenerateResponseBody>>,
    #[serde(default)]
    error: Option<BackendErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct BackendErrorBody {
    message: String,
}

impl GenerateResponseBody {
    fn into_text(self) -> PortResult<String> {
        if let Some(error) = self.error {
            return Err(PortError::Unavailable(error.message));
        }
        let first_text = |candidates: Vec<Candidate>| {
            candidates
                .into_iter()
                .next()
                .and_then(|c| c.content.parts.into_iter().next())
                .and_then(|p| p.text)
        };
        first_text(self.candidates)
            .or_else(|| self.result.and_then(|inner| first_text(inner.candidates)))
            .ok_or_else(|| PortError::Malformed("backend response contained no text".to_string()))
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentGenerator` by calling the hosted backend.
#[derive(Clone)]
pub struct BackendGeneratorAdapter {
    client: reqwest::Client,
    endpoint: String,
}

impl BackendGeneratorAdapter {
    /// Creates a new `BackendGeneratorAdapter` for the given endpoint URL.
    pub fn new(endpoint: String) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self { client, endpoint })
    }
}

//=========================================================================================
// `ContentGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentGenerator for BackendGeneratorAdapter {
    fn name(&self) -> &str {
        "backend"
    }

    async fn generate_passage(&self, request: &GenerationRequest) -> PortResult<Passage> {
        let prompt = render_prompt(request);
        debug!("Posting {} prompt characters to {}", prompt.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequestBody { prompt: &prompt })
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Unavailable(format!(
                "backend responded with {}",
                status
            )));
        }

        let body: GenerateResponseBody = response
            .json()
            .await
            .map_err(|e| PortError::Malformed(e.to_string()))?;

        parse_passage(&body.into_text()?)
    }
}
