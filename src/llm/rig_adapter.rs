//! Bridges rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rust_decimal::Decimal;

use super::costs::model_cost;
use super::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};
use crate::error::LlmError;

/// Adapter wrapping any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Split our messages into a rig preamble and a single prompt.
///
/// System messages become the preamble. The remaining turns are flattened into
/// one prompt; with a single user turn the content is passed through untouched.
fn split_messages(messages: &[ChatMessage]) -> (Option<String>, String) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let turns: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != Role::System).collect();

    let preamble = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };

    let prompt = match turns.as_slice() {
        [only] => only.content.clone(),
        many => many
            .iter()
            .map(|m| match m.role {
                Role::Assistant => format!("Assistant: {}", m.content),
                _ => format!("User: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
    };

    (preamble, prompt)
}

/// rig does not surface a provider-neutral stop reason, so a response that
/// used the whole output budget is reported as truncated.
fn finish_reason(output_tokens: u64, max_tokens: Option<u32>) -> FinishReason {
    match max_tokens {
        Some(max) if output_tokens >= u64::from(max) => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        model_cost(&self.model_name)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, prompt) = split_messages(&request.messages);
        let max_tokens = request.max_tokens;

        let mut builder = self.model.completion_request(prompt);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "response contained no text content".to_string(),
            });
        }

        let output_tokens = response.usage.output_tokens;
        Ok(CompletionResponse {
            content,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(output_tokens).unwrap_or(u32::MAX),
            finish_reason: finish_reason(output_tokens, max_tokens),
        })
    }
}
