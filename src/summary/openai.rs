//! OpenAI chat-completion backend.

use std::future::Future;
use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, FinishReason,
    },
};
use secrecy::{ExposeSecret as _, SecretString};

use super::{Prompt, SummaryService, SummaryServiceError};
use crate::config::AiConfig;

/// [`SummaryService`] backed by an OpenAI-compatible endpoint.
///
/// The client's own retry loop is switched off: a summary request maps to
/// exactly one HTTP call, and failures are reported instead of repeated.
pub struct OpenAiSummaryService {
    client: Client<OpenAIConfig>,
    config: AiConfig,
}

impl OpenAiSummaryService {
    pub fn new(api_key: &SecretString, config: AiConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key.expose_secret());
        if let Some(base) = &config.api_base {
            openai_config = openai_config.with_api_base(base);
        }

        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        let client = Client::with_config(openai_config).with_backoff(no_retry);

        Self { client, config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    fn build_request(&self, prompt: &Prompt) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system.as_str())
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user.as_str())
                .build()?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(messages)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build()
    }
}

impl SummaryService for OpenAiSummaryService {
    fn complete(
        &self,
        prompt: &Prompt,
    ) -> impl Future<Output = Result<String, SummaryServiceError>> + Send {
        let request = self.build_request(prompt);
        async move {
            let request = request.map_err(classify)?;
            tracing::debug!(model = %self.config.model, "Sending chat completion request");

            let response = self.client.chat().create(request).await.map_err(classify)?;

            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or(SummaryServiceError::EmptyResponse)?;

            if let Some(refusal) = choice.message.refusal {
                return Err(SummaryServiceError::Refused(refusal));
            }
            if matches!(choice.finish_reason, Some(FinishReason::ContentFilter)) {
                return Err(SummaryServiceError::Refused(
                    "response withheld by the content filter".to_owned(),
                ));
            }

            choice
                .message
                .content
                .filter(|text| !text.trim().is_empty())
                .ok_or(SummaryServiceError::EmptyResponse)
        }
    }
}

/// Map a client error onto the service-independent taxonomy.
fn classify(err: OpenAIError) -> SummaryServiceError {
    match err {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_deref().unwrap_or_default();
            let kind = api.r#type.as_deref().unwrap_or_default();
            match (code, kind) {
                ("invalid_api_key", _) | (_, "authentication_error" | "invalid_authentication") => {
                    SummaryServiceError::Authentication(api.message)
                }
                ("rate_limit_exceeded" | "insufficient_quota", _)
                | (_, "insufficient_quota" | "rate_limit_error" | "requests" | "tokens") => {
                    SummaryServiceError::RateLimited(api.message)
                }
                _ => SummaryServiceError::Api(api.message),
            }
        }
        OpenAIError::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
            Some(401 | 403) => SummaryServiceError::Authentication(e.to_string()),
            Some(429) => SummaryServiceError::RateLimited(e.to_string()),
            _ => SummaryServiceError::Network(e.to_string()),
        },
        other => SummaryServiceError::Api(other.to_string()),
    }
}
