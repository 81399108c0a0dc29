//! Natural-language summary of a dataset.
//!
//! - [`prompt`]: turns statistics, sample rows and a question into a bounded [`Prompt`]
//! - [`openai`]: the OpenAI-backed [`SummaryService`]
//! - [`gate`]: supersede/cancel bookkeeping for in-flight requests
//!
//! [`Summarizer`] ties them together: one service call per request, an optional
//! timeout, and a newer request always supersedes an older one.

pub mod gate;
pub mod openai;
pub mod prompt;

use std::future::Future;
use std::time::Duration;

pub use gate::{SummaryGate, Ticket};
pub use openai::OpenAiSummaryService;
pub use prompt::{MAX_CELL_CHARS, MAX_SAMPLE_ROWS, Prompt, SampleRows, SummaryRequest};

/// Default limit on a single summarization call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Ways the summarization collaborator can fail. None of them abort a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummaryServiceError {
    #[error("the service rejected the credential: {0}")]
    Authentication(String),

    #[error("the service is rate limiting requests: {0}")]
    RateLimited(String),

    #[error("cannot reach the service: {0}")]
    Network(String),

    #[error("no response within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("the service refused to answer: {0}")]
    Refused(String),

    #[error("the service returned an empty response")]
    EmptyResponse,

    #[error("superseded by a newer summary request")]
    Superseded,

    #[error("service error: {0}")]
    Api(String),
}

/// A language-model backend that answers one prompt.
pub trait SummaryService: Send + Sync {
    fn complete(
        &self,
        prompt: &Prompt,
    ) -> impl Future<Output = Result<String, SummaryServiceError>> + Send;
}

/// Final state of a summary request, as stored by a session and shown in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Completed(String),
    Failed(SummaryServiceError),
}

impl SummaryOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed(text) => Some(text),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&SummaryServiceError> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(err) => Some(err),
        }
    }
}

impl From<Result<String, SummaryServiceError>> for SummaryOutcome {
    fn from(result: Result<String, SummaryServiceError>) -> Self {
        match result {
            Ok(text) => Self::Completed(text),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Runs summary requests against a [`SummaryService`].
pub struct Summarizer<S> {
    service: S,
    timeout: Option<Duration>,
    gate: SummaryGate,
}

impl<S: SummaryService> Summarizer<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            timeout: Some(DEFAULT_TIMEOUT),
            gate: SummaryGate::default(),
        }
    }

    /// `None` waits for the service indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Cancel the in-flight request, if any. It resolves to `Superseded`.
    pub fn cancel(&self) -> bool {
        self.gate.cancel()
    }

    /// Build the prompt and make exactly one service call.
    ///
    /// # Errors
    ///
    /// Returns the service's failure, [`SummaryServiceError::Timeout`] when the
    /// configured limit passes, and [`SummaryServiceError::Superseded`] when a
    /// newer request starts (or [`Self::cancel`] is called) first.
    pub async fn summarize(&self, request: &SummaryRequest) -> Result<String, SummaryServiceError> {
        let prompt = request.prompt();
        let mut ticket = self.gate.begin();
        tracing::info!(
            request = ticket.id(),
            prompt_chars = prompt.char_count(),
            "Requesting summary"
        );

        let call = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.service.complete(&prompt))
                    .await
                    .unwrap_or(Err(SummaryServiceError::Timeout(limit))),
                None => self.service.complete(&prompt).await,
            }
        };

        let result = tokio::select! {
            biased;
            () = ticket.superseded() => Err(SummaryServiceError::Superseded),
            result = call => result,
        };
        self.gate.finish(&ticket);

        let result = result.and_then(|text| {
            let text = text.trim();
            if text.is_empty() {
                Err(SummaryServiceError::EmptyResponse)
            } else {
                Ok(text.to_owned())
            }
        });

        match &result {
            Ok(text) => tracing::info!(request = ticket.id(), chars = text.len(), "Summary received"),
            Err(err) => tracing::warn!(request = ticket.id(), "Summary failed: {err}"),
        }
        result
    }
}
