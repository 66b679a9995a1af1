//! Error types for the diff splitting, budgeting and summarization pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PrError>;

/// Every failure is fatal to a run; there is no degraded output mode.
#[derive(Error, Debug)]
pub enum PrError {
    #[error("Invalid split parameters: {reason}")]
    InvalidSplitParameters { reason: String },

    #[error("Unknown model '{name}': no context window size is known for it")]
    UnknownModel { name: String },

    #[error("Model '{name}' is not supported by the token estimator")]
    UnsupportedModel { name: String },

    #[error(
        "Prompt templates leave no room for diff content with model '{model}' \
         ({max_context_tokens} token context, segment limit {segment_token_limit}); \
         choose a larger-context model"
    )]
    SplitBudgetExceeded {
        model: String,
        max_context_tokens: usize,
        segment_token_limit: i64,
    },

    #[error(
        "Diff splits into {segments} segments; {segments} x {segment_response_token_cap} \
         summary tokens exceeds the {final_response_token_budget} token budget of the \
         final request; choose a larger-context model"
    )]
    TooManySegments {
        segments: usize,
        segment_response_token_cap: usize,
        final_response_token_budget: usize,
    },

    #[error("Remote chat request failed{}: {detail}", status_suffix(.status))]
    RemoteCallFailed { status: Option<u16>, detail: String },

    #[error("Failed to load {encoding} tokenizer: {message}")]
    Tokenizer { encoding: &'static str, message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl PrError {
    pub(crate) fn invalid_split(reason: impl Into<String>) -> Self {
        PrError::InvalidSplitParameters {
            reason: reason.into(),
        }
    }

    pub fn remote(status: Option<u16>, detail: impl Into<String>) -> Self {
        PrError::RemoteCallFailed {
            status,
            detail: detail.into(),
        }
    }
}
