//! Context window sizes for the chat models we know how to budget for.

use std::collections::BTreeMap;

use crate::error::{PrError, Result};

/// Known model identifiers and their context window (request + reply) in tokens.
const CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("gpt-3.5-turbo", 4096),
    ("gpt-3.5-turbo-0613", 4096),
    ("gpt-3.5-turbo-16k", 16384),
    ("gpt-3.5-turbo-16k-0613", 16384),
    ("gpt-4", 8192),
    ("gpt-4-0314", 8192),
    ("gpt-4-0613", 8192),
    ("gpt-4-32k", 32768),
    ("gpt-4-32k-0314", 32768),
    ("gpt-4-32k-0613", 32768),
    ("gpt-4o", 128000),
    ("gpt-4o-2024-08-06", 128000),
    ("gpt-4o-mini", 128000),
    ("gpt-4o-mini-2024-07-18", 128000),
];

/// Look up a model's context window in the static table.
pub fn max_tokens_for(model: &str) -> Option<usize> {
    CONTEXT_WINDOWS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, tokens)| *tokens)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProfile {
    name: String,
    max_context_tokens: usize,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>, max_context_tokens: usize) -> Self {
        ModelProfile {
            name: name.into(),
            max_context_tokens,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_context_tokens(&self) -> usize {
        self.max_context_tokens
    }
}

/// The static table plus any context windows the user declared explicitly.
///
/// Overrides win over built-in entries. A name found in neither is an error;
/// a window size is never guessed.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    overrides: BTreeMap<String, usize>,
}

impl ModelCatalog {
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, name: impl Into<String>, max_context_tokens: usize) -> Self {
        self.overrides.insert(name.into(), max_context_tokens);
        self
    }

    pub fn max_tokens_for(&self, model: &str) -> Option<usize> {
        self.overrides
            .get(model)
            .copied()
            .or_else(|| max_tokens_for(model))
            .filter(|tokens| *tokens > 0)
    }

    pub fn profile(&self, model: &str) -> Result<ModelProfile> {
        let max_context_tokens =
            self.max_tokens_for(model)
                .ok_or_else(|| PrError::UnknownModel {
                    name: model.to_string(),
                })?;
        Ok(ModelProfile::new(model, max_context_tokens))
    }
}
