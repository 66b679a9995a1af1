//! Token accounting for chat requests.
//!
//! Counts come from the BPE encoding the target model family uses, plus the
//! fixed framing overhead the chat endpoint adds around each message and the
//! reply it primes.

use tiktoken_rs::CoreBPE;

use crate::error::{PrError, Result};
use crate::llm::ConversationTurn;

/// Framing tokens added around every message.
pub const TOKENS_PER_MESSAGE: usize = 3;
/// Tokens the endpoint spends priming the assistant reply.
pub const REPLY_PRIMING_TOKENS: usize = 3;

/// Raw encoded length of a text, with no chat framing.
pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cl100kBase,
    O200kBase,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::O200kBase => "o200k_base",
        }
    }

    fn load(self) -> Result<CoreBPE> {
        let loaded = match self {
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
        };
        loaded.map_err(|e| PrError::Tokenizer {
            encoding: self.as_str(),
            message: e.to_string(),
        })
    }
}

/// Dated model variants whose accounting rule is known exactly.
const KNOWN_VARIANTS: &[(&str, Encoding)] = &[
    ("gpt-3.5-turbo-0613", Encoding::Cl100kBase),
    ("gpt-3.5-turbo-16k-0613", Encoding::Cl100kBase),
    ("gpt-4-0314", Encoding::Cl100kBase),
    ("gpt-4-32k-0314", Encoding::Cl100kBase),
    ("gpt-4-0613", Encoding::Cl100kBase),
    ("gpt-4-32k-0613", Encoding::Cl100kBase),
    ("gpt-4o-2024-08-06", Encoding::O200kBase),
    ("gpt-4o-mini-2024-07-18", Encoding::O200kBase),
];

/// Family prefix -> dated variant used when the exact name is not known.
/// More specific prefixes come before the families they extend.
const FAMILY_FALLBACKS: &[(&str, &str)] = &[
    ("gpt-4o-mini", "gpt-4o-mini-2024-07-18"),
    ("gpt-3.5-turbo-16k", "gpt-3.5-turbo-16k-0613"),
    ("gpt-3.5-turbo", "gpt-3.5-turbo-0613"),
    ("gpt-4o", "gpt-4o-2024-08-06"),
    ("gpt-4", "gpt-4-0613"),
];

fn known_encoding(variant: &str) -> Option<Encoding> {
    KNOWN_VARIANTS
        .iter()
        .find(|(name, _)| *name == variant)
        .map(|(_, encoding)| *encoding)
}

/// Resolve a model name to the dated variant whose accounting applies.
///
/// Returns the variant and whether it was reached through a family fallback.
fn resolve_variant(model: &str) -> Result<(&'static str, Encoding, bool)> {
    if let Some((name, encoding)) = KNOWN_VARIANTS.iter().find(|(name, _)| *name == model) {
        return Ok((*name, *encoding, false));
    }

    for (prefix, variant) in FAMILY_FALLBACKS {
        if model.starts_with(prefix) {
            if let Some(encoding) = known_encoding(variant) {
                return Ok((*variant, encoding, true));
            }
        }
    }

    Err(PrError::UnsupportedModel {
        name: model.to_string(),
    })
}

/// Estimates what a text costs when submitted to a given model's chat endpoint.
pub struct TokenEstimator {
    model: String,
    resolved_model: &'static str,
    encoding: Encoding,
    bpe: CoreBPE,
}

impl TokenEstimator {
    /// Build an estimator for `model`.
    ///
    /// Names that only match a known family by prefix fall back to that
    /// family's dated variant and log a warning; anything else is
    /// `UnsupportedModel`.
    pub fn for_model(model: &str) -> Result<Self> {
        let (resolved_model, encoding, fell_back) = resolve_variant(model)?;
        if fell_back {
            log::warn!(
                "{model} may change over time; estimating tokens as if it were {resolved_model}"
            );
        }

        Ok(TokenEstimator {
            model: model.to_string(),
            resolved_model,
            encoding,
            bpe: encoding.load()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The dated variant whose accounting rule is applied.
    pub fn resolved_model(&self) -> &'static str {
        self.resolved_model
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Tokens for `text` sent as a single message, including reply priming.
    pub fn estimate(&self, text: &str) -> usize {
        TOKENS_PER_MESSAGE + self.count(text) + REPLY_PRIMING_TOKENS
    }

    /// Tokens for a whole request made of `turns`.
    pub fn estimate_turns(&self, turns: &[ConversationTurn]) -> usize {
        let messages: usize = turns
            .iter()
            .map(|turn| TOKENS_PER_MESSAGE + self.count(&turn.content))
            .sum();
        messages + REPLY_PRIMING_TOKENS
    }
}

impl TokenCounter for TokenEstimator {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// One-shot form of [`TokenEstimator::estimate`].
pub fn estimate_tokens(text: &str, model: &str) -> Result<usize> {
    Ok(TokenEstimator::for_model(model)?.estimate(text))
}
