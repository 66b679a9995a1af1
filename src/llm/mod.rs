pub mod openai;
pub mod prompt_builder;
pub mod prompts;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One role-tagged message within a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        ConversationTurn {
            role,
            content: content.into(),
        }
    }
}

/// Per-request knobs passed alongside the turns.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub model: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

impl ChatOptions {
    pub fn new(model: impl Into<String>) -> Self {
        ChatOptions {
            model: model.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A remote chat-completion capability.
///
/// Implementations hold no conversation state between calls: every request
/// carries all the context it needs, and the reply is a single text.
pub trait ChatBackend: Send + Sync {
    fn send(&self, turns: &[ConversationTurn], options: &ChatOptions) -> Result<String>;
}

/// Truncate long strings for debug logging.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...\n[truncated {} bytes]", &s[..cut], s.len() - cut)
}
