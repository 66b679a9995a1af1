use crate::llm::prompts;
use crate::llm::{ChatRole, ConversationTurn};

pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    /// Request turns in the order they are sent: user first, then system.
    pub fn into_turns(self) -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::new(ChatRole::User, self.user),
            ConversationTurn::new(ChatRole::System, self.system),
        ]
    }
}

/// Prompt asking for a summary of one diff segment.
///
/// `part` is 1-based; the segment is framed with part markers so the model
/// knows it is looking at a slice of a larger diff.
pub fn code_summary_prompt(segment: &str, part: usize, total: usize) -> PromptPair {
    let user = format!(
        "{instructions}\n\n\
         [START PART {part}/{total}]\n\
         ```diff\n{segment}\n```\n\
         [END PART {part}/{total}]",
        instructions = prompts::CODE_SUMMARY_USER,
    );

    PromptPair {
        system: prompts::CODE_SUMMARY_SYSTEM.to_owned(),
        user,
    }
}

/// Prompt asking for the final PR description from the concatenated summaries.
pub fn pr_description_prompt(summaries: &str) -> PromptPair {
    let user = format!(
        "{instructions}\n\n{summaries}",
        instructions = prompts::PR_DESCRIPTION_USER,
    );

    PromptPair {
        system: prompts::PR_DESCRIPTION_SYSTEM.to_owned(),
        user,
    }
}
