//! Token budgets for the two request kinds of a run.
//!
//! Each segment request carries the code-summary prompt pair plus one diff
//! segment and gets a capped reply. The final request carries the
//! PR-description prompt pair plus every segment summary, and keeps a fixed
//! margin free for its own reply.

use crate::error::{PrError, Result};
use crate::llm::prompt_builder;
use crate::models::{ModelCatalog, ModelProfile};
use crate::tokens::TokenEstimator;

/// Tokens kept free for the final PR description reply.
pub const RESERVED_REPLY_MARGIN: usize = 1500;
/// Share of the context window each segment summary may use.
const SEGMENT_RESPONSE_SHARE: f64 = 0.1;
/// Widest part markers the code-summary prompt will carry.
const WORST_CASE_PART: usize = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBudget {
    /// Tokens available for the diff text of one segment.
    pub segment_token_limit: usize,
    /// Reply cap for each segment summary.
    pub segment_response_token_cap: usize,
    /// Tokens available for the concatenated summaries in the final request.
    pub final_response_token_budget: usize,
    pub max_context_tokens: usize,
}

impl PromptBudget {
    /// Fail fast when every segment's longest possible summary could not fit
    /// the final request.
    pub fn check_segment_count(&self, segments: usize) -> Result<()> {
        let needed = segments.saturating_mul(self.segment_response_token_cap);
        if needed > self.final_response_token_budget {
            return Err(PrError::TooManySegments {
                segments,
                segment_response_token_cap: self.segment_response_token_cap,
                final_response_token_budget: self.final_response_token_budget,
            });
        }
        Ok(())
    }
}

/// Token cost of the code-summary prompt pair around an empty segment.
pub fn code_summary_prompt_cost(estimator: &TokenEstimator) -> usize {
    let turns = prompt_builder::code_summary_prompt("", WORST_CASE_PART, WORST_CASE_PART).into_turns();
    estimator.estimate_turns(&turns)
}

/// Token cost of the PR-description prompt pair around empty summaries.
pub fn pr_description_prompt_cost(estimator: &TokenEstimator) -> usize {
    let turns = prompt_builder::pr_description_prompt("").into_turns();
    estimator.estimate_turns(&turns)
}

/// Derive the run's budget from the model's context window.
pub fn plan(profile: &ModelProfile, estimator: &TokenEstimator) -> Result<PromptBudget> {
    let max_context_tokens = profile.max_context_tokens();
    let summary_cost = code_summary_prompt_cost(estimator);
    let description_cost = pr_description_prompt_cost(estimator);

    let final_response_token_budget = max_context_tokens
        .saturating_sub(RESERVED_REPLY_MARGIN)
        .saturating_sub(description_cost);
    let segment_response_token_cap =
        (max_context_tokens as f64 * SEGMENT_RESPONSE_SHARE).floor() as usize;
    let segment_token_limit = max_context_tokens as i64
        - summary_cost as i64
        - segment_response_token_cap as i64;

    log::debug!(
        "Budget for {} ({} tokens): summary prompt={}, description prompt={}, \
         segment limit={}, segment reply cap={}, final budget={}",
        profile.name(),
        max_context_tokens,
        summary_cost,
        description_cost,
        segment_token_limit,
        segment_response_token_cap,
        final_response_token_budget
    );

    if segment_token_limit <= 0 {
        return Err(PrError::SplitBudgetExceeded {
            model: profile.name().to_string(),
            max_context_tokens,
            segment_token_limit,
        });
    }

    Ok(PromptBudget {
        segment_token_limit: segment_token_limit as usize,
        segment_response_token_cap,
        final_response_token_budget,
        max_context_tokens,
    })
}

/// Resolve `model` in the catalog and plan for it.
pub fn plan_for_model(catalog: &ModelCatalog, model: &str) -> Result<PromptBudget> {
    let profile = catalog.profile(model)?;
    let estimator = TokenEstimator::for_model(model)?;
    plan(&profile, &estimator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> TokenEstimator {
        TokenEstimator::for_model("gpt-3.5-turbo").unwrap()
    }

    #[test]
    fn plan_for_a_4096_token_model() {
        let estimator = estimator();
        let profile = ModelProfile::new("gpt-3.5-turbo", 4096);
        let budget = plan(&profile, &estimator).unwrap();

        assert!(budget.segment_token_limit > 0);
        assert!(budget.segment_token_limit < 4096);
        assert_eq!(budget.segment_response_token_cap, 409);
        assert_eq!(
            budget.segment_token_limit,
            4096 - code_summary_prompt_cost(&estimator) - 409
        );
        assert_eq!(
            budget.final_response_token_budget,
            4096 - 1500 - pr_description_prompt_cost(&estimator)
        );
        assert_eq!(budget.max_context_tokens, 4096);
    }

    #[test]
    fn tiny_context_window_cannot_fit_the_prompts() {
        let profile = ModelProfile::new("tiny", 10);
        let err = plan(&profile, &estimator()).unwrap_err();
        assert!(matches!(
            err,
            PrError::SplitBudgetExceeded { max_context_tokens: 10, segment_token_limit, .. }
                if segment_token_limit <= 0
        ));
    }

    #[test]
    fn prompt_costs_include_framing() {
        let estimator = estimator();
        // Two messages of framing plus reply priming, at minimum.
        assert!(code_summary_prompt_cost(&estimator) > 9);
        assert!(pr_description_prompt_cost(&estimator) > 9);
    }

    #[test]
    fn plan_for_model_resolves_through_the_catalog() {
        let budget = plan_for_model(&ModelCatalog::builtin(), "gpt-4").unwrap();
        assert_eq!(budget.max_context_tokens, 8192);
        assert_eq!(budget.segment_response_token_cap, 819);
    }

    #[test]
    fn unknown_model_fails_before_estimating() {
        let err = plan_for_model(&ModelCatalog::builtin(), "not-a-real-model").unwrap_err();
        assert!(matches!(err, PrError::UnknownModel { .. }));
    }

    #[test]
    fn configured_window_for_unsupported_family_fails_in_the_estimator() {
        let catalog = ModelCatalog::builtin().with_override("llama3", 8192);
        let err = plan_for_model(&catalog, "llama3").unwrap_err();
        assert!(matches!(err, PrError::UnsupportedModel { .. }));
    }

    #[test]
    fn segment_count_check() {
        let budget = PromptBudget {
            segment_token_limit: 3500,
            segment_response_token_cap: 400,
            final_response_token_budget: 2000,
            max_context_tokens: 4096,
        };

        assert!(budget.check_segment_count(0).is_ok());
        assert!(budget.check_segment_count(5).is_ok());
        let err = budget.check_segment_count(6).unwrap_err();
        assert!(matches!(err, PrError::TooManySegments { segments: 6, .. }));
    }
}
