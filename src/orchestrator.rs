//! Two-stage summarize-then-compose run over a diff.

use crate::budget::{self, PromptBudget, RESERVED_REPLY_MARGIN};
use crate::error::Result;
use crate::llm::{ChatBackend, ChatOptions, prompt_builder, truncate};
use crate::models::{ModelCatalog, ModelProfile};
use crate::split::{CharSplitter, DEFAULT_OVERLAP, DiffSegment, SplitStrategy, TokenSplitter};
use crate::tokens::TokenEstimator;

/// How the diff is cut into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Token-aware, line-biased segments sized from the planned budget.
    Tokens { overlap: usize },
    /// Fixed-width character segments.
    Chars { max_chars: usize },
}

impl Default for SplitMode {
    fn default() -> Self {
        SplitMode::Tokens {
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Everything a run needs besides the diff and the remote capability.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub model: String,
    pub split: SplitMode,
    pub temperature: Option<f32>,
}

impl RunSettings {
    pub fn new(model: impl Into<String>) -> Self {
        RunSettings {
            model: model.into(),
            split: SplitMode::default(),
            temperature: None,
        }
    }

    pub fn with_split(mut self, split: SplitMode) -> Self {
        self.split = split;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Planning,
    /// `segment` is 1-based.
    Summarizing { segment: usize, total: usize },
    Composing,
    Done,
    Failed,
}

/// Outcome of the planning state: nothing has been sent yet.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub profile: ModelProfile,
    pub budget: PromptBudget,
    pub segments: Vec<DiffSegment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    pub description: String,
    /// Segment summaries, in segment order.
    pub summaries: Vec<String>,
    pub segments: Vec<DiffSegment>,
    pub budget: Option<PromptBudget>,
}

/// Plan a run without calling the model: resolve the model, derive the
/// budget, split the diff, and check the final request can hold every summary.
///
/// A diff with no non-whitespace content yields zero segments.
pub fn prepare_run(settings: &RunSettings, catalog: &ModelCatalog, diff: &str) -> Result<RunPlan> {
    let profile = catalog.profile(&settings.model)?;
    let estimator = TokenEstimator::for_model(&settings.model)?;
    let budget = budget::plan(&profile, &estimator)?;

    let segments = if diff.trim().is_empty() {
        Vec::new()
    } else {
        match settings.split {
            SplitMode::Tokens { overlap } => TokenSplitter::new(&estimator, budget.segment_token_limit)
                .with_overlap(overlap)
                .split(diff)?,
            SplitMode::Chars { max_chars } => CharSplitter::new(max_chars).split(diff)?,
        }
    };

    budget.check_segment_count(segments.len())?;

    Ok(RunPlan {
        profile,
        budget,
        segments,
    })
}

/// Drives one run against a chat backend.
pub struct Orchestrator<'a> {
    backend: &'a dyn ChatBackend,
    settings: RunSettings,
    catalog: ModelCatalog,
}

impl<'a> Orchestrator<'a> {
    pub fn new(backend: &'a dyn ChatBackend, settings: RunSettings) -> Self {
        Orchestrator {
            backend,
            settings,
            catalog: ModelCatalog::builtin(),
        }
    }

    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn run(&self, diff: &str) -> Result<RunResult> {
        self.run_with(diff, |_| {})
    }

    /// Run, reporting each state transition to `observer`.
    pub fn run_with<F>(&self, diff: &str, mut observer: F) -> Result<RunResult>
    where
        F: FnMut(&RunState),
    {
        let result = self.drive(diff, &mut observer);
        match &result {
            Ok(_) => observer(&RunState::Done),
            Err(e) => {
                log::error!("Run failed: {e}");
                observer(&RunState::Failed);
            }
        }
        result
    }

    fn drive(&self, diff: &str, observer: &mut dyn FnMut(&RunState)) -> Result<RunResult> {
        observer(&RunState::Planning);
        let plan = prepare_run(&self.settings, &self.catalog, diff)?;

        if plan.segments.is_empty() {
            log::info!("Diff is empty; nothing to summarize");
            return Ok(RunResult {
                budget: Some(plan.budget),
                ..RunResult::default()
            });
        }

        let summaries = self.summarize(&plan, observer)?;

        observer(&RunState::Composing);
        let description = self.compose(&summaries.concat())?;

        Ok(RunResult {
            description,
            summaries,
            segments: plan.segments,
            budget: Some(plan.budget),
        })
    }

    fn summarize(&self, plan: &RunPlan, observer: &mut dyn FnMut(&RunState)) -> Result<Vec<String>> {
        let total = plan.segments.len();
        let options = ChatOptions::new(&self.settings.model)
            .with_max_tokens(plan.budget.segment_response_token_cap)
            .with_temperature(self.settings.temperature);

        let mut summaries = Vec::with_capacity(total);
        for segment in &plan.segments {
            let part = segment.index + 1;
            observer(&RunState::Summarizing {
                segment: part,
                total,
            });

            let prompts = prompt_builder::code_summary_prompt(&segment.text, part, total);
            log::trace!(
                "Summary prompt for part {part}/{total}:\n{}",
                truncate(&prompts.user, 2000)
            );

            let summary = self.backend.send(&prompts.into_turns(), &options)?;
            log::debug!(
                "Summary for part {part}/{total}:\n{}",
                truncate(&summary, 1000)
            );
            summaries.push(summary);
        }

        Ok(summaries)
    }

    fn compose(&self, summaries: &str) -> Result<String> {
        let options = ChatOptions::new(&self.settings.model)
            .with_max_tokens(RESERVED_REPLY_MARGIN)
            .with_temperature(self.settings.temperature);

        let prompts = prompt_builder::pr_description_prompt(summaries);
        log::trace!("PR description prompt:\n{}", truncate(&prompts.user, 3500));

        self.backend.send(&prompts.into_turns(), &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrError;

    #[test]
    fn empty_diff_plans_zero_segments() {
        let plan = prepare_run(&RunSettings::new("gpt-4"), &ModelCatalog::builtin(), "").unwrap();
        assert!(plan.segments.is_empty());
        assert_eq!(plan.profile.max_context_tokens(), 8192);

        let plan = prepare_run(&RunSettings::new("gpt-4"), &ModelCatalog::builtin(), " \n\t").unwrap();
        assert!(plan.segments.is_empty());
    }

    #[test]
    fn char_mode_uses_the_requested_width() {
        let settings = RunSettings::new("gpt-4o").with_split(SplitMode::Chars { max_chars: 12_000 });
        let diff = "a".repeat(30_000);
        let plan = prepare_run(&settings, &ModelCatalog::builtin(), &diff).unwrap();
        let lens: Vec<usize> = plan.segments.iter().map(|s| s.char_len()).collect();
        assert_eq!(lens, vec![12_000, 12_000, 6_000]);
    }

    #[test]
    fn char_mode_with_zero_width_is_rejected() {
        let settings = RunSettings::new("gpt-4").with_split(SplitMode::Chars { max_chars: 0 });
        let err = prepare_run(&settings, &ModelCatalog::builtin(), "+x\n").unwrap_err();
        assert!(matches!(err, PrError::InvalidSplitParameters { .. }));
    }

    #[test]
    fn too_many_segments_fails_during_planning() {
        // 8192 context: each summary may take 819 tokens, so only a handful
        // of segments fit the final request.
        let settings = RunSettings::new("gpt-4").with_split(SplitMode::Chars { max_chars: 100 });
        let diff = "+line of code\n".repeat(500);
        let err = prepare_run(&settings, &ModelCatalog::builtin(), &diff).unwrap_err();
        assert!(matches!(err, PrError::TooManySegments { segments: 70, .. }));
    }

    #[test]
    fn settings_default_to_token_mode() {
        let settings = RunSettings::new("gpt-4");
        assert_eq!(settings.split, SplitMode::Tokens { overlap: 1000 });
        assert_eq!(settings.temperature, None);
    }
}
