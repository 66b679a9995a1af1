use std::collections::VecDeque;
use std::sync::Mutex;

use prdescribe::llm::{prompts, ChatBackend, ChatOptions, ChatRole, ConversationTurn};
use prdescribe::models::ModelCatalog;
use prdescribe::{Orchestrator, PrError, Result, RunSettings, RunState, SplitMode};

/// Replies from a script and records every request it receives.
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<(Vec<ConversationTurn>, ChatOptions)>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<String>>) -> Self {
        ScriptedBackend {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    fn requests(&self) -> Vec<(Vec<ConversationTurn>, ChatOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatBackend for ScriptedBackend {
    fn send(&self, turns: &[ConversationTurn], options: &ChatOptions) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((turns.to_vec(), options.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PrError::remote(None, "script exhausted")))
    }
}

fn three_part_settings() -> RunSettings {
    RunSettings::new("gpt-4o").with_split(SplitMode::Chars { max_chars: 12_000 })
}

fn sample_diff(chars: usize) -> String {
    let line = "+    let value = compute(input);\n";
    line.repeat(chars / line.len() + 1)[..chars].to_string()
}

#[test]
fn summaries_are_concatenated_in_segment_order() {
    let backend = ScriptedBackend::replying(&["A", "B", "C", "## Description\nDone"]);
    let orchestrator = Orchestrator::new(&backend, three_part_settings());

    let result = orchestrator.run(&sample_diff(30_000)).unwrap();

    assert_eq!(result.summaries, vec!["A", "B", "C"]);
    assert_eq!(result.description, "## Description\nDone");
    assert_eq!(result.segments.len(), 3);

    let requests = backend.requests();
    assert_eq!(requests.len(), 4);

    let (final_turns, _) = &requests[3];
    assert_eq!(final_turns[0].role, ChatRole::User);
    assert!(final_turns[0].content.ends_with("ABC"));
    assert_eq!(final_turns[1].role, ChatRole::System);
    assert_eq!(final_turns[1].content, prompts::PR_DESCRIPTION_SYSTEM);
}

#[test]
fn each_segment_request_restates_the_prompt_pair() {
    let backend = ScriptedBackend::replying(&["A", "B", "C", "PR"]);
    let orchestrator = Orchestrator::new(&backend, three_part_settings());
    let diff = sample_diff(30_000);

    let result = orchestrator.run(&diff).unwrap();
    let budget = result.budget.unwrap();
    let requests = backend.requests();

    for (i, (turns, options)) in requests[..3].iter().enumerate() {
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, ChatRole::User);
        assert!(turns[0].content.starts_with(prompts::CODE_SUMMARY_USER));
        assert!(turns[0].content.contains(&result.segments[i].text));
        assert!(turns[0].content.contains(&format!("[START PART {}/3]", i + 1)));
        assert_eq!(turns[1].role, ChatRole::System);
        assert_eq!(turns[1].content, prompts::CODE_SUMMARY_SYSTEM);

        assert_eq!(options.model, "gpt-4o");
        assert_eq!(options.max_tokens, Some(budget.segment_response_token_cap));
    }
}

#[test]
fn empty_diff_makes_no_remote_calls() {
    let backend = ScriptedBackend::replying(&[]);
    let orchestrator = Orchestrator::new(&backend, RunSettings::new("gpt-4"));

    let result = orchestrator.run("").unwrap();

    assert!(result.description.is_empty());
    assert!(result.summaries.is_empty());
    assert!(result.segments.is_empty());
    assert!(backend.requests().is_empty());
}

#[test]
fn unknown_model_fails_without_remote_calls() {
    let backend = ScriptedBackend::replying(&["unused"]);
    let orchestrator = Orchestrator::new(&backend, RunSettings::new("not-a-real-model"));

    let err = orchestrator.run(&sample_diff(500)).unwrap_err();

    assert!(matches!(err, PrError::UnknownModel { ref name } if name == "not-a-real-model"));
    assert!(backend.requests().is_empty());
}

#[test]
fn too_many_segments_fails_before_remote_calls() {
    let backend = ScriptedBackend::replying(&[]);
    let settings = RunSettings::new("gpt-3.5-turbo").with_split(SplitMode::Chars { max_chars: 1_000 });
    let orchestrator = Orchestrator::new(&backend, settings);

    let err = orchestrator.run(&sample_diff(20_000)).unwrap_err();

    assert!(matches!(err, PrError::TooManySegments { segments: 20, .. }));
    assert!(backend.requests().is_empty());
}

#[test]
fn segment_failure_aborts_the_run() {
    let backend = ScriptedBackend::new(vec![
        Ok("A".to_string()),
        Err(PrError::remote(Some(429), "rate limited")),
        Ok("C".to_string()),
        Ok("PR".to_string()),
    ]);
    let orchestrator = Orchestrator::new(&backend, three_part_settings());

    let mut states = Vec::new();
    let err = orchestrator
        .run_with(&sample_diff(30_000), |s| states.push(*s))
        .unwrap_err();

    assert!(matches!(err, PrError::RemoteCallFailed { status: Some(429), .. }));
    // No request after the failed one.
    assert_eq!(backend.requests().len(), 2);
    assert_eq!(states.last(), Some(&RunState::Failed));
    assert!(!states.contains(&RunState::Composing));
}

#[test]
fn states_progress_in_order() {
    let backend = ScriptedBackend::replying(&["A", "B", "C", "PR"]);
    let orchestrator = Orchestrator::new(&backend, three_part_settings());

    let mut states = Vec::new();
    orchestrator
        .run_with(&sample_diff(30_000), |s| states.push(*s))
        .unwrap();

    assert_eq!(
        states,
        vec![
            RunState::Planning,
            RunState::Summarizing { segment: 1, total: 3 },
            RunState::Summarizing { segment: 2, total: 3 },
            RunState::Summarizing { segment: 3, total: 3 },
            RunState::Composing,
            RunState::Done,
        ]
    );
}

#[test]
fn token_mode_sizes_segments_from_the_budget() {
    // About 9000 tokens of diff against a 4096-token model.
    let diff = (0..600)
        .map(|i| format!("+    let value_{i} = compute(input_{i}, &config);\n"))
        .collect::<String>();

    let backend = ScriptedBackend::replying(&["one ", "two ", "three ", "four ", "five ", "PR"]);
    let settings = RunSettings::new("gpt-3.5-turbo").with_split(SplitMode::Tokens { overlap: 200 });
    let orchestrator = Orchestrator::new(&backend, settings);

    let result = orchestrator.run(&diff).unwrap();
    let budget = result.budget.unwrap();

    assert!(result.segments.len() > 1);
    assert_eq!(result.segments.last().unwrap().end_offset, diff.chars().count());
    for pair in result.segments.windows(2) {
        assert_eq!(pair[1].overlap_with_previous, 200);
        assert_eq!(pair[1].start_offset, pair[0].end_offset - 200);
        assert!(pair[0].text.ends_with('\n'));
    }

    let requests = backend.requests();
    assert_eq!(requests.len(), result.segments.len() + 1);
    let (final_turns, _) = requests.last().unwrap();
    assert!(final_turns[0].content.ends_with(&result.summaries.concat()));
    assert!(budget.segment_token_limit < 4096);
}

#[test]
fn configured_context_window_is_used() {
    let backend = ScriptedBackend::replying(&["A", "PR"]);
    let catalog = ModelCatalog::builtin().with_override("gpt-4-1106-preview", 128_000);
    let orchestrator =
        Orchestrator::new(&backend, RunSettings::new("gpt-4-1106-preview")).with_catalog(catalog);

    let result = orchestrator.run(&sample_diff(2_000)).unwrap();

    assert_eq!(result.budget.unwrap().max_context_tokens, 128_000);
    assert_eq!(result.description, "PR");
}

#[test]
fn temperature_is_forwarded() {
    let backend = ScriptedBackend::replying(&["A", "PR"]);
    let settings = RunSettings::new("gpt-4").with_temperature(Some(0.2));
    let orchestrator = Orchestrator::new(&backend, settings);

    orchestrator.run(&sample_diff(800)).unwrap();

    assert!(backend
        .requests()
        .iter()
        .all(|(_, options)| options.temperature == Some(0.2)));
}
