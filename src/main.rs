mod cli_args;
mod config;
mod git;
mod logging;
mod setup;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressBar;
use prdescribe::models::ModelCatalog;
use prdescribe::orchestrator::{self, RunSettings, RunState, SplitMode};
use prdescribe::split::DEFAULT_OVERLAP;
use prdescribe::Orchestrator;
use std::fs;
use std::io::{self, Read};
use std::time::Duration;

use crate::cli_args::{Cli, SplitArg};
use crate::config::Config;

/// Read the diff from --diff-file (or stdin), or ask git for it.
fn read_diff(cli: &Cli) -> Result<String> {
    if let Some(path) = &cli.diff_file {
        if path.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read diff from stdin")?;
            return Ok(buf);
        }
        return fs::read_to_string(path)
            .with_context(|| format!("failed to read diff from {}", path.display()));
    }

    let base = cli
        .base
        .as_deref()
        .context("a base branch or --diff-file is required")?;
    let branch = git::current_branch()?;
    log::info!("Diffing {branch} against {base}");
    git::diff_against(base)
}

fn run_settings(cli: &Cli, cfg: &Config) -> RunSettings {
    let split = match cli.split {
        SplitArg::Tokens => SplitMode::Tokens {
            overlap: cfg.overlap.unwrap_or(DEFAULT_OVERLAP),
        },
        SplitArg::Chars => SplitMode::Chars {
            max_chars: cli.max_chars,
        },
    };

    RunSettings::new(cfg.model.clone())
        .with_split(split)
        .with_temperature(cfg.temperature)
}

/// Dry run: plan and split only, no model calls.
fn run_dry(settings: &RunSettings, catalog: &ModelCatalog, diff: &str) -> Result<()> {
    let plan = orchestrator::prepare_run(settings, catalog, diff)?;

    println!("Model: {} ({} token context)", plan.profile.name(), plan.profile.max_context_tokens());
    println!("Segment token limit: {}", plan.budget.segment_token_limit);
    println!("Segment reply cap: {}", plan.budget.segment_response_token_cap);
    println!("Final request budget: {}", plan.budget.final_response_token_budget);
    println!("Segments: {}", plan.segments.len());
    for segment in &plan.segments {
        println!(
            "  #{:<3} chars {}..{} (overlap {})",
            segment.index + 1,
            segment.start_offset,
            segment.end_offset,
            segment.overlap_with_previous
        );
    }

    Ok(())
}

fn describe_state(state: &RunState) -> String {
    match state {
        RunState::Planning => "Planning token budget...".to_string(),
        RunState::Summarizing { segment, total } => {
            format!("Summarizing part {segment}/{total}...")
        }
        RunState::Composing => "Writing PR description...".to_string(),
        RunState::Done => "Done".to_string(),
        RunState::Failed => "Failed".to_string(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    let cfg = Config::from_sources(&cli);
    let diff = read_diff(&cli)?;
    let settings = run_settings(&cli, &cfg);
    let catalog = cfg.model_catalog();

    if cli.dry_run {
        return run_dry(&settings, &catalog, &diff);
    }

    let backend = setup::build_chat_client(&cfg)?;
    let orchestrator = Orchestrator::new(backend.as_ref(), settings).with_catalog(catalog);

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(120));
    let result = orchestrator.run_with(&diff, |state| spinner.set_message(describe_state(state)));
    spinner.finish_and_clear();
    let result = result?;

    if result.segments.is_empty() {
        println!("Diff is empty; nothing to describe.");
        return Ok(());
    }

    if cli.show_summaries {
        for (segment, summary) in result.segments.iter().zip(&result.summaries) {
            println!();
            println!("----- Summary of part {}/{} -----", segment.index + 1, result.segments.len());
            println!("{summary}");
        }
    }

    println!();
    println!("----- PR Description Preview -----");
    println!("{}", result.description);
    println!("----------------------------------");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_split_flag() {
        let cli = Cli::try_parse_from(["prdescribe", "main", "--split", "chars", "--max-chars", "500"])
            .unwrap();
        let cfg = Config::from_sources(&cli);
        let settings = run_settings(&cli, &cfg);
        assert_eq!(settings.split, SplitMode::Chars { max_chars: 500 });
    }

    #[test]
    fn progress_messages_name_the_part() {
        assert_eq!(
            describe_state(&RunState::Summarizing { segment: 2, total: 5 }),
            "Summarizing part 2/5..."
        );
    }
}
