use clap::{ArgAction, ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "prdescribe",
    version,
    about = "LLM-assisted Pull Request description generator"
)]
#[command(group(
    ArgGroup::new("diff_source")
        .args(["base", "diff_file"])
        .required(true)
        .multiple(false)
))]
pub struct Cli {
    /// Base branch or revision to diff against (runs `git diff <base>`)
    pub base: Option<String>,

    /// Read the diff from a file instead of running git ('-' reads stdin)
    #[arg(long, value_name = "PATH")]
    pub diff_file: Option<PathBuf>,

    /// Model name to use (e.g. gpt-4, gpt-4o-mini)
    #[arg(long)]
    pub model: Option<String>,

    /// API key (otherwise uses OPENAI_API_KEY env var or the config file)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// How to cut the diff into segments
    #[arg(long, value_enum, default_value_t = SplitArg::Tokens)]
    pub split: SplitArg,

    /// Segment width in characters for `--split chars`
    #[arg(long, default_value_t = 24000)]
    pub max_chars: usize,

    /// Characters repeated between consecutive segments for `--split tokens`
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Sampling temperature passed to the model
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Also print the intermediate per-segment summaries
    #[arg(long)]
    pub show_summaries: bool,

    /// Plan and split only: print the budget and segments, make no model calls
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitArg {
    /// Token-aware, line-biased segments with overlap
    Tokens,
    /// Fixed-width character segments
    Chars,
}
