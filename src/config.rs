use crate::cli_args::Cli;
use prdescribe::models::ModelCatalog;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_API_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Final resolved configuration for prdescribe.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub model: String,
    pub api_base_url: String,
    pub timeout: Duration,
    pub temperature: Option<f32>,
    pub overlap: Option<usize>,
    pub context_windows: BTreeMap<String, usize>,
}

/// Values read from the environment.
#[derive(Debug, Default)]
pub struct EnvConfig {
    pub model: Option<String>,
    pub openai_api_key: Option<String>,
    pub api_base_url: Option<String>,
}

impl EnvConfig {
    fn from_env() -> Self {
        EnvConfig {
            model: env::var("PRDESCRIBE_MODEL").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            api_base_url: env::var("PRDESCRIBE_API_BASE_URL").ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    /// Default model to use when not provided via CLI or env.
    pub model: Option<String>,
    pub openai_api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
    pub overlap: Option<usize>,
    /// Context window sizes for models the built-in table does not know.
    #[serde(default)]
    pub context_windows: BTreeMap<String, usize>,
}

impl Config {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags (`--model`, `--api-key`, ...)
    ///   2. Env vars `PRDESCRIBE_MODEL`, `OPENAI_API_KEY`, `PRDESCRIBE_API_BASE_URL`
    ///   3. TOML `~/.config/prdescribe.toml`
    ///   4. Hardcoded defaults
    pub fn from_sources(cli: &Cli) -> Self {
        let file_cfg = load_file_config().unwrap_or_default();
        Self::resolve(cli, EnvConfig::from_env(), file_cfg)
    }

    fn resolve(cli: &Cli, env_cfg: EnvConfig, file_cfg: FileConfig) -> Self {
        let model = cli
            .model
            .clone()
            .or(env_cfg.model)
            .or(file_cfg.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        // A blank key at one level must not hide a real one below it.
        let present = |key: &String| !key.trim().is_empty();
        let openai_api_key = cli
            .api_key
            .clone()
            .filter(present)
            .or(env_cfg.openai_api_key.filter(present))
            .or(file_cfg.openai_api_key.filter(present));

        let api_base_url = env_cfg
            .api_base_url
            .or(file_cfg.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let timeout =
            Duration::from_secs(file_cfg.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

        Config {
            openai_api_key,
            model,
            api_base_url,
            timeout,
            temperature: cli.temperature.or(file_cfg.temperature),
            overlap: cli.overlap.or(file_cfg.overlap),
            context_windows: file_cfg.context_windows,
        }
    }

    /// Built-in context windows plus any declared in the config file.
    pub fn model_catalog(&self) -> ModelCatalog {
        self.context_windows
            .iter()
            .fold(ModelCatalog::builtin(), |catalog, (name, tokens)| {
                catalog.with_override(name.clone(), *tokens)
            })
    }
}

/// Return `~/.config/prdescribe.toml`
fn config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("prdescribe.toml"))
}

fn load_file_config() -> Option<FileConfig> {
    let path = config_path()?;
    if !path.exists() {
        return None;
    }

    let data = fs::read_to_string(&path).ok()?;
    match toml::from_str::<FileConfig>(&data) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("Ignoring {}: {e}", path.display());
            None
        }
    }
}
