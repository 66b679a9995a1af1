use anyhow::{anyhow, Result};
use log::debug;
use prdescribe::llm::ChatBackend;
use prdescribe::llm::openai::OpenAiClient;

use crate::config::Config;

/// Build the chat backend from the resolved config.
pub fn build_chat_client(cfg: &Config) -> Result<Box<dyn ChatBackend>> {
    let key = cfg.openai_api_key.clone().ok_or_else(|| {
        anyhow!("OPENAI_API_KEY (or --api-key, or openai_api_key in the config file) is required unless --dry-run is used")
    })?;

    debug!("Using OpenAiClient at {} with model: {}", cfg.api_base_url, cfg.model);

    let client = OpenAiClient::new(key, cfg.api_base_url.clone(), cfg.timeout)?;
    Ok(Box::new(client))
}
