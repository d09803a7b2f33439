use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// API key value that selects a locally served Ollama model instead of the hosted API.
pub const OLLAMA_API_KEY: &str = "ollama";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Application configuration loaded from environment variables.
/// Startup fails if the API key is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub llm_base_url: String,
    pub port: u16,
    pub rust_log: String,
    pub dataset_output_dir: PathBuf,
    pub stream_pace: Duration,
}

/// Per-run overrides coming from the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    pub fn from_env(overrides: Overrides) -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let api_key = match overrides.api_key {
            Some(key) => key,
            None => require_env("OPENAI_API_KEY")?,
        };
        validate_api_key(&api_key)?;

        let llm_base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| default_base_url(&api_key).to_string());

        let port = match overrides.port {
            Some(port) => port,
            None => std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
        };

        let pace_ms = std::env::var("STREAM_PACE_MS")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<u64>()
            .context("STREAM_PACE_MS must be a whole number of milliseconds")?;

        Ok(Config {
            model: overrides
                .model
                .or_else(|| std::env::var("LLM_MODEL").ok())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            llm_base_url,
            port,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            dataset_output_dir: std::env::var("DATASET_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("generated_datasets")),
            stream_pace: Duration::from_millis(pace_ms),
        })
    }

    pub fn uses_ollama(&self) -> bool {
        self.api_key == OLLAMA_API_KEY
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn default_base_url(api_key: &str) -> &'static str {
    if api_key == OLLAMA_API_KEY {
        OLLAMA_BASE_URL
    } else {
        OPENAI_BASE_URL
    }
}

/// Hosted-API keys must look like `sk-...`; the key itself never ends up in an error.
fn validate_api_key(api_key: &str) -> Result<()> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        bail!("API key is empty; set OPENAI_API_KEY or pass --api-key");
    }
    if api_key != OLLAMA_API_KEY && !api_key.starts_with("sk-") {
        bail!("API key does not look like an OpenAI key (expected an 'sk-' prefix, or 'ollama' for a local model)");
    }
    Ok(())
}
