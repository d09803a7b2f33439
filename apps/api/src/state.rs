use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use reqwest::Client as HttpClient;

use crate::config::Config;
use crate::cv_analyzer::CvDraft;
use crate::datasets::values::{LlmValueSource, ValueSource};
use crate::llm_client::{LlmClient, LlmSettings};
use crate::tutor::QuestionStore;

/// Timeout for fetching websites to summarize.
const SCRAPE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    /// Plain HTTP client for fetching websites to summarize.
    pub http: HttpClient,
    pub config: Config,
    pub questions: Arc<QuestionStore>,
    /// Staged CV form inputs. Never hold the guard across an `.await`.
    pub cv_draft: Arc<Mutex<CvDraft>>,
    /// Fills dataset cells that need free text. Default: the LLM.
    pub value_source: Arc<dyn ValueSource>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let llm = LlmClient::new(LlmSettings::from(&config)).context("build LLM client")?;
        let http = HttpClient::builder()
            .timeout(SCRAPE_TIMEOUT)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            value_source: Arc::new(LlmValueSource(llm.clone())),
            llm,
            http,
            config,
            questions: Arc::new(QuestionStore::default()),
            cv_draft: Arc::new(Mutex::new(CvDraft::default())),
        })
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use std::path::PathBuf;
    use std::time::Duration;

    // Nothing listens on the discard port; tests never reach the model.
    let config = Config {
        api_key: "sk-test".to_string(),
        model: "test-model".to_string(),
        llm_base_url: "http://127.0.0.1:9/v1".to_string(),
        port: 0,
        rust_log: "info".to_string(),
        dataset_output_dir: PathBuf::from("generated_datasets"),
        stream_pace: Duration::ZERO,
    };
    AppState::new(config).unwrap()
}
