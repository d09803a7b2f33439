//! CV Analyzer — compares an uploaded CV with a job description and reports the alignment.
//!
//! The browser form is staged: the job description and the PDF can be submitted
//! separately. Analysis runs as soon as both are present, then the inputs reset.

pub mod handlers;
pub mod pdf;
pub mod prompts;

use tracing::info;

use crate::errors::AppError;
use crate::llm_client::prompts::collapse_blanks;
use crate::llm_client::LlmClient;
use prompts::{cv_analyze_prompt, CV_ANALYZE_SYSTEM};

pub fn system_prompt() -> String {
    collapse_blanks(CV_ANALYZE_SYSTEM)
}

pub fn user_prompt(job_description: &str, cv_content: &str) -> String {
    cv_analyze_prompt(job_description, cv_content)
}

/// Runs the alignment analysis and returns the model's markdown report.
pub async fn analyze(
    llm: &LlmClient,
    job_description: &str,
    cv_content: &str,
) -> Result<String, AppError> {
    info!(
        "Analyzing CV ({} chars) against job description ({} chars)",
        cv_content.len(),
        job_description.len()
    );
    let report = llm
        .complete(&user_prompt(job_description, cv_content), &system_prompt())
        .await?;
    Ok(report)
}

/// Inputs staged by the browser form, plus the last finished report.
#[derive(Debug, Default, Clone)]
pub struct CvDraft {
    pub job_description: Option<String>,
    pub cv_text: Option<String>,
    pub cv_filename: Option<String>,
    pub last_report: Option<String>,
}

impl CvDraft {
    pub fn set_job_description(&mut self, text: String) {
        let text = text.trim().to_string();
        self.job_description = (!text.is_empty()).then_some(text);
    }

    pub fn set_cv(&mut self, filename: String, text: String) {
        self.cv_filename = Some(filename);
        self.cv_text = Some(text);
    }

    /// When both inputs are staged, clears them and returns `(job_description, cv_text)`.
    pub fn take_ready(&mut self) -> Option<(String, String)> {
        if self.job_description.is_none() || self.cv_text.is_none() {
            return None;
        }
        self.cv_filename = None;
        let job_description = self.job_description.take()?;
        let cv_text = self.cv_text.take()?;
        Some((job_description, cv_text))
    }
}
