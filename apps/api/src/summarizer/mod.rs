//! Website Summarizer — scrapes a page and asks the model for a structured markdown summary.

pub mod handlers;
pub mod page;
pub mod prompts;

use futures::stream::BoxStream;
use tracing::info;

use crate::errors::AppError;
use crate::llm_client::prompts::collapse_whitespace;
use crate::llm_client::{LlmClient, LlmError};
use page::ScrapedPage;
use prompts::{summarize_prompt, SUMMARIZE_SYSTEM};

pub fn system_prompt() -> String {
    collapse_whitespace(SUMMARIZE_SYSTEM)
}

pub fn user_prompt(page: &ScrapedPage) -> String {
    summarize_prompt(&page.url, &page.title, &page.content)
}

/// Summarizes an already scraped page in one call.
pub async fn summarize(llm: &LlmClient, page: &ScrapedPage) -> Result<String, AppError> {
    info!("Summarizing {} ('{}')", page.url, page.title);
    let summary = llm.complete(&user_prompt(page), &system_prompt()).await?;
    Ok(summary)
}

/// Streams the summary of an already scraped page chunk by chunk.
pub async fn summarize_stream(
    llm: &LlmClient,
    page: &ScrapedPage,
) -> Result<BoxStream<'static, Result<String, LlmError>>, AppError> {
    info!("Streaming summary of {} ('{}')", page.url, page.title);
    let stream = llm.stream(&user_prompt(page), &system_prompt()).await?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_is_single_spaced() {
        let prompt = system_prompt();
        assert!(prompt.starts_with("You are an assistant"));
        assert!(prompt.contains("questions: 1. Globally"));
        assert!(!prompt.contains("  "));
        assert!(!prompt.contains('\n'));
    }

    #[test]
    fn test_user_prompt_carries_url_title_and_content() {
        let page = ScrapedPage {
            url: "https://acme.example".to_string(),
            title: "Acme".to_string(),
            content: "We build robots".to_string(),
        };
        let prompt = user_prompt(&page);
        assert!(prompt.contains("summarize: https://acme.example."));
        assert!(prompt.contains("Its title is Acme."));
        assert!(prompt.ends_with("\nWe build robots."));
    }

    #[test]
    fn test_user_prompt_keeps_braces_from_the_page() {
        let page = ScrapedPage {
            url: "https://tpl.example".to_string(),
            title: "Docs for {content}".to_string(),
            content: "Use {url} in templates".to_string(),
        };
        let prompt = user_prompt(&page);
        assert!(prompt.contains("Its title is Docs for {content}."));
        assert!(prompt.ends_with("\nUse {url} in templates."));
        assert_eq!(prompt.matches("https://tpl.example").count(), 1);
    }
}
