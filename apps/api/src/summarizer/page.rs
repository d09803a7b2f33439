//! Website scraping — fetches a page and reduces it to its title and visible text.

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::errors::AppError;

pub const NO_TITLE: &str = "No title found";
pub const NO_CONTENT: &str = "No content found";

/// Page text beyond this many characters is dropped before prompting.
pub const MAX_CONTENT_CHARS: usize = 20_000;

/// Elements whose subtrees never contribute text.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "img", "input"];

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// Accepts only absolute http(s) URLs.
pub fn validate_url(url: &str) -> Result<reqwest::Url, AppError> {
    let parsed = reqwest::Url::parse(url.trim())
        .map_err(|e| AppError::Validation(format!("Invalid URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(AppError::Validation(format!(
            "Unsupported URL scheme '{other}', expected http or https"
        ))),
    }
}

/// Fetches the URL and extracts its title and text content.
pub async fn scrape(client: &Client, url: &str) -> Result<ScrapedPage, AppError> {
    let parsed = validate_url(url)?;
    info!("Scraping {parsed}");

    let response = client
        .get(parsed.clone())
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
        .map_err(|e| AppError::Scrape(format!("request to {parsed} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Scrape(format!("{parsed} returned {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| AppError::Scrape(format!("reading {parsed} failed: {e}")))?;

    let page = extract_page(parsed.as_str(), &body)?;
    debug!(
        "Scraped '{}' ({} chars of content)",
        page.title,
        page.content.len()
    );
    Ok(page)
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid selector '{css}': {e:?}")))
}

/// Extracts title and visible body text from an HTML document.
pub fn extract_page(url: &str, html: &str) -> Result<ScrapedPage, AppError> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());

    let content = document
        .select(&selector("body")?)
        .next()
        .map(visible_text)
        .filter(|t| !t.is_empty())
        .map(|t| truncate_chars(&t, MAX_CONTENT_CHARS))
        .unwrap_or_else(|| NO_CONTENT.to_string());

    Ok(ScrapedPage {
        url: url.to_string(),
        title,
        content,
    })
}

/// One stripped, non-empty text node per line, skipping non-visible subtrees.
fn visible_text(body: ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let text = text.trim();
        if !text.is_empty() {
            lines.push(text);
        }
    }
    lines.join("\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
