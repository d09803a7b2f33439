//! Axum route handlers for the website summarizer.

use anyhow::Context;
use askama::Template;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::markdown::render_markdown;
use crate::relay::{sse_response, RelayMode};
use crate::state::AppState;
use crate::summarizer::page::{scrape, validate_url};
use crate::summarizer::{summarize, summarize_stream};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub url: String,
    #[serde(default)]
    pub mode: RelayMode,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub url: String,
    pub title: String,
    pub markdown: String,
    pub html: String,
}

/// Side-by-side view: the live site on the left, the streamed summary on the right.
#[derive(Template)]
#[template(path = "summarizer.html")]
struct SummarizerPage {
    url: Option<String>,
    error: Option<String>,
}

/// GET /summarizer?url=...
pub async fn handle_page(Query(query): Query<PageQuery>) -> Result<Html<String>, AppError> {
    let url = query.url.filter(|u| !u.trim().is_empty());
    let page = match url {
        Some(url) => match validate_url(&url) {
            Ok(parsed) => SummarizerPage {
                url: Some(parsed.to_string()),
                error: None,
            },
            Err(AppError::Validation(msg)) => SummarizerPage {
                url: None,
                error: Some(msg),
            },
            Err(e) => return Err(e),
        },
        None => SummarizerPage {
            url: None,
            error: None,
        },
    };
    Ok(Html(page.render().context("render summarizer page")?))
}

/// GET /api/summarizer/stream?url=...
///
/// Scrapes the site, then relays the summary as SSE (rendered HTML by default).
pub async fn handle_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, AppError> {
    let page = scrape(&state.http, &query.url).await?;
    let upstream = summarize_stream(&state.llm, &page).await?;
    Ok(sse_response(upstream, query.mode, state.config.stream_pace).into_response())
}

/// POST /api/summarizer
pub async fn handle_summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, AppError> {
    if request.url.trim().is_empty() {
        return Err(AppError::Validation("url cannot be empty".to_string()));
    }

    let page = scrape(&state.http, &request.url).await?;
    let markdown = summarize(&state.llm, &page).await?;
    let html = render_markdown(&markdown);

    Ok(Json(SummarizeResponse {
        url: page.url,
        title: page.title,
        markdown,
        html,
    }))
}
