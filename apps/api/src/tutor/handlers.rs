//! Axum route handlers for the AI tutor.

use anyhow::Context;
use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::relay::{sse_response, RelayMode};
use crate::state::AppState;
use crate::tutor::{system_prompt, user_prompt};

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub question_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub mode: RelayMode,
}

#[derive(Template)]
#[template(path = "tutor.html")]
struct TutorPage<'a> {
    model: &'a str,
}

/// GET /tutor
pub async fn handle_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = TutorPage {
        model: state.llm.model(),
    };
    Ok(Html(page.render().context("render tutor page")?))
}

/// GET /api/tutor/chat?message=...
///
/// Registers the question; the answer is streamed from `/api/tutor/stream/:id`.
pub async fn handle_chat(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = query.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("Error: Empty message".to_string()));
    }

    let question_id = state.questions.insert(message.to_string());
    info!(
        "Tutor question {question_id} received ({} chars, {} pending)",
        message.len(),
        state.questions.pending_count()
    );

    Ok(Json(ChatResponse {
        question_id,
        status: "Message received",
    }))
}

/// GET /api/tutor/stream/:question_id
///
/// Streams the answer as SSE. A question can be streamed once.
pub async fn handle_stream(
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, AppError> {
    let question = state
        .questions
        .take(question_id)
        .ok_or_else(|| AppError::NotFound(format!("Question {question_id} not found")))?;

    let upstream = state
        .llm
        .stream(&user_prompt(&question), &system_prompt())
        .await?;
    info!("Streaming tutor answer for {question_id} ({:?})", query.mode);

    Ok(sse_response(upstream, query.mode, state.config.stream_pace).into_response())
}
