//! Axum route handlers for the synthetic data generator.

use std::path::PathBuf;

use anyhow::Context;
use askama::Template;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::datasets::generator::generate_datasets;
use crate::datasets::instruction::{parse_instruction, DatasetInstruction};
use crate::datasets::writer::{summary_markdown, write_datasets};
use crate::datasets::{instruction_system_prompt, instruction_user_prompt};
use crate::errors::AppError;
use crate::markdown::render_markdown;
use crate::relay::{sse_response, RelayMode};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InstructionStreamQuery {
    #[serde(default)]
    pub requirements: String,
    pub mode: Option<RelayMode>,
}

#[derive(Debug, Deserialize)]
pub struct InstructionRequest {
    pub requirements: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Instruction object, or the model's raw text.
    pub instruction: Value,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub files: Vec<String>,
    pub summary_markdown: String,
    pub summary_html: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Template)]
#[template(path = "datasets.html")]
struct DatasetsPage<'a> {
    model: &'a str,
    output_dir: String,
}

fn require_requirements(requirements: &str) -> Result<&str, AppError> {
    let requirements = requirements.trim();
    if requirements.is_empty() {
        return Err(AppError::Validation(
            "requirements cannot be empty".to_string(),
        ));
    }
    Ok(requirements)
}

/// GET /datasets
pub async fn handle_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = DatasetsPage {
        model: state.llm.model(),
        output_dir: state.config.dataset_output_dir.display().to_string(),
    };
    Ok(Html(page.render().context("render datasets page")?))
}

/// GET /api/datasets/instruction/stream?requirements=...
///
/// Streams the instruction JSON as it is written (accumulated text by default).
pub async fn handle_instruction_stream(
    State(state): State<AppState>,
    Query(query): Query<InstructionStreamQuery>,
) -> Result<Response, AppError> {
    let requirements = require_requirements(&query.requirements)?;
    let upstream = state
        .llm
        .stream(
            &instruction_user_prompt(requirements),
            instruction_system_prompt(),
        )
        .await?;

    let mode = query.mode.unwrap_or(RelayMode::Accumulated);
    info!("Streaming dataset instruction ({mode:?})");
    Ok(sse_response(upstream, mode, state.config.stream_pace).into_response())
}

/// POST /api/datasets/instruction
///
/// Non-streaming stage 1: returns the parsed and validated instruction.
pub async fn handle_instruction(
    State(state): State<AppState>,
    Json(request): Json<InstructionRequest>,
) -> Result<Json<DatasetInstruction>, AppError> {
    let requirements = require_requirements(&request.requirements)?;
    let raw: Value = state
        .llm
        .call_json(
            &instruction_user_prompt(requirements),
            instruction_system_prompt(),
        )
        .await?;

    let instruction = parse_instruction(&raw).map_err(|e| match e {
        AppError::Validation(msg) => AppError::UnprocessableEntity(format!(
            "The model returned an unusable instruction: {msg}"
        )),
        other => other,
    })?;
    info!(
        "Dataset instruction with {} entities",
        instruction.entities.len()
    );
    Ok(Json(instruction))
}

/// POST /api/datasets/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let instruction = parse_instruction(&request.instruction)?;
    info!(
        "Generating {} entities into {}",
        instruction.entities.len(),
        state.config.dataset_output_dir.display()
    );

    let mut rng = StdRng::from_entropy();
    let datasets = generate_datasets(&instruction, &mut rng, state.value_source.as_ref()).await?;

    let dir: PathBuf = state.config.dataset_output_dir.clone();
    let (datasets, paths) = tokio::task::spawn_blocking(move || {
        write_datasets(&dir, &datasets).map(|paths| (datasets, paths))
    })
    .await
    .context("dataset writer task failed")??;

    let summary = summary_markdown(&datasets, &paths);
    info!("Saved {} dataset files", paths.len());

    Ok(Json(GenerateResponse {
        files: paths.iter().map(|p| p.display().to_string()).collect(),
        summary_html: render_markdown(&summary),
        summary_markdown: summary,
        generated_at: Utc::now(),
    }))
}
