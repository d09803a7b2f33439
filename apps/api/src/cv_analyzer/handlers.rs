//! Axum route handlers for the CV analyzer.

use anyhow::Context;
use askama::Template;
use axum::{
    extract::{Multipart, State},
    response::Html,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::cv_analyzer::pdf::extract_pdf_text;
use crate::cv_analyzer::{analyze, CvDraft};
use crate::errors::AppError;
use crate::markdown::render_markdown;
use crate::state::AppState;

/// Upload limit for CV forms.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Fields accepted from either the staged page form or the JSON API.
#[derive(Debug, Default)]
struct CvForm {
    job_description: Option<String>,
    pdf: Option<(String, Bytes)>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub markdown: String,
    pub html: String,
}

#[derive(Template)]
#[template(path = "cv.html")]
struct CvPage {
    job_description: Option<String>,
    cv_filename: Option<String>,
    report_html: Option<String>,
    error: Option<String>,
}

impl CvPage {
    fn from_draft(draft: &CvDraft, error: Option<String>) -> Self {
        Self {
            job_description: draft.job_description.clone(),
            cv_filename: draft.cv_filename.clone(),
            report_html: draft.last_report.as_deref().map(render_markdown),
            error,
        }
    }
}

async fn read_form(mut multipart: Multipart) -> Result<CvForm, AppError> {
    let mut form = CvForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text_input" | "job_description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable job description: {e}")))?;
                if !text.trim().is_empty() {
                    form.job_description = Some(text);
                }
            }
            "pdf_file" | "cv_pdf" => {
                let filename = field.file_name().unwrap_or("cv.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable upload: {e}")))?;
                if !data.is_empty() {
                    form.pdf = Some((filename, data));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn render_page(page: CvPage) -> Result<Html<String>, AppError> {
    Ok(Html(page.render().context("render cv page")?))
}

fn snapshot(state: &AppState) -> CvDraft {
    state
        .cv_draft
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /cv
pub async fn handle_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    render_page(CvPage::from_draft(&snapshot(&state), None))
}

/// POST /cv
///
/// Stages whichever inputs were submitted. Once both the job description and
/// the CV are staged, runs the analysis and resets the inputs.
pub async fn handle_submit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    match stage_and_analyze(&state, multipart).await {
        Ok(()) => render_page(CvPage::from_draft(&snapshot(&state), None)),
        Err(AppError::Validation(msg)) | Err(AppError::UnprocessableEntity(msg)) => {
            warn!("CV form rejected: {msg}");
            render_page(CvPage::from_draft(&snapshot(&state), Some(msg)))
        }
        Err(e) => Err(e),
    }
}

async fn stage_and_analyze(state: &AppState, multipart: Multipart) -> Result<(), AppError> {
    let form = read_form(multipart).await?;

    let cv = match form.pdf {
        Some((filename, data)) => Some((filename, extract_pdf_text(data).await?)),
        None => None,
    };

    let ready = {
        let mut draft = state.cv_draft.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(text) = form.job_description {
            draft.set_job_description(text);
        }
        if let Some((filename, text)) = cv {
            info!("Staged CV '{filename}'");
            draft.set_cv(filename, text);
        }
        draft.take_ready()
    };

    if let Some((job_description, cv_text)) = ready {
        let report = analyze(&state.llm, &job_description, &cv_text).await?;
        state
            .cv_draft
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_report = Some(report);
    }

    Ok(())
}

/// POST /api/cv/analyze
///
/// One-shot analysis: multipart `job_description` + `cv_pdf`, returns the report
/// as markdown and rendered HTML. Does not touch the staged page form.
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let form = read_form(multipart).await?;

    let job_description = form
        .job_description
        .ok_or_else(|| AppError::Validation("job_description cannot be empty".to_string()))?;
    let (_, pdf) = form
        .pdf
        .ok_or_else(|| AppError::Validation("cv_pdf is required".to_string()))?;

    let cv_text = extract_pdf_text(pdf).await?;
    let markdown = analyze(&state.llm, job_description.trim(), &cv_text).await?;
    let html = render_markdown(&markdown);

    Ok(Json(AnalyzeResponse { markdown, html }))
}
