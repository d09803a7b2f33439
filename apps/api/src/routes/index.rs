use anyhow::Context;
use askama::Template;
use axum::{extract::State, response::Html};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage<'a> {
    model: &'a str,
}

/// GET /
pub async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = IndexPage {
        model: state.llm.model(),
    };
    Ok(Html(page.render().context("render landing page")?))
}
