pub mod health;
pub mod index;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::cv_analyzer::handlers::{self as cv, MAX_UPLOAD_BYTES};
use crate::datasets::handlers as datasets;
use crate::state::AppState;
use crate::summarizer::handlers as summarizer;
use crate::tutor::handlers as tutor;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index::index_handler))
        .route("/health", get(health::health_handler))
        // AI tutor
        .route("/tutor", get(tutor::handle_page))
        .route("/api/tutor/chat", get(tutor::handle_chat))
        .route("/api/tutor/stream/:question_id", get(tutor::handle_stream))
        // CV analyzer
        .route(
            "/cv",
            get(cv::handle_page)
                .post(cv::handle_submit)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/cv/analyze",
            post(cv::handle_analyze).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // Website summarizer
        .route("/summarizer", get(summarizer::handle_page))
        .route("/api/summarizer", post(summarizer::handle_summarize))
        .route("/api/summarizer/stream", get(summarizer::handle_stream))
        // Synthetic data generator
        .route("/datasets", get(datasets::handle_page))
        .route(
            "/api/datasets/instruction",
            post(datasets::handle_instruction),
        )
        .route(
            "/api/datasets/instruction/stream",
            get(datasets::handle_instruction_stream),
        )
        .route("/api/datasets/generate", post(datasets::handle_generate))
        .with_state(state)
}
