//! AI Tutor — answers free-form questions, streamed to the browser over SSE.
//!
//! Flow: `/api/tutor/chat` registers a question and hands back an id,
//! `/api/tutor/stream/:id` takes the question and relays the model's answer.

pub mod handlers;
pub mod prompts;

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::llm_client::prompts::collapse_indentation;
use prompts::{TUTOR_PROMPT_TEMPLATE, TUTOR_SYSTEM};

/// Questions nobody streamed within this window are dropped.
const PENDING_TTL_MINUTES: i64 = 10;

pub fn system_prompt() -> String {
    collapse_indentation(TUTOR_SYSTEM)
}

pub fn user_prompt(question: &str) -> String {
    collapse_indentation(&TUTOR_PROMPT_TEMPLATE.replace("{question}", question))
}

#[derive(Debug, Clone)]
struct PendingQuestion {
    text: String,
    asked_at: DateTime<Utc>,
}

/// Questions waiting for their answer stream. Each id streams at most once.
#[derive(Debug, Default)]
pub struct QuestionStore {
    pending: Mutex<HashMap<Uuid, PendingQuestion>>,
}

impl QuestionStore {
    pub fn insert(&self, question: String) -> Uuid {
        self.insert_at(question, Utc::now())
    }

    fn insert_at(&self, question: String, now: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let cutoff = now - Duration::minutes(PENDING_TTL_MINUTES);
        pending.retain(|_, q| q.asked_at >= cutoff);
        pending.insert(
            id,
            PendingQuestion {
                text: question,
                asked_at: now,
            },
        );
        id
    }

    /// Removes and returns the question, if it is still pending.
    pub fn take(&self, id: Uuid) -> Option<String> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .map(|q| q.text)
    }

    /// Questions still waiting to be streamed.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_collapses_indentation() {
        let prompt = system_prompt();
        assert!(prompt.contains("You are an AI tutor"));
        assert!(!prompt.contains("    "));
        assert!(!prompt.contains('\t'));
    }

    #[test]
    fn test_user_prompt_embeds_question() {
        let prompt = user_prompt("What is a borrow checker?");
        assert!(prompt.contains("Here is my question:\n What is a borrow checker?"));
        assert!(prompt.contains("Please respond in Markdown format."));
    }

    #[test]
    fn test_store_take_is_single_use() {
        let store = QuestionStore::default();
        let id = store.insert("What is Rust?".to_string());
        assert_eq!(store.take(id).as_deref(), Some("What is Rust?"));
        assert!(store.take(id).is_none());
    }

    #[test]
    fn test_store_unknown_id_is_none() {
        let store = QuestionStore::default();
        assert!(store.take(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_store_evicts_stale_questions_on_insert() {
        let store = QuestionStore::default();
        let start = Utc::now();
        let stale = store.insert_at("old".to_string(), start);
        let fresh = store.insert_at("new".to_string(), start + Duration::minutes(11));
        assert_eq!(store.pending_count(), 1);
        assert!(store.take(stale).is_none());
        assert_eq!(store.take(fresh).as_deref(), Some("new"));
    }
}
